//! Pointer and keyboard primitives shared by every backend

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

/// Screen coordinates in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Point at fraction `t` (0.0..=1.0) of the way to `to`
    pub fn lerp(&self, to: Point, t: f64) -> Point {
        let t = t.clamp(0.0, 1.0);
        Point {
            x: self.x + (f64::from(to.x - self.x) * t).round() as i32,
            y: self.y + (f64::from(to.y - self.y) * t).round() as i32,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        };
        f.write_str(s)
    }
}

impl FromStr for MouseButton {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" | "l" => Ok(MouseButton::Left),
            "right" | "r" => Ok(MouseButton::Right),
            "middle" | "center" | "m" => Ok(MouseButton::Middle),
            other => Err(Error::invalid_argument(format!(
                "Unknown mouse button: {}",
                other
            ))),
        }
    }
}

/// How a key or button event is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    Down,
    Up,
    /// Down immediately followed by up
    Press,
}

/// Interval between interpolated pointer moves during a drag
const DRAG_STEP: Duration = Duration::from_millis(10);
const MAX_DRAG_STEPS: u64 = 50;

/// OS-level input capability.
///
/// Position queries must not block. Every other call may block, but only for
/// as long as the event itself takes (a drag blocks for its duration).
pub trait InputSynthesizer: Send + Sync {
    /// Short backend name for status output
    fn backend(&self) -> &'static str;

    fn current_position(&self) -> Result<Point>;

    fn move_to(&self, to: Point) -> Result<()>;

    /// Move to `at`, then click `clicks` times
    fn click(&self, at: Point, button: MouseButton, clicks: u32) -> Result<()>;

    fn button(&self, button: MouseButton, mode: KeyMode) -> Result<()>;

    fn key_event(&self, key: &str, mode: KeyMode) -> Result<()>;

    /// Scroll by `amount` wheel notches (positive = up), at `at` or the current position
    fn scroll(&self, amount: i32, at: Option<Point>) -> Result<()>;

    /// Press `button` at `from`, glide to `to` over `duration`, release
    fn drag(&self, from: Point, to: Point, button: MouseButton, duration: Duration) -> Result<()> {
        self.move_to(from)?;
        self.button(button, KeyMode::Down)?;

        let steps = (duration.as_millis() as u64 / DRAG_STEP.as_millis() as u64)
            .clamp(1, MAX_DRAG_STEPS);
        let pause = duration / steps as u32;
        let mut result = Ok(());
        for i in 1..=steps {
            thread::sleep(pause);
            if let Err(e) = self.move_to(from.lerp(to, i as f64 / steps as f64)) {
                result = Err(e);
                break;
            }
        }

        // Always release, even if a move failed midway
        let released = self.button(button, KeyMode::Up);
        result.and(released)
    }

    /// Hold every key down in order, then release in reverse order
    fn key_combo(&self, keys: &[String]) -> Result<()> {
        let mut held: Vec<&str> = Vec::with_capacity(keys.len());
        let mut result = Ok(());
        for key in keys {
            match self.key_event(key, KeyMode::Down) {
                Ok(()) => held.push(key.as_str()),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        for key in held.iter().rev() {
            let released = self.key_event(key, KeyMode::Up);
            if result.is_ok() {
                result = released;
            }
        }
        result
    }
}
