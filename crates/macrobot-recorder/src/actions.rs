//! Macro data model
//!
//! Actions serialize as flat JSON records with a `kind` tag, so a stored macro
//! reads as a plain list of `{kind, x, y, delay_ms, captured_at, ...}` objects.

use chrono::{DateTime, Utc};
use macrobot_input::{MouseButton, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const DEFAULT_DRAG_MS: u64 = 500;

fn one() -> u32 {
    1
}

fn default_drag_ms() -> u64 {
    DEFAULT_DRAG_MS
}

/// What to do - one input event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Pointer move
    Move { x: i32, y: i32 },

    /// Move then click
    Click {
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
        #[serde(default = "one")]
        clicks: u32,
    },

    /// Press at (x, y), glide to (end_x, end_y), release
    Drag {
        x: i32,
        y: i32,
        end_x: i32,
        end_y: i32,
        #[serde(default)]
        button: MouseButton,
        #[serde(default = "default_drag_ms")]
        duration_ms: u64,
    },

    KeyPress { key: String },

    /// Keys held together, e.g. ["ctrl", "shift", "s"]
    KeyCombo { keys: Vec<String> },

    /// Wheel notches, positive = up. Without a position, scrolls wherever the pointer is.
    Scroll {
        amount: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<i32>,
    },

    /// Authored pause, separate from the inter-action delay
    Wait { duration_ms: u64 },
}

impl Action {
    pub fn move_to(to: Point) -> Self {
        Action::Move { x: to.x, y: to.y }
    }

    pub fn click(at: Point, button: MouseButton, clicks: u32) -> Self {
        Action::Click {
            x: at.x,
            y: at.y,
            button,
            clicks,
        }
    }

    pub fn drag(from: Point, to: Point, button: MouseButton, duration: Duration) -> Self {
        Action::Drag {
            x: from.x,
            y: from.y,
            end_x: to.x,
            end_y: to.y,
            button,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        Action::KeyPress { key: key.into() }
    }

    pub fn combo<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Action::KeyCombo {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn scroll(amount: i32, at: Option<Point>) -> Self {
        Action::Scroll {
            amount,
            x: at.map(|p| p.x),
            y: at.map(|p| p.y),
        }
    }

    pub fn wait(duration: Duration) -> Self {
        Action::Wait {
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Stable name used in logs, reports and the `kind` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Move { .. } => "move",
            Action::Click { .. } => "click",
            Action::Drag { .. } => "drag",
            Action::KeyPress { .. } => "key_press",
            Action::KeyCombo { .. } => "key_combo",
            Action::Scroll { .. } => "scroll",
            Action::Wait { .. } => "wait",
        }
    }

    /// Where the action happens, for kinds that have a position
    pub fn position(&self) -> Option<Point> {
        match self {
            Action::Move { x, y } | Action::Click { x, y, .. } | Action::Drag { x, y, .. } => {
                Some(Point::new(*x, *y))
            }
            Action::Scroll {
                x: Some(x),
                y: Some(y),
                ..
            } => Some(Point::new(*x, *y)),
            _ => None,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Action::Click { clicks: 0, .. } => Err("click needs at least 1 click".into()),
            Action::KeyPress { key } if key.trim().is_empty() => Err("key press has no key".into()),
            Action::KeyCombo { keys } if keys.is_empty() => Err("key combo has no keys".into()),
            Action::KeyCombo { keys } if keys.iter().any(|k| k.trim().is_empty()) => {
                Err("key combo contains an empty key".into())
            }
            Action::Scroll { x, y, .. } if x.is_some() != y.is_some() => {
                Err("scroll position needs both x and y".into())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move { x, y } => write!(f, "move to ({}, {})", x, y),
            Action::Click {
                x,
                y,
                button,
                clicks,
            } => write!(f, "{} click x{} at ({}, {})", button, clicks, x, y),
            Action::Drag {
                x,
                y,
                end_x,
                end_y,
                button,
                duration_ms,
            } => write!(
                f,
                "{} drag ({}, {}) -> ({}, {}) over {}ms",
                button, x, y, end_x, end_y, duration_ms
            ),
            Action::KeyPress { key } => write!(f, "press {}", key),
            Action::KeyCombo { keys } => write!(f, "press {}", keys.join("+")),
            Action::Scroll { amount, .. } => match self.position() {
                Some(at) => write!(f, "scroll {} at {}", amount, at),
                None => write!(f, "scroll {}", amount),
            },
            Action::Wait { duration_ms } => write!(f, "wait {}ms", duration_ms),
        }
    }
}

/// One action as captured: the event plus the gap since the previous one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(flatten)]
    pub action: Action,
    /// Wall-clock gap since the previous action, reproduced during playback
    pub delay_ms: u64,
    pub captured_at: DateTime<Utc>,
}

impl ActionRecord {
    pub fn new(action: Action, delay: Duration) -> Self {
        Self {
            action,
            delay_ms: delay.as_millis() as u64,
            captured_at: Utc::now(),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// A named, ordered sequence of actions plus timing metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub actions: Vec<ActionRecord>,
    /// Sum of every `delay_ms`
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
    pub action_count: usize,
}

impl Macro {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        actions: Vec<ActionRecord>,
    ) -> Self {
        let mut m = Self {
            name: name.into(),
            description: description.into(),
            actions,
            duration_ms: 0,
            created_at: Utc::now(),
            action_count: 0,
        };
        m.refresh();
        m
    }

    /// Recompute the derived fields from `actions`
    pub fn refresh(&mut self) {
        self.duration_ms = self.actions.iter().map(|a| a.delay_ms).sum();
        self.action_count = self.actions.len();
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// First invalid action, if any
    pub fn validate(&self) -> std::result::Result<(), (usize, String)> {
        for (i, record) in self.actions.iter().enumerate() {
            record.action.validate().map_err(|reason| (i, reason))?;
        }
        Ok(())
    }

    pub fn info(&self) -> MacroInfo {
        MacroInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            duration_ms: self.duration_ms,
            action_count: self.action_count,
            created_at: self.created_at,
        }
    }
}

/// Summary of a stored macro, without its actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroInfo {
    pub name: String,
    pub description: String,
    pub duration_ms: u64,
    pub action_count: usize,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for MacroInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Macro '{}': {} actions, {:.1}s, created {}",
            self.name,
            self.action_count,
            self.duration_ms as f64 / 1000.0,
            self.created_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        if !self.description.is_empty() {
            write!(f, " ({})", self.description)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_fields_follow_actions() {
        let m = Macro::new(
            "loot_run",
            "",
            vec![
                ActionRecord::new(Action::move_to(Point::new(100, 100)), Duration::ZERO),
                ActionRecord::new(Action::move_to(Point::new(200, 150)), Duration::from_millis(500)),
                ActionRecord::new(
                    Action::click(Point::new(200, 150), MouseButton::Left, 1),
                    Duration::from_millis(250),
                ),
            ],
        );
        assert_eq!(m.action_count, 3);
        assert_eq!(m.duration(), Duration::from_millis(750));
    }

    #[test]
    fn record_serializes_flat() {
        let record = ActionRecord::new(
            Action::click(Point::new(4, 2), MouseButton::Right, 2),
            Duration::from_millis(120),
        );
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["kind"], "click");
        assert_eq!(v["x"], 4);
        assert_eq!(v["button"], "right");
        assert_eq!(v["clicks"], 2);
        assert_eq!(v["delay_ms"], 120);
        assert!(v["captured_at"].is_string());
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let json = r#"{"kind":"click","x":1,"y":2,"delay_ms":0,"captured_at":"2024-01-01T00:00:00Z"}"#;
        let record: ActionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            record.action,
            Action::Click {
                x: 1,
                y: 2,
                button: MouseButton::Left,
                clicks: 1
            }
        );

        let json = r#"{"kind":"scroll","amount":-3,"delay_ms":10,"captured_at":"2024-01-01T00:00:00Z"}"#;
        let record: ActionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.action.position(), None);
    }

    #[test]
    fn validation_catches_bad_actions() {
        assert!(Action::click(Point::new(0, 0), MouseButton::Left, 0).validate().is_err());
        assert!(Action::key(" ").validate().is_err());
        assert!(Action::combo(Vec::<String>::new()).validate().is_err());
        assert!(Action::Scroll { amount: 1, x: Some(3), y: None }.validate().is_err());
        assert!(Action::combo(["ctrl", "c"]).validate().is_ok());
        assert!(Action::wait(Duration::from_secs(1)).validate().is_ok());
    }

    #[test]
    fn kind_matches_tag() {
        let actions = [
            Action::move_to(Point::new(0, 0)),
            Action::drag(Point::new(0, 0), Point::new(5, 5), MouseButton::Left, Duration::from_millis(100)),
            Action::key("e"),
            Action::combo(["ctrl", "a"]),
            Action::scroll(2, Some(Point::new(1, 1))),
            Action::wait(Duration::from_millis(30)),
        ];
        for a in actions {
            let v = serde_json::to_value(&a).unwrap();
            assert_eq!(v["kind"], a.kind());
        }
    }
}
