//! Test synthesizer that records every dispatched call

use macrobot_input::{Error, InputSynthesizer, KeyMode, MouseButton, Point, Result};
use parking_lot::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Key name that makes `key_event` fail
pub const FAILING_KEY: &str = "boom";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Move(Point),
    Click(Point, MouseButton, u32),
    Button(MouseButton, KeyMode),
    Key(String, KeyMode),
    Combo(Vec<String>),
    Scroll(i32, Option<Point>),
    Drag(Point, Point),
}

#[derive(Default)]
pub struct ScriptedSynthesizer {
    position: Mutex<Point>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the "user" has put the pointer
    pub fn set_position(&self, to: Point) {
        *self.position.lock() = to;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Poll until at least `n` calls were dispatched
    pub fn wait_for_calls(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.call_count() >= n {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        self.call_count() >= n
    }

    fn push(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl InputSynthesizer for ScriptedSynthesizer {
    fn backend(&self) -> &'static str {
        "scripted"
    }

    fn current_position(&self) -> Result<Point> {
        Ok(*self.position.lock())
    }

    fn move_to(&self, to: Point) -> Result<()> {
        self.push(Call::Move(to));
        Ok(())
    }

    fn click(&self, at: Point, button: MouseButton, clicks: u32) -> Result<()> {
        self.push(Call::Click(at, button, clicks));
        Ok(())
    }

    fn button(&self, button: MouseButton, mode: KeyMode) -> Result<()> {
        self.push(Call::Button(button, mode));
        Ok(())
    }

    fn key_event(&self, key: &str, mode: KeyMode) -> Result<()> {
        if key == FAILING_KEY {
            return Err(Error::invalid_key(key));
        }
        self.push(Call::Key(key.to_string(), mode));
        Ok(())
    }

    fn scroll(&self, amount: i32, at: Option<Point>) -> Result<()> {
        self.push(Call::Scroll(amount, at));
        Ok(())
    }

    fn drag(&self, from: Point, to: Point, _button: MouseButton, _duration: Duration) -> Result<()> {
        self.push(Call::Drag(from, to));
        Ok(())
    }

    fn key_combo(&self, keys: &[String]) -> Result<()> {
        self.push(Call::Combo(keys.to_vec()));
        Ok(())
    }
}
