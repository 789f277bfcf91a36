//! Log-only backend for machines without an input device
//!
//! Every call succeeds and logs what it would have done. A virtual pointer is
//! kept so position queries reflect earlier moves.

use crate::error::Result;
use crate::input::{InputSynthesizer, KeyMode, MouseButton, Point};
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct HeadlessSynthesizer {
    pointer: Mutex<Point>,
}

impl HeadlessSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the virtual pointer at `at`
    pub fn at(at: Point) -> Self {
        Self {
            pointer: Mutex::new(at),
        }
    }
}

impl InputSynthesizer for HeadlessSynthesizer {
    fn backend(&self) -> &'static str {
        "headless"
    }

    fn current_position(&self) -> Result<Point> {
        Ok(*self.pointer.lock())
    }

    fn move_to(&self, to: Point) -> Result<()> {
        log::info!("headless: would have moved pointer to {}", to);
        *self.pointer.lock() = to;
        Ok(())
    }

    fn click(&self, at: Point, button: MouseButton, clicks: u32) -> Result<()> {
        log::info!("headless: would have {} clicked {}x at {}", button, clicks, at);
        *self.pointer.lock() = at;
        Ok(())
    }

    fn button(&self, button: MouseButton, mode: KeyMode) -> Result<()> {
        log::info!("headless: would have sent {} button {:?}", button, mode);
        Ok(())
    }

    fn key_event(&self, key: &str, mode: KeyMode) -> Result<()> {
        log::info!("headless: would have sent key {} {:?}", key, mode);
        Ok(())
    }

    fn scroll(&self, amount: i32, at: Option<Point>) -> Result<()> {
        let mut pointer = self.pointer.lock();
        if let Some(at) = at {
            *pointer = at;
        }
        log::info!("headless: would have scrolled {} at {}", amount, *pointer);
        Ok(())
    }

    fn drag(&self, from: Point, to: Point, button: MouseButton, duration: Duration) -> Result<()> {
        log::info!(
            "headless: would have dragged {} from {} to {} over {:?}",
            button,
            from,
            to,
            duration
        );
        *self.pointer.lock() = to;
        Ok(())
    }

    fn key_combo(&self, keys: &[String]) -> Result<()> {
        log::info!("headless: would have pressed {}", keys.join("+"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_virtual_pointer() {
        let synth = HeadlessSynthesizer::at(Point::new(5, 5));
        assert_eq!(synth.current_position().unwrap(), Point::new(5, 5));

        synth.move_to(Point::new(100, 100)).unwrap();
        assert_eq!(synth.current_position().unwrap(), Point::new(100, 100));

        synth
            .drag(
                Point::new(100, 100),
                Point::new(300, 40),
                MouseButton::Left,
                Duration::from_secs(5),
            )
            .unwrap();
        assert_eq!(synth.current_position().unwrap(), Point::new(300, 40));
    }

    #[test]
    fn scroll_without_position_keeps_pointer() {
        let synth = HeadlessSynthesizer::at(Point::new(7, 8));
        synth.scroll(-3, None).unwrap();
        assert_eq!(synth.current_position().unwrap(), Point::new(7, 8));
    }
}
