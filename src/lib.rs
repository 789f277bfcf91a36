//! macrobot-input - input synthesis for macro playback
//!
//! One trait, [`InputSynthesizer`], with a native backend where the platform
//! has one and a log-only headless backend everywhere else.
//!
//! ## Platform Support
//!
//! - **Windows**: SendInput / SetCursorPos
//! - **macOS, Linux**: headless fallback

pub mod error;
pub mod input;
pub mod platform;

pub use error::{Error, ErrorCode, Result};
pub use input::{InputSynthesizer, KeyMode, MouseButton, Point};
pub use platform::headless::HeadlessSynthesizer;

use std::sync::Arc;

/// Native backend if available, otherwise the headless one.
///
/// Never fails: a missing backend degrades to logging what would have happened.
pub fn detect() -> Arc<dyn InputSynthesizer> {
    match platform::native() {
        Ok(synth) => {
            log::info!("Using {} input backend", synth.backend());
            Arc::from(synth)
        }
        Err(e) => {
            log::warn!("No input backend ({}), running headless", e);
            Arc::new(HeadlessSynthesizer::new())
        }
    }
}

pub mod prelude {
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::input::{InputSynthesizer, KeyMode, MouseButton, Point};
    pub use crate::platform::headless::HeadlessSynthesizer;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn detect_falls_back_to_headless() {
        assert_eq!(detect().backend(), "headless");
    }
}
