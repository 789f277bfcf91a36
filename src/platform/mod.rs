//! Platform backends
//!
//! - **Windows**: SendInput
//! - **everything else**: headless (log-only) until a native backend lands

pub mod headless;

#[cfg(target_os = "windows")]
pub mod windows;

use crate::error::Result;
use crate::input::InputSynthesizer;

#[cfg(not(target_os = "windows"))]
use crate::error::Error;

/// The native backend for this platform, if there is one
#[cfg(target_os = "windows")]
pub fn native() -> Result<Box<dyn InputSynthesizer>> {
    Ok(Box::new(windows::WindowsSynthesizer::new()?))
}

#[cfg(not(target_os = "windows"))]
pub fn native() -> Result<Box<dyn InputSynthesizer>> {
    Err(Error::unsupported("Native input synthesis"))
}
