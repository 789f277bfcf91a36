//! Structured errors for input synthesis

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No backend for this platform
    Unsupported,
    /// The OS rejected or partially applied an input event
    ActionFailed,
    /// Key name could not be mapped to a key code
    InvalidKey,
    /// Value could not be parsed (button names, coordinates)
    InvalidArgument,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unsupported(what: &str) -> Self {
        Self::new(
            ErrorCode::Unsupported,
            format!("{} is not supported on this platform", what),
        )
    }

    pub fn action_failed(action: &str, reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::ActionFailed, format!("{} failed: {}", action, reason))
    }

    pub fn invalid_key(key: &str) -> Self {
        Self::new(ErrorCode::InvalidKey, format!("Unknown key: {}", key))
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Unknown, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let e = Error::invalid_key("hyper");
        assert_eq!(e.to_string(), "[InvalidKey] Unknown key: hyper");
    }

    #[test]
    fn code_serializes_screaming() {
        let json = serde_json::to_string(&Error::unsupported("Scroll")).unwrap();
        assert!(json.contains("\"UNSUPPORTED\""));
    }
}
