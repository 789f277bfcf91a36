//! Error taxonomy for the macro engine
//!
//! Every variant renders as one line suitable for showing to the operator.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MacroError>;

#[derive(Error, Debug)]
pub enum MacroError {
    #[error("Macro '{0}' already exists. Choose a different name.")]
    DuplicateName(String),
    #[error("Macro '{0}' not found")]
    NotFound(String),
    #[error("Already recording macro '{0}'. Stop current recording first.")]
    AlreadyRecording(String),
    #[error("No recording in progress")]
    NotRecording,
    #[error("Already playing macro '{0}'. Wait for completion.")]
    AlreadyPlaying(String),
    #[error("Cannot play macro while recording '{0}'")]
    RecordingActive(String),
    #[error("Cannot record while macro '{0}' is playing")]
    PlaybackActive(String),
    #[error("Recording '{0}' reached its time limit. Stop it to save.")]
    CaptureEnded(String),
    #[error("No macro currently playing")]
    NotPlaying,
    #[error("No unsaved recording to retry")]
    NothingUnsaved,
    #[error("Invalid playback speed {0}: must be a positive number")]
    InvalidSpeed(f64),
    #[error("Invalid action #{index}: {reason}")]
    InvalidAction { index: usize, reason: String },
    #[error("Macro name must not be empty")]
    EmptyName,
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed macro document {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{worker} thread did not respond within {timeout:?}")]
    WorkerTimeout {
        worker: &'static str,
        timeout: Duration,
    },
    #[error("{0} thread exited unexpectedly")]
    WorkerLost(&'static str),
    #[error("Failed to start {worker} thread: {source}")]
    Spawn {
        worker: &'static str,
        #[source]
        source: io::Error,
    },
}

impl MacroError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MacroError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        MacroError::Format {
            path: path.into(),
            source,
        }
    }

    /// Expected operator mistakes, as opposed to I/O or worker failures
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            MacroError::DuplicateName(_)
                | MacroError::NotFound(_)
                | MacroError::AlreadyRecording(_)
                | MacroError::NotRecording
                | MacroError::AlreadyPlaying(_)
                | MacroError::RecordingActive(_)
                | MacroError::PlaybackActive(_)
                | MacroError::CaptureEnded(_)
                | MacroError::NotPlaying
                | MacroError::NothingUnsaved
                | MacroError::InvalidSpeed(_)
                | MacroError::InvalidAction { .. }
                | MacroError::EmptyName
        )
    }
}
