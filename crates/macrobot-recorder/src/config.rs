//! Engine settings, loadable from a JSON file
//!
//! Every field has a default, so a partial file (or none at all) is valid.

use crate::error::{MacroError, Result};
use crate::recorder::RecorderConfig;
use crate::replay::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroConfig {
    /// Macro store file. Defaults to `$HOME/.macrobot/macros.json`.
    pub store_path: Option<PathBuf>,
    /// Pointer sampling interval while recording
    pub recording_interval_ms: u64,
    /// Minimum pointer travel that counts as a move
    pub movement_threshold_px: f64,
    /// Recording auto-terminates after this long
    pub max_recording_secs: u64,
    /// Cap on any single inter-action sleep during playback
    pub max_step_delay_ms: u64,
    /// Default speed multiplier when none is given
    pub playback_speed: f64,
    /// How long stop waits for a worker thread before giving up on it
    pub join_timeout_ms: u64,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            recording_interval_ms: 100,
            movement_threshold_px: 5.0,
            max_recording_secs: 300,
            max_step_delay_ms: 5_000,
            playback_speed: 1.0,
            join_timeout_ms: 2_000,
        }
    }
}

impl MacroConfig {
    /// Missing file means defaults; a malformed one is an error
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(MacroError::io(path, e)),
        };
        serde_json::from_str(&text).map_err(|e| MacroError::format(path, e))
    }

    /// Configured store path, or the per-user default
    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(default_store_path)
    }

    pub fn recorder(&self) -> RecorderConfig {
        RecorderConfig {
            sample_interval: Duration::from_millis(self.recording_interval_ms.max(1)),
            movement_threshold_px: self.movement_threshold_px,
            max_duration: Duration::from_secs(self.max_recording_secs),
            join_timeout: self.join_timeout(),
        }
    }

    pub fn player(&self) -> PlayerConfig {
        PlayerConfig {
            max_step_delay: Duration::from_millis(self.max_step_delay_ms),
            join_timeout: self.join_timeout(),
        }
    }

    fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

fn default_store_path() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".macrobot").join("macros.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MacroConfig::load(dir.path().join("nope.json")).unwrap();
        assert_eq!(config, MacroConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"recording_interval_ms": 50, "store_path": "/tmp/m.json"}"#).unwrap();

        let config = MacroConfig::load(&path).unwrap();
        assert_eq!(config.recording_interval_ms, 50);
        assert_eq!(config.max_recording_secs, 300);
        assert_eq!(config.store_path(), PathBuf::from("/tmp/m.json"));
        assert_eq!(config.recorder().sample_interval, Duration::from_millis(50));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MacroConfig::load(&path),
            Err(MacroError::Format { .. })
        ));
    }
}
