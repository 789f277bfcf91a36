//! macrobot-recorder - record, store and replay input macros
//!
//! # Architecture
//!
//! ```text
//! MacroEngine ── session: Idle | Recording | Playing
//!   ├── MacroRecorder  pointer sampling thread ──▶ Vec<ActionRecord>
//!   ├── Player         playback thread ──▶ InputSynthesizer
//!   └── MacroStore     name → Macro, one JSON file
//! ```
//!
//! # Example
//!
//! ```no_run
//! use macrobot_recorder::prelude::*;
//! use std::time::Duration;
//!
//! let engine = MacroEngine::from_config(macrobot_input::detect(), &MacroConfig::default());
//! engine.start_recording("loot_run", "").unwrap();
//! std::thread::sleep(Duration::from_secs(5));
//! println!("{}", engine.stop_recording().unwrap());
//!
//! engine.play("loot_run", Some(2.0)).unwrap();
//! let report = engine.wait_for_playback(Duration::from_secs(60)).unwrap();
//! ```

pub mod actions;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod recorder;
pub mod replay;
pub mod storage;

#[cfg(test)]
mod testing;

pub use actions::{Action, ActionRecord, Macro, MacroInfo};
pub use commands::MacroCommand;
pub use config::MacroConfig;
pub use engine::{EngineStatus, MacroEngine, PlaybackStarted, RecordingStatus, RecordingSummary};
pub use error::{MacroError, Result};
pub use recorder::{MacroRecorder, RecorderConfig, RecordingHandle};
pub use replay::{ActionFailure, PlaybackHandle, PlaybackReport, Player, PlayerConfig};
pub use storage::MacroStore;

pub mod prelude {
    pub use crate::actions::{Action, ActionRecord, Macro, MacroInfo};
    pub use crate::commands::MacroCommand;
    pub use crate::config::MacroConfig;
    pub use crate::engine::{EngineStatus, MacroEngine};
    pub use crate::error::{MacroError, Result};
    pub use crate::replay::PlaybackReport;
    pub use crate::storage::MacroStore;
}
