//! Macro engine - one coordinator for store, recorder and player
//!
//! The engine holds a single session value. Recording and playback are
//! variants of it, so at most one of either can exist at a time. Locks are
//! always taken session first, then store.

use crate::actions::{Action, ActionRecord, Macro, MacroInfo};
use crate::config::MacroConfig;
use crate::error::{MacroError, Result};
use crate::recorder::{MacroRecorder, RecordingHandle};
use crate::replay::{PlaybackHandle, PlaybackReport, Player, PlayerConfig};
use crate::storage::{self, MacroStore};
use macrobot_input::InputSynthesizer;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

enum Session {
    Idle,
    Recording(RecordingHandle),
    Playing(PlaybackHandle),
}

/// Result of `stop_recording`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingSummary {
    pub name: String,
    pub action_count: usize,
    pub duration_ms: u64,
}

impl fmt::Display for RecordingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Recorded macro '{}' with {} actions ({:.1}s)",
            self.name,
            self.action_count,
            self.duration_ms as f64 / 1000.0
        )
    }
}

/// Result of `play`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStarted {
    pub name: String,
    pub action_count: usize,
    pub speed: f64,
}

impl fmt::Display for PlaybackStarted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Playing macro '{}' ({} actions) at {}x",
            self.name, self.action_count, self.speed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingStatus {
    pub name: String,
    pub elapsed_ms: u64,
    pub actions: usize,
    /// Sampling stopped on its own; the recording still waits for a stop
    pub capture_ended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub total_macros: usize,
    pub recording: Option<RecordingStatus>,
    pub playing: Option<String>,
    pub backend: String,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} macros stored", self.total_macros)?;
        match &self.recording {
            Some(r) => {
                write!(
                    f,
                    ", recording '{}' for {:.1}s ({} actions",
                    r.name,
                    r.elapsed_ms as f64 / 1000.0,
                    r.actions
                )?;
                if r.capture_ended {
                    write!(f, ", time limit reached")?;
                }
                write!(f, ")")?;
            }
            None => write!(f, ", not recording")?,
        }
        match &self.playing {
            Some(name) => write!(f, ", playing '{}'", name)?,
            None => write!(f, ", not playing")?,
        }
        write!(f, " [{} backend]", self.backend)
    }
}

pub struct MacroEngine {
    synth: Arc<dyn InputSynthesizer>,
    store: Mutex<MacroStore>,
    session: Mutex<Session>,
    last_playback: Mutex<Option<PlaybackReport>>,
    /// A stopped recording whose save failed, kept for `save_unsaved`
    unsaved: Mutex<Option<Macro>>,
    recorder: MacroRecorder,
    player: PlayerConfig,
    default_speed: f64,
}

impl MacroEngine {
    /// Engine with default timing over an already opened store
    pub fn new(synth: Arc<dyn InputSynthesizer>, store: MacroStore) -> Self {
        Self::with_config(synth, store, &MacroConfig::default())
    }

    pub fn with_config(
        synth: Arc<dyn InputSynthesizer>,
        store: MacroStore,
        config: &MacroConfig,
    ) -> Self {
        Self {
            synth,
            store: Mutex::new(store),
            session: Mutex::new(Session::Idle),
            last_playback: Mutex::new(None),
            unsaved: Mutex::new(None),
            recorder: MacroRecorder::with_config(config.recorder()),
            player: config.player(),
            default_speed: config.playback_speed,
        }
    }

    /// Open the configured store and build an engine over it
    pub fn from_config(synth: Arc<dyn InputSynthesizer>, config: &MacroConfig) -> Self {
        let store = MacroStore::open(config.store_path());
        Self::with_config(synth, store, config)
    }

    pub fn backend(&self) -> &'static str {
        self.synth.backend()
    }

    // ------------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------------

    pub fn start_recording(&self, name: &str, description: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(MacroError::EmptyName);
        }

        let mut session = self.session.lock();
        self.reap(&mut session);
        match &*session {
            Session::Recording(h) => return Err(MacroError::AlreadyRecording(h.name().to_string())),
            Session::Playing(h) => return Err(MacroError::PlaybackActive(h.name().to_string())),
            Session::Idle => {}
        }
        if self.store.lock().contains(name) {
            return Err(MacroError::DuplicateName(name.to_string()));
        }

        let handle = self.recorder.start(self.synth.clone(), name, description)?;
        *session = Session::Recording(handle);
        Ok(())
    }

    /// End the recording and persist it, even when nothing was captured
    pub fn stop_recording(&self) -> Result<RecordingSummary> {
        let mut session = self.session.lock();
        let handle = match std::mem::replace(&mut *session, Session::Idle) {
            Session::Recording(h) => h,
            other => {
                *session = other;
                return Err(MacroError::NotRecording);
            }
        };

        let name = handle.name().to_string();
        let description = handle.description().to_string();
        let actions = handle.stop()?;

        self.commit(Macro::new(name, description, actions))
    }

    /// Retry storing a recording whose save failed in `stop_recording`
    pub fn save_unsaved(&self) -> Result<RecordingSummary> {
        let session = self.session.lock();
        let m = self.unsaved.lock().take().ok_or(MacroError::NothingUnsaved)?;
        if let Err(e) = reject_recording_name(&session, &m.name) {
            *self.unsaved.lock() = Some(m);
            return Err(e);
        }
        self.commit(m)
    }

    /// The recording waiting for `save_unsaved`, if any
    pub fn unsaved_recording(&self) -> Option<MacroInfo> {
        self.unsaved.lock().as_ref().map(Macro::info)
    }

    /// Store a finished recording; on failure keep it in `unsaved`
    fn commit(&self, m: Macro) -> Result<RecordingSummary> {
        let mut store = self.store.lock();
        match store.insert(m.clone()) {
            Ok(stored) => Ok(RecordingSummary {
                name: stored.name.clone(),
                action_count: stored.action_count,
                duration_ms: stored.duration_ms,
            }),
            Err(e) => {
                log::error!(
                    "Recording '{}' was not saved, keeping its {} actions for retry: {}",
                    m.name,
                    m.actions.len(),
                    e
                );
                if let Some(replaced) = self.unsaved.lock().replace(m) {
                    log::warn!(
                        "Dropping earlier unsaved recording '{}' ({} actions)",
                        replaced.name,
                        replaced.actions.len()
                    );
                }
                Err(e)
            }
        }
    }

    /// Append an action observed outside the pointer sampler
    pub fn record_action(&self, action: Action) -> Result<()> {
        match &*self.session.lock() {
            Session::Recording(h) => h.inject(action),
            _ => Err(MacroError::NotRecording),
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(&*self.session.lock(), Session::Recording(_))
    }

    // ------------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------------

    /// Start playing `name` in the background. `None` uses the configured speed.
    pub fn play(&self, name: &str, speed: Option<f64>) -> Result<PlaybackStarted> {
        let speed = speed.unwrap_or(self.default_speed);

        let mut session = self.session.lock();
        self.reap(&mut session);
        match &*session {
            Session::Playing(h) => return Err(MacroError::AlreadyPlaying(h.name().to_string())),
            Session::Recording(h) => return Err(MacroError::RecordingActive(h.name().to_string())),
            Session::Idle => {}
        }
        let m = self.store.lock().get(name)?.clone();

        let started = PlaybackStarted {
            name: m.name.clone(),
            action_count: m.actions.len(),
            speed,
        };
        let player = Player::with_config(self.synth.clone(), self.player.clone());
        *session = Session::Playing(player.spawn(m, speed)?);
        Ok(started)
    }

    /// Cancel the running playback at its next action boundary
    pub fn stop_playback(&self) -> Result<PlaybackReport> {
        let mut session = self.session.lock();
        self.reap(&mut session);
        let handle = match std::mem::replace(&mut *session, Session::Idle) {
            Session::Playing(h) => h,
            other => {
                *session = other;
                return Err(MacroError::NotPlaying);
            }
        };

        let report = handle.stop()?;
        *self.last_playback.lock() = Some(report.clone());
        Ok(report)
    }

    /// Block until the running playback finishes or `timeout` passes.
    ///
    /// Returns `Ok(None)` if it is still running at the deadline.
    pub fn wait_for_playback(&self, timeout: Duration) -> Result<Option<PlaybackReport>> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut session = self.session.lock();
                match &mut *session {
                    Session::Playing(h) => {
                        if let Some(result) = h.try_finish() {
                            *session = Session::Idle;
                            let report = result?;
                            *self.last_playback.lock() = Some(report.clone());
                            return Ok(Some(report));
                        }
                    }
                    _ => return Err(MacroError::NotPlaying),
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            // The session lock is released here so stop_playback can get in
            thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn is_playing(&self) -> bool {
        let mut session = self.session.lock();
        self.reap(&mut session);
        matches!(&*session, Session::Playing(_))
    }

    /// Report of the most recent finished or stopped playback
    pub fn last_playback(&self) -> Option<PlaybackReport> {
        let mut session = self.session.lock();
        self.reap(&mut session);
        self.last_playback.lock().clone()
    }

    /// Move a finished playback out of the session
    fn reap(&self, session: &mut Session) {
        let Session::Playing(h) = session else {
            return;
        };
        match h.try_finish() {
            None => {}
            Some(Ok(report)) => {
                *self.last_playback.lock() = Some(report);
                *session = Session::Idle;
            }
            Some(Err(e)) => {
                log::error!("Playback of '{}' ended abnormally: {}", h.name(), e);
                *session = Session::Idle;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Store
    // ------------------------------------------------------------------------

    /// Store a macro built from explicit steps
    pub fn create_macro(
        &self,
        name: &str,
        description: &str,
        actions: Vec<ActionRecord>,
    ) -> Result<MacroInfo> {
        let session = self.session.lock();
        reject_recording_name(&session, name)?;
        let mut store = self.store.lock();
        Ok(store.create(name, description, actions)?.info())
    }

    pub fn delete_macro(&self, name: &str) -> Result<MacroInfo> {
        Ok(self.store.lock().delete(name)?.info())
    }

    /// Stored macro names, sorted
    pub fn list_macros(&self) -> Vec<String> {
        self.store.lock().list_names()
    }

    pub fn macro_info(&self, name: &str) -> Result<MacroInfo> {
        Ok(self.store.lock().get(name)?.info())
    }

    pub fn get_macro(&self, name: &str) -> Result<Macro> {
        Ok(self.store.lock().get(name)?.clone())
    }

    pub fn export_macro(&self, name: &str, to: &Path) -> Result<()> {
        self.store.lock().export(name, to)
    }

    pub fn import_macro(&self, from: &Path) -> Result<MacroInfo> {
        let m = storage::read_macro_file(from)?;
        let session = self.session.lock();
        reject_recording_name(&session, &m.name)?;
        let mut store = self.store.lock();
        Ok(store.insert(m)?.info())
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    pub fn status(&self) -> EngineStatus {
        let mut session = self.session.lock();
        self.reap(&mut session);

        let (recording, playing) = match &*session {
            Session::Idle => (None, None),
            Session::Recording(h) => (
                Some(RecordingStatus {
                    name: h.name().to_string(),
                    elapsed_ms: h.elapsed().as_millis() as u64,
                    actions: h.action_count(),
                    capture_ended: !h.is_capturing(),
                }),
                None,
            ),
            Session::Playing(h) => (None, Some(h.name().to_string())),
        };

        EngineStatus {
            total_macros: self.store.lock().len(),
            recording,
            playing,
            backend: self.backend().to_string(),
        }
    }
}

/// The name of a live recording is reserved until it is stopped
fn reject_recording_name(session: &Session, name: &str) -> Result<()> {
    match session {
        Session::Recording(h) if h.name() == name => Err(MacroError::DuplicateName(name.to_string())),
        _ => Ok(()),
    }
}
