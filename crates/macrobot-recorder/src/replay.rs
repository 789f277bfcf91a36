//! Macro playback through an input synthesizer
//!
//! Actions run strictly in stored order. Before each one the player sleeps for
//! the recorded delay divided by the speed multiplier; that sleep wakes early
//! on cancellation, so stopping takes effect at the next action boundary. A
//! failing action is logged and skipped, the rest of the macro still runs.

use crate::actions::{Action, Macro};
use crate::error::{MacroError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use macrobot_input::{InputSynthesizer, KeyMode, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Cap on a single inter-action sleep and on `wait` actions
    pub max_step_delay: Duration,
    /// How long `stop` waits for the playback thread
    pub join_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_step_delay: Duration::from_secs(5),
            join_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    pub index: usize,
    pub kind: String,
    pub message: String,
}

/// What a playback did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub name: String,
    pub total: usize,
    /// Actions dispatched, failed ones included
    pub executed: usize,
    pub failures: Vec<ActionFailure>,
    pub cancelled: bool,
    /// Sum of the scaled delays actually slept
    pub slept_ms: u64,
}

impl PlaybackReport {
    pub fn skipped(&self) -> usize {
        self.total - self.executed
    }

    pub fn completed(&self) -> bool {
        !self.cancelled && self.executed == self.total
    }

    pub fn slept(&self) -> Duration {
        Duration::from_millis(self.slept_ms)
    }
}

impl fmt::Display for PlaybackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cancelled {
            write!(
                f,
                "Stopped macro '{}' after {} of {} actions ({} skipped)",
                self.name,
                self.executed,
                self.total,
                self.skipped()
            )?;
        } else {
            write!(
                f,
                "Played macro '{}': {}/{} actions",
                self.name, self.executed, self.total
            )?;
        }
        if !self.failures.is_empty() {
            let indices: Vec<String> = self.failures.iter().map(|x| format!("#{}", x.index)).collect();
            write!(f, ", {} failed ({})", self.failures.len(), indices.join(", "))?;
        }
        Ok(())
    }
}

/// Reject zero, negative and non-finite multipliers
pub fn check_speed(speed: f64) -> Result<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(MacroError::InvalidSpeed(speed))
    }
}

/// Replays macros
#[derive(Clone)]
pub struct Player {
    synth: Arc<dyn InputSynthesizer>,
    config: PlayerConfig,
}

impl Player {
    pub fn new(synth: Arc<dyn InputSynthesizer>) -> Self {
        Self::with_config(synth, PlayerConfig::default())
    }

    pub fn with_config(synth: Arc<dyn InputSynthesizer>, config: PlayerConfig) -> Self {
        Self { synth, config }
    }

    /// Recorded delay scaled by `speed`, capped at `max_step_delay`
    pub fn scaled_delay(&self, delay: Duration, speed: f64) -> Duration {
        // Tiny speeds overflow Duration
        Duration::try_from_secs_f64(delay.as_secs_f64() / speed)
            .unwrap_or(Duration::MAX)
            .min(self.config.max_step_delay)
    }

    /// Replay on the calling thread.
    ///
    /// A message on `cancel`, or its sender being dropped, ends playback at the
    /// next action boundary.
    pub fn play(&self, m: &Macro, speed: f64, cancel: &Receiver<()>) -> Result<PlaybackReport> {
        check_speed(speed)?;

        let total = m.actions.len();
        let mut report = PlaybackReport {
            name: m.name.clone(),
            total,
            executed: 0,
            failures: Vec::new(),
            cancelled: false,
            slept_ms: 0,
        };
        log::info!("Playing macro '{}' with {} actions at {}x", m.name, total, speed);

        for (i, record) in m.actions.iter().enumerate() {
            if is_cancelled(cancel) {
                report.cancelled = true;
                break;
            }

            let delay = self.scaled_delay(record.delay(), speed);
            if !delay.is_zero() {
                if sleep_or_cancel(cancel, delay) {
                    report.cancelled = true;
                    break;
                }
                report.slept_ms += delay.as_millis() as u64;
            }

            report.executed += 1;
            match self.dispatch(&record.action) {
                Ok(()) => log::debug!("Executed action {}/{}: {}", i + 1, total, record.action),
                Err(e) => {
                    log::warn!("Action {}/{} ({}) failed: {}", i + 1, total, record.action, e);
                    report.failures.push(ActionFailure {
                        index: i,
                        kind: record.action.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        log::info!("{}", report);
        Ok(report)
    }

    /// Replay on a background thread
    pub fn spawn(self, m: Macro, speed: f64) -> Result<PlaybackHandle> {
        check_speed(speed)?;

        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<PlaybackReport>(1);
        let name = m.name.clone();
        let total = m.actions.len();
        let join_timeout = self.config.join_timeout;

        let thread = thread::Builder::new()
            .name(format!("macro-player-{}", name))
            .spawn(move || {
                // Speed was checked above, so play cannot reject it
                if let Ok(report) = self.play(&m, speed, &cancel_rx) {
                    let _ = done_tx.send(report);
                }
            })
            .map_err(|source| MacroError::Spawn {
                worker: "player",
                source,
            })?;

        Ok(PlaybackHandle {
            name,
            total,
            speed,
            started: Instant::now(),
            cancel: cancel_tx,
            done: done_rx,
            thread: Some(thread),
            join_timeout,
        })
    }

    fn dispatch(&self, action: &Action) -> macrobot_input::Result<()> {
        match action {
            Action::Move { x, y } => self.synth.move_to(Point::new(*x, *y)),
            Action::Click {
                x,
                y,
                button,
                clicks,
            } => self.synth.click(Point::new(*x, *y), *button, *clicks),
            Action::Drag {
                x,
                y,
                end_x,
                end_y,
                button,
                duration_ms,
            } => self.synth.drag(
                Point::new(*x, *y),
                Point::new(*end_x, *end_y),
                *button,
                Duration::from_millis(*duration_ms).min(self.config.max_step_delay),
            ),
            Action::KeyPress { key } => self.synth.key_event(key, KeyMode::Press),
            Action::KeyCombo { keys } => self.synth.key_combo(keys),
            Action::Scroll { amount, .. } => self.synth.scroll(*amount, action.position()),
            Action::Wait { duration_ms } => {
                thread::sleep(Duration::from_millis(*duration_ms).min(self.config.max_step_delay));
                Ok(())
            }
        }
    }
}

fn is_cancelled(cancel: &Receiver<()>) -> bool {
    !matches!(cancel.try_recv(), Err(TryRecvError::Empty))
}

/// Sleep for `delay`; true if cancelled meanwhile
fn sleep_or_cancel(cancel: &Receiver<()>, delay: Duration) -> bool {
    !matches!(cancel.recv_timeout(delay), Err(RecvTimeoutError::Timeout))
}

/// A playback running on its own thread
pub struct PlaybackHandle {
    name: String,
    total: usize,
    speed: f64,
    started: Instant,
    cancel: Sender<()>,
    done: Receiver<PlaybackReport>,
    thread: Option<thread::JoinHandle<()>>,
    join_timeout: Duration,
}

impl PlaybackHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The report, if playback has finished. Never blocks.
    pub fn try_finish(&mut self) -> Option<Result<PlaybackReport>> {
        match self.done.try_recv() {
            Ok(report) => {
                self.join();
                Some(Ok(report))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                Some(Err(MacroError::WorkerLost("player")))
            }
        }
    }

    /// Request cancellation and wait for the report
    pub fn stop(mut self) -> Result<PlaybackReport> {
        let _ = self.cancel.try_send(());

        match self.done.recv_timeout(self.join_timeout) {
            Ok(report) => {
                self.join();
                Ok(report)
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Playback of '{}' did not stop within {:?}, detaching it",
                    self.name,
                    self.join_timeout
                );
                Err(MacroError::WorkerTimeout {
                    worker: "player",
                    timeout: self.join_timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.join();
                Err(MacroError::WorkerLost("player"))
            }
        }
    }

    fn join(&mut self) {
        if let Some(t) = self.thread.take() {
            if t.join().is_err() {
                log::error!("Playback thread for '{}' panicked", self.name);
            }
        }
    }
}
