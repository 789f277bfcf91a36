//! Live macro capture by pointer sampling
//!
//! A background thread polls the pointer on a fixed interval and turns motion
//! beyond a pixel threshold into `move` actions. Other kinds of action reach
//! a live recording only through [`RecordingHandle::inject`]. The thread owns
//! the capture buffer and hands it over when stopped.

use crate::actions::{Action, ActionRecord};
use crate::error::{MacroError, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use macrobot_input::{InputSynthesizer, Point};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Pointer sampling interval
    pub sample_interval: Duration,
    /// Record a move only when the pointer travelled further than this
    pub movement_threshold_px: f64,
    /// Capture ends by itself after this long
    pub max_duration: Duration,
    /// How long `stop` waits for the capture thread
    pub join_timeout: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(100),
            movement_threshold_px: 5.0,
            max_duration: Duration::from_secs(300),
            join_timeout: Duration::from_secs(2),
        }
    }
}

enum Control {
    /// The ack sender is dropped unanswered if capture ends first
    Inject(Action, Sender<()>),
    Stop,
}

/// Why the capture thread finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEnd {
    Stopped,
    TimeLimit,
}

struct Capture {
    actions: Vec<ActionRecord>,
    end: CaptureEnd,
}

/// Recording handle - owns the recording session
pub struct RecordingHandle {
    name: String,
    description: String,
    started: Instant,
    control: Sender<Control>,
    done: Receiver<Capture>,
    count: Arc<AtomicUsize>,
    capturing: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    join_timeout: Duration,
}

impl RecordingHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Actions captured so far
    pub fn action_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// False once the thread stopped sampling (time limit or stop)
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Relaxed)
    }

    /// Append an action observed elsewhere (a click, a key) to the live recording
    pub fn inject(&self, action: Action) -> Result<()> {
        action
            .validate()
            .map_err(|reason| MacroError::InvalidAction {
                index: self.action_count(),
                reason,
            })?;
        if !self.is_capturing() {
            return Err(MacroError::CaptureEnded(self.name.clone()));
        }

        let (ack_tx, ack_rx) = bounded(1);
        self.control
            .send(Control::Inject(action, ack_tx))
            .map_err(|_| MacroError::CaptureEnded(self.name.clone()))?;
        match ack_rx.recv_timeout(self.join_timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => Err(MacroError::CaptureEnded(self.name.clone())),
            Err(RecvTimeoutError::Timeout) => Err(MacroError::WorkerTimeout {
                worker: "recorder",
                timeout: self.join_timeout,
            }),
        }
    }

    /// End capture and take the recorded actions
    pub fn stop(mut self) -> Result<Vec<ActionRecord>> {
        // The thread may already be gone after hitting the time limit
        let _ = self.control.send(Control::Stop);

        match self.done.recv_timeout(self.join_timeout) {
            Ok(capture) => {
                if let Some(t) = self.thread.take() {
                    let _ = t.join();
                }
                log::debug!(
                    "Capture of '{}' ended ({:?}) with {} actions",
                    self.name,
                    capture.end,
                    capture.actions.len()
                );
                Ok(capture.actions)
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Recorder thread for '{}' did not hand over within {:?}, detaching it",
                    self.name,
                    self.join_timeout
                );
                Err(MacroError::WorkerTimeout {
                    worker: "recorder",
                    timeout: self.join_timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(t) = self.thread.take() {
                    let _ = t.join();
                }
                log::error!("Recorder thread for '{}' died without handing over", self.name);
                Err(MacroError::WorkerLost("recorder"))
            }
        }
    }
}

/// The recorder
pub struct MacroRecorder {
    config: RecorderConfig,
}

impl MacroRecorder {
    pub fn new() -> Self {
        Self::with_config(RecorderConfig::default())
    }

    pub fn with_config(config: RecorderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Start sampling `synth` on a background thread
    pub fn start(
        &self,
        synth: Arc<dyn InputSynthesizer>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<RecordingHandle> {
        let name = name.into();
        let (control_tx, control_rx) = unbounded::<Control>();
        let (done_tx, done_rx) = bounded::<Capture>(1);
        let count = Arc::new(AtomicUsize::new(0));
        let capturing = Arc::new(AtomicBool::new(true));
        let started = Instant::now();

        let origin = synth.current_position().unwrap_or_else(|e| {
            log::warn!("Cannot read pointer position ({}), starting from origin", e);
            Point::default()
        });

        let state = CaptureState {
            synth,
            config: self.config.clone(),
            started,
            last_position: origin,
            last_action: started,
            actions: Vec::new(),
            count: count.clone(),
        };
        let capturing_thread = capturing.clone();
        let thread = thread::Builder::new()
            .name(format!("macro-recorder-{}", name))
            .spawn(move || {
                let capture = run_capture(state, control_rx);
                capturing_thread.store(false, Ordering::SeqCst);
                let _ = done_tx.send(capture);
            })
            .map_err(|source| MacroError::Spawn {
                worker: "recorder",
                source,
            })?;

        log::info!("Started recording macro '{}'", name);
        Ok(RecordingHandle {
            name,
            description: description.into(),
            started,
            control: control_tx,
            done: done_rx,
            count,
            capturing,
            thread: Some(thread),
            join_timeout: self.config.join_timeout,
        })
    }
}

impl Default for MacroRecorder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Capture Thread
// ============================================================================

struct CaptureState {
    synth: Arc<dyn InputSynthesizer>,
    config: RecorderConfig,
    started: Instant,
    last_position: Point,
    last_action: Instant,
    actions: Vec<ActionRecord>,
    count: Arc<AtomicUsize>,
}

impl CaptureState {
    fn push(&mut self, action: Action) {
        let now = Instant::now();
        let delay = now.saturating_duration_since(self.last_action);
        self.last_action = now;
        if let Some(at) = action.position() {
            self.last_position = at;
        }
        self.actions.push(ActionRecord::new(action, delay));
        self.count.store(self.actions.len(), Ordering::Relaxed);
    }

    fn sample(&mut self) {
        match self.synth.current_position() {
            Ok(at) if at.distance_to(self.last_position) > self.config.movement_threshold_px => {
                self.push(Action::move_to(at));
            }
            Ok(_) => {}
            Err(e) => log::debug!("Pointer sample failed: {}", e),
        }
    }
}

fn run_capture(mut state: CaptureState, control: Receiver<Control>) -> Capture {
    let end = 'capture: loop {
        if state.started.elapsed() > state.config.max_duration {
            log::warn!(
                "Recording stopped: maximum duration of {:?} reached",
                state.config.max_duration
            );
            break CaptureEnd::TimeLimit;
        }

        state.sample();

        // Service injections and stop requests until the next sample is due
        let next_sample = Instant::now() + state.config.sample_interval;
        loop {
            let remaining = next_sample.saturating_duration_since(Instant::now());
            match control.recv_timeout(remaining) {
                Ok(Control::Inject(action, ack)) => {
                    state.push(action);
                    let _ = ack.send(());
                }
                Ok(Control::Stop) | Err(RecvTimeoutError::Disconnected) => {
                    break 'capture CaptureEnd::Stopped;
                }
                Err(RecvTimeoutError::Timeout) => break,
            }
        }
    };

    Capture {
        actions: state.actions,
        end,
    }
}
