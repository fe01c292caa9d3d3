//! # Pitch Tracker Module
//!
//! Bridges a continuous [`SampleSource`] to discrete pitch samples at a fixed
//! cadence (default 50 ms / 20 Hz) and keeps a bounded rolling history.
//!
//! ## Architecture
//! - **Poll thread**: owns the source and detector while a session runs,
//!   driven by a crossbeam tick channel
//! - **Shutdown**: a bounded channel; the thread hands the source and
//!   detector back when it exits
//! - **History**: shared behind a mutex, written only by the poll thread

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::history::{DEFAULT_HISTORY_CAPACITY, PitchHistory, PitchHistoryPoint};
use crate::inference::MelodyInference;
use crate::melody::{MelodyAnalysis, MelodyAnalyzer, VocalCharacteristics};
use crate::pitch::{PitchDetectionResult, PitchDetector, PitchDetectorConfig};
use crate::source::SampleSource;

/// Tracker cadence and history size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Time between polls in ms
    pub poll_interval_ms: u64,
    /// Maximum number of history points kept
    pub history_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// State shared with the poll thread.
#[derive(Debug)]
struct TrackState {
    history: PitchHistory,
    current: Option<PitchDetectionResult>,
}

/// Source and detector, moved onto the poll thread while running.
struct Poller {
    source: Box<dyn SampleSource>,
    detector: PitchDetector,
}

impl Poller {
    /// One poll: read the latest frame, detect, record voiced results.
    fn tick(&mut self, elapsed_ms: u64, state: &Mutex<TrackState>) {
        let Some(samples) = self.source.current_samples() else {
            return;
        };
        match self.detector.detect(&samples) {
            Ok(result) => {
                let mut state = lock(state);
                if result.is_voiced() {
                    state.history.push(PitchHistoryPoint {
                        timestamp: elapsed_ms,
                        result: result.clone(),
                    });
                }
                state.current = Some(result);
            }
            Err(e) => log::warn!("[TRACKER] Detection failed: {}", e),
        }
    }
}

/// Handle to a running poll thread.
struct PollWorker {
    shutdown_tx: Sender<()>,
    thread_handle: JoinHandle<Poller>,
}

fn lock(state: &Mutex<TrackState>) -> MutexGuard<'_, TrackState> {
    // A panic on the poll thread leaves the history itself intact
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run_poll_loop(
    mut poller: Poller,
    state: Arc<Mutex<TrackState>>,
    started: Instant,
    interval: Duration,
    shutdown_rx: Receiver<()>,
) -> Poller {
    log::debug!("[TRACKER] Poll thread started ({:?} interval)", interval);
    let ticker = crossbeam_channel::tick(interval);
    loop {
        crossbeam_channel::select! {
            recv(ticker) -> _ => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                poller.tick(elapsed_ms, &state);
            },
            recv(shutdown_rx) -> _ => {
                log::debug!("[TRACKER] Received shutdown signal");
                break;
            },
        }
    }
    poller
}

/// Polls a sample source on a timer and accumulates a pitch history.
pub struct PitchTracker {
    config: TrackerConfig,
    detector_config: PitchDetectorConfig,
    state: Arc<Mutex<TrackState>>,
    poller: Option<Poller>,
    worker: Option<PollWorker>,
    started_at: Option<Instant>,
    recorded: Option<Duration>,
}

impl PitchTracker {
    /// Creates an idle tracker with no source attached.
    ///
    /// `detector_config` supplies the detector tuning; its sample rate and
    /// buffer size are replaced by the source's on [`attach_source`].
    ///
    /// [`attach_source`]: PitchTracker::attach_source
    pub fn new(config: TrackerConfig, detector_config: PitchDetectorConfig) -> Self {
        let history = PitchHistory::new(config.history_capacity);
        Self {
            config,
            detector_config,
            state: Arc::new(Mutex::new(TrackState {
                history,
                current: None,
            })),
            poller: None,
            worker: None,
            started_at: None,
            recorded: None,
        }
    }

    /// Attaches a source and builds a detector matching its frame format.
    ///
    /// A running session is stopped first.
    pub fn attach_source<S: SampleSource + 'static>(&mut self, source: S) -> Result<()> {
        if self.is_running() {
            log::info!("[TRACKER] Stopping running session to attach a new source");
            self.stop();
        }
        let config = PitchDetectorConfig {
            sample_rate: source.sample_rate(),
            buffer_size: source.buffer_size(),
            ..self.detector_config.clone()
        };
        let detector = PitchDetector::new(config)?;
        self.poller = Some(Poller {
            source: Box::new(source),
            detector,
        });
        Ok(())
    }

    pub fn has_source(&self) -> bool {
        self.poller.is_some() || self.worker.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Starts a new session: clears the history and begins polling.
    ///
    /// Without an attached source this logs a warning and does nothing.
    pub fn start(&mut self) {
        if self.is_running() {
            log::warn!("[TRACKER] start() called while already running");
            return;
        }
        let Some(mut poller) = self.poller.take() else {
            log::warn!("[TRACKER] start() called without a sample source; ignoring");
            return;
        };
        poller.source.reset();

        {
            let mut state = lock(&self.state);
            state.history.clear();
            state.current = None;
        }

        let started = Instant::now();
        self.started_at = Some(started);
        self.recorded = None;

        let interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let state = Arc::clone(&self.state);
        let thread_handle =
            thread::spawn(move || run_poll_loop(poller, state, started, interval, shutdown_rx));

        self.worker = Some(PollWorker {
            shutdown_tx,
            thread_handle,
        });
        log::info!(
            "[TRACKER] Started polling every {} ms",
            self.config.poll_interval_ms
        );
    }

    /// Stops polling. The history stays available for analysis.
    ///
    /// A poll already in progress finishes before the thread exits.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.recorded = self.started_at.map(|t| t.elapsed());

        let _ = worker.shutdown_tx.send(());
        match worker.thread_handle.join() {
            Ok(poller) => self.poller = Some(poller),
            Err(_) => log::error!("[TRACKER] Poll thread panicked; source must be re-attached"),
        }
        log::info!("[TRACKER] Stopped with {} history points", self.history_len());
    }

    /// Snapshot of the history in chronological order.
    pub fn history(&self) -> Vec<PitchHistoryPoint> {
        lock(&self.state).history.to_vec()
    }

    pub fn history_len(&self) -> usize {
        lock(&self.state).history.len()
    }

    /// The most recent detection, voiced or not.
    pub fn current_pitch(&self) -> Option<PitchDetectionResult> {
        lock(&self.state).current.clone()
    }

    pub fn clear_history(&self) {
        let mut state = lock(&self.state);
        state.history.clear();
        state.current = None;
    }

    /// Length of the current (or last) session.
    pub fn recording_duration(&self) -> Duration {
        match (self.recorded, self.started_at) {
            (Some(recorded), _) => recorded,
            (None, Some(started)) => started.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    /// Runs melody analysis over the current history.
    pub fn analyze_current<I: MelodyInference>(
        &self,
        analyzer: &MelodyAnalyzer<I>,
        bpm: Option<f64>,
    ) -> MelodyAnalysis {
        let history = self.history();
        analyzer.analyze_pitch_history(&history, self.recording_duration().as_secs_f64(), bpm)
    }

    /// Runs vocal analysis over the current history.
    pub fn vocal_characteristics<I: MelodyInference>(
        &self,
        analyzer: &MelodyAnalyzer<I>,
    ) -> VocalCharacteristics {
        analyzer.analyze_vocal_characteristics(&self.history())
    }
}

impl Drop for PitchTracker {
    fn drop(&mut self) {
        self.stop();
    }
}
