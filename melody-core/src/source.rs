//! Sample sources the pitch tracker polls.
//!
//! A source behaves like an analyser node: every call hands back the most
//! recent complete frame, even if no new one has arrived since the last call.
//! A frame older than the source's maximum age counts as no signal, so a
//! stalled capture stream reads as silence.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};

/// How long a frame stays current when no newer one arrives.
pub const DEFAULT_MAX_FRAME_AGE: Duration = Duration::from_millis(250);

/// Anything that can supply fixed-size frames of time-domain samples.
pub trait SampleSource: Send {
    /// Sample rate of the frames in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of samples in every frame.
    fn buffer_size(&self) -> usize;

    /// The latest frame, or `None` if there is no current signal.
    fn current_samples(&mut self) -> Option<Vec<f32>>;

    /// Drops buffered state before a new session starts.
    fn reset(&mut self) {}
}

/// A [`SampleSource`] fed by the audio capture channel.
///
/// Frames of the wrong length are dropped.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: Receiver<Vec<f32>>,
    latest: Option<(Vec<f32>, Instant)>,
    max_age: Duration,
    sample_rate: u32,
    buffer_size: usize,
    disconnected: bool,
}

impl ChannelSource {
    pub fn new(receiver: Receiver<Vec<f32>>, sample_rate: u32, buffer_size: usize) -> Self {
        Self {
            receiver,
            latest: None,
            max_age: DEFAULT_MAX_FRAME_AGE,
            sample_rate,
            buffer_size,
            disconnected: false,
        }
    }

    /// Sets how long a frame is reused once capture stops delivering.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Moves queued frames into `latest`.
    fn drain(&mut self) {
        let mut received = false;
        loop {
            match self.receiver.try_recv() {
                Ok(frame) if frame.len() == self.buffer_size => {
                    self.latest = Some((frame, Instant::now()));
                    received = true;
                }
                Ok(frame) => log::debug!(
                    "[SOURCE] Dropping frame of {} samples (expected {})",
                    frame.len(),
                    self.buffer_size
                ),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        log::warn!("[SOURCE] Capture channel closed");
                        self.disconnected = true;
                    }
                    if !received {
                        self.latest = None;
                    }
                    break;
                }
            }
        }
    }
}

impl SampleSource for ChannelSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn current_samples(&mut self) -> Option<Vec<f32>> {
        self.drain();
        let stale = match &self.latest {
            Some((_, received)) => received.elapsed() > self.max_age,
            None => return None,
        };
        if stale {
            log::debug!("[SOURCE] No frame for {:?}; treating input as silent", self.max_age);
            self.latest = None;
            return None;
        }
        self.latest.as_ref().map(|(frame, _)| frame.clone())
    }

    fn reset(&mut self) {
        self.drain();
        self.latest = None;
    }
}
