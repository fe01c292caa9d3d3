//! # Pitch Detection Module
//!
//! Monophonic pitch detection for sung or played notes. The detector works on
//! fixed-size frames of time-domain samples and reports the fundamental
//! frequency, the nearest note and how far off it is in cents.
//!
//! ## Algorithm
//! 1. RMS noise gate to reject silence
//! 2. Normalized autocorrelation (see [`crate::fft::autocorrelation`])
//! 3. Strongest local maximum within the lag window implied by the
//!    configured frequency range
//! 4. Parabolic interpolation for sub-sample accuracy
//! 5. Confidence = peak clarity scaled by signal level, then gated

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fft;
use crate::tuning;

/// Smallest frame the detector accepts.
pub const MIN_BUFFER_SIZE: usize = 2;

/// The outcome of running the detector over one frame.
///
/// A `frequency` of `0.0` means no pitch was found (silence, noise or an
/// out-of-range tone). Consumers must treat it as an absent sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchDetectionResult {
    /// Detected frequency in Hz (0 if no pitch detected)
    pub frequency: f32,
    /// Musical note (e.g., "C4", "A#3")
    pub note: Option<String>,
    /// MIDI note number (0-127)
    pub midi_note: Option<u8>,
    /// Deviation from the nearest note in cents (-50 to +50)
    pub cents: f32,
    /// Confidence score (0-1)
    pub confidence: f32,
    /// Whether |cents| is within the in-tune tolerance
    pub in_tune: bool,
    /// Raw normalized autocorrelation at the detected period
    pub clarity: f32,
}

impl PitchDetectionResult {
    /// The "no pitch" result.
    pub fn empty() -> Self {
        Self {
            frequency: 0.0,
            note: None,
            midi_note: None,
            cents: 0.0,
            confidence: 0.0,
            in_tune: false,
            clarity: 0.0,
        }
    }

    /// True when the frame carried a detectable pitch.
    pub fn is_voiced(&self) -> bool {
        self.frequency > 0.0
    }
}

impl Default for PitchDetectionResult {
    fn default() -> Self {
        Self::empty()
    }
}

/// Detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PitchDetectorConfig {
    /// Sample rate of the incoming frames in Hz
    pub sample_rate: u32,
    /// Number of samples per frame; fixed for the detector's lifetime
    pub buffer_size: usize,
    /// Lowest frequency to report (default: 80 Hz, low E2)
    pub min_frequency: f32,
    /// Highest frequency to report (default: 1000 Hz, around B5)
    pub max_frequency: f32,
    /// Results below this confidence are discarded
    pub confidence_threshold: f32,
    /// In-tune tolerance in cents
    pub in_tune_tolerance: f32,
    /// Frames with an RMS level below this are treated as silence
    pub silence_threshold: f32,
}

impl Default for PitchDetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            buffer_size: 2048,
            min_frequency: 80.0,
            max_frequency: 1000.0,
            confidence_threshold: 0.9,
            in_tune_tolerance: 20.0,
            silence_threshold: 0.01,
        }
    }
}

impl PitchDetectorConfig {
    /// Checks that every field is usable.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::invalid_config("sample_rate", "must be positive"));
        }
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(Error::invalid_config(
                "buffer_size",
                format!(
                    "need at least {} samples, got {}",
                    MIN_BUFFER_SIZE, self.buffer_size
                ),
            ));
        }
        if !(self.min_frequency > 0.0 && self.min_frequency < self.max_frequency) {
            return Err(Error::invalid_config(
                "min_frequency",
                format!(
                    "must be positive and below max_frequency ({} >= {})",
                    self.min_frequency, self.max_frequency
                ),
            ));
        }
        if self.max_frequency > self.sample_rate as f32 / 2.0 {
            return Err(Error::invalid_config(
                "max_frequency",
                format!("{} Hz is above Nyquist for {} Hz", self.max_frequency, self.sample_rate),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::invalid_config("confidence_threshold", "must be within 0..=1"));
        }
        if !(self.in_tune_tolerance >= 0.0) {
            return Err(Error::invalid_config("in_tune_tolerance", "must not be negative"));
        }
        if !(self.silence_threshold >= 0.0) {
            return Err(Error::invalid_config("silence_threshold", "must not be negative"));
        }
        Ok(())
    }
}

/// Partial update for [`PitchDetector::update_config`]. `None` keeps the
/// current value. Sample rate and frame size cannot change after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchDetectorConfigUpdate {
    pub min_frequency: Option<f32>,
    pub max_frequency: Option<f32>,
    pub confidence_threshold: Option<f32>,
    pub in_tune_tolerance: Option<f32>,
}

/// Autocorrelation pitch detector.
#[derive(Debug, Clone)]
pub struct PitchDetector {
    config: PitchDetectorConfig,
    // Scratch frame, reused between calls
    buffer: Vec<f32>,
}

impl PitchDetector {
    /// Creates a detector after validating `config`.
    pub fn new(config: PitchDetectorConfig) -> Result<Self> {
        config.validate()?;
        let buffer = Vec::with_capacity(config.buffer_size);
        Ok(Self { config, buffer })
    }

    pub fn config(&self) -> &PitchDetectorConfig {
        &self.config
    }

    /// Detects the pitch of one frame.
    ///
    /// # Returns
    /// * `Ok(result)` - The detection; `result.frequency == 0.0` when no pitch
    /// * `Err(Error::BufferSizeMismatch)` - `samples` is not `buffer_size` long
    pub fn detect(&mut self, samples: &[f32]) -> Result<PitchDetectionResult> {
        if samples.len() != self.config.buffer_size {
            return Err(Error::BufferSizeMismatch {
                expected: self.config.buffer_size,
                got: samples.len(),
            });
        }

        let level = fft::rms(samples);
        // NaN levels fail this comparison too
        if !(level >= self.config.silence_threshold) || level == 0.0 {
            return Ok(PitchDetectionResult::empty());
        }

        self.buffer.clear();
        self.buffer.extend_from_slice(samples);
        fft::remove_dc_offset(&mut self.buffer);
        let acf = fft::autocorrelation(&self.buffer);

        let Some((lag, period)) = self.find_fundamental_period(&acf) else {
            return Ok(PitchDetectionResult::empty());
        };

        let frequency = self.config.sample_rate as f32 / period;
        if !frequency.is_finite()
            || frequency < self.config.min_frequency
            || frequency > self.config.max_frequency
        {
            return Ok(PitchDetectionResult::empty());
        }

        let clarity = acf[lag];
        let confidence = (clarity * (level * 10.0).min(1.0)).clamp(0.0, 1.0);
        if confidence < self.config.confidence_threshold {
            return Ok(PitchDetectionResult::empty());
        }

        let Some(info) = tuning::frequency_to_note(frequency) else {
            return Ok(PitchDetectionResult::empty());
        };
        let in_tune = info.cents.abs() <= self.config.in_tune_tolerance;

        Ok(PitchDetectionResult {
            frequency,
            note: Some(info.name),
            midi_note: Some(info.midi_note),
            cents: info.cents,
            confidence,
            in_tune,
            clarity,
        })
    }

    /// Finds the strongest autocorrelation peak inside the allowed lag window.
    ///
    /// Returns the integer peak lag and the interpolated period in samples.
    fn find_fundamental_period(&self, acf: &[f32]) -> Option<(usize, f32)> {
        let size = acf.len();
        let sample_rate = self.config.sample_rate as f32;
        let min_period = ((sample_rate / self.config.max_frequency).floor() as usize).max(1);
        let max_period = (sample_rate / self.config.min_frequency).floor() as usize;
        let end = max_period.min(size - 1);

        let mut best: Option<(usize, f32)> = None;
        for lag in min_period..end {
            let (prev, current, next) = (acf[lag - 1], acf[lag], acf[lag + 1]);
            let is_peak = current > prev && current > next;
            let beats_best = best.is_none_or(|(_, value)| current > value);
            if is_peak && current > 0.0 && beats_best {
                best = Some((lag, current));
            }
        }

        let (lag, _) = best?;
        let (y1, y2, y3) = (acf[lag - 1], acf[lag], acf[lag + 1]);
        let denominator = y1 - 2.0 * y2 + y3;
        let period = if denominator != 0.0 {
            lag as f32 + 0.5 * (y1 - y3) / denominator
        } else {
            lag as f32
        };
        Some((lag, period))
    }

    /// Applies a partial configuration update.
    ///
    /// The update is validated as a whole; on error the current
    /// configuration is left untouched.
    pub fn update_config(&mut self, update: PitchDetectorConfigUpdate) -> Result<()> {
        let mut next = self.config.clone();
        if let Some(v) = update.min_frequency {
            next.min_frequency = v;
        }
        if let Some(v) = update.max_frequency {
            next.max_frequency = v;
        }
        if let Some(v) = update.confidence_threshold {
            next.confidence_threshold = v;
        }
        if let Some(v) = update.in_tune_tolerance {
            next.in_tune_tolerance = v;
        }
        next.validate()?;
        self.config = next;
        Ok(())
    }
}
