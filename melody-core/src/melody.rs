//! # Melody Analysis Module
//!
//! Turns a pitch history into discrete notes and summary statistics.
//!
//! ## Pipeline
//! 1. History points become raw samples (seconds, MIDI number, confidence)
//! 2. Low-confidence samples and samples without a MIDI number are dropped
//! 3. Consecutive samples on the same MIDI number are merged into one note
//! 4. Notes shorter than the minimum duration are discarded
//! 5. Optionally, notes are snapped to a tempo grid
//! 6. Key, tempo and range come from a [`MelodyInference`] collaborator
//!
//! Vocal characteristics (average pitch, stability, vibrato, dynamics) are
//! computed straight from the history.


use serde::{Deserialize, Serialize};

use crate::history::PitchHistoryPoint;
use crate::inference::{MelodyInference, PitchRange, ProfileInference, Scale};
use crate::tuning;

const DEFAULT_TEMPO: f64 = 120.0;
const DEFAULT_KEY: &str = "C major";
const DEFAULT_AVERAGE_PITCH: f64 = 60.0;
const DEFAULT_PITCH_RANGE: PitchRange = PitchRange { min: 60, max: 72 };
const DEFAULT_CONFIDENCE: f64 = 0.5;

const MIN_VELOCITY: u8 = 40;
const MAX_VELOCITY: u8 = 100;

/// A segmented note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidiNote {
    /// MIDI note number
    pub note: u8,
    pub note_name: String,
    /// Seconds from the start of the recording
    pub start_time: f64,
    /// Seconds
    pub duration: f64,
    /// 40-100, derived from detection confidence
    pub velocity: u8,
    /// Frequency of the first sample of the note
    pub frequency: f32,
    /// Highest confidence seen across the note
    pub confidence: f32,
}

/// Structured description of a sung melody.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MelodyAnalysis {
    pub notes: Vec<MidiNote>,
    /// Beats per minute
    pub tempo: f64,
    pub key: String,
    pub scale: Scale,
    /// Recording length in seconds
    pub duration: f64,
    /// Mean MIDI note number
    pub average_pitch: f64,
    pub pitch_range: PitchRange,
    pub confidence: f64,
}

/// Summary of how a voice behaves over a take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocalCharacteristics {
    /// Mean of the voiced frequencies in Hz
    pub average_frequency: f64,
    /// 1 - (standard deviation / mean), within 0..=1
    pub pitch_stability: f64,
    /// Vibrato rate in Hz
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibrato_rate: Option<f64>,
    /// Vibrato depth in cents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibrato_depth: Option<f64>,
    /// Rough dB estimate from the spread of detection confidence
    pub dynamic_range: f64,
}

impl VocalCharacteristics {
    fn zero() -> Self {
        Self {
            average_frequency: 0.0,
            pitch_stability: 0.0,
            vibrato_rate: None,
            vibrato_depth: None,
            dynamic_range: 0.0,
        }
    }
}

/// Detected vibrato, rate in Hz and depth in cents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vibrato {
    pub rate: f64,
    pub depth: f64,
}

/// Analyzer tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MelodyAnalyzerOptions {
    /// Notes shorter than this (ms) are treated as glitches
    pub min_note_duration_ms: f64,
    /// Samples below this confidence are ignored
    pub min_confidence: f32,
    /// Snap notes to the tempo grid when a BPM is known
    pub quantize: bool,
    /// Grid subdivision per whole note (16 = sixteenth notes)
    pub quantize_resolution: u32,
    /// Minimum autocorrelation sum for vibrato to be reported
    pub vibrato_threshold: f64,
    /// Spacing of history points (ms), i.e. the tracker's poll interval
    pub sample_interval_ms: f64,
    /// Shortest vibrato period searched (ms)
    pub vibrato_min_period_ms: f64,
    /// Longest vibrato period searched (ms)
    pub vibrato_max_period_ms: f64,
    /// Histories shorter than this never report vibrato
    pub min_vibrato_points: usize,
}

impl Default for MelodyAnalyzerOptions {
    fn default() -> Self {
        Self {
            min_note_duration_ms: 100.0,
            min_confidence: 0.7,
            quantize: false,
            quantize_resolution: 16,
            vibrato_threshold: 0.3,
            sample_interval_ms: 50.0,
            vibrato_min_period_ms: 100.0,
            vibrato_max_period_ms: 600.0,
            min_vibrato_points: 50,
        }
    }
}

/// Partial update for [`MelodyAnalyzer::update_options`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MelodyAnalyzerOptionsUpdate {
    pub min_note_duration_ms: Option<f64>,
    pub min_confidence: Option<f32>,
    pub quantize: Option<bool>,
    pub quantize_resolution: Option<u32>,
    pub vibrato_threshold: Option<f64>,
    pub sample_interval_ms: Option<f64>,
    pub vibrato_min_period_ms: Option<f64>,
    pub vibrato_max_period_ms: Option<f64>,
    pub min_vibrato_points: Option<usize>,
}

/// A history point reduced to what segmentation needs.
#[derive(Debug, Clone)]
struct PitchSample {
    frequency: f32,
    note_name: Option<String>,
    midi_note: Option<u8>,
    confidence: f32,
    /// Seconds
    time: f64,
}

/// Converts pitch histories into melodies and vocal statistics.
#[derive(Debug, Clone)]
pub struct MelodyAnalyzer<I = ProfileInference> {
    options: MelodyAnalyzerOptions,
    inference: I,
}

impl MelodyAnalyzer<ProfileInference> {
    pub fn new(options: MelodyAnalyzerOptions) -> Self {
        Self::with_inference(options, ProfileInference)
    }
}

impl Default for MelodyAnalyzer<ProfileInference> {
    fn default() -> Self {
        Self::new(MelodyAnalyzerOptions::default())
    }
}

impl<I: MelodyInference> MelodyAnalyzer<I> {
    /// Creates an analyzer that delegates key/tempo inference to `inference`.
    pub fn with_inference(options: MelodyAnalyzerOptions, inference: I) -> Self {
        Self { options, inference }
    }

    pub fn options(&self) -> &MelodyAnalyzerOptions {
        &self.options
    }

    /// Extracts the melody from a pitch history.
    ///
    /// # Arguments
    /// * `history` - Points in chronological order
    /// * `recording_duration` - Length of the take in seconds
    /// * `bpm` - Known tempo, used for quantization and reported as-is
    pub fn analyze_pitch_history(
        &self,
        history: &[PitchHistoryPoint],
        recording_duration: f64,
        bpm: Option<f64>,
    ) -> MelodyAnalysis {
        let samples: Vec<PitchSample> = history
            .iter()
            .map(|point| PitchSample {
                frequency: point.result.frequency,
                note_name: point.result.note.clone(),
                midi_note: point.result.midi_note,
                confidence: point.result.confidence,
                time: point.timestamp as f64 / 1000.0,
            })
            .collect();

        let notes = self.convert_to_midi_notes(&samples);
        let bpm = bpm.filter(|b| b.is_finite() && *b > 0.0);
        let notes = match bpm {
            Some(bpm) if self.options.quantize => self.quantize_notes(notes, bpm),
            _ => notes,
        };

        let traits = self.inference.infer(&notes);
        log::debug!(
            "[MELODY] {} history points -> {} notes, key {:?}",
            history.len(),
            notes.len(),
            traits.key
        );

        MelodyAnalysis {
            tempo: bpm.or(traits.tempo).unwrap_or(DEFAULT_TEMPO),
            key: traits.key.unwrap_or_else(|| DEFAULT_KEY.to_string()),
            scale: traits.scale.unwrap_or(Scale::Major),
            duration: recording_duration,
            average_pitch: traits.average_pitch.unwrap_or(DEFAULT_AVERAGE_PITCH),
            pitch_range: traits.pitch_range.unwrap_or(DEFAULT_PITCH_RANGE),
            confidence: traits.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            notes,
        }
    }

    /// Segments filtered samples into notes.
    fn convert_to_midi_notes(&self, samples: &[PitchSample]) -> Vec<MidiNote> {
        let min_duration = self.options.min_note_duration_ms / 1000.0;
        let mut notes = Vec::new();
        let mut current: Option<MidiNote> = None;

        for sample in samples {
            if sample.confidence < self.options.min_confidence {
                continue;
            }
            let Some(midi) = sample.midi_note else {
                continue;
            };

            if let Some(note) = current.as_mut().filter(|n| n.note == midi) {
                note.duration = sample.time - note.start_time;
                note.confidence = note.confidence.max(sample.confidence);
                note.velocity = note.velocity.max(velocity_from_confidence(sample.confidence));
                continue;
            }

            if let Some(finished) = current.take() {
                if finished.duration >= min_duration {
                    notes.push(finished);
                }
            }
            current = Some(MidiNote {
                note: midi,
                note_name: sample
                    .note_name
                    .clone()
                    .unwrap_or_else(|| tuning::midi_note_to_note_name(midi)),
                start_time: sample.time,
                duration: 0.0,
                velocity: velocity_from_confidence(sample.confidence),
                frequency: sample.frequency,
                confidence: sample.confidence,
            });
        }

        if let Some(finished) = current {
            if finished.duration >= min_duration {
                notes.push(finished);
            }
        }
        notes
    }

    /// Snaps start times and durations to the grid for `bpm`.
    fn quantize_notes(&self, notes: Vec<MidiNote>, bpm: f64) -> Vec<MidiNote> {
        let Some(grid) = grid_duration(bpm, self.options.quantize_resolution) else {
            log::warn!(
                "[MELODY] Cannot quantize with resolution {}; leaving notes as-is",
                self.options.quantize_resolution
            );
            return notes;
        };

        notes
            .into_iter()
            .map(|note| {
                let start_units = (note.start_time / grid).round();
                let duration_units = (note.duration / grid).round().max(1.0);
                MidiNote {
                    start_time: start_units * grid,
                    duration: duration_units * grid,
                    ..note
                }
            })
            .collect()
    }

    /// Computes average frequency, stability, vibrato and dynamic range.
    ///
    /// Unvoiced points (frequency 0) are excluded from the pitch statistics
    /// but still count towards the dynamic range.
    pub fn analyze_vocal_characteristics(
        &self,
        history: &[PitchHistoryPoint],
    ) -> VocalCharacteristics {
        if history.is_empty() {
            return VocalCharacteristics::zero();
        }

        let frequencies = voiced_frequencies(history);
        let (average_frequency, pitch_stability) = match mean(&frequencies) {
            Some(avg) if avg > 0.0 => {
                let variance = frequencies.iter().map(|f| (f - avg).powi(2)).sum::<f64>()
                    / frequencies.len() as f64;
                let stability = (1.0 - variance.sqrt() / avg).clamp(0.0, 1.0);
                (avg, stability)
            }
            _ => (0.0, 0.0),
        };

        let vibrato = self.detect_vibrato(history);

        let (min_conf, max_conf) = history.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY),
            |(lo, hi), p| (lo.min(p.result.confidence), hi.max(p.result.confidence)),
        );
        let dynamic_range = ((max_conf - min_conf) as f64 * 20.0).max(0.0);

        VocalCharacteristics {
            average_frequency,
            pitch_stability,
            vibrato_rate: vibrato.map(|v| v.rate),
            vibrato_depth: vibrato.map(|v| v.depth),
            dynamic_range,
        }
    }

    /// Looks for periodic pitch oscillation.
    ///
    /// Correlates frequency deviations from the mean against themselves at
    /// every lag within the configured period window and keeps the strongest
    /// lag. Needs at least `min_vibrato_points` history points.
    pub fn detect_vibrato(&self, history: &[PitchHistoryPoint]) -> Option<Vibrato> {
        if history.len() < self.options.min_vibrato_points {
            return None;
        }
        let interval = self.options.sample_interval_ms;
        if !(interval > 0.0) {
            return None;
        }

        let frequencies = voiced_frequencies(history);
        let avg = mean(&frequencies).filter(|avg| *avg > 0.0)?;
        let deviations: Vec<f64> = frequencies.iter().map(|f| f - avg).collect();

        let min_lag = ((self.options.vibrato_min_period_ms / interval).ceil() as usize).max(1);
        let max_lag = (self.options.vibrato_max_period_ms / interval).floor() as usize;

        let mut best_correlation = 0.0;
        let mut best_lag = 0;
        for lag in min_lag..=max_lag.min(deviations.len().saturating_sub(1)) {
            let correlation: f64 = deviations
                .iter()
                .zip(deviations.iter().skip(lag))
                .map(|(a, b)| a * b)
                .sum();
            if correlation > best_correlation {
                best_correlation = correlation;
                best_lag = lag;
            }
        }

        if best_lag == 0 || best_correlation <= self.options.vibrato_threshold {
            return None;
        }

        let rate = 1000.0 / (best_lag as f64 * interval);
        let max_deviation = deviations.iter().fold(0.0_f64, |m, d| m.max(d.abs()));
        let depth = 1200.0 * (1.0 + max_deviation / avg).log2() / 2.0;
        Some(Vibrato { rate, depth })
    }

    /// Renders a human-readable report of an analysis.
    pub fn export_as_text(&self, melody: &MelodyAnalysis) -> String {
        let mut lines = vec![
            "Melody Analysis".to_string(),
            "===============".to_string(),
            format!("Key: {}", melody.key),
            format!("Tempo: {} BPM", melody.tempo),
            format!("Duration: {:.2}s", melody.duration),
            format!("Notes: {}", melody.notes.len()),
            format!(
                "Pitch Range: {} - {}",
                melody.pitch_range.min, melody.pitch_range.max
            ),
            format!("Confidence: {:.0}%", melody.confidence * 100.0),
            String::new(),
            "Notes:".to_string(),
            "------".to_string(),
        ];
        lines.extend(melody.notes.iter().enumerate().map(|(i, note)| {
            format!(
                "{}. {} ({}) @ {:.2}s for {:.2}s (vel: {})",
                i + 1,
                note.note_name,
                note.note,
                note.start_time,
                note.duration,
                note.velocity
            )
        }));
        lines.join("\n")
    }

    /// Applies a partial options update.
    pub fn update_options(&mut self, update: MelodyAnalyzerOptionsUpdate) {
        let options = &mut self.options;
        if let Some(v) = update.min_note_duration_ms {
            options.min_note_duration_ms = v;
        }
        if let Some(v) = update.min_confidence {
            options.min_confidence = v;
        }
        if let Some(v) = update.quantize {
            options.quantize = v;
        }
        if let Some(v) = update.quantize_resolution {
            options.quantize_resolution = v;
        }
        if let Some(v) = update.vibrato_threshold {
            options.vibrato_threshold = v;
        }
        if let Some(v) = update.sample_interval_ms {
            options.sample_interval_ms = v;
        }
        if let Some(v) = update.vibrato_min_period_ms {
            options.vibrato_min_period_ms = v;
        }
        if let Some(v) = update.vibrato_max_period_ms {
            options.vibrato_max_period_ms = v;
        }
        if let Some(v) = update.min_vibrato_points {
            options.min_vibrato_points = v;
        }
    }
}

/// Maps confidence (0-1) onto MIDI velocity 40-100.
pub fn velocity_from_confidence(confidence: f32) -> u8 {
    let velocity = (40.0 + confidence as f64 * 60.0).round();
    velocity.clamp(MIN_VELOCITY as f64, MAX_VELOCITY as f64) as u8
}

/// Length of one grid unit in seconds, or `None` for unusable inputs.
pub fn grid_duration(bpm: f64, resolution: u32) -> Option<f64> {
    if resolution == 0 || !(bpm.is_finite() && bpm > 0.0) {
        return None;
    }
    let beat = 60.0 / bpm;
    Some(beat / (resolution as f64 / 4.0))
}

fn voiced_frequencies(history: &[PitchHistoryPoint]) -> Vec<f64> {
    history
        .iter()
        .map(|p| p.result.frequency as f64)
        .filter(|f| *f > 0.0)
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// One-off melody analysis with a throwaway analyzer.
pub fn quick_analyze_melody(
    history: &[PitchHistoryPoint],
    recording_duration: f64,
    bpm: Option<f64>,
    options: Option<MelodyAnalyzerOptions>,
) -> MelodyAnalysis {
    MelodyAnalyzer::new(options.unwrap_or_default()).analyze_pitch_history(
        history,
        recording_duration,
        bpm,
    )
}

/// One-off vocal analysis with default options.
pub fn quick_analyze_vocals(history: &[PitchHistoryPoint]) -> VocalCharacteristics {
    MelodyAnalyzer::new(MelodyAnalyzerOptions::default()).analyze_vocal_characteristics(history)
}
