//! # Melody Inference Module
//!
//! Derives the musical context of a segmented melody: key and scale, tempo,
//! average pitch, range and an overall confidence. The analyzer treats this as
//! a pluggable collaborator through the [`MelodyInference`] trait; every field
//! is optional so an implementation can abstain.
//!
//! The default [`ProfileInference`] matches a duration-weighted pitch-class
//! histogram against the Krumhansl–Kessler key profiles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::melody::MidiNote;

/// Krumhansl–Kessler major key profile. Index 0 = tonic.
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl–Kessler minor key profile. Index 0 = tonic.
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Tempo estimates are folded by octaves into this range.
const MIN_TEMPO: f64 = 60.0;
const MAX_TEMPO: f64 = 200.0;

/// Mode of the detected key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Major,
    Minor,
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scale::Major => write!(f, "major"),
            Scale::Minor => write!(f, "minor"),
        }
    }
}

/// Lowest and highest MIDI note of a melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchRange {
    pub min: u8,
    pub max: u8,
}

/// What an inference pass could determine. `None` means "no opinion".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MelodyTraits {
    pub tempo: Option<f64>,
    /// Key name, e.g. "C major"
    pub key: Option<String>,
    pub scale: Option<Scale>,
    /// Mean MIDI note number
    pub average_pitch: Option<f64>,
    pub pitch_range: Option<PitchRange>,
    pub confidence: Option<f64>,
}

/// Musical inference over a segmented melody.
pub trait MelodyInference {
    fn infer(&self, notes: &[MidiNote]) -> MelodyTraits;
}

/// Key-profile based inference.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileInference;

impl MelodyInference for ProfileInference {
    fn infer(&self, notes: &[MidiNote]) -> MelodyTraits {
        if notes.is_empty() {
            return MelodyTraits::default();
        }

        let histogram = pitch_class_histogram(notes);
        let (root, scale, correlation) = match_key_profile(&histogram);

        let min = notes.iter().map(|n| n.note).min();
        let max = notes.iter().map(|n| n.note).max();
        let pitch_range = min.zip(max).map(|(min, max)| PitchRange { min, max });

        MelodyTraits {
            tempo: estimate_tempo(notes),
            key: Some(format!("{} {}", PITCH_CLASSES[root], scale)),
            scale: Some(scale),
            average_pitch: Some(weighted_average_pitch(notes)),
            pitch_range,
            confidence: Some(correlation.clamp(0.0, 1.0)),
        }
    }
}

fn note_weight(note: &MidiNote) -> f64 {
    note.duration.max(1e-3)
}

fn pitch_class_histogram(notes: &[MidiNote]) -> [f64; 12] {
    let mut histogram = [0.0; 12];
    for note in notes {
        histogram[(note.note % 12) as usize] += note_weight(note);
    }
    histogram
}

/// Returns the best (root, scale, correlation) over all 24 keys.
fn match_key_profile(histogram: &[f64; 12]) -> (usize, Scale, f64) {
    let mut best = (0, Scale::Major, f64::NEG_INFINITY);
    for root in 0..12 {
        let rotated: [f64; 12] = std::array::from_fn(|i| histogram[(root + i) % 12]);
        for (scale, profile) in [(Scale::Major, &MAJOR_PROFILE), (Scale::Minor, &MINOR_PROFILE)] {
            let r = correlate(&rotated, profile);
            if r > best.2 {
                best = (root, scale, r);
            }
        }
    }
    best
}

/// Pearson correlation of two 12-element vectors; 0 when either is flat.
fn correlate(a: &[f64; 12], b: &[f64; 12]) -> f64 {
    let mean_a = a.iter().sum::<f64>() / 12.0;
    let mean_b = b.iter().sum::<f64>() / 12.0;

    let mut numerator = 0.0;
    let mut denom_a = 0.0;
    let mut denom_b = 0.0;
    for i in 0..12 {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        numerator += da * db;
        denom_a += da * da;
        denom_b += db * db;
    }

    let denom = (denom_a * denom_b).sqrt();
    if denom > 0.0 { numerator / denom } else { 0.0 }
}

/// Median inter-onset interval converted to BPM and folded into 60–200.
fn estimate_tempo(notes: &[MidiNote]) -> Option<f64> {
    let mut intervals: Vec<f64> = notes
        .windows(2)
        .map(|pair| pair[1].start_time - pair[0].start_time)
        .filter(|ioi| *ioi > 1e-6)
        .collect();
    if intervals.is_empty() {
        return None;
    }
    intervals.sort_by(|a, b| a.total_cmp(b));
    let mid = intervals.len() / 2;
    let median = if intervals.len() % 2 == 0 {
        (intervals[mid - 1] + intervals[mid]) / 2.0
    } else {
        intervals[mid]
    };

    let mut bpm = 60.0 / median;
    while bpm < MIN_TEMPO {
        bpm *= 2.0;
    }
    while bpm > MAX_TEMPO {
        bpm /= 2.0;
    }
    Some(bpm.round())
}

fn weighted_average_pitch(notes: &[MidiNote]) -> f64 {
    let total: f64 = notes.iter().map(note_weight).sum();
    notes.iter().map(|n| n.note as f64 * note_weight(n)).sum::<f64>() / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn melody(pitches: &[u8], step: f64) -> Vec<MidiNote> {
        pitches
            .iter()
            .enumerate()
            .map(|(i, &note)| MidiNote {
                note,
                note_name: crate::tuning::midi_note_to_note_name(note),
                start_time: i as f64 * step,
                duration: step * 0.9,
                velocity: 80,
                frequency: crate::tuning::midi_note_to_frequency(note),
                confidence: 0.9,
            })
            .collect()
    }

    #[test]
    fn test_empty_melody_has_no_opinion() {
        assert_eq!(ProfileInference.infer(&[]), MelodyTraits::default());
    }

    #[test]
    fn test_c_major_scale() {
        let traits = ProfileInference.infer(&melody(&[60, 62, 64, 65, 67, 69, 71, 72], 0.5));
        assert_eq!(traits.key.as_deref(), Some("C major"));
        assert_eq!(traits.scale, Some(Scale::Major));
        assert_eq!(traits.pitch_range, Some(PitchRange { min: 60, max: 72 }));
        assert_abs_diff_eq!(traits.average_pitch.unwrap(), 66.25, epsilon = 1e-9);
        let confidence = traits.confidence.unwrap();
        assert!(confidence > 0.5 && confidence <= 1.0);
    }

    #[test]
    fn test_a_minor_arpeggio() {
        let traits = ProfileInference.infer(&melody(&[69, 72, 76, 69], 0.5));
        assert_eq!(traits.key.as_deref(), Some("A minor"));
        assert_eq!(traits.scale, Some(Scale::Minor));
    }

    #[test]
    fn test_tempo_from_onsets() {
        // Quarter notes at 0.5 s = 120 BPM
        let traits = ProfileInference.infer(&melody(&[60, 62, 64, 65], 0.5));
        assert_eq!(traits.tempo, Some(120.0));

        // 1.5 s apart = 40 BPM, folded up to 80
        let traits = ProfileInference.infer(&melody(&[60, 62, 64], 1.5));
        assert_eq!(traits.tempo, Some(80.0));

        // A single note carries no tempo
        let traits = ProfileInference.infer(&melody(&[60], 0.5));
        assert_eq!(traits.tempo, None);
    }

    #[test]
    fn test_correlate_flat_vector() {
        assert_eq!(correlate(&[1.0; 12], &MAJOR_PROFILE), 0.0);
        assert_abs_diff_eq!(correlate(&MAJOR_PROFILE, &MAJOR_PROFILE), 1.0, epsilon = 1e-12);
    }
}
