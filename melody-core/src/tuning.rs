//! # Musical Tuning Module
//!
//! Equal temperament note math shared by the detector and the melody analyzer.
//! Everything is referenced to A4 = 440 Hz = MIDI note 69.
//!
//! ## Features
//! - Frequency to nearest MIDI note with cents deviation
//! - MIDI note to frequency and note name (sharp spelling)
//! - Note name parsing, accepting sharps, flats and negative octaves
//! - Cent distance between two frequencies

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;
/// MIDI number of A4.
pub const A4_MIDI_NOTE: u8 = 69;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A single entry of the MIDI note table.
#[derive(Debug, Clone)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3", "C-1")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// The nearest equal-tempered note to a measured frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInfo {
    pub name: String,
    pub midi_note: u8,
    /// Deviation from the note in whole cents, -50 to +50.
    pub cents: f32,
}

/// All 128 MIDI notes, computed once on first use.
static MIDI_NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    (0..128u8)
        .map(|midi| {
            let octave = (midi / 12) as i32 - 1;
            let name = format!("{}{}", NOTE_NAMES[(midi % 12) as usize], octave);
            Note {
                name,
                frequency: midi_note_to_frequency(midi),
            }
        })
        .collect()
});

/// Converts a MIDI note number to its equal-tempered frequency in Hz.
pub fn midi_note_to_frequency(midi_note: u8) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi_note as f32 - A4_MIDI_NOTE as f32) / 12.0)
}

/// Converts a frequency to a fractional MIDI note number.
///
/// Non-positive frequencies have no pitch and produce a non-finite result.
pub fn frequency_to_midi_note(frequency: f32) -> f32 {
    12.0 * (frequency / A4_FREQUENCY).log2() + A4_MIDI_NOTE as f32
}

/// Returns the sharp-spelled name of a MIDI note, e.g. 60 -> "C4".
pub fn midi_note_to_note_name(midi_note: u8) -> String {
    match MIDI_NOTES.get(midi_note as usize) {
        Some(note) => note.name.clone(),
        None => {
            let octave = (midi_note / 12) as i32 - 1;
            format!("{}{}", NOTE_NAMES[(midi_note % 12) as usize], octave)
        }
    }
}

/// Looks up a MIDI table entry.
pub fn midi_note(midi_note: u8) -> Option<&'static Note> {
    MIDI_NOTES.get(midi_note as usize)
}

/// Finds the nearest MIDI note to a frequency.
///
/// # Returns
/// * `Some(info)` - Nearest note name, MIDI number and cents deviation
/// * `None` - The frequency is not positive or falls outside MIDI 0..=127
pub fn frequency_to_note(frequency: f32) -> Option<NoteInfo> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return None;
    }
    let midi_float = frequency_to_midi_note(frequency);
    let midi = midi_float.round();
    if !(0.0..=127.0).contains(&midi) {
        return None;
    }
    let cents = ((midi_float - midi) * 100.0).round();
    let midi_note = midi as u8;

    Some(NoteInfo {
        name: midi_note_to_note_name(midi_note),
        midi_note,
        cents,
    })
}

/// Parses a note name such as "C4", "A#3", "Gb5" or "C-1" into a MIDI number.
///
/// Flats are normalized to their enharmonic sharps. Returns `None` for
/// malformed names and for notes outside MIDI 0..=127.
pub fn note_name_to_midi_note(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let letter = chars.next()?;
    if !('A'..='G').contains(&letter) {
        return None;
    }
    let rest = chars.as_str();
    let (accidental, octave_str) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };
    if octave_str.is_empty() || octave_str == "-" {
        return None;
    }
    let octave: i32 = octave_str.parse().ok()?;

    let natural = NOTE_NAMES.iter().position(|n| *n == letter.to_string())? as i32;
    let midi = (octave + 1) * 12 + natural + accidental;
    u8::try_from(midi).ok().filter(|m| *m <= 127)
}

/// Calculates the distance from `freq1` to `freq2` in cents.
///
/// Positive values mean `freq2` is sharp of `freq1`.
pub fn cents_between_frequencies(freq1: f32, freq2: f32) -> f32 {
    1200.0 * (freq2 / freq1).log2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_reference_pitches() {
        assert_abs_diff_eq!(midi_note_to_frequency(69), 440.0, epsilon = 1e-3);
        assert_abs_diff_eq!(midi_note_to_frequency(60), 261.6256, epsilon = 1e-2);
        assert_abs_diff_eq!(frequency_to_midi_note(880.0), 81.0, epsilon = 1e-4);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(midi_note_to_note_name(60), "C4");
        assert_eq!(midi_note_to_note_name(69), "A4");
        assert_eq!(midi_note_to_note_name(0), "C-1");
        assert_eq!(midi_note_to_note_name(70), "A#4");
    }

    #[test]
    fn test_frequency_to_note() {
        let info = frequency_to_note(440.0).unwrap();
        assert_eq!(info.name, "A4");
        assert_eq!(info.midi_note, 69);
        assert_eq!(info.cents, 0.0);

        // 10 cents sharp of A4
        let sharp = 440.0 * 2.0_f32.powf(10.0 / 1200.0);
        let info = frequency_to_note(sharp).unwrap();
        assert_eq!(info.midi_note, 69);
        assert_eq!(info.cents, 10.0);

        assert!(frequency_to_note(0.0).is_none());
        assert!(frequency_to_note(-5.0).is_none());
        assert!(frequency_to_note(40_000.0).is_none());
    }

    #[test]
    fn test_parse_note_names() {
        assert_eq!(note_name_to_midi_note("C4"), Some(60));
        assert_eq!(note_name_to_midi_note("A#3"), Some(58));
        assert_eq!(note_name_to_midi_note("Bb3"), Some(58));
        assert_eq!(note_name_to_midi_note("Gb5"), Some(78));
        assert_eq!(note_name_to_midi_note("C-1"), Some(0));
        assert_eq!(note_name_to_midi_note("H4"), None);
        assert_eq!(note_name_to_midi_note("C"), None);
        assert_eq!(note_name_to_midi_note("C#x"), None);
        assert_eq!(note_name_to_midi_note("C-2"), None);
    }

    #[test]
    fn test_cents_between() {
        assert_abs_diff_eq!(cents_between_frequencies(440.0, 880.0), 1200.0, epsilon = 1e-3);
        assert_abs_diff_eq!(cents_between_frequencies(440.0, 220.0), -1200.0, epsilon = 1e-3);
    }

    #[test]
    fn test_midi_table() {
        let a4 = midi_note(69).unwrap();
        assert_eq!(a4.name, "A4");
        assert_abs_diff_eq!(a4.frequency, 440.0, epsilon = 1e-3);
        assert!(midi_note(128).is_none());
    }
}
