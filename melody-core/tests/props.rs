//! Property tests for the analyzer invariants.

use melody_core::{
    MelodyAnalyzer, MelodyAnalyzerOptions, PitchDetectionResult, PitchHistoryPoint, tuning,
};
use proptest::prelude::*;

/// Histories of (midi, confidence, voiced) at 50 ms spacing.
fn history_strategy() -> impl Strategy<Value = Vec<PitchHistoryPoint>> {
    proptest::collection::vec((48u8..84, 0.0f32..=1.0, any::<bool>()), 0..200).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (midi, confidence, voiced))| PitchHistoryPoint {
                timestamp: i as u64 * 50,
                result: if voiced {
                    PitchDetectionResult {
                        frequency: tuning::midi_note_to_frequency(midi),
                        note: Some(tuning::midi_note_to_note_name(midi)),
                        midi_note: Some(midi),
                        cents: 0.0,
                        confidence,
                        in_tune: true,
                        clarity: confidence,
                    }
                } else {
                    PitchDetectionResult::empty()
                },
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_stability_is_bounded(history in history_strategy()) {
        let vocals = MelodyAnalyzer::new(MelodyAnalyzerOptions::default())
            .analyze_vocal_characteristics(&history);
        prop_assert!((0.0..=1.0).contains(&vocals.pitch_stability));
        prop_assert!(vocals.average_frequency.is_finite());
        prop_assert!(vocals.dynamic_range >= 0.0);
    }

    #[test]
    fn prop_notes_meet_minimum_duration(history in history_strategy(), min_ms in 0.0f64..400.0) {
        let analyzer = MelodyAnalyzer::new(MelodyAnalyzerOptions {
            min_note_duration_ms: min_ms,
            ..Default::default()
        });
        let melody = analyzer.analyze_pitch_history(&history, 10.0, None);
        for note in &melody.notes {
            prop_assert!(note.duration >= min_ms / 1000.0);
            prop_assert!((40..=100).contains(&note.velocity));
        }
        // Notes come out in time order
        prop_assert!(melody.notes.windows(2).all(|w| w[0].start_time < w[1].start_time));
    }

    #[test]
    fn prop_analysis_is_idempotent(history in history_strategy(), bpm in 60.0f64..180.0) {
        let analyzer = MelodyAnalyzer::new(MelodyAnalyzerOptions {
            quantize: true,
            ..Default::default()
        });
        let first = analyzer.analyze_pitch_history(&history, 10.0, Some(bpm));
        let second = analyzer.analyze_pitch_history(&history, 10.0, Some(bpm));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_quantized_notes_sit_on_grid(
        history in history_strategy(),
        bpm in 60.0f64..180.0,
        resolution in prop::sample::select(vec![4u32, 8, 16, 32]),
    ) {
        let analyzer = MelodyAnalyzer::new(MelodyAnalyzerOptions {
            quantize: true,
            quantize_resolution: resolution,
            ..Default::default()
        });
        let grid = 60.0 / bpm / (resolution as f64 / 4.0);
        let melody = analyzer.analyze_pitch_history(&history, 10.0, Some(bpm));
        for note in &melody.notes {
            let start_units = note.start_time / grid;
            let duration_units = note.duration / grid;
            prop_assert!((start_units - start_units.round()).abs() < 1e-6);
            prop_assert!((duration_units - duration_units.round()).abs() < 1e-6);
            prop_assert!(duration_units.round() >= 1.0);
        }
    }
}
