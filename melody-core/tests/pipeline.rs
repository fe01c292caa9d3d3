//! End-to-end checks: synthetic audio -> detector -> history -> analysis.

use approx::assert_abs_diff_eq;
use melody_core::{
    MelodyAnalyzer, MelodyAnalyzerOptions, PitchDetectionResult, PitchDetector,
    PitchDetectorConfig, PitchHistory, PitchHistoryPoint, Scale, quick_analyze_melody,
    quick_analyze_vocals, tuning,
};

const SAMPLE_RATE: u32 = 44_100;
const FRAME: usize = 2048;
const POLL_MS: u64 = 50;

fn sine_frame(frequency: f32, offset: usize) -> Vec<f32> {
    (0..FRAME)
        .map(|i| {
            let t = (offset + i) as f32 / SAMPLE_RATE as f32;
            0.5 * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Detects each (frequency, polls) segment as the tracker would, one frame
/// per poll, keeping only voiced results.
fn sing(segments: &[(f32, usize)]) -> PitchHistory {
    // Low notes span few periods per frame, so clarity sits near 0.9
    let mut detector = PitchDetector::new(PitchDetectorConfig {
        confidence_threshold: 0.8,
        ..Default::default()
    })
    .unwrap();
    let mut history = PitchHistory::default();
    let mut poll = 0u64;
    for &(frequency, polls) in segments {
        for _ in 0..polls {
            let samples = if frequency > 0.0 {
                sine_frame(frequency, poll as usize * 2205)
            } else {
                vec![0.0; FRAME]
            };
            let result = detector.detect(&samples).unwrap();
            if result.is_voiced() {
                history.push(PitchHistoryPoint {
                    timestamp: poll * POLL_MS,
                    result,
                });
            }
            poll += 1;
        }
    }
    history
}

#[test]
fn test_sung_c_major_phrase() {
    let c4 = tuning::midi_note_to_frequency(60);
    let e4 = tuning::midi_note_to_frequency(64);
    let g4 = tuning::midi_note_to_frequency(67);
    let history = sing(&[(c4, 10), (0.0, 2), (e4, 10), (0.0, 2), (g4, 10), (c4, 10)]);

    let melody = quick_analyze_melody(&history.to_vec(), 2.2, None, None);
    let pitches: Vec<u8> = melody.notes.iter().map(|n| n.note).collect();
    assert_eq!(pitches, vec![60, 64, 67, 60]);
    assert_eq!(melody.key, "C major");
    assert_eq!(melody.scale, Scale::Major);
    assert_eq!(melody.pitch_range.min, 60);
    assert_eq!(melody.pitch_range.max, 67);
    assert_abs_diff_eq!(melody.notes[0].duration, 0.45, epsilon = 1e-9);
    assert_abs_diff_eq!(melody.notes[1].start_time, 0.6, epsilon = 1e-9);
}

#[test]
fn test_quantized_sung_phrase_sits_on_grid() {
    let a4 = tuning::midi_note_to_frequency(69);
    let c5 = tuning::midi_note_to_frequency(72);
    let history = sing(&[(a4, 7), (c5, 9)]);

    let options = MelodyAnalyzerOptions {
        quantize: true,
        quantize_resolution: 8,
        ..Default::default()
    };
    let melody = quick_analyze_melody(&history.to_vec(), 0.8, Some(90.0), Some(options));
    let grid = 60.0 / 90.0 / 2.0;
    assert_eq!(melody.tempo, 90.0);
    assert_eq!(melody.notes.len(), 2);
    for note in &melody.notes {
        let start_units = note.start_time / grid;
        let duration_units = note.duration / grid;
        assert_abs_diff_eq!(start_units, start_units.round(), epsilon = 1e-9);
        assert_abs_diff_eq!(duration_units, duration_units.round(), epsilon = 1e-9);
        assert!(duration_units.round() >= 1.0);
    }
}

#[test]
fn test_twenty_point_scenario() {
    let history: Vec<PitchHistoryPoint> = (0..20)
        .map(|i| PitchHistoryPoint {
            timestamp: i * 50,
            result: PitchDetectionResult {
                frequency: 261.63,
                note: Some("C4".into()),
                midi_note: Some(60),
                cents: 0.0,
                confidence: 0.9,
                in_tune: true,
                clarity: 0.9,
            },
        })
        .collect();

    let melody = quick_analyze_melody(&history, 1.0, None, None);
    assert_eq!(melody.notes.len(), 1);
    assert_eq!(melody.notes[0].note, 60);
    assert_abs_diff_eq!(melody.notes[0].duration, 0.95, epsilon = 1e-9);
    assert_eq!(melody.notes[0].velocity, 94);
}

#[test]
fn test_vocal_characteristics_of_steady_tone() {
    let a3 = 220.0;
    let history = sing(&[(a3, 30)]);
    assert_eq!(history.len(), 30);

    let vocals = quick_analyze_vocals(&history.to_vec());
    assert_abs_diff_eq!(vocals.average_frequency, 220.0, epsilon = 1.0);
    assert!(vocals.pitch_stability > 0.99 && vocals.pitch_stability <= 1.0);
    // Fewer than 50 points never reports vibrato
    assert!(vocals.vibrato_rate.is_none());
}

#[test]
fn test_analysis_serializes_as_camel_case_json() {
    let history: Vec<PitchHistoryPoint> = (0..10)
        .map(|i| PitchHistoryPoint {
            timestamp: i * 50,
            result: PitchDetectionResult {
                frequency: 440.0,
                note: Some("A4".into()),
                midi_note: Some(69),
                cents: 0.0,
                confidence: 0.95,
                in_tune: true,
                clarity: 0.95,
            },
        })
        .collect();
    let analyzer = MelodyAnalyzer::new(MelodyAnalyzerOptions::default());
    let melody = analyzer.analyze_pitch_history(&history, 0.5, Some(120.0));
    let json = serde_json::to_value(&melody).unwrap();

    assert_eq!(json["tempo"], 120.0);
    assert_eq!(json["scale"], "major");
    assert_eq!(json["notes"][0]["noteName"], "A4");
    assert_eq!(json["notes"][0]["startTime"], 0.0);
    assert!(json["pitchRange"]["min"].is_u64());
    assert!(json.get("averagePitch").is_some());

    let vocals = serde_json::to_value(analyzer.analyze_vocal_characteristics(&[])).unwrap();
    assert_eq!(vocals["averageFrequency"], 0.0);
    assert!(vocals.get("vibratoRate").is_none());
}
