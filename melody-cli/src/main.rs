//! # melody-cli - Sing-to-melody command line tool
//!
//! Records from the default microphone for a fixed time, tracks pitch while
//! recording and prints the extracted melody and vocal characteristics.
//!
//! ## Architecture
//! - **Audio callback**: CPAL stream cutting mono frames
//! - **Poll thread**: `PitchTracker` sampling the latest frame every poll interval
//! - **Main thread**: progress logging, then analysis and output
//! - **Communication**: Crossbeam channel between the callback and the tracker

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use cpal::traits::StreamTrait;
use melody_core::{
    ChannelSource, MelodyAnalysis, MelodyAnalyzer, PitchTracker, Settings, VocalCharacteristics,
    audio,
};

/// Queue depth between the audio callback and the tracker.
const FRAME_QUEUE: usize = 8;
/// How often the live pitch is logged while recording.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "melody-cli")]
#[command(about = "Sing into the microphone and get the melody back")]
struct Args {
    /// Settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recording length in seconds
    #[arg(short, long, default_value_t = 5.0)]
    seconds: f64,

    /// Known tempo; enables reporting it and quantization
    #[arg(short, long)]
    bpm: Option<f64>,

    /// Snap notes to the tempo grid (needs --bpm)
    #[arg(long)]
    quantize: bool,

    /// Print the analysis as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Write the effective settings to this file and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if args.quantize {
        settings.analyzer.quantize = true;
    }

    if let Some(path) = &args.write_config {
        settings
            .save(path)
            .with_context(|| format!("writing settings to {}", path.display()))?;
        log::info!("[MAIN] Wrote settings to {}", path.display());
        return Ok(());
    }

    let length = recording_length(args.seconds)?;
    if settings.analyzer.quantize && args.bpm.is_none() {
        log::warn!("[MAIN] Quantization requested without --bpm; notes will not be quantized");
    }

    let analyzer = MelodyAnalyzer::new(settings.analyzer_options());
    let (melody, vocals) = record(&settings, length, args.bpm, &analyzer)?;

    if args.json {
        let payload = serde_json::json!({
            "melody": melody,
            "vocalCharacteristics": vocals,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{}", analyzer.export_as_text(&melody));
        println!();
        print_vocals(&vocals);
    }
    Ok(())
}

/// Validates `--seconds` as a positive, representable duration.
fn recording_length(seconds: f64) -> Result<Duration> {
    if !(seconds > 0.0) {
        bail!("--seconds must be a positive number, got {}", seconds);
    }
    Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("--seconds {} is out of range", seconds))
}

/// Captures audio for `length` and analyzes the take.
fn record(
    settings: &Settings,
    length: Duration,
    bpm: Option<f64>,
    analyzer: &MelodyAnalyzer,
) -> Result<(MelodyAnalysis, VocalCharacteristics)> {
    let buffer_size = settings.detector.buffer_size;
    let (frame_tx, frame_rx) = crossbeam_channel::bounded(FRAME_QUEUE);
    let (stream, sample_rate) =
        audio::start_audio_capture(frame_tx, buffer_size).context("starting audio capture")?;

    let mut tracker = PitchTracker::new(settings.tracker.clone(), settings.detector.clone());
    tracker
        .attach_source(ChannelSource::new(frame_rx, sample_rate, buffer_size))
        .context("configuring pitch detector")?;

    log::info!("[MAIN] Recording for {:.1}s, sing now", length.as_secs_f64());
    tracker.start();

    let deadline = Instant::now()
        .checked_add(length)
        .with_context(|| format!("recording length {:?} is too long", length))?;
    while Instant::now() < deadline {
        thread::sleep(PROGRESS_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
        if let Some(pitch) = tracker.current_pitch() {
            if pitch.is_voiced() {
                log::info!(
                    "[MAIN] {} {:+.0} cents ({:.1} Hz)",
                    pitch.note.as_deref().unwrap_or("?"),
                    pitch.cents,
                    pitch.frequency
                );
            }
        }
    }

    tracker.stop();
    if let Err(e) = stream.pause() {
        log::warn!("[MAIN] Failed to pause input stream: {}", e);
    }
    drop(stream);
    log::info!("[MAIN] Captured {} pitch points", tracker.history_len());

    let melody = tracker.analyze_current(analyzer, bpm);
    let vocals = tracker.vocal_characteristics(analyzer);
    Ok((melody, vocals))
}

fn print_vocals(vocals: &VocalCharacteristics) {
    println!("Vocal Characteristics");
    println!("=====================");
    println!("Average Frequency: {:.1} Hz", vocals.average_frequency);
    println!("Pitch Stability: {:.0}%", vocals.pitch_stability * 100.0);
    match (vocals.vibrato_rate, vocals.vibrato_depth) {
        (Some(rate), Some(depth)) => println!("Vibrato: {:.1} Hz, {:.0} cents", rate, depth),
        _ => println!("Vibrato: none detected"),
    }
    println!("Dynamic Range: {:.1} dB", vocals.dynamic_range);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let args = Args::parse_from(["melody-cli"]);
        assert_eq!(args.seconds, 5.0);
        assert!(args.bpm.is_none());
        assert!(!args.quantize);
        assert!(!args.json);
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([
            "melody-cli", "--seconds", "3", "--bpm", "96", "--quantize", "--json", "-c",
            "settings.json",
        ]);
        assert_eq!(args.seconds, 3.0);
        assert_eq!(args.bpm, Some(96.0));
        assert!(args.quantize && args.json);
        assert_eq!(args.config, Some(PathBuf::from("settings.json")));
    }

    #[test]
    fn test_recording_length() {
        assert_eq!(recording_length(2.5).unwrap(), Duration::from_millis(2500));
        assert!(recording_length(0.0).is_err());
        assert!(recording_length(-1.0).is_err());
        assert!(recording_length(f64::NAN).is_err());
        assert!(recording_length(f64::INFINITY).is_err());
        assert!(recording_length(1e30).is_err());
    }
}
