//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio Library).
//! Captured audio is cut into fixed-size mono frames and streamed over a
//! channel to the pitch tracker's [`ChannelSource`](crate::source::ChannelSource).
//!
//! ## Features
//! - Automatic input device selection
//! - f32 input at (or as close as possible to) 44.1 kHz
//! - Multi-channel input downmixed to mono
//! - Non-blocking frame delivery; frames are dropped when the channel is full

use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

use crate::error::{Error, Result};

/// Default number of samples per analysis frame (~46 ms at 44.1 kHz).
pub const BUFFER_SIZE: usize = 2048;

/// Preferred capture rate in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

fn audio_err(e: impl std::fmt::Display) -> Error {
    Error::Audio(e.to_string())
}

/// Starts audio capture from the default input device.
///
/// # Arguments
/// * `sender` - Channel for complete frames of `buffer_size` mono samples
/// * `buffer_size` - Samples per frame
///
/// # Returns
/// * `Ok((stream, sample_rate))` - The playing stream (capture stops when it
///   is dropped) and the actual sample rate
/// * `Err(e)` - No usable device or stream setup failed
pub fn start_audio_capture(
    sender: Sender<Vec<f32>>,
    buffer_size: usize,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("No input device available".into()))?;

    log::info!("[AUDIO] Using audio input device: {}", device.name().map_err(audio_err)?);

    let configs = device
        .supported_input_configs()
        .map_err(audio_err)?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| Error::Audio("No suitable f32 input format found".into()))?;

    let rate = TARGET_SAMPLE_RATE.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let sample_rate = config.sample_rate().0;
    let channels = config.channels().max(1) as usize;
    let config: cpal::StreamConfig = config.into();

    log::info!("[AUDIO] Selected sample rate: {} Hz, {} channel(s)", sample_rate, channels);

    let err_fn = |err| log::error!("[AUDIO] An error occurred on the audio stream: {}", err);

    // Accumulates mono samples from the callback.
    let mut audio_buffer: Vec<f32> = Vec::with_capacity(buffer_size * 2);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                audio_buffer.extend(
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                );

                while audio_buffer.len() >= buffer_size {
                    let frame_to_send = audio_buffer[..buffer_size].to_vec();
                    // Ignore a full or closed channel, the tracker only wants the latest frame
                    let _ = sender.try_send(frame_to_send);
                    audio_buffer.drain(..buffer_size);
                }
            },
            err_fn,
            None,
        )
        .map_err(audio_err)?;

    stream.play().map_err(audio_err)?;

    Ok((stream, sample_rate))
}

/// Picks the f32 configuration whose rate range is closest to `target_rate`,
/// preferring mono when several are equally close.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let (min, max) = (c.min_sample_rate().0, c.max_sample_rate().0);
            let distance = if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            };
            (distance, c.channels())
        })
}
