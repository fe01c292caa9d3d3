//! # Fast Fourier Transform (FFT) Module
//!
//! Signal helpers for the pitch detector. The autocorrelation is computed in
//! the frequency domain (Wiener–Khinchin) so a 2048-sample frame costs a pair
//! of FFTs instead of a quadratic time-domain sum.
//!
//! ## Features
//! - DC offset removal
//! - RMS level measurement
//! - Linear (biased) autocorrelation normalized to the zero lag

use rustfft::{FftPlanner, num_complex::Complex};

/// Removes the DC offset from a signal by making its average value zero.
///
/// # Arguments
/// * `signal` - Audio signal to process (modified in-place)
pub fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 { return; }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Root mean square level of a signal. Empty signals have an RMS of zero.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Computes the linear autocorrelation of `signal`, normalized by the zero lag.
///
/// Output index `lag` holds `sum(x[i] * x[i + lag]) / sum(x[i]^2)` for
/// `lag in 0..signal.len()`, so every value lies in `[-1, 1]`. The signal is
/// zero-padded to at least twice its length before the transform to avoid
/// circular wrap-around. An all-zero signal yields all zeros.
pub fn autocorrelation(signal: &[f32]) -> Vec<f32> {
    let size = signal.len();
    if size == 0 {
        return Vec::new();
    }
    let padded_len = (2 * size).next_power_of_two();

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(padded_len);
    let inverse = planner.plan_fft_inverse(padded_len);

    let mut buffer: Vec<Complex<f32>> = signal
        .iter()
        .map(|&sample| Complex { re: sample, im: 0.0 })
        .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
        .take(padded_len)
        .collect();

    forward.process(&mut buffer);
    // Power spectrum
    for bin in buffer.iter_mut() {
        *bin = Complex { re: bin.norm_sqr(), im: 0.0 };
    }
    inverse.process(&mut buffer);

    let zero_lag = buffer[0].re;
    if zero_lag <= f32::EPSILON {
        return vec![0.0; size];
    }
    buffer
        .iter()
        .take(size)
        .map(|c| (c.re / zero_lag).clamp(-1.0, 1.0))
        .collect()
}
