// Spectral subtraction - magnitude-domain removal of stationary noise
//
// Each bin keeps max(|S| - alpha·|N|, beta·|S|): alpha over-subtracts to
// suppress residual noise, beta leaves a small spectral floor so isolated
// surviving bins do not turn into musical noise. Output is never negative.

use rustfft::num_complex::Complex;

/// Subtract one noise magnitude from one signal magnitude
///
/// Negative or non-finite inputs are treated as 0.
#[inline]
pub fn subtract_magnitude(signal: f32, noise: f32, alpha: f32, beta: f32) -> f32 {
    let signal = if signal.is_finite() { signal.max(0.0) } else { 0.0 };
    let noise = if noise.is_finite() { noise.max(0.0) } else { 0.0 };
    let cleaned = (signal - alpha * noise).max(beta * signal).max(0.0);
    if cleaned.is_finite() {
        cleaned
    } else {
        0.0
    }
}

/// Subtract a noise magnitude spectrum bin by bin
///
/// Bins missing from `noise` count as noise-free.
pub fn subtract_spectrum(signal: &[f32], noise: &[f32], alpha: f32, beta: f32) -> Vec<f32> {
    signal
        .iter()
        .enumerate()
        .map(|(i, &s)| subtract_magnitude(s, noise.get(i).copied().unwrap_or(0.0), alpha, beta))
        .collect()
}

/// Apply subtraction to a full complex spectrum, keeping each bin's phase
///
/// `noise` holds magnitudes for bins 0..=N/2; bin k and its mirror N-k share
/// one noise value so the inverse transform stays real.
pub fn subtract_complex(bins: &mut [Complex<f32>], noise: &[f32], alpha: f32, beta: f32) {
    let n = bins.len();
    for (k, bin) in bins.iter_mut().enumerate() {
        let magnitude = bin.norm();
        if magnitude <= 0.0 {
            continue;
        }
        let noise_magnitude = noise.get(k.min(n - k)).copied().unwrap_or(0.0);
        let cleaned = subtract_magnitude(magnitude, noise_magnitude, alpha, beta);
        *bin *= cleaned / magnitude;
    }
}
