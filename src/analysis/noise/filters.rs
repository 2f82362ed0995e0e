// Smoothing filters - Wiener, median and band-pass
//
// Window-based filters replicate the edge samples so the output has the same
// length as the input and no zero bias creeps in at the frame boundaries.

use crate::analysis::features::FftProcessor;
use crate::error::AnalysisError;

/// Sample at `index` with the first/last sample repeated past the ends
#[inline]
fn replicated(frame: &[f32], index: isize) -> f32 {
    let last = frame.len() as isize - 1;
    frame[index.clamp(0, last) as usize]
}

fn check_window(frame: &[f32], window: usize, name: &str) -> Result<(), AnalysisError> {
    if window == 0 || window % 2 == 0 {
        return Err(AnalysisError::invalid_config(format!(
            "{} window must be odd (got {})",
            name, window
        )));
    }
    if frame.len() < window {
        return Err(AnalysisError::InsufficientSamples {
            required: window,
            available: frame.len(),
        });
    }
    Ok(())
}

/// Local mean and variance over a centered odd window
fn local_statistics(frame: &[f32], window: usize) -> Vec<(f32, f32)> {
    let half = (window / 2) as isize;
    (0..frame.len() as isize)
        .map(|center| {
            let values = (center - half..=center + half).map(|i| replicated(frame, i));
            let (sum, sum_sq) = values.fold((0.0f32, 0.0f32), |(s, sq), x| (s + x, sq + x * x));
            let mean = sum / window as f32;
            let variance = (sum_sq / window as f32 - mean * mean).max(0.0);
            (mean, variance)
        })
        .collect()
}

/// Adaptive (local-statistics) Wiener filter
///
/// Formula: y = μ + max(σ² - ν, 0) / σ² × (x - μ)
///
/// # Arguments
/// * `frame` - Input samples
/// * `window` - Odd local window length
/// * `noise_power` - ν; `None` uses the mean local variance of the frame
///
/// # Errors
/// `InvalidConfiguration` for an even window, `InsufficientSamples` when the
/// frame is shorter than the window
pub fn wiener_filter(
    frame: &[f32],
    window: usize,
    noise_power: Option<f32>,
) -> Result<Vec<f32>, AnalysisError> {
    check_window(frame, window, "Wiener")?;

    let stats = local_statistics(frame, window);
    let noise_power = match noise_power {
        Some(power) if power.is_finite() && power >= 0.0 => power,
        _ => stats.iter().map(|&(_, v)| v).sum::<f32>() / stats.len() as f32,
    };

    Ok(frame
        .iter()
        .zip(&stats)
        .map(|(&x, &(mean, variance))| {
            if variance <= 0.0 {
                mean
            } else {
                mean + (variance - noise_power).max(0.0) / variance * (x - mean)
            }
        })
        .collect())
}

/// Sliding median with edge replication
///
/// # Errors
/// `InvalidConfiguration` for an even window, `InsufficientSamples` when the
/// frame is shorter than the window
pub fn median_filter(frame: &[f32], window: usize) -> Result<Vec<f32>, AnalysisError> {
    check_window(frame, window, "median")?;

    let half = (window / 2) as isize;
    let mut scratch = vec![0.0f32; window];
    Ok((0..frame.len() as isize)
        .map(|center| {
            for (slot, i) in scratch.iter_mut().zip(center - half..=center + half) {
                *slot = replicated(frame, i);
            }
            let (_, median, _) = scratch.select_nth_unstable_by(window / 2, f32::total_cmp);
            *median
        })
        .collect())
}

/// Frequency-domain band-pass: zero every bin outside `[low_hz, high_hz]`
///
/// `high_hz` is clamped to Nyquist. Works on any frame length.
///
/// # Errors
/// `InvalidConfiguration` if the band is empty, inverted or not finite
pub fn bandpass_filter(
    fft: &FftProcessor,
    frame: &[f32],
    sample_rate: u32,
    low_hz: f32,
    high_hz: f32,
) -> Result<Vec<f32>, AnalysisError> {
    let nyquist = sample_rate as f32 / 2.0;
    if sample_rate == 0
        || !low_hz.is_finite()
        || !high_hz.is_finite()
        || low_hz < 0.0
        || low_hz >= high_hz
        || low_hz >= nyquist
    {
        return Err(AnalysisError::invalid_config(format!(
            "band-pass [{}, {}] Hz invalid at {} Hz",
            low_hz, high_hz, sample_rate
        )));
    }
    if frame.is_empty() {
        return Ok(Vec::new());
    }

    let high_hz = high_hz.min(nyquist);
    let mut bins = fft.forward(frame);
    let n = bins.len();
    let bin_hz = sample_rate as f32 / n as f32;
    for (k, bin) in bins.iter_mut().enumerate() {
        // Mirror bins above N/2 share the frequency of bin N-k
        let frequency = k.min(n - k) as f32 * bin_hz;
        if frequency < low_hz || frequency > high_hz {
            *bin = Default::default();
        }
    }
    Ok(fft.inverse(bins))
}
