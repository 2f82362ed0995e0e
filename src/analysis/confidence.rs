// Confidence module - heuristic quality score for a feature vector
//
// confidence = min(variance(MFCC) × min(energy × 2, 1), 1)
//
// Spectrally varied, reasonably loud windows score high. This is a heuristic
// and not a calibrated probability. It never fails: non-finite MFCC values
// are skipped and bad energy counts as zero.

/// Population variance of the finite values, 0.0 when fewer than two remain
pub fn mfcc_variance(mfcc: &[f32]) -> f32 {
    let finite: Vec<f32> = mfcc.iter().copied().filter(|c| c.is_finite()).collect();
    if finite.len() < 2 {
        return 0.0;
    }
    let n = finite.len() as f32;
    let mean = finite.iter().sum::<f32>() / n;
    let variance = finite.iter().map(|&c| (c - mean) * (c - mean)).sum::<f32>() / n;
    if variance.is_finite() {
        variance
    } else {
        f32::MAX
    }
}

/// Combine MFCC variance and energy into a score in [0, 1]
///
/// # Arguments
/// * `mfcc` - Cepstral coefficients
/// * `energy` - Mean signal power; negative or non-finite values count as 0
pub fn compute_confidence(mfcc: &[f32], energy: f32) -> f32 {
    let energy = if energy.is_finite() { energy.max(0.0) } else { 0.0 };
    let energy_term = (energy * 2.0).min(1.0);
    let score = (mfcc_variance(mfcc) * energy_term).min(1.0);
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
