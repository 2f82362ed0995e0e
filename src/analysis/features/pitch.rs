// Pitch module - fundamental frequency and harmonic structure
//
// The fundamental is found by normalized autocorrelation restricted to the
// lag range of the configured cry band. The first local peak that clears the
// voicing threshold wins, which keeps octave-low errors (peaks at 2× the
// period) out. Harmonic features are then read off the magnitude spectrum.

use super::fft::Spectrum;
use crate::error::{AnalysisError, DegenerateKind};

/// Shortest lag considered; lags 0 and 1 are always near 1.0
const MIN_LAG: usize = 2;

/// Autocorrelation pitch estimator for one frequency band
pub struct PitchEstimator {
    sample_rate: u32,
    min_lag: usize,
    max_lag: usize,
    threshold: f32,
}

impl PitchEstimator {
    /// Create an estimator searching `[min_hz, max_hz]`
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `min_hz` / `max_hz` - Fundamental search band
    /// * `threshold` - Minimum normalized autocorrelation of a voiced peak
    pub fn new(sample_rate: u32, min_hz: f32, max_hz: f32, threshold: f32) -> Self {
        let sr = sample_rate as f32;
        let min_lag = ((sr / max_hz).floor() as usize).max(MIN_LAG);
        let max_lag = ((sr / min_hz).ceil() as usize).max(min_lag);
        Self {
            sample_rate,
            min_lag,
            max_lag,
            threshold,
        }
    }

    /// Lag search range in samples (inclusive)
    pub fn lag_range(&self) -> (usize, usize) {
        (self.min_lag, self.max_lag)
    }

    /// Estimate the fundamental frequency of a frame
    ///
    /// # Returns
    /// * `Ok(Some(hz))` - Voiced frame
    /// * `Ok(None)` - No autocorrelation peak above the threshold (unvoiced)
    /// * `Err(AnalysisError::DegenerateSignal)` - Silent frame, pitch undefined
    pub fn estimate(&self, frame: &[f32]) -> Result<Option<f32>, AnalysisError> {
        let energy: f64 = frame.iter().map(|&x| (x as f64) * (x as f64)).sum();
        if energy <= 0.0 {
            return Err(AnalysisError::DegenerateSignal {
                kind: DegenerateKind::Silent,
            });
        }

        // Need one lag of headroom on each side for peak picking and refinement
        let first = self.min_lag - 1;
        let last = (self.max_lag + 1).min(frame.len().saturating_sub(1));
        if last <= self.min_lag {
            return Ok(None);
        }

        let acf: Vec<f32> = (first..=last)
            .map(|lag| normalized_autocorrelation(frame, lag))
            .collect();
        let at = |lag: usize| acf[lag - first];
        let search_end = self.max_lag.min(last - 1);

        let mut chosen = None;
        let mut best: Option<(usize, f32)> = None;
        for lag in self.min_lag..=search_end {
            let value = at(lag);
            if value < self.threshold {
                continue;
            }
            if value > at(lag - 1) && value >= at(lag + 1) {
                chosen = Some(lag);
                break;
            }
            if best.map_or(true, |(_, v)| value > v) {
                best = Some((lag, value));
            }
        }

        let lag = match chosen.or(best.map(|(lag, _)| lag)) {
            Some(lag) => lag,
            None => return Ok(None),
        };

        let refined = lag as f32 + parabolic_offset(at(lag - 1), at(lag), at(lag + 1));
        if refined <= 0.0 {
            return Ok(None);
        }
        Ok(Some(self.sample_rate as f32 / refined))
    }
}

/// Autocorrelation at `lag` normalized by the energy of both overlapping parts
fn normalized_autocorrelation(frame: &[f32], lag: usize) -> f32 {
    if lag >= frame.len() {
        return 0.0;
    }
    let (mut cross, mut head, mut tail) = (0.0f64, 0.0f64, 0.0f64);
    for (a, b) in frame.iter().zip(&frame[lag..]) {
        let (a, b) = (*a as f64, *b as f64);
        cross += a * b;
        head += a * a;
        tail += b * b;
    }
    let norm = (head * tail).sqrt();
    if norm > 0.0 {
        (cross / norm) as f32
    } else {
        0.0
    }
}

/// Vertex offset of the parabola through three equally spaced points
fn parabolic_offset(left: f32, center: f32, right: f32) -> f32 {
    let denom = left - 2.0 * center + right;
    if denom.abs() < 1e-12 {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-1.0, 1.0)
}

/// Harmonic magnitudes and harmonic-to-total energy ratio
///
/// # Arguments
/// * `spectrum` - Magnitude spectrum of the frame
/// * `fundamental_hz` - Estimated fundamental
/// * `num_harmonics` - Number of harmonic magnitudes to report (k = 1..=n)
///
/// # Returns
/// `(harmonics, ratio)`: the peak magnitude within ±1 bin of k·f0 (0 above
/// Nyquist), and the energy in ±1 bin around every harmonic below Nyquist
/// divided by total spectral energy
pub fn harmonic_profile(
    spectrum: &Spectrum,
    fundamental_hz: f32,
    num_harmonics: usize,
) -> (Vec<f32>, f32) {
    let magnitudes = spectrum.magnitudes();
    let mut harmonics = vec![0.0; num_harmonics];
    if !fundamental_hz.is_finite() || fundamental_hz <= 0.0 || magnitudes.is_empty() {
        return (harmonics, 0.0);
    }

    let neighborhood = |bin: usize| bin.saturating_sub(1)..=(bin + 1).min(magnitudes.len() - 1);

    for (k, slot) in harmonics.iter_mut().enumerate() {
        if let Some(bin) = spectrum.bin_of(fundamental_hz * (k + 1) as f32) {
            *slot = magnitudes[neighborhood(bin)]
                .iter()
                .copied()
                .fold(0.0, f32::max);
        }
    }

    let total_energy: f32 = magnitudes.iter().map(|&m| m * m).sum();
    if total_energy <= 0.0 {
        return (harmonics, 0.0);
    }

    // Mask avoids counting a bin twice when harmonics are closer than 3 bins
    let mut is_harmonic = vec![false; magnitudes.len()];
    let mut k = 1;
    while let Some(bin) = spectrum.bin_of(fundamental_hz * k as f32) {
        for b in neighborhood(bin) {
            is_harmonic[b] = true;
        }
        k += 1;
    }
    let harmonic_energy: f32 = magnitudes
        .iter()
        .zip(&is_harmonic)
        .filter(|&(_, &h)| h)
        .map(|(&m, _)| m * m)
        .sum();

    (harmonics, (harmonic_energy / total_energy).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::fft::FftProcessor;
    use crate::audio::WindowFunction;

    fn sine(sample_rate: u32, frequency: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_sine_pitch_within_five_percent() {
        for &sample_rate in &[8000u32, 16000, 44100] {
            let estimator = PitchEstimator::new(sample_rate, 250.0, 600.0, 0.3);
            for &frequency in &[250.0f32, 300.0, 400.0, 523.0, 600.0] {
                let window = if sample_rate > 16000 { 4096 } else { 2048 };
                let f0 = estimator
                    .estimate(&sine(sample_rate, frequency, window))
                    .unwrap()
                    .expect("sine should be voiced");
                let error = (f0 - frequency).abs() / frequency;
                assert!(
                    error < 0.05,
                    "sr {} f {}: estimated {} ({:.2}%)",
                    sample_rate,
                    frequency,
                    f0,
                    error * 100.0
                );
            }
        }
    }

    #[test]
    fn test_silence_is_degenerate() {
        let estimator = PitchEstimator::new(16000, 250.0, 600.0, 0.3);
        assert_eq!(
            estimator.estimate(&[0.0; 2048]),
            Err(AnalysisError::DegenerateSignal {
                kind: DegenerateKind::Silent
            })
        );
    }

    #[test]
    fn test_noise_is_mostly_unvoiced() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let noise: Vec<f32> = (0..2048).map(|_| rng.gen_range(-0.5..0.5)).collect();

        let estimator = PitchEstimator::new(16000, 250.0, 600.0, 0.3);
        assert_eq!(estimator.estimate(&noise).unwrap(), None);
    }

    #[test]
    fn test_lag_range_never_below_two() {
        let estimator = PitchEstimator::new(1000, 100.0, 900.0, 0.3);
        assert_eq!(estimator.lag_range().0, 2);
    }

    #[test]
    fn test_harmonic_profile_of_pure_tone() {
        let processor = FftProcessor::new(16000);
        let mut frame = sine(16000, 400.0, 2048);
        WindowFunction::Hann.apply(&mut frame);
        let spectrum = processor.magnitude_spectrum(&frame).unwrap();

        let (harmonics, ratio) = harmonic_profile(&spectrum, 400.0, 8);
        assert_eq!(harmonics.len(), 8);
        assert!(harmonics[0] > 100.0);
        assert!(harmonics[1] < harmonics[0] * 0.01);
        assert!(ratio > 0.8, "pure tone harmonic ratio {}", ratio);
    }

    #[test]
    fn test_harmonic_profile_without_fundamental() {
        let spectrum = Spectrum::new(vec![1.0; 1024], 16000, 2048);
        let (harmonics, ratio) = harmonic_profile(&spectrum, 0.0, 4);
        assert_eq!(harmonics, vec![0.0; 4]);
        assert_eq!(ratio, 0.0);
    }
}
