// Formants module - vocal tract resonances via linear prediction
//
// Pipeline per frame:
// 1. Pre-emphasis (first-order high-pass) and Hamming window
// 2. Autocorrelation and Levinson-Durbin recursion for the LPC coefficients
// 3. Durand-Kerner iteration for the roots of the prediction polynomial
// 4. Roots in the upper half plane become candidate resonances; narrow ones
//    above the lowest plausible formant are kept, sorted by frequency

use rustfft::num_complex::Complex;

use crate::audio::WindowFunction;

const PRE_EMPHASIS: f64 = 0.97;
/// Resonances wider than this are treated as spectral tilt, not formants
const MAX_BANDWIDTH_HZ: f64 = 400.0;
/// Lowest frequency accepted as a formant
const MIN_FORMANT_HZ: f64 = 90.0;
const MAX_ROOT_ITERATIONS: usize = 500;
const ROOT_TOLERANCE: f64 = 1e-10;

/// One resonance of the LPC model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resonance {
    pub frequency_hz: f32,
    pub bandwidth_hz: f32,
}

/// LPC-based formant estimator
pub struct FormantEstimator {
    sample_rate: u32,
    order: usize,
}

impl FormantEstimator {
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `order` - Linear prediction order (≈ 2 + sample_rate / 1 kHz is typical)
    pub fn new(sample_rate: u32, order: usize) -> Self {
        Self { sample_rate, order }
    }

    /// Linear prediction coefficients `a` such that x[n] ≈ Σ a[j]·x[n-1-j]
    ///
    /// Returns all zeros for silent or too-short frames.
    pub fn lpc_coefficients(&self, frame: &[f32]) -> Vec<f64> {
        if frame.len() <= self.order {
            return vec![0.0; self.order];
        }

        let mut emphasized: Vec<f32> = Vec::with_capacity(frame.len());
        emphasized.push(frame[0]);
        emphasized.extend(
            frame
                .windows(2)
                .map(|pair| pair[1] - PRE_EMPHASIS as f32 * pair[0]),
        );
        WindowFunction::Hamming.apply(&mut emphasized);

        let acf: Vec<f64> = (0..=self.order)
            .map(|lag| {
                emphasized
                    .iter()
                    .zip(&emphasized[lag..])
                    .map(|(&a, &b)| a as f64 * b as f64)
                    .sum()
            })
            .collect();

        levinson_durbin(&acf, self.order)
    }

    /// Every narrow resonance of the LPC model, sorted by frequency
    pub fn resonances(&self, frame: &[f32]) -> Vec<Resonance> {
        let lpc = self.lpc_coefficients(frame);
        if lpc.iter().all(|&a| a == 0.0) {
            return Vec::new();
        }

        // Monic polynomial z^p - a0·z^(p-1) - ... - a(p-1)
        let mut polynomial = Vec::with_capacity(lpc.len() + 1);
        polynomial.push(1.0);
        polynomial.extend(lpc.iter().map(|&a| -a));

        let sr = self.sample_rate as f64;
        let nyquist = sr / 2.0;
        let mut resonances: Vec<Resonance> = polynomial_roots(&polynomial)
            .into_iter()
            .filter(|root| root.im > 0.0)
            .filter_map(|root| {
                let frequency = root.arg() * sr / (2.0 * std::f64::consts::PI);
                let bandwidth = -(sr / std::f64::consts::PI) * root.norm().ln();
                let plausible = frequency > MIN_FORMANT_HZ
                    && frequency < nyquist
                    && bandwidth.is_finite()
                    && bandwidth < MAX_BANDWIDTH_HZ;
                plausible.then_some(Resonance {
                    frequency_hz: frequency as f32,
                    bandwidth_hz: bandwidth as f32,
                })
            })
            .collect();

        resonances.sort_by(|a, b| a.frequency_hz.total_cmp(&b.frequency_hz));
        resonances
    }

    /// The lowest `count` formant frequencies, zero-padded when fewer are found
    pub fn estimate(&self, frame: &[f32], count: usize) -> Vec<f32> {
        let mut formants: Vec<f32> = self
            .resonances(frame)
            .iter()
            .take(count)
            .map(|r| r.frequency_hz)
            .collect();
        formants.resize(count, 0.0);
        formants
    }
}

/// Levinson-Durbin recursion on an autocorrelation sequence
///
/// # Arguments
/// * `acf` - Autocorrelation values for lags 0..=order
/// * `order` - Prediction order
fn levinson_durbin(acf: &[f64], order: usize) -> Vec<f64> {
    let mut coeffs = vec![0.0_f64; order];
    let mut err = acf[0];
    if err.abs() < 1e-30 {
        return coeffs;
    }

    for i in 0..order {
        let mut reflection: f64 = (0..i).map(|j| coeffs[j] * acf[i - j]).sum();
        reflection = (acf[i + 1] - reflection) / err;

        let previous = coeffs.clone();
        coeffs[i] = reflection;
        for j in 0..i {
            coeffs[j] = previous[j] - reflection * previous[i - 1 - j];
        }

        err *= 1.0 - reflection * reflection;
        if err.abs() < 1e-30 {
            break;
        }
    }

    coeffs
}

/// Roots of a monic polynomial (highest power first) by Durand-Kerner iteration
fn polynomial_roots(coefficients: &[f64]) -> Vec<Complex<f64>> {
    let degree = coefficients.len().saturating_sub(1);
    if degree == 0 {
        return Vec::new();
    }

    let evaluate = |z: Complex<f64>| {
        coefficients
            .iter()
            .fold(Complex::new(0.0, 0.0), |acc, &c| acc * z + c)
    };

    // Distinct, non-real starting points
    let seed = Complex::new(0.4, 0.9);
    let mut roots: Vec<Complex<f64>> = (0..degree).map(|i| seed.powu(i as u32)).collect();

    for _ in 0..MAX_ROOT_ITERATIONS {
        let mut max_step = 0.0f64;
        for i in 0..degree {
            let denominator = (0..degree)
                .filter(|&j| j != i)
                .fold(Complex::new(1.0, 0.0), |acc, j| acc * (roots[i] - roots[j]));
            if denominator.norm() < 1e-300 {
                continue;
            }
            let step = evaluate(roots[i]) / denominator;
            roots[i] -= step;
            max_step = max_step.max(step.norm());
        }
        if max_step < ROOT_TOLERANCE {
            break;
        }
    }

    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    /// White noise through a cascade of two-pole resonators
    fn synthetic_vowel(sample_rate: u32, resonances: &[(f64, f64)], len: usize) -> Vec<f32> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut signal: Vec<f64> = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let sr = sample_rate as f64;

        for &(frequency, bandwidth) in resonances {
            let r = (-std::f64::consts::PI * bandwidth / sr).exp();
            let theta = 2.0 * std::f64::consts::PI * frequency / sr;
            let (a1, a2) = (2.0 * r * theta.cos(), -r * r);
            let mut out = vec![0.0f64; len];
            for n in 0..len {
                let y1 = if n >= 1 { out[n - 1] } else { 0.0 };
                let y2 = if n >= 2 { out[n - 2] } else { 0.0 };
                out[n] = signal[n] + a1 * y1 + a2 * y2;
            }
            signal = out;
        }

        let peak = signal.iter().fold(0.0f64, |m, &x| m.max(x.abs()));
        signal.iter().map(|&x| (0.8 * x / peak) as f32).collect()
    }

    #[test]
    fn test_levinson_durbin_recovers_ar2() {
        // x[n] = 0.5·x[n-1] has acf 1, 0.5, 0.25
        let coeffs = levinson_durbin(&[1.0, 0.5, 0.25], 2);
        assert!((coeffs[0] - 0.5).abs() < 1e-12);
        assert!(coeffs[1].abs() < 1e-12);
    }

    #[test]
    fn test_polynomial_roots_quadratic() {
        // z² - 3z + 2 = (z - 1)(z - 2)
        let mut roots: Vec<f64> = polynomial_roots(&[1.0, -3.0, 2.0])
            .iter()
            .map(|z| z.re)
            .collect();
        roots.sort_by(f64::total_cmp);
        assert!((roots[0] - 1.0).abs() < 1e-8);
        assert!((roots[1] - 2.0).abs() < 1e-8);
    }

    #[test]
    fn test_resonances_found_near_synthetic_formants() {
        let sample_rate = 16000;
        let signal = synthetic_vowel(sample_rate, &[(700.0, 60.0), (1800.0, 80.0)], 2048);
        let estimator = FormantEstimator::new(sample_rate, 12);
        let resonances = estimator.resonances(&signal);
        println!("resonances: {:?}", resonances);

        for target in [700.0f32, 1800.0] {
            assert!(
                resonances
                    .iter()
                    .any(|r| (r.frequency_hz - target).abs() < target * 0.1),
                "no resonance near {} Hz in {:?}",
                target,
                resonances
            );
        }
        assert!(resonances
            .windows(2)
            .all(|w| w[0].frequency_hz <= w[1].frequency_hz));
    }

    #[test]
    fn test_estimate_pads_to_requested_count() {
        let estimator = FormantEstimator::new(16000, 12);
        assert_eq!(estimator.estimate(&[0.0; 2048], 3), vec![0.0; 3]);

        let signal = synthetic_vowel(16000, &[(700.0, 60.0)], 2048);
        let formants = estimator.estimate(&signal, 3);
        assert_eq!(formants.len(), 3);
        assert!(formants.iter().all(|&f| f == 0.0 || f > 90.0));
    }
}
