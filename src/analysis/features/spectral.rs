// Spectral module - Frequency-domain feature extraction
//
// This module computes spectral shape features from magnitude spectra.
// All results are in Hz except flatness, which is a unitless ratio.
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

use super::fft::Spectrum;

/// Magnitudes at or below this are treated as empty bins
const MAGNITUDE_EPSILON: f32 = 1e-10;

/// Spectral feature computation functions
pub struct SpectralFeatures {
    rolloff_fraction: f32,
}

impl SpectralFeatures {
    /// Create a new spectral features processor
    ///
    /// # Arguments
    /// * `rolloff_fraction` - Energy fraction defining the rolloff point (e.g. 0.85)
    pub fn new(rolloff_fraction: f32) -> Self {
        Self { rolloff_fraction }
    }

    /// Compute spectral centroid (weighted mean frequency)
    ///
    /// Formula: centroid = Σ(f_i × |X[i]|) / Σ|X[i]|
    ///
    /// # Returns
    /// Spectral centroid in Hz, 0.0 for an empty spectrum
    pub fn compute_centroid(&self, spectrum: &Spectrum) -> f32 {
        let magnitude_sum: f32 = spectrum.magnitudes().iter().sum();
        if magnitude_sum <= MAGNITUDE_EPSILON {
            return 0.0;
        }

        let weighted_sum: f32 = spectrum
            .magnitudes()
            .iter()
            .enumerate()
            .map(|(i, &mag)| spectrum.frequency_of(i) * mag)
            .sum();

        weighted_sum / magnitude_sum
    }

    /// Compute spectral spread around a given centroid
    ///
    /// Formula: spread = sqrt(Σ((f_i - centroid)² × |X[i]|) / Σ|X[i]|)
    ///
    /// # Returns
    /// Standard deviation of frequency in Hz
    pub fn compute_spread(&self, spectrum: &Spectrum, centroid: f32) -> f32 {
        let magnitude_sum: f32 = spectrum.magnitudes().iter().sum();
        if magnitude_sum <= MAGNITUDE_EPSILON {
            return 0.0;
        }

        let variance: f32 = spectrum
            .magnitudes()
            .iter()
            .enumerate()
            .map(|(i, &mag)| {
                let deviation = spectrum.frequency_of(i) - centroid;
                deviation * deviation * mag
            })
            .sum::<f32>()
            / magnitude_sum;

        variance.max(0.0).sqrt()
    }

    /// Compute spectral flatness (tonality measure)
    ///
    /// Formula: flatness = geometric_mean(|X[i]|) / arithmetic_mean(|X[i]|)
    ///
    /// Returns value between 0 (tonal, e.g., sine wave) and 1 (noise-like).
    /// Empty bins are skipped so a single zero does not collapse the
    /// geometric mean.
    pub fn compute_flatness(&self, spectrum: &Spectrum) -> f32 {
        let non_zero: Vec<f32> = spectrum
            .magnitudes()
            .iter()
            .filter(|&&mag| mag > MAGNITUDE_EPSILON)
            .copied()
            .collect();

        if non_zero.is_empty() {
            return 0.0;
        }

        // Geometric mean: exp(mean(log(x)))
        let log_sum: f32 = non_zero.iter().map(|&mag| mag.ln()).sum();
        let geometric_mean = (log_sum / non_zero.len() as f32).exp();
        let arithmetic_mean: f32 = non_zero.iter().sum::<f32>() / non_zero.len() as f32;

        if arithmetic_mean > MAGNITUDE_EPSILON {
            (geometric_mean / arithmetic_mean).min(1.0)
        } else {
            0.0
        }
    }

    /// Compute spectral rolloff
    ///
    /// Finds the frequency below which `rolloff_fraction` of the spectral
    /// energy (squared magnitude) is contained.
    ///
    /// # Returns
    /// Rolloff frequency in Hz
    pub fn compute_rolloff(&self, spectrum: &Spectrum) -> f32 {
        let magnitudes = spectrum.magnitudes();
        let total_energy: f32 = magnitudes.iter().map(|&mag| mag * mag).sum();

        if total_energy < MAGNITUDE_EPSILON {
            return 0.0;
        }

        let threshold = self.rolloff_fraction * total_energy;
        let mut cumulative_energy = 0.0;
        for (i, &mag) in magnitudes.iter().enumerate() {
            cumulative_energy += mag * mag;
            if cumulative_energy >= threshold {
                return spectrum.frequency_of(i);
            }
        }

        // Rounding can leave the sum a hair short of the threshold
        spectrum.frequency_of(magnitudes.len() - 1)
    }
}
