// Temporal module - Time-domain feature extraction
//
// This module computes features directly from the (noise-suppressed, not
// windowed) time-domain frame: level, energy, zero-crossing rate and the
// share of samples pinned at full scale.
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

/// Temporal feature computation functions
pub struct TemporalFeatures;

impl TemporalFeatures {
    /// Compute mean signal power
    ///
    /// Formula: energy = (1 / N) × Σ x[n]²
    pub fn compute_energy(audio: &[f32]) -> f32 {
        if audio.is_empty() {
            return 0.0;
        }
        audio.iter().map(|&x| x * x).sum::<f32>() / audio.len() as f32
    }

    /// Compute root-mean-square level
    ///
    /// Formula: RMS = sqrt(energy)
    pub fn compute_rms(audio: &[f32]) -> f32 {
        Self::compute_energy(audio).sqrt()
    }

    /// Compute zero-crossing rate (ZCR)
    ///
    /// ZCR is the fraction of adjacent sample pairs whose signs differ.
    /// High ZCR indicates high-frequency or noise-like content.
    ///
    /// # Returns
    /// Zero-crossing rate (0.0 to 1.0)
    pub fn compute_zcr(audio: &[f32]) -> f32 {
        if audio.len() < 2 {
            return 0.0;
        }

        let crossings = audio
            .windows(2)
            .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
            .count();

        crossings as f32 / (audio.len() - 1) as f32
    }

    /// Fraction of samples whose magnitude reaches `clip_level`
    pub fn compute_clipped_fraction(audio: &[f32], clip_level: f32) -> f32 {
        if audio.is_empty() {
            return 0.0;
        }
        let clipped = audio.iter().filter(|&&x| x.abs() >= clip_level).count();
        clipped as f32 / audio.len() as f32
    }
}
