// Types module - Data structures for cry features
//
// This module defines the feature vector handed to the downstream
// classifier. Its shape is fixed by configuration: the MFCC, formant and
// harmonic arrays always have their configured lengths, silent frames included.

use serde::{Deserialize, Serialize};

use crate::error::DegenerateKind;

/// Features extracted from one frame or one analysis window
///
/// Produced once and never mutated afterwards; consumers get it by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Root-mean-square level of the suppressed signal
    pub rms: f32,

    /// Fraction of adjacent sample pairs with opposite sign (0.0 to 1.0)
    pub zero_crossing_rate: f32,

    /// Mean signal power, mean(x²)
    ///
    /// Equal to rms² but kept separate; the classifier input has both.
    pub energy: f32,

    /// Magnitude-weighted mean frequency in Hz
    pub spectral_centroid: f32,

    /// Magnitude-weighted standard deviation around the centroid in Hz
    pub spectral_spread: f32,

    /// Geometric / arithmetic mean of magnitudes (0 = tonal, 1 = noise-like)
    pub spectral_flatness: f32,

    /// Frequency below which the configured energy fraction lies, in Hz
    pub spectral_rolloff: f32,

    /// Mel-frequency cepstral coefficients
    pub mfcc: Vec<f32>,

    /// Fundamental frequency in Hz, 0.0 when unvoiced or silent
    pub fundamental_frequency: f32,

    /// Lowest formant frequencies in Hz, zero-padded
    pub formants: Vec<f32>,

    /// Spectral magnitudes at integer multiples of the fundamental
    pub harmonics: Vec<f32>,

    /// Energy at harmonic bins / total spectral energy (0.0 to 1.0)
    pub harmonic_ratio: f32,

    /// Heuristic score in [0, 1]; not a calibrated probability
    pub confidence: f32,

    /// Number of frames summarized (1 for per-frame vectors)
    pub frame_count: usize,

    /// Set when the input was silent or clipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degenerate: Option<DegenerateKind>,
}

impl FeatureVector {
    /// Zero-valued vector for silent input
    ///
    /// # Arguments
    /// * `num_mfcc` / `num_formants` / `num_harmonics` - Array lengths to keep the shape fixed
    pub fn silent(num_mfcc: usize, num_formants: usize, num_harmonics: usize) -> Self {
        Self {
            rms: 0.0,
            zero_crossing_rate: 0.0,
            energy: 0.0,
            spectral_centroid: 0.0,
            spectral_spread: 0.0,
            spectral_flatness: 0.0,
            spectral_rolloff: 0.0,
            mfcc: vec![0.0; num_mfcc],
            fundamental_frequency: 0.0,
            formants: vec![0.0; num_formants],
            harmonics: vec![0.0; num_harmonics],
            harmonic_ratio: 0.0,
            confidence: 0.0,
            frame_count: 1,
            degenerate: Some(DegenerateKind::Silent),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.degenerate == Some(DegenerateKind::Silent)
    }

    /// A fundamental frequency was found
    pub fn is_voiced(&self) -> bool {
        self.fundamental_frequency > 0.0
    }
}
