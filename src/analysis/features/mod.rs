// FeatureExtractor - DSP feature extraction for cry classification
//
// This module turns one noise-suppressed frame and its magnitude spectrum into
// a FeatureVector. Time-domain features come from the frame, frequency-domain
// features from the spectrum.
//
// Module organization:
// - types: FeatureVector
// - fft: FFT computation and the Spectrum type
// - spectral: centroid, spread, flatness, rolloff
// - temporal: RMS, energy, zero-crossing rate, clipping
// - mfcc: mel filterbank and cepstral coefficients
// - pitch: autocorrelation fundamental and harmonic profile
// - formants: LPC resonances
// - mod.rs: Coordinator (FeatureExtractor)
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

pub mod fft;
mod formants;
mod mfcc;
mod pitch;
mod spectral;
mod temporal;
mod types;

pub use fft::{FftProcessor, Spectrum};
pub use formants::{FormantEstimator, Resonance};
pub use mfcc::{hz_to_mel, mel_to_hz, MelFilterbank};
pub use pitch::{harmonic_profile, PitchEstimator};
pub use spectral::SpectralFeatures;
pub use temporal::TemporalFeatures;
pub use types::FeatureVector;

use crate::analysis::confidence::compute_confidence;
use crate::config::{FeatureConfig, PipelineConfig};
use crate::error::{AnalysisError, DegenerateKind};

/// FeatureExtractor coordinates the feature extraction pipeline
///
/// Filterbank weights and pitch lag bounds are computed once at construction,
/// so one extractor serves every frame of a session.
pub struct FeatureExtractor {
    config: FeatureConfig,
    num_mfcc: usize,
    spectral_features: SpectralFeatures,
    mel_filterbank: MelFilterbank,
    pitch_estimator: PitchEstimator,
    formant_estimator: FormantEstimator,
}

impl FeatureExtractor {
    /// Create a new FeatureExtractor
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `config` - Pipeline configuration (assumed validated)
    pub fn new(sample_rate: u32, config: &PipelineConfig) -> Self {
        let features = &config.features;
        Self {
            config: features.clone(),
            num_mfcc: config.num_mfcc_coefficients,
            spectral_features: SpectralFeatures::new(features.rolloff_fraction),
            mel_filterbank: MelFilterbank::new(
                sample_rate,
                config.window_size,
                features.mel_filters,
                features.mel_low_hz,
                features.mel_high_hz,
            ),
            pitch_estimator: PitchEstimator::new(
                sample_rate,
                config.min_cry_frequency_hz,
                config.max_cry_frequency_hz,
                features.pitch_threshold,
            ),
            formant_estimator: FormantEstimator::new(sample_rate, features.lpc_order),
        }
    }

    /// Shape-preserving vector for silent input
    pub fn silent_vector(&self) -> FeatureVector {
        FeatureVector::silent(
            self.num_mfcc,
            self.config.num_formants,
            self.config.num_harmonics,
        )
    }

    /// Extract all features from a frame
    ///
    /// # Arguments
    /// * `frame` - Noise-suppressed, un-windowed frame
    /// * `spectrum` - Magnitude spectrum of the windowed frame
    ///
    /// # Returns
    /// FeatureVector; silent frames yield `FeatureVector::silent` and clipped
    /// frames carry `degenerate = Clipped` with zero confidence
    ///
    /// # Errors
    /// `InvalidFrameLength` if the spectrum was not computed at the configured window size
    pub fn extract(&self, frame: &[f32], spectrum: &Spectrum) -> Result<FeatureVector, AnalysisError> {
        if spectrum.fft_size() != self.mel_filterbank.fft_size() {
            return Err(AnalysisError::InvalidFrameLength {
                length: spectrum.fft_size(),
            });
        }

        let fundamental = match self.pitch_estimator.estimate(frame) {
            Ok(f0) => f0,
            Err(AnalysisError::DegenerateSignal {
                kind: DegenerateKind::Silent,
            }) => {
                log::trace!("[FeatureExtractor] Silent frame, returning zero features");
                return Ok(self.silent_vector());
            }
            Err(err) => return Err(err),
        };

        // Time-domain features
        let energy = TemporalFeatures::compute_energy(frame);
        let rms = energy.sqrt();
        let zero_crossing_rate = TemporalFeatures::compute_zcr(frame);

        // Frequency-domain features
        let spectral_centroid = self.spectral_features.compute_centroid(spectrum);
        let spectral_spread = self
            .spectral_features
            .compute_spread(spectrum, spectral_centroid);
        let spectral_flatness = self.spectral_features.compute_flatness(spectrum);
        let spectral_rolloff = self.spectral_features.compute_rolloff(spectrum);
        let mfcc = self.mel_filterbank.compute(spectrum, self.num_mfcc);

        // Cry-specific features
        let fundamental_frequency = fundamental.unwrap_or(0.0);
        let (harmonics, harmonic_ratio) =
            harmonic_profile(spectrum, fundamental_frequency, self.config.num_harmonics);
        let formants = self
            .formant_estimator
            .estimate(frame, self.config.num_formants);

        let clipped = TemporalFeatures::compute_clipped_fraction(frame, self.config.clip_level)
            >= self.config.clip_fraction;
        let (confidence, degenerate) = if clipped {
            (0.0, Some(DegenerateKind::Clipped))
        } else {
            (compute_confidence(&mfcc, energy), None)
        };

        Ok(FeatureVector {
            rms,
            zero_crossing_rate,
            energy,
            spectral_centroid,
            spectral_spread,
            spectral_flatness,
            spectral_rolloff,
            mfcc,
            fundamental_frequency,
            formants,
            harmonics,
            harmonic_ratio,
            confidence,
            frame_count: 1,
            degenerate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::WindowFunction;

    const SAMPLE_RATE: u32 = 16000;
    const WINDOW: usize = 2048;

    /// Generate pure sine wave for testing
    fn generate_sine_wave(frequency: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect()
    }

    /// Generate white noise for testing
    fn generate_white_noise(len: usize) -> Vec<f32> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..len).map(|_| rng.gen_range(-0.5..0.5)).collect()
    }

    fn extract(frame: &[f32]) -> FeatureVector {
        let extractor = FeatureExtractor::new(SAMPLE_RATE, &PipelineConfig::default());
        let processor = FftProcessor::new(SAMPLE_RATE);
        let mut windowed = frame.to_vec();
        WindowFunction::Hann.apply(&mut windowed);
        let spectrum = processor.magnitude_spectrum(&windowed).unwrap();
        extractor.extract(frame, &spectrum).unwrap()
    }

    #[test]
    fn test_sine_features() {
        let features = extract(&generate_sine_wave(400.0, 0.5, WINDOW));
        println!("400 Hz sine features: {:?}", features);

        assert!((features.rms - 0.354).abs() < 0.01);
        assert!((features.energy - features.rms * features.rms).abs() < 1e-5);
        assert!((features.fundamental_frequency - 400.0).abs() < 20.0);
        assert!((features.spectral_centroid - 400.0).abs() < 50.0);
        assert_eq!(features.mfcc.len(), 13);
        assert_eq!(features.formants.len(), 3);
        assert_eq!(features.harmonics.len(), 8);
        assert!(features.harmonic_ratio > 0.8);
        assert!((0.0..=1.0).contains(&features.confidence));
        assert_eq!(features.degenerate, None);
    }

    #[test]
    fn test_zcr_sine_vs_noise() {
        let sine = extract(&generate_sine_wave(300.0, 0.5, WINDOW));
        let noise = extract(&generate_white_noise(WINDOW));
        println!("Sine ZCR: {}, noise ZCR: {}", sine.zero_crossing_rate, noise.zero_crossing_rate);

        assert!(noise.zero_crossing_rate > 0.3);
        assert!(sine.zero_crossing_rate < 0.1);
    }

    #[test]
    fn test_flatness_sine_vs_noise() {
        let sine = extract(&generate_sine_wave(1000.0, 0.5, WINDOW));
        let noise = extract(&generate_white_noise(WINDOW));
        println!("Sine flatness: {}, noise flatness: {}", sine.spectral_flatness, noise.spectral_flatness);

        assert!(sine.spectral_flatness < 0.2);
        assert!(noise.spectral_flatness > 0.5);
    }

    #[test]
    fn test_silent_frame_returns_zero_vector() {
        let features = extract(&[0.0; WINDOW]);
        assert!(features.is_silent());
        assert_eq!(features.rms, 0.0);
        assert_eq!(features.confidence, 0.0);
        assert_eq!(features.mfcc, vec![0.0; 13]);
    }

    #[test]
    fn test_clipped_frame_has_zero_confidence() {
        let clipped: Vec<f32> = generate_sine_wave(400.0, 3.0, WINDOW)
            .into_iter()
            .map(|x| x.clamp(-1.0, 1.0))
            .collect();
        let features = extract(&clipped);

        assert_eq!(features.degenerate, Some(DegenerateKind::Clipped));
        assert_eq!(features.confidence, 0.0);
        assert!(features.rms > 0.5);
        assert!(features.fundamental_frequency > 0.0);
    }

    #[test]
    fn test_mismatched_spectrum_size_rejected() {
        let extractor = FeatureExtractor::new(SAMPLE_RATE, &PipelineConfig::default());
        let spectrum = Spectrum::new(vec![0.0; 512], SAMPLE_RATE, 1024);
        assert_eq!(
            extractor.extract(&[0.1; 1024], &spectrum),
            Err(AnalysisError::InvalidFrameLength { length: 1024 })
        );
    }
}
