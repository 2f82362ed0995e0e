// NoiseSuppressor - noise estimation and suppression before feature extraction
//
// Stages run in a fixed order, each assuming the previous one already reduced
// its kind of noise:
//   adaptive gate → spectral subtraction → Wiener → median → band-pass
// The order is a convention; nothing checks it.
//
// Module organization:
// - profile: NoiseProfile and its shared, lock-protected handle
// - gate: block-RMS hysteresis gate
// - spectral_subtraction: magnitude subtraction with over-subtraction and floor
// - filters: Wiener, median and band-pass filters

mod filters;
mod gate;
mod profile;
mod spectral_subtraction;

pub use filters::{bandpass_filter, median_filter, wiener_filter};
pub use gate::AdaptiveGate;
pub use profile::{db_to_linear, linear_to_db, NoiseProfile, SharedNoiseProfile, MIN_DB};
pub use spectral_subtraction::{subtract_complex, subtract_magnitude, subtract_spectrum};

use std::sync::Arc;

use crate::analysis::features::{FftProcessor, Spectrum};
use crate::analysis::features::TemporalFeatures;
use crate::config::{NoiseSuppressionConfig, PipelineConfig};
use crate::error::AnalysisError;

/// Noise estimation and suppression for one monitoring session
pub struct NoiseSuppressor {
    config: NoiseSuppressionConfig,
    sample_rate: u32,
    /// Floor implied by the configured noise_floor_db
    prior_floor: f32,
    gate: AdaptiveGate,
    fft: Arc<FftProcessor>,
    profile: SharedNoiseProfile,
}

impl NoiseSuppressor {
    /// Create a suppressor with a fresh noise profile
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `config` - Pipeline configuration (assumed validated)
    /// * `fft` - FFT processor shared with feature extraction
    pub fn new(sample_rate: u32, config: &PipelineConfig, fft: Arc<FftProcessor>) -> Self {
        Self::with_profile(sample_rate, config, fft, SharedNoiseProfile::new())
    }

    /// Create a suppressor that reads and updates an existing profile
    pub fn with_profile(
        sample_rate: u32,
        config: &PipelineConfig,
        fft: Arc<FftProcessor>,
        profile: SharedNoiseProfile,
    ) -> Self {
        Self {
            config: config.noise.clone(),
            sample_rate,
            prior_floor: db_to_linear(config.noise_floor_db),
            gate: AdaptiveGate::new(&config.noise),
            fft,
            profile,
        }
    }

    pub fn profile(&self) -> &SharedNoiseProfile {
        &self.profile
    }

    /// Estimate the noise floor of a buffer and fold it into the profile
    ///
    /// The estimate is the `noise_percentile` value of the sorted absolute
    /// samples. A percentile rather than a mean keeps occasional loud
    /// transients from inflating the floor.
    ///
    /// Only low-energy buffers update the profile: the estimate must not
    /// exceed the gate close threshold of the current gate floor. A buffer
    /// that is loud throughout (a sustained cry) leaves the floor alone, so
    /// the floor can creep up with the background but never jump to the
    /// level of the signal.
    ///
    /// # Returns
    /// The raw estimate for this buffer (linear amplitude)
    ///
    /// # Errors
    /// `InsufficientSamples` for an empty buffer, `LockPoisoned` if the
    /// profile lock is poisoned
    pub fn estimate_noise_floor(&self, buffer: &[f32]) -> Result<f32, AnalysisError> {
        if buffer.is_empty() {
            return Err(AnalysisError::InsufficientSamples {
                required: 1,
                available: 0,
            });
        }

        let mut magnitudes: Vec<f32> = buffer
            .iter()
            .map(|x| if x.is_finite() { x.abs() } else { 0.0 })
            .collect();
        let rank = (self.config.noise_percentile * (magnitudes.len() - 1) as f32).round() as usize;
        let rank = rank.min(magnitudes.len() - 1);
        let (_, estimate, _) = magnitudes.select_nth_unstable_by(rank, f32::total_cmp);
        let estimate = *estimate;

        let smoothing = self.config.profile_smoothing;
        let prior = self.prior_floor;
        // Check and update under one write lock so concurrent analyses
        // judge against the floor they are about to change
        let (folded, floor) = self.profile.update(|profile| {
            let threshold = self.gate.close_threshold(profile.floor_linear().max(prior));
            if estimate <= threshold {
                (true, profile.update_floor(estimate, smoothing))
            } else {
                (false, profile.floor_linear())
            }
        })?;

        if folded {
            tracing::debug!(
                "[NoiseSuppressor] Noise floor estimate {:.6} ({:.1} dBFS), profile floor {:.6}",
                estimate,
                linear_to_db(estimate),
                floor
            );
        } else {
            tracing::debug!(
                "[NoiseSuppressor] Estimate {:.6} ({:.1} dBFS) above noise level, profile floor kept at {:.6}",
                estimate,
                linear_to_db(estimate),
                floor
            );
        }
        Ok(estimate)
    }

    /// Floor the gate works from: the profile floor, never below the configured prior
    pub fn gate_floor(&self) -> Result<f32, AnalysisError> {
        let floor = self.profile.read(|profile| profile.floor_linear())?;
        Ok(floor.max(self.prior_floor))
    }

    /// Attenuate blocks of `frame` whose envelope stays near the noise floor
    ///
    /// # Returns
    /// Number of attenuated blocks
    pub fn apply_adaptive_gate(&self, frame: &mut [f32], noise_floor: f32) -> usize {
        self.gate.apply(frame, noise_floor)
    }

    /// Subtract a noise magnitude spectrum from a signal spectrum
    ///
    /// Result magnitudes are never negative.
    pub fn apply_spectral_subtraction(&self, spectrum: &Spectrum, noise_spectrum: &[f32]) -> Spectrum {
        let cleaned = subtract_spectrum(
            spectrum.magnitudes(),
            noise_spectrum,
            self.config.over_subtraction,
            self.config.spectral_floor,
        );
        Spectrum::new(cleaned, spectrum.sample_rate(), spectrum.fft_size())
    }

    /// Local-statistics Wiener filter
    ///
    /// Noise power is the squared profile floor once one is known (a measured
    /// floor of zero included), otherwise the frame's mean local variance.
    pub fn apply_wiener_filter(&self, frame: &[f32]) -> Result<Vec<f32>, AnalysisError> {
        let noise_power = self.profile.read(|profile| {
            profile
                .has_floor()
                .then(|| profile.floor_linear() * profile.floor_linear())
        })?;
        wiener_filter(frame, self.config.wiener_window, noise_power)
    }

    /// Sliding median to remove clicks; `window_size` must be odd
    pub fn apply_median_filter(
        &self,
        frame: &[f32],
        window_size: usize,
    ) -> Result<Vec<f32>, AnalysisError> {
        median_filter(frame, window_size)
    }

    /// Restrict a frame to `[low_hz, high_hz]`
    pub fn apply_bandpass_filter(
        &self,
        frame: &[f32],
        sample_rate: u32,
        low_hz: f32,
        high_hz: f32,
    ) -> Result<Vec<f32>, AnalysisError> {
        bandpass_filter(&self.fft, frame, sample_rate, low_hz, high_hz)
    }

    /// Learn the noise spectrum from a frame if it is quiet enough
    ///
    /// A frame counts as noise when its RMS does not exceed the gate's close
    /// threshold.
    ///
    /// # Returns
    /// Whether the frame was folded into the noise spectrum
    pub fn observe_noise_frame(&self, frame: &[f32]) -> Result<bool, AnalysisError> {
        if frame.is_empty() {
            return Ok(false);
        }
        let threshold = self.gate.close_threshold(self.gate_floor()?);
        if TemporalFeatures::compute_rms(frame) > threshold {
            return Ok(false);
        }

        let bins = self.fft.forward(frame);
        let magnitudes: Vec<f32> = bins[..=frame.len() / 2].iter().map(|c| c.norm()).collect();
        let smoothing = self.config.noise_spectrum_smoothing;
        self.profile
            .update(|profile| profile.update_spectrum(&magnitudes, smoothing))?;
        Ok(true)
    }

    /// Run the full suppression chain on one frame
    ///
    /// # Errors
    /// `InsufficientSamples` when the frame is shorter than a filter window,
    /// `LockPoisoned` if the profile lock is poisoned
    pub fn suppress(&self, frame: &[f32]) -> Result<Vec<f32>, AnalysisError> {
        let required = self.config.wiener_window.max(self.config.median_window);
        if frame.len() < required {
            return Err(AnalysisError::InsufficientSamples {
                required,
                available: frame.len(),
            });
        }

        let mut signal = frame.to_vec();

        let floor = self.gate_floor()?;
        let closed_blocks = self.apply_adaptive_gate(&mut signal, floor);

        let noise_spectrum = self
            .profile
            .read(|profile| profile.noise_spectrum().map(<[f32]>::to_vec))?;
        if let Some(noise) = noise_spectrum.filter(|n| n.len() == signal.len() / 2 + 1) {
            let mut bins = self.fft.forward(&signal);
            subtract_complex(
                &mut bins,
                &noise,
                self.config.over_subtraction,
                self.config.spectral_floor,
            );
            signal = self.fft.inverse(bins);
        }

        let signal = self.apply_wiener_filter(&signal)?;
        let signal = self.apply_median_filter(&signal, self.config.median_window)?;
        let signal = self.apply_bandpass_filter(
            &signal,
            self.sample_rate,
            self.config.bandpass_low_hz,
            self.config.bandpass_high_hz,
        )?;

        tracing::trace!(
            "[NoiseSuppressor] Frame suppressed: gate floor {:.6}, {} blocks gated",
            floor,
            closed_blocks
        );
        Ok(signal)
    }

    /// Start over with an empty noise profile
    pub fn reset(&self) -> Result<(), AnalysisError> {
        self.profile.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suppressor() -> NoiseSuppressor {
        NoiseSuppressor::new(
            16000,
            &PipelineConfig::default(),
            Arc::new(FftProcessor::new(16000)),
        )
    }

    fn sine(frequency: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * frequency * i as f32 / 16000.0).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        TemporalFeatures::compute_rms(samples)
    }

    /// Put a known floor into the profile without going through estimation
    fn seed_floor(suppressor: &NoiseSuppressor, floor: f32) {
        suppressor
            .profile()
            .update(|profile| profile.update_floor(floor, 0.9))
            .unwrap();
    }

    #[test]
    fn test_noise_floor_of_silence_is_zero() {
        let suppressor = suppressor();
        assert_eq!(suppressor.estimate_noise_floor(&[0.0; 4096]).unwrap(), 0.0);
        assert_eq!(suppressor.profile().snapshot().unwrap().floor_linear(), 0.0);
    }

    #[test]
    fn test_noise_floor_is_percentile() {
        let suppressor = suppressor();
        // |x| = 0.00, 0.01, ..., 1.00; 10th percentile of 101 values is 0.10
        let buffer: Vec<f32> = (0..=100)
            .map(|i| if i % 2 == 0 { i as f32 / 100.0 } else { -(i as f32) / 100.0 })
            .collect();
        let estimate = suppressor.estimate_noise_floor(&buffer).unwrap();
        assert!((estimate - 0.10).abs() < 1e-6);
    }

    #[test]
    fn test_noise_floor_robust_to_transient() {
        let suppressor = suppressor();
        let mut buffer = vec![0.01f32; 1000];
        buffer[500] = 1.0;
        assert!((suppressor.estimate_noise_floor(&buffer).unwrap() - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_noise_floor_empty_buffer() {
        assert!(matches!(
            suppressor().estimate_noise_floor(&[]),
            Err(AnalysisError::InsufficientSamples { .. })
        ));
    }

    #[test]
    fn test_profile_rises_with_louder_background() {
        let suppressor = suppressor();
        let mut previous = 0.0;
        // Close threshold starts at 1.5 x the -60 dB prior (0.0015)
        for level in [0.0005f32, 0.001, 0.0014] {
            suppressor.estimate_noise_floor(&vec![level; 2048]).unwrap();
            let floor = suppressor.profile().snapshot().unwrap().floor_linear();
            assert!(floor > previous, "floor did not rise from {} to {}", previous, floor);
            previous = floor;
        }
        assert_eq!(suppressor.profile().snapshot().unwrap().floor_updates(), 3);
    }

    #[test]
    fn test_loud_buffer_leaves_floor_alone() {
        let suppressor = suppressor();
        suppressor.estimate_noise_floor(&vec![0.001; 2048]).unwrap();

        // 10th percentile of a 0.5 tone is about 0.078: signal, not background
        let estimate = suppressor
            .estimate_noise_floor(&sine(400.0, 0.5, 8000))
            .unwrap();
        assert!(estimate > 0.05);

        let profile = suppressor.profile().snapshot().unwrap();
        assert_eq!(profile.floor_updates(), 1);
        assert!((profile.floor_linear() - 0.001).abs() < 1e-7);
    }

    #[test]
    fn test_loud_first_buffer_does_not_seed_floor() {
        let suppressor = suppressor();
        suppressor
            .estimate_noise_floor(&sine(400.0, 0.5, 8000))
            .unwrap();
        assert!(!suppressor.profile().snapshot().unwrap().has_floor());
        assert!((suppressor.gate_floor().unwrap() - 0.001).abs() < 1e-7);
    }

    #[test]
    fn test_gate_floor_never_below_prior() {
        let suppressor = suppressor();
        assert!((suppressor.gate_floor().unwrap() - 0.001).abs() < 1e-7);
        seed_floor(&suppressor, 0.05);
        assert!((suppressor.gate_floor().unwrap() - 0.05).abs() < 1e-6);
        suppressor.reset().unwrap();
        seed_floor(&suppressor, 0.0);
        assert!((suppressor.gate_floor().unwrap() - 0.001).abs() < 1e-7);
    }

    #[test]
    fn test_suppress_keeps_in_band_tone() {
        let suppressor = suppressor();
        let tone = sine(400.0, 0.5, 2048);
        suppressor.estimate_noise_floor(&tone).unwrap();
        let cleaned = suppressor.suppress(&tone).unwrap();

        assert_eq!(cleaned.len(), tone.len());
        assert!((rms(&cleaned) - rms(&tone)).abs() < 0.02, "rms {}", rms(&cleaned));
    }

    #[test]
    fn test_zero_floor_wiener_passes_tone() {
        let suppressor = suppressor();
        // Leading digital silence puts the 10th percentile at exactly 0
        let mut buffer = vec![0.0f32; 8000];
        buffer.extend(sine(2500.0, 0.5, 8000));
        assert_eq!(suppressor.estimate_noise_floor(&buffer).unwrap(), 0.0);
        assert!(suppressor.profile().snapshot().unwrap().has_floor());

        let tone = sine(2500.0, 0.5, 2048);
        let filtered = suppressor.apply_wiener_filter(&tone).unwrap();
        for (out, original) in filtered.iter().zip(&tone) {
            assert!((out - original).abs() < 1e-5);
        }
    }

    #[test]
    fn test_suppress_removes_quiet_background() {
        let suppressor = suppressor();
        seed_floor(&suppressor, 0.05);
        // Envelope sits below the close threshold (0.075): gated to silence
        let hum = sine(400.0, 0.04, 2048);
        let cleaned = suppressor.suppress(&hum).unwrap();
        assert!(rms(&cleaned) < 1e-4, "rms {}", rms(&cleaned));
    }

    #[test]
    fn test_observe_noise_frame_learns_spectrum() {
        let suppressor = suppressor();
        seed_floor(&suppressor, 0.05);

        assert!(suppressor.observe_noise_frame(&sine(1000.0, 0.02, 2048)).unwrap());
        assert!(!suppressor.observe_noise_frame(&sine(1000.0, 0.5, 2048)).unwrap());

        let profile = suppressor.profile().snapshot().unwrap();
        assert_eq!(profile.noise_spectrum().map(|s| s.len()), Some(1025));
        assert_eq!(profile.spectrum_updates(), 1);
    }

    #[test]
    fn test_spectral_subtraction_on_spectrum() {
        let suppressor = suppressor();
        let spectrum = Spectrum::new(vec![1.0, 0.5, 0.0, 2.0], 16000, 8);
        let cleaned = suppressor.apply_spectral_subtraction(&spectrum, &[0.25, 0.5, 0.25, 0.25]);
        assert_eq!(cleaned.len(), 4);
        assert!(cleaned.magnitudes().iter().all(|&m| m >= 0.0));
        assert!((cleaned.magnitudes()[0] - 0.5).abs() < 1e-6);
        assert!((cleaned.magnitudes()[1] - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_suppress_short_frame() {
        assert_eq!(
            suppressor().suppress(&[0.1; 3]),
            Err(AnalysisError::InsufficientSamples {
                required: 5,
                available: 3
            })
        );
    }

    #[test]
    fn test_reset_clears_profile() {
        let suppressor = suppressor();
        suppressor.estimate_noise_floor(&vec![0.001; 64]).unwrap();
        assert!(suppressor.profile().snapshot().unwrap().has_floor());
        suppressor.reset().unwrap();
        assert!(!suppressor.profile().snapshot().unwrap().has_floor());
    }
}
