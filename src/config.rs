//! Configuration management for pipeline parameter tuning
//!
//! This module provides runtime configuration loading from JSON files, so
//! filter constants (gate hysteresis, Wiener window, subtraction factors) can
//! be tuned without recompilation. None of the defaults are load-bearing;
//! they are starting points for field recordings.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::features::fft::{MAX_FFT_SIZE, MIN_FFT_SIZE};
use crate::audio::DEFAULT_BUFFER_SIZE;
use crate::error::AnalysisError;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Per-invocation pipeline parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Frame length in samples (power of two)
    pub window_size: usize,
    /// Distance between consecutive frame starts
    pub hop_size: usize,
    /// Lowest fundamental frequency searched for
    pub min_cry_frequency_hz: f32,
    /// Highest fundamental frequency searched for
    pub max_cry_frequency_hz: f32,
    /// Number of cepstral coefficients in each feature vector
    pub num_mfcc_coefficients: usize,
    /// Prior noise floor; the gate never uses a lower threshold than this
    pub noise_floor_db: f32,
    #[serde(default)]
    pub noise: NoiseSuppressionConfig,
    #[serde(default)]
    pub features: FeatureConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            hop_size: 512,
            min_cry_frequency_hz: 250.0,
            max_cry_frequency_hz: 600.0,
            num_mfcc_coefficients: 13,
            noise_floor_db: -60.0,
            noise: NoiseSuppressionConfig::default(),
            features: FeatureConfig::default(),
        }
    }
}

/// Noise estimation and suppression parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSuppressionConfig {
    /// Percentile of sorted absolute amplitudes used as the noise floor (0-1)
    pub noise_percentile: f32,
    /// Weight of the previous floor when a new estimate arrives (0-1)
    pub profile_smoothing: f32,
    /// Gate opens when the envelope exceeds floor × this factor
    pub gate_open_factor: f32,
    /// Gate closes when the envelope drops below floor × this factor
    pub gate_close_factor: f32,
    /// Gain applied to blocks while the gate is closed (0 = mute)
    pub gate_attenuation: f32,
    /// Envelope block length in samples
    pub gate_block_size: usize,
    /// Spectral subtraction over-subtraction factor (alpha)
    pub over_subtraction: f32,
    /// Fraction of the original magnitude kept as spectral floor (beta)
    pub spectral_floor: f32,
    /// Weight of the previous noise spectrum when a quiet frame is observed
    pub noise_spectrum_smoothing: f32,
    /// Wiener filter local window (odd)
    pub wiener_window: usize,
    /// Median filter window (odd)
    pub median_window: usize,
    /// Band-pass lower edge
    pub bandpass_low_hz: f32,
    /// Band-pass upper edge (clamped to Nyquist)
    pub bandpass_high_hz: f32,
}

impl Default for NoiseSuppressionConfig {
    fn default() -> Self {
        Self {
            noise_percentile: 0.10,
            profile_smoothing: 0.9,
            gate_open_factor: 2.0,
            gate_close_factor: 1.5,
            gate_attenuation: 0.0,
            gate_block_size: 128,
            over_subtraction: 2.0,
            spectral_floor: 0.02,
            noise_spectrum_smoothing: 0.9,
            wiener_window: 5,
            median_window: 3,
            // Below the lowest cry fundamental, above the first formants
            bandpass_low_hz: 200.0,
            bandpass_high_hz: 4000.0,
        }
    }
}

/// Feature extraction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Fraction of spectral energy below the rolloff frequency
    pub rolloff_fraction: f32,
    /// Number of triangular mel filters
    pub mel_filters: usize,
    pub mel_low_hz: f32,
    /// Upper mel edge (clamped to Nyquist)
    pub mel_high_hz: f32,
    /// Linear prediction order for formant estimation
    pub lpc_order: usize,
    pub num_formants: usize,
    pub num_harmonics: usize,
    /// Minimum normalized autocorrelation accepted as a pitch peak
    pub pitch_threshold: f32,
    /// Absolute amplitude treated as full scale
    pub clip_level: f32,
    /// Fraction of full-scale samples that marks a frame as clipped
    pub clip_fraction: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rolloff_fraction: 0.85,
            mel_filters: 26,
            mel_low_hz: 20.0,
            mel_high_hz: 8000.0,
            lpc_order: 12,
            num_formants: 3,
            num_harmonics: 8,
            pitch_threshold: 0.3,
            clip_level: 0.999,
            clip_fraction: 0.05,
        }
    }
}

/// Monitoring session worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Samples per analysis window handed to the analyzer
    pub analysis_window_samples: usize,
    /// Samples the window advances between analyses
    pub analysis_hop_samples: usize,
    /// Size of buffer pool for audio transfer to the worker
    pub buffer_pool_size: usize,
    /// Size of each pooled buffer in samples
    pub buffer_size: usize,
    /// Capacity of the result broadcast channel
    pub result_channel_capacity: usize,
    /// Log a summary every N windows (0 disables)
    pub log_every_n_windows: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            analysis_window_samples: 16000,
            analysis_hop_samples: 8000,
            buffer_pool_size: 64,
            buffer_size: DEFAULT_BUFFER_SIZE,
            result_channel_capacity: 64,
            log_every_n_windows: 50,
        }
    }
}

fn check(condition: bool, reason: impl FnOnce() -> String) -> Result<(), AnalysisError> {
    if condition {
        Ok(())
    } else {
        Err(AnalysisError::invalid_config(reason()))
    }
}

fn check_odd_window(name: &str, window: usize) -> Result<(), AnalysisError> {
    check(window >= 1 && window % 2 == 1, || {
        format!("{} must be odd and >= 1 (got {})", name, window)
    })
}

impl PipelineConfig {
    /// Validate parameters against the sample rate they will run at
    ///
    /// # Returns
    /// * `Ok(())` - Configuration usable
    /// * `Err(AnalysisError::InvalidConfiguration)` - Bad window/hop/frequency/filter parameter
    /// * `Err(AnalysisError::InvalidFrameLength)` - Window size is not a supported FFT size
    pub fn validate(&self, sample_rate: u32) -> Result<(), AnalysisError> {
        check(sample_rate > 0, || "sample_rate must be > 0".to_string())?;
        validate_framing(self.window_size, self.hop_size)?;
        if !self.window_size.is_power_of_two()
            || self.window_size < MIN_FFT_SIZE
            || self.window_size > MAX_FFT_SIZE
        {
            return Err(AnalysisError::InvalidFrameLength {
                length: self.window_size,
            });
        }

        let nyquist = sample_rate as f32 / 2.0;
        check(
            self.min_cry_frequency_hz.is_finite() && self.min_cry_frequency_hz > 0.0,
            || {
                format!(
                    "min_cry_frequency_hz must be > 0 (got {})",
                    self.min_cry_frequency_hz
                )
            },
        )?;
        check(
            self.max_cry_frequency_hz.is_finite()
                && self.max_cry_frequency_hz > self.min_cry_frequency_hz,
            || {
                format!(
                    "max_cry_frequency_hz {} must exceed min_cry_frequency_hz {}",
                    self.max_cry_frequency_hz, self.min_cry_frequency_hz
                )
            },
        )?;
        check(self.max_cry_frequency_hz <= nyquist, || {
            format!(
                "max_cry_frequency_hz {} exceeds Nyquist {}",
                self.max_cry_frequency_hz, nyquist
            )
        })?;
        // The longest pitch lag must fit in a frame
        check(
            (sample_rate as f32 / self.min_cry_frequency_hz) < self.window_size as f32 / 2.0,
            || {
                format!(
                    "window_size {} too short for min_cry_frequency_hz {}",
                    self.window_size, self.min_cry_frequency_hz
                )
            },
        )?;
        check(
            self.num_mfcc_coefficients > 0
                && self.num_mfcc_coefficients <= self.features.mel_filters,
            || {
                format!(
                    "num_mfcc_coefficients must be in [1, {}] (got {})",
                    self.features.mel_filters, self.num_mfcc_coefficients
                )
            },
        )?;
        check(
            self.noise_floor_db.is_finite() && self.noise_floor_db <= 0.0,
            || {
                format!(
                    "noise_floor_db must be a finite value <= 0 dBFS (got {})",
                    self.noise_floor_db
                )
            },
        )?;

        self.noise.validate(sample_rate)?;
        self.features.validate(sample_rate)
    }

    /// Largest filter window; shorter inputs cannot be suppressed
    pub fn min_samples(&self) -> usize {
        self.noise.wiener_window.max(self.noise.median_window).max(2)
    }
}

/// Validate a window/hop pair as used by the framer
pub fn validate_framing(window_size: usize, hop_size: usize) -> Result<(), AnalysisError> {
    check(window_size > 0, || "window_size must be > 0".to_string())?;
    check(hop_size > 0, || "hop_size must be > 0".to_string())?;
    check(hop_size <= window_size, || {
        format!(
            "hop_size {} must not exceed window_size {}",
            hop_size, window_size
        )
    })
}

impl NoiseSuppressionConfig {
    pub fn validate(&self, sample_rate: u32) -> Result<(), AnalysisError> {
        let unit = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);

        check(unit(self.noise_percentile), || {
            format!(
                "noise_percentile must be in [0, 1] (got {})",
                self.noise_percentile
            )
        })?;
        check(
            self.profile_smoothing.is_finite() && (0.0..1.0).contains(&self.profile_smoothing),
            || {
                format!(
                    "profile_smoothing must be in [0, 1) (got {})",
                    self.profile_smoothing
                )
            },
        )?;
        check(
            self.gate_close_factor > 0.0 && self.gate_close_factor <= self.gate_open_factor,
            || {
                format!(
                    "gate factors must satisfy 0 < close ({}) <= open ({})",
                    self.gate_close_factor, self.gate_open_factor
                )
            },
        )?;
        check(unit(self.gate_attenuation), || {
            format!(
                "gate_attenuation must be in [0, 1] (got {})",
                self.gate_attenuation
            )
        })?;
        check(self.gate_block_size > 0, || {
            "gate_block_size must be > 0".to_string()
        })?;
        check(
            self.over_subtraction.is_finite() && self.over_subtraction >= 0.0,
            || {
                format!(
                    "over_subtraction must be >= 0 (got {})",
                    self.over_subtraction
                )
            },
        )?;
        check(unit(self.spectral_floor), || {
            format!(
                "spectral_floor must be in [0, 1] (got {})",
                self.spectral_floor
            )
        })?;
        check(
            self.noise_spectrum_smoothing.is_finite()
                && (0.0..1.0).contains(&self.noise_spectrum_smoothing),
            || {
                format!(
                    "noise_spectrum_smoothing must be in [0, 1) (got {})",
                    self.noise_spectrum_smoothing
                )
            },
        )?;
        check_odd_window("wiener_window", self.wiener_window)?;
        check_odd_window("median_window", self.median_window)?;

        let nyquist = sample_rate as f32 / 2.0;
        check(
            self.bandpass_low_hz >= 0.0
                && self.bandpass_low_hz < self.bandpass_high_hz
                && self.bandpass_low_hz < nyquist,
            || {
                format!(
                    "band-pass [{}, {}] Hz invalid for Nyquist {}",
                    self.bandpass_low_hz, self.bandpass_high_hz, nyquist
                )
            },
        )
    }
}

impl FeatureConfig {
    pub fn validate(&self, sample_rate: u32) -> Result<(), AnalysisError> {
        check(
            self.rolloff_fraction > 0.0 && self.rolloff_fraction <= 1.0,
            || {
                format!(
                    "rolloff_fraction must be in (0, 1] (got {})",
                    self.rolloff_fraction
                )
            },
        )?;
        check(self.mel_filters >= 2, || {
            format!("mel_filters must be >= 2 (got {})", self.mel_filters)
        })?;
        check(
            self.mel_low_hz >= 0.0
                && self.mel_low_hz < self.mel_high_hz.min(sample_rate as f32 / 2.0),
            || {
                format!(
                    "mel range [{}, {}] Hz invalid",
                    self.mel_low_hz, self.mel_high_hz
                )
            },
        )?;
        check(self.lpc_order >= 2, || {
            format!("lpc_order must be >= 2 (got {})", self.lpc_order)
        })?;
        check(self.num_formants <= self.lpc_order / 2, || {
            format!(
                "num_formants {} exceeds lpc_order / 2 ({})",
                self.num_formants,
                self.lpc_order / 2
            )
        })?;
        check(
            self.pitch_threshold > 0.0 && self.pitch_threshold < 1.0,
            || {
                format!(
                    "pitch_threshold must be in (0, 1) (got {})",
                    self.pitch_threshold
                )
            },
        )?;
        check(
            self.clip_level > 0.0 && self.clip_level <= 1.0 && self.clip_fraction > 0.0,
            || "clip_level must be in (0, 1] and clip_fraction > 0".to_string(),
        )
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        check(self.analysis_window_samples > 0, || {
            "analysis_window_samples must be > 0".to_string()
        })?;
        check(
            self.analysis_hop_samples > 0
                && self.analysis_hop_samples <= self.analysis_window_samples,
            || {
                format!(
                    "analysis_hop_samples must be in [1, {}] (got {})",
                    self.analysis_window_samples, self.analysis_hop_samples
                )
            },
        )?;
        check(self.buffer_pool_size > 0 && self.buffer_size > 0, || {
            "buffer pool size and buffer size must be > 0".to_string()
        })?;
        check(self.result_channel_capacity > 0, || {
            "result_channel_capacity must be > 0".to_string()
        })
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration, or the defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load_from_file(&path) {
            Ok(config) => {
                log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log::warn!(
                    "[Config] Failed to load config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from JSON file, propagating read/parse failures
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(&path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/cry_config.json")
    }

    /// Validate every section against the session sample rate
    pub fn validate(&self, sample_rate: u32) -> Result<(), AnalysisError> {
        self.pipeline.validate(sample_rate)?;
        self.session.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.window_size, 2048);
        assert_eq!(config.pipeline.hop_size, 512);
        assert_eq!(config.pipeline.num_mfcc_coefficients, 13);
        assert_eq!(config.pipeline.features.lpc_order, 12);
        assert_eq!(config.session.buffer_pool_size, 64);
        assert_eq!(config.session.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(config.validate(16000).is_ok());
        assert!(config.validate(44100).is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.pipeline.window_size, config.pipeline.window_size);
        assert_eq!(
            parsed.pipeline.noise.gate_open_factor,
            config.pipeline.noise.gate_open_factor
        );
    }

    #[test]
    fn test_partial_json_uses_section_defaults() {
        let json = r#"{
            "pipeline": {
                "window_size": 1024,
                "hop_size": 256,
                "min_cry_frequency_hz": 300.0,
                "max_cry_frequency_hz": 700.0,
                "num_mfcc_coefficients": 13,
                "noise_floor_db": -50.0,
                "noise": { "median_window": 5 }
            }
        }"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.pipeline.window_size, 1024);
        assert_eq!(parsed.pipeline.noise.median_window, 5);
        assert_eq!(parsed.pipeline.noise.wiener_window, 5);
        assert_eq!(parsed.session.analysis_window_samples, 16000);
    }

    #[test]
    fn test_invalid_framing_rejected() {
        assert!(matches!(
            validate_framing(0, 1),
            Err(AnalysisError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            validate_framing(256, 0),
            Err(AnalysisError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            validate_framing(256, 512),
            Err(AnalysisError::InvalidConfiguration { .. })
        ));
        assert!(validate_framing(256, 256).is_ok());
    }

    #[test]
    fn test_non_power_of_two_window_is_frame_length_error() {
        let config = PipelineConfig {
            window_size: 2000,
            ..PipelineConfig::default()
        };
        assert_eq!(
            config.validate(16000),
            Err(AnalysisError::InvalidFrameLength { length: 2000 })
        );
    }

    #[test]
    fn test_frequency_range_rejected() {
        let inverted = PipelineConfig {
            min_cry_frequency_hz: 600.0,
            max_cry_frequency_hz: 250.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            inverted.validate(16000),
            Err(AnalysisError::InvalidConfiguration { .. })
        ));

        let above_nyquist = PipelineConfig {
            max_cry_frequency_hz: 9000.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            above_nyquist.validate(16000),
            Err(AnalysisError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_even_median_window_rejected() {
        let mut config = PipelineConfig::default();
        config.noise.median_window = 4;
        assert!(matches!(
            config.validate(16000),
            Err(AnalysisError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_gate_hysteresis_order_enforced() {
        let mut config = PipelineConfig::default();
        config.noise.gate_close_factor = 3.0;
        config.noise.gate_open_factor = 2.0;
        assert!(config.validate(16000).is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/cry_config.json");
        assert_eq!(config.pipeline.window_size, 2048);
        assert!(AppConfig::try_load_from_file("/nonexistent/cry_config.json").is_err());
    }

    #[test]
    fn test_bundled_asset_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/cry_config.json");
        let config = AppConfig::try_load_from_file(path).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            serde_json::to_value(&defaults).unwrap()
        );
    }
}
