// Analysis module - DSP pipeline from raw samples to a cry feature vector
//
// This module orchestrates the complete single-pass pipeline:
//
//   samples → frames → noise suppression → Hann window → spectrum
//           → per-frame features → aggregated FeatureVector (+ confidence)
//
// Architecture:
// - CryAnalyzer: validated configuration plus the shared DSP components
// - NoiseSuppressor: rolling NoiseProfile, the only state kept across calls
// - FeatureExtractor: temporal, spectral, MFCC and cry-specific features
//
// Silent input is not an error: it yields a zero-confidence vector so a
// monitoring loop keeps running through quiet periods.

use std::sync::Arc;

use crate::audio::{AudioBuffer, Frame, Framer, WindowFunction};
use crate::config::PipelineConfig;
use crate::debug::pipeline_tracer::{self, PipelineStage};
use crate::error::{AnalysisError, DegenerateKind};
use crate::trace_pipeline;

pub mod confidence;
pub mod features;
pub mod noise;

pub use confidence::compute_confidence;
pub use features::{FeatureExtractor, FeatureVector, FftProcessor, Spectrum, TemporalFeatures};
pub use noise::{NoiseProfile, NoiseSuppressor, SharedNoiseProfile};

/// Single-pass cry analyzer for one sample rate and configuration
///
/// `Send + Sync`: independent windows may be analyzed from several threads;
/// they share the noise profile through its lock.
pub struct CryAnalyzer {
    sample_rate: u32,
    config: PipelineConfig,
    framer: Framer,
    fft: Arc<FftProcessor>,
    suppressor: NoiseSuppressor,
    extractor: FeatureExtractor,
    hann: Vec<f32>,
}

impl CryAnalyzer {
    /// Create an analyzer with a fresh noise profile
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `config` - Pipeline configuration
    ///
    /// # Errors
    /// `InvalidConfiguration` / `InvalidFrameLength` if the configuration is
    /// unusable at this sample rate
    pub fn new(sample_rate: u32, config: PipelineConfig) -> Result<Self, AnalysisError> {
        Self::with_profile(sample_rate, config, SharedNoiseProfile::new())
    }

    /// Create an analyzer that shares an existing noise profile
    pub fn with_profile(
        sample_rate: u32,
        config: PipelineConfig,
        profile: SharedNoiseProfile,
    ) -> Result<Self, AnalysisError> {
        config.validate(sample_rate)?;

        let framer = Framer::new(config.window_size, config.hop_size)?;
        let fft = Arc::new(FftProcessor::new(sample_rate));
        let suppressor =
            NoiseSuppressor::with_profile(sample_rate, &config, Arc::clone(&fft), profile);
        let extractor = FeatureExtractor::new(sample_rate, &config);
        let hann = WindowFunction::Hann.coefficients(config.window_size);

        Ok(Self {
            sample_rate,
            config,
            framer,
            fft,
            suppressor,
            extractor,
            hann,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The session's rolling noise profile
    pub fn noise_profile(&self) -> &SharedNoiseProfile {
        self.suppressor.profile()
    }

    pub fn suppressor(&self) -> &NoiseSuppressor {
        &self.suppressor
    }

    /// Forget the learned noise; call when a new monitoring session starts
    pub fn reset_noise_profile(&self) -> Result<(), AnalysisError> {
        self.suppressor.reset()
    }

    /// Analyze a captured buffer
    ///
    /// # Errors
    /// `InvalidConfiguration` if the buffer was captured at another sample rate
    pub fn analyze_buffer(&self, buffer: &AudioBuffer) -> Result<FeatureVector, AnalysisError> {
        if buffer.sample_rate() != self.sample_rate {
            return Err(AnalysisError::invalid_config(format!(
                "buffer sample rate {} does not match analyzer sample rate {}",
                buffer.sample_rate(),
                self.sample_rate
            )));
        }
        self.analyze(buffer.samples())
    }

    /// Analyze one window of audio into a single FeatureVector
    ///
    /// Scalar features and MFCCs are averaged over non-silent frames. The
    /// fundamental is the median over voiced frames and the harmonic ratio
    /// their mean. Formants and harmonics come from the loudest voiced frame.
    /// Confidence is recomputed from the aggregated values.
    ///
    /// # Errors
    /// * `InsufficientSamples` - fewer samples than the largest filter window
    /// * `InvalidConfiguration` - a sample is NaN or infinite
    /// * `LockPoisoned` - the noise profile lock is poisoned
    pub fn analyze(&self, samples: &[f32]) -> Result<FeatureVector, AnalysisError> {
        let frames = self.analyze_frames(samples)?;
        Ok(self.aggregate(&frames))
    }

    /// Analyze one window of audio, returning one FeatureVector per frame
    pub fn analyze_frames(&self, samples: &[f32]) -> Result<Vec<FeatureVector>, AnalysisError> {
        let required = self.config.min_samples();
        if samples.len() < required {
            return Err(AnalysisError::InsufficientSamples {
                required,
                available: samples.len(),
            });
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(AnalysisError::invalid_config(format!(
                "sample {} is not finite",
                index
            )));
        }

        let estimate = self.suppressor.estimate_noise_floor(samples)?;
        if pipeline_tracer::is_enabled() {
            pipeline_tracer::trace_noise_floor(estimate, self.suppressor.gate_floor()?);
        }

        self.framer
            .frames(samples)
            .map(|frame| self.process_frame(&frame))
            .collect()
    }

    /// Suppress, transform and extract features from one frame
    pub fn process_frame(&self, frame: &Frame) -> Result<FeatureVector, AnalysisError> {
        // Padded frames would bias the noise spectrum low
        if !frame.is_padded() && self.suppressor.observe_noise_frame(&frame.samples)? {
            trace_pipeline!(
                PipelineStage::NoiseLearned,
                "frame={} learned as background noise",
                frame.index
            );
        }

        let suppressed = self.suppressor.suppress(&frame.samples)?;

        let windowed: Vec<f32> = suppressed
            .iter()
            .zip(&self.hann)
            .map(|(&x, &w)| x * w)
            .collect();
        let spectrum = self.fft.magnitude_spectrum(&windowed)?;

        // Time-domain features only see the real samples, not the padding
        let vector = self
            .extractor
            .extract(&suppressed[..frame.valid_len], &spectrum)?;

        if pipeline_tracer::is_enabled() {
            let valid = &frame.samples[..frame.valid_len];
            pipeline_tracer::trace_suppressed(
                frame.index,
                TemporalFeatures::compute_rms(valid),
                vector.rms,
            );
            pipeline_tracer::trace_features(
                frame.index,
                vector.fundamental_frequency,
                vector.spectral_centroid,
                vector.rms,
            );
        }

        Ok(vector)
    }

    /// Fold per-frame vectors into one vector for the window
    pub fn aggregate(&self, frames: &[FeatureVector]) -> FeatureVector {
        let active: Vec<&FeatureVector> = frames.iter().filter(|f| !f.is_silent()).collect();
        if active.is_empty() {
            let mut silent = self.extractor.silent_vector();
            silent.frame_count = frames.len();
            pipeline_tracer::trace_aggregated(frames.len(), 0, 0.0);
            return silent;
        }

        let count = active.len() as f32;
        let mean = |select: fn(&FeatureVector) -> f32| -> f32 {
            active.iter().map(|f| select(f)).sum::<f32>() / count
        };

        let num_mfcc = self.config.num_mfcc_coefficients;
        let mut mfcc = vec![0.0f32; num_mfcc];
        for frame in &active {
            for (sum, &c) in mfcc.iter_mut().zip(&frame.mfcc) {
                *sum += c;
            }
        }
        for c in mfcc.iter_mut() {
            *c /= count;
        }

        let voiced: Vec<&FeatureVector> =
            active.iter().copied().filter(|f| f.is_voiced()).collect();
        let fundamental_frequency =
            median(voiced.iter().map(|f| f.fundamental_frequency).collect());
        let harmonic_ratio = if voiced.is_empty() {
            0.0
        } else {
            voiced.iter().map(|f| f.harmonic_ratio).sum::<f32>() / voiced.len() as f32
        };

        // Loudest voiced frame, else loudest active frame, supplies formants and harmonics
        let (formants, harmonics) = match loudest(&voiced) {
            Some(frame) => (frame.formants.clone(), frame.harmonics.clone()),
            None => (
                loudest(&active)
                    .map(|f| f.formants.clone())
                    .unwrap_or_else(|| vec![0.0; self.config.features.num_formants]),
                vec![0.0; self.config.features.num_harmonics],
            ),
        };

        let energy = mean(|f| f.energy);
        let clipped = active
            .iter()
            .any(|f| f.degenerate == Some(DegenerateKind::Clipped));
        let (confidence, degenerate) = if clipped {
            (0.0, Some(DegenerateKind::Clipped))
        } else {
            (compute_confidence(&mfcc, energy), None)
        };

        pipeline_tracer::trace_aggregated(frames.len(), voiced.len(), confidence);

        FeatureVector {
            rms: mean(|f| f.rms),
            zero_crossing_rate: mean(|f| f.zero_crossing_rate),
            energy,
            spectral_centroid: mean(|f| f.spectral_centroid),
            spectral_spread: mean(|f| f.spectral_spread),
            spectral_flatness: mean(|f| f.spectral_flatness),
            spectral_rolloff: mean(|f| f.spectral_rolloff),
            mfcc,
            fundamental_frequency,
            formants,
            harmonics,
            harmonic_ratio,
            confidence,
            frame_count: frames.len(),
            degenerate,
        }
    }
}

fn loudest<'a>(candidates: &[&'a FeatureVector]) -> Option<&'a FeatureVector> {
    candidates
        .iter()
        .copied()
        .max_by(|a, b| a.energy.total_cmp(&b.energy))
}

/// Median of the values, 0.0 when empty
fn median(mut values: Vec<f32>) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests;
