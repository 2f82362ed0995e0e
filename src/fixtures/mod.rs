//! Fixture utilities for the deterministic CLI harness.
//!
//! This module discovers fixture assets, loads and writes PCM WAV data,
//! synthesizes test tones, parses optional expectation JSON, and runs the
//! analyzer against fixtures. It backs `cry_cli` and the integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::{CryAnalyzer, FeatureVector};
use crate::config::PipelineConfig;

/// Default location for fixture WAV/JSON assets.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub wav_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// Loaded fixture data with decoded PCM samples.
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
    pub expectations: Option<FixtureExpectations>,
}

/// Scalar features an expectation can check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    Rms,
    ZeroCrossingRate,
    Energy,
    SpectralCentroid,
    SpectralSpread,
    SpectralFlatness,
    SpectralRolloff,
    FundamentalFrequency,
    HarmonicRatio,
    Confidence,
}

impl FeatureName {
    pub fn value(&self, features: &FeatureVector) -> f32 {
        match self {
            FeatureName::Rms => features.rms,
            FeatureName::ZeroCrossingRate => features.zero_crossing_rate,
            FeatureName::Energy => features.energy,
            FeatureName::SpectralCentroid => features.spectral_centroid,
            FeatureName::SpectralSpread => features.spectral_spread,
            FeatureName::SpectralFlatness => features.spectral_flatness,
            FeatureName::SpectralRolloff => features.spectral_rolloff,
            FeatureName::FundamentalFrequency => features.fundamental_frequency,
            FeatureName::HarmonicRatio => features.harmonic_ratio,
            FeatureName::Confidence => features.confidence,
        }
    }
}

/// Expected value of one feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedFeature {
    pub feature: FeatureName,
    pub value: f32,
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
}

fn default_tolerance() -> f32 {
    0.05
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureExpectations {
    pub fixture: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Whether the fixture should analyze as silent
    #[serde(default)]
    pub silent: Option<bool>,
    #[serde(default)]
    pub features: Vec<ExpectedFeature>,
}

impl FixtureExpectations {
    pub fn verify(&self, actual: &FeatureVector) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        if let Some(silent) = self.silent {
            if actual.is_silent() != silent {
                failures.push(ExpectationFailure::Silence {
                    expected: silent,
                    actual: actual.is_silent(),
                });
            }
        }

        for expected in &self.features {
            let value = expected.feature.value(actual);
            let delta = (value - expected.value).abs();
            // NaN deltas fail too
            let within = delta <= expected.tolerance;
            if !within {
                failures.push(ExpectationFailure::Feature {
                    expected: expected.clone(),
                    actual: value,
                    delta,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Outcome of comparing actual results with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| match failure {
                ExpectationFailure::Silence { expected, actual } => serde_json::json!({
                    "check": "silent",
                    "expected": expected,
                    "actual": actual,
                }),
                ExpectationFailure::Feature { expected, actual, delta } => serde_json::json!({
                    "check": expected.feature,
                    "expected": expected.value,
                    "tolerance": expected.tolerance,
                    "actual": actual,
                    "delta": delta,
                }),
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single failure.
#[derive(Debug)]
pub enum ExpectationFailure {
    Silence {
        expected: bool,
        actual: bool,
    },
    Feature {
        expected: ExpectedFeature,
        actual: f32,
        delta: f32,
    },
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some("wav") {
                    fixtures.push(self.metadata_for_path(&path)?);
                }
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load fixture samples + expectations for provided name or path.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let wav_path = self.resolve_fixture_path(fixture)?;
        let metadata = self.metadata_for_path(&wav_path)?;
        let (samples, sample_rate) = read_wav(&wav_path)?;

        let expectation_path = override_expect.or(metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => Some(read_expectations(&path)?),
            None => None,
        };

        Ok(FixtureData {
            metadata,
            sample_rate,
            samples,
            expectations,
        })
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.exists() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}.wav"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }

    fn metadata_for_path(&self, wav_path: &Path) -> Result<FixtureMetadata> {
        let name = wav_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Invalid fixture name for {}", wav_path.display()))?
            .to_string();
        let expect_path = wav_path.with_extension("expect.json");
        Ok(FixtureMetadata {
            name,
            wav_path: wav_path.to_path_buf(),
            expect_path: expect_path.exists().then_some(expect_path),
        })
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

/// Parse an expectation JSON file.
pub fn read_expectations(path: &Path) -> Result<FixtureExpectations> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading expectation {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}

/// Runs fixtures through a fresh analyzer per fixture.
pub struct FixtureProcessor {
    config: PipelineConfig,
}

impl FixtureProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    fn analyzer(&self, data: &FixtureData) -> Result<CryAnalyzer> {
        CryAnalyzer::new(data.sample_rate, self.config.clone()).with_context(|| {
            format!(
                "configuring analyzer for {} at {} Hz",
                data.metadata.name, data.sample_rate
            )
        })
    }

    /// Aggregated feature vector for the whole fixture.
    pub fn run(&self, data: &FixtureData) -> Result<FeatureVector> {
        let analyzer = self.analyzer(data)?;
        analyzer
            .analyze(&data.samples)
            .with_context(|| format!("analyzing fixture {}", data.metadata.name))
    }

    /// One feature vector per frame.
    pub fn run_frames(&self, data: &FixtureData) -> Result<Vec<FeatureVector>> {
        let analyzer = self.analyzer(data)?;
        analyzer
            .analyze_frames(&data.samples)
            .with_context(|| format!("analyzing fixture {}", data.metadata.name))
    }
}

/// Parameters of a synthetic test tone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthSpec {
    pub frequency_hz: f32,
    pub duration_secs: f32,
    pub amplitude: f32,
    pub sample_rate: u32,
    /// Peak amplitude of uniform white noise added to the tone
    pub noise_amplitude: f32,
    /// Overtones at integer multiples of the fundamental, amplitude 1/k
    pub harmonics: usize,
    pub seed: u64,
}

impl Default for SynthSpec {
    fn default() -> Self {
        Self {
            frequency_hz: 400.0,
            duration_secs: 1.0,
            amplitude: 0.5,
            sample_rate: 16000,
            noise_amplitude: 0.0,
            harmonics: 0,
            seed: 7,
        }
    }
}

impl SynthSpec {
    /// Render the tone; output is clamped to [-1, 1].
    pub fn generate(&self) -> Vec<f32> {
        let len = (self.duration_secs.max(0.0) * self.sample_rate as f32).round() as usize;
        let mut rng = rand::rngs::StdRng::seed_from_u64(self.seed);
        let nyquist = self.sample_rate as f32 / 2.0;

        (0..len)
            .map(|i| {
                let t = i as f32 / self.sample_rate as f32;
                let mut value = 0.0f32;
                for k in 1..=self.harmonics + 1 {
                    let frequency = self.frequency_hz * k as f32;
                    if frequency >= nyquist {
                        break;
                    }
                    value += (2.0 * std::f32::consts::PI * frequency * t).sin() / k as f32;
                }
                value *= self.amplitude;
                if self.noise_amplitude > 0.0 {
                    value += rng.gen_range(-self.noise_amplitude..self.noise_amplitude);
                }
                value.clamp(-1.0, 1.0)
            })
            .collect()
    }
}

/// Write mono 32-bit float PCM.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))
}

/// Read mono PCM (float, or 16/24/32-bit integer) normalized to [-1, 1].
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 {
        return Err(anyhow!(
            "Fixture {} must be mono (found {} channels)",
            path.display(),
            spec.channels
        ));
    }

    let sample_rate = spec.sample_rate;

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f32>>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f32>>>()?,
                other => {
                    return Err(anyhow!(
                        "Unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ))
                }
            }
        }
    };

    Ok((samples, sample_rate))
}
