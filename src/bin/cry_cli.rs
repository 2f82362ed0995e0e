use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use cry_analyzer::analysis::FeatureVector;
use cry_analyzer::config::{AppConfig, PipelineConfig};
use cry_analyzer::fixtures::{
    write_wav, ExpectationDiff, FixtureCatalog, FixtureData, FixtureProcessor, SynthSpec,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "cry_cli",
    about = "Deterministic feature extraction harness for the cry analyzer"
)]
struct Cli {
    /// Override directory containing fixture assets (defaults to ./fixtures)
    #[arg(long, global = true)]
    fixtures_dir: Option<PathBuf>,
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a WAV file into one aggregated feature vector
    Analyze {
        /// WAV path or fixture name
        #[arg(long)]
        input: String,
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print one JSON line per analysis frame
    Frames {
        #[arg(long)]
        input: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write a synthetic test tone
    Synth {
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        frequency: f32,
        #[arg(long, default_value_t = 1.0)]
        duration: f32,
        #[arg(long, default_value_t = 0.5)]
        amplitude: f32,
        #[arg(long, default_value_t = 16000)]
        sample_rate: u32,
        /// Peak amplitude of added white noise
        #[arg(long, default_value_t = 0.0)]
        noise: f32,
        /// Number of overtones above the fundamental
        #[arg(long, default_value_t = 0)]
        harmonics: usize,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Analyze a WAV file and compare against expectations (exit 2 on mismatch)
    Verify {
        #[arg(long)]
        input: String,
        /// Expectation JSON; defaults to <input>.expect.json
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List available fixtures on disk
    DumpFixtures,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    cry_analyzer::init_logging(cli.verbose);

    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_default();

    match cli.command {
        Commands::Analyze {
            input,
            config,
            output,
        } => run_analyze(&catalog, &input, config.as_deref(), output),
        Commands::Frames { input, config } => run_frames(&catalog, &input, config.as_deref()),
        Commands::Synth {
            output,
            frequency,
            duration,
            amplitude,
            sample_rate,
            noise,
            harmonics,
            seed,
        } => run_synth(
            &output,
            SynthSpec {
                frequency_hz: frequency,
                duration_secs: duration,
                amplitude,
                sample_rate,
                noise_amplitude: noise,
                harmonics,
                seed,
            },
        ),
        Commands::Verify {
            input,
            expect,
            config,
        } => run_verify(&catalog, &input, expect, config.as_deref()),
        Commands::DumpFixtures => run_dump(&catalog),
    }
}

/// Pipeline configuration from an explicit file, or defaults
fn pipeline_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = AppConfig::try_load_from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            Ok(config.pipeline)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn run_analyze(
    catalog: &FixtureCatalog,
    input: &str,
    config: Option<&Path>,
    output_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let processor = FixtureProcessor::new(pipeline_config(config)?);
    let data = catalog.load(input, None)?;
    let features = processor.run(&data)?;

    emit_report(&data, &features, output_path)?;
    Ok(ExitCode::from(0))
}

fn run_frames(catalog: &FixtureCatalog, input: &str, config: Option<&Path>) -> Result<ExitCode> {
    let processor = FixtureProcessor::new(pipeline_config(config)?);
    let data = catalog.load(input, None)?;
    let frames = processor.run_frames(&data)?;

    for (index, features) in frames.iter().enumerate() {
        let line = FrameLine { index, features };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(ExitCode::from(0))
}

fn run_synth(output: &Path, spec: SynthSpec) -> Result<ExitCode> {
    if spec.sample_rate == 0 || !spec.frequency_hz.is_finite() || spec.frequency_hz <= 0.0 {
        return Err(anyhow!(
            "frequency and sample rate must be positive (got {} Hz at {} Hz)",
            spec.frequency_hz,
            spec.sample_rate
        ));
    }
    let samples = spec.generate();
    write_wav(output, &samples, spec.sample_rate)?;
    tracing::info!(
        "[cry_cli] Wrote {} samples of {} Hz to {}",
        samples.len(),
        spec.frequency_hz,
        output.display()
    );
    Ok(ExitCode::from(0))
}

fn run_verify(
    catalog: &FixtureCatalog,
    input: &str,
    override_expect: Option<PathBuf>,
    config: Option<&Path>,
) -> Result<ExitCode> {
    let processor = FixtureProcessor::new(pipeline_config(config)?);
    let data = catalog.load(input, override_expect)?;
    let features = processor.run(&data)?;

    emit_report(&data, &features, None)?;

    let expectations = data
        .expectations
        .as_ref()
        .ok_or_else(|| anyhow!("no expectations found for {}", data.metadata.name))?;
    match expectations.verify(&features) {
        Ok(()) => Ok(ExitCode::from(0)),
        Err(diff) => {
            emit_diff(&diff)?;
            Ok(ExitCode::from(2))
        }
    }
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn emit_report(
    data: &FixtureData,
    features: &FeatureVector,
    output_path: Option<PathBuf>,
) -> Result<()> {
    let report = AnalysisReportPayload {
        fixture: &data.metadata.name,
        sample_rate: data.sample_rate,
        duration_secs: data.samples.len() as f32 / data.sample_rate.max(1) as f32,
        features,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct AnalysisReportPayload<'a> {
    fixture: &'a str,
    sample_rate: u32,
    duration_secs: f32,
    features: &'a FeatureVector,
}

#[derive(Serialize)]
struct FrameLine<'a> {
    index: usize,
    #[serde(flatten)]
    features: &'a FeatureVector,
}
