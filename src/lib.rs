// Cry Analyzer Core - DSP feature extraction for infant cry monitoring
// Noise-suppressed spectral, cepstral and pitch features with confidence scores

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod debug;
pub mod error;
pub mod fixtures;
pub mod session;

// Re-exports for convenience
pub use analysis::{CryAnalyzer, FeatureVector, NoiseProfile, SharedNoiseProfile};
pub use audio::{AudioBuffer, WindowFunction};
pub use config::{AppConfig, PipelineConfig};
pub use error::{AnalysisError, DegenerateKind, ErrorCode};
pub use session::{AnalysisResult, MonitoringSession};

use tracing_subscriber::EnvFilter;

/// Install the stderr tracing subscriber and read `CRY_TRACE`
///
/// `RUST_LOG` overrides the level chosen by `verbose`. `log` records from the
/// library are forwarded to the same subscriber.
///
/// # Returns
/// false if a global subscriber was already installed
pub fn init_logging(verbose: bool) -> bool {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    debug::pipeline_tracer::init();
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(false);
        assert!(!init_logging(true));
    }
}
