// Analysis error types and constants

use crate::error::ErrorCode;
use log::error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Analysis error code constants
///
/// Single source of truth for the numeric codes handed to the orchestration
/// layer alongside each failure.
///
/// Error code range: 3001-3005
pub struct AnalysisErrorCodes {}

impl AnalysisErrorCodes {
    /// Window/hop/frequency-range parameters are invalid
    pub const INVALID_CONFIGURATION: i32 = 3001;

    /// Frame length is not a supported FFT size
    pub const INVALID_FRAME_LENGTH: i32 = 3002;

    /// Input is shorter than the minimum required by a filter window
    pub const INSUFFICIENT_SAMPLES: i32 = 3003;

    /// Silent or clipped input
    pub const DEGENERATE_SIGNAL: i32 = 3004;

    /// Shared noise profile lock was poisoned
    pub const LOCK_POISONED: i32 = 3005;
}

/// Why a signal could not be analyzed meaningfully
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateKind {
    /// RMS is zero; pitch and spectral shape are undefined
    Silent,
    /// Too many samples sit at full scale
    Clipped,
}

impl DegenerateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegenerateKind::Silent => "silent",
            DegenerateKind::Clipped => "clipped",
        }
    }
}

/// Log an analysis error with structured context
///
/// Logs the numeric code, the component and the human-readable message.
pub fn log_analysis_error(err: &AnalysisError, context: &str) {
    error!(
        "Analysis error in {}: code={}, component=CryAnalyzer, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the feature-extraction and noise-suppression pipeline
///
/// Configuration errors are fatal to the call. `InsufficientSamples` asks the
/// caller to accumulate more audio. `DegenerateSignal` is recovered inside the
/// pipeline and turned into a zero-confidence feature vector.
///
/// Error code ranges: 3001-3005
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Bad window/hop/frequency-range/filter parameters
    InvalidConfiguration { reason: String },

    /// Frame length is not a power of two in the supported FFT range
    InvalidFrameLength { length: usize },

    /// Input shorter than the filter window requires
    InsufficientSamples { required: usize, available: usize },

    /// Silent or clipped input
    DegenerateSignal { kind: DegenerateKind },

    /// RwLock around shared state was poisoned
    LockPoisoned { component: String },
}

impl AnalysisError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        AnalysisError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry after accumulating more audio
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::InsufficientSamples { .. })
    }
}

impl ErrorCode for AnalysisError {
    fn code(&self) -> i32 {
        match self {
            AnalysisError::InvalidConfiguration { .. } => {
                AnalysisErrorCodes::INVALID_CONFIGURATION
            }
            AnalysisError::InvalidFrameLength { .. } => AnalysisErrorCodes::INVALID_FRAME_LENGTH,
            AnalysisError::InsufficientSamples { .. } => AnalysisErrorCodes::INSUFFICIENT_SAMPLES,
            AnalysisError::DegenerateSignal { .. } => AnalysisErrorCodes::DEGENERATE_SIGNAL,
            AnalysisError::LockPoisoned { .. } => AnalysisErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            AnalysisError::InvalidConfiguration { reason } => {
                format!("Invalid configuration: {}", reason)
            }
            AnalysisError::InvalidFrameLength { length } => {
                format!(
                    "Frame length {} is not a supported FFT size (power of two)",
                    length
                )
            }
            AnalysisError::InsufficientSamples {
                required,
                available,
            } => {
                format!(
                    "Insufficient samples: need {}, got {}",
                    required, available
                )
            }
            AnalysisError::DegenerateSignal { kind } => {
                format!("Degenerate signal: {}", kind.as_str())
            }
            AnalysisError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AnalysisError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AnalysisError {}
