// Error types for the cry analyzer
//
// This module defines the error taxonomy of the feature-extraction pipeline,
// providing structured error handling with numeric codes for the
// orchestration layer that consumes feature vectors.

mod analysis;

pub use analysis::{log_analysis_error, AnalysisError, AnalysisErrorCodes, DegenerateKind};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the pipeline boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
