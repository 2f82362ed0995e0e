// Pipeline Tracer - Diagnostic logging for the cry analysis pipeline
//
// Provides structured trace points throughout the DSP pipeline to help debug
// signal flow issues. Each stage logs its state when tracing is enabled, which
// makes it easy to see where a cry is gated away or where a feature collapses.
//
// Usage:
//   - Enable with CRY_TRACE=1 environment variable
//   - Traces appear in logs with [TRACE] prefix
//   - Each trace includes stage name, timestamp, and relevant metrics

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Global flag to enable/disable pipeline tracing
static TRACING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Counter for trace events (helps correlate related traces)
static TRACE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Enable pipeline tracing if the CRY_TRACE environment variable asks for it
///
/// Never disables tracing that was enabled at runtime.
pub fn init() {
    let enabled = std::env::var("CRY_TRACE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if enabled {
        TRACING_ENABLED.store(true, Ordering::SeqCst);
        log::info!("[TRACE] Pipeline tracing ENABLED - unset CRY_TRACE to disable");
    }
}

/// Check if tracing is enabled
#[inline]
pub fn is_enabled() -> bool {
    TRACING_ENABLED.load(Ordering::Relaxed)
}

/// Enable tracing at runtime
pub fn enable() {
    TRACING_ENABLED.store(true, Ordering::SeqCst);
    log::info!("[TRACE] Pipeline tracing enabled at runtime");
}

/// Disable tracing at runtime
pub fn disable() {
    TRACING_ENABLED.store(false, Ordering::SeqCst);
    log::info!("[TRACE] Pipeline tracing disabled at runtime");
}

/// Pipeline stages for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Session worker receives a block of samples
    BufferReceived,
    /// Noise floor estimated for a buffer
    NoiseFloor,
    /// Frame classified as background noise
    NoiseLearned,
    /// Frame passed through the suppression chain
    Suppressed,
    /// Features extracted from one frame
    FeaturesExtracted,
    /// Per-frame features folded into one vector
    Aggregated,
    /// Result broadcast to subscribers
    ResultSent,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::BufferReceived => "BUF_RX",
            PipelineStage::NoiseFloor => "NOISE_FLOOR",
            PipelineStage::NoiseLearned => "NOISE_LEARN",
            PipelineStage::Suppressed => "SUPPRESS",
            PipelineStage::FeaturesExtracted => "FEATURES",
            PipelineStage::Aggregated => "AGGREGATE",
            PipelineStage::ResultSent => "RESULT_TX",
        }
    }
}

/// Global start time for relative timestamps
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

fn get_timestamp_us() -> u64 {
    let start = START_TIME.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// Log a trace event at a pipeline stage
///
/// Only logs if CRY_TRACE=1 is set (or tracing was enabled at runtime).
///
/// # Arguments
/// * `stage` - The pipeline stage
/// * `message` - Descriptive message with metrics
#[inline]
pub fn trace(stage: PipelineStage, message: &str) {
    if !is_enabled() {
        return;
    }

    let id = TRACE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let ts = get_timestamp_us();

    log::info!(
        "[TRACE] {:>12} #{:06} @{:>10}us | {}",
        stage.as_str(),
        id,
        ts,
        message
    );
}

/// Log a trace event with formatted arguments
#[macro_export]
macro_rules! trace_pipeline {
    ($stage:expr, $($arg:tt)*) => {
        if $crate::debug::pipeline_tracer::is_enabled() {
            $crate::debug::pipeline_tracer::trace($stage, &format!($($arg)*));
        }
    };
}

/// Trace a block arriving at the session worker
pub fn trace_buffer_received(samples: usize, accumulated: usize) {
    trace(
        PipelineStage::BufferReceived,
        &format!("samples={} accumulated={}", samples, accumulated),
    );
}

/// Trace a noise floor estimate
pub fn trace_noise_floor(estimate: f32, gate_floor: f32) {
    trace(
        PipelineStage::NoiseFloor,
        &format!("estimate={:.6} gate_floor={:.6}", estimate, gate_floor),
    );
}

/// Trace one suppressed frame
pub fn trace_suppressed(frame_index: usize, rms_in: f32, rms_out: f32) {
    trace(
        PipelineStage::Suppressed,
        &format!(
            "frame={} rms_in={:.4} rms_out={:.4}",
            frame_index, rms_in, rms_out
        ),
    );
}

/// Trace per-frame feature extraction
pub fn trace_features(frame_index: usize, f0: f32, centroid: f32, rms: f32) {
    trace(
        PipelineStage::FeaturesExtracted,
        &format!(
            "frame={} f0={:.1}Hz centroid={:.1}Hz rms={:.4}",
            frame_index, f0, centroid, rms
        ),
    );
}

/// Trace the aggregated window result
pub fn trace_aggregated(frames: usize, voiced: usize, confidence: f32) {
    trace(
        PipelineStage::Aggregated,
        &format!(
            "frames={} voiced={} confidence={:.3}",
            frames, voiced, confidence
        ),
    );
}

/// Trace a result broadcast by the session
pub fn trace_result_sent(window_index: u64, receivers: usize) {
    trace(
        PipelineStage::ResultSent,
        &format!("window={} receivers={}", window_index, receivers),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_disable() {
        enable();
        assert!(is_enabled());
        trace(PipelineStage::NoiseFloor, "estimate=0.001");
        disable();
        assert!(!is_enabled());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::BufferReceived.as_str(), "BUF_RX");
        assert_eq!(PipelineStage::FeaturesExtracted.as_str(), "FEATURES");
        assert_eq!(PipelineStage::ResultSent.as_str(), "RESULT_TX");
    }
}
