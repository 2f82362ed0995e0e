// Audio module - sample buffers, framing and buffer transport
//
// AudioBuffer is the immutable input of one pipeline invocation. Framing
// slices it into fixed-size overlapping frames; the buffer pool moves raw
// sample blocks from the capture side to a monitoring session worker.

pub mod buffer_pool;
pub mod framing;

use crate::error::AnalysisError;

// Re-export commonly used types for convenience
pub use buffer_pool::{BufferPool, BufferPoolChannels, PooledBuffer, DEFAULT_BUFFER_SIZE};
pub use framing::{Frame, Framer, Frames, WindowFunction};

/// Normalized mono samples at a known sample rate
///
/// Samples are expected in [-1.0, 1.0]. Non-finite samples are rejected at
/// construction so every downstream stage can assume finite input.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Box<[f32]>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap captured samples
    ///
    /// # Errors
    /// `InvalidConfiguration` if the sample rate is zero or a sample is NaN/infinite
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::invalid_config("sample_rate must be > 0"));
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(AnalysisError::invalid_config(format!(
                "sample {} is not finite",
                index
            )));
        }
        Ok(Self {
            samples: samples.into_boxed_slice(),
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}
