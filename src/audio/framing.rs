// Framing module - overlapping fixed-size frames with windowing
//
// Slices a continuous buffer into frames of exactly `window_size` samples,
// each starting `hop_size` samples after the previous one. Frames are produced
// lazily; the final frame is zero-padded so no input sample is dropped.

use crate::config::validate_framing;
use crate::error::AnalysisError;

/// Window functions applied before spectral analysis to reduce leakage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowFunction {
    #[default]
    Hann,
    Hamming,
    Rectangular,
}

impl WindowFunction {
    /// Pre-compute window coefficients of the given length
    pub fn coefficients(&self, len: usize) -> Vec<f32> {
        if len < 2 {
            return vec![1.0; len];
        }
        let denom = len as f32 - 1.0;
        (0..len)
            .map(|i| {
                let phase = (2.0 * std::f32::consts::PI * i as f32) / denom;
                match self {
                    WindowFunction::Hann => 0.5 * (1.0 - phase.cos()),
                    WindowFunction::Hamming => 0.54 - 0.46 * phase.cos(),
                    WindowFunction::Rectangular => 1.0,
                }
            })
            .collect()
    }

    /// Multiply samples by the window in place
    pub fn apply(&self, samples: &mut [f32]) {
        if *self == WindowFunction::Rectangular {
            return;
        }
        let coefficients = self.coefficients(samples.len());
        for (sample, w) in samples.iter_mut().zip(coefficients) {
            *sample *= w;
        }
    }
}

/// One frame of a buffer, always exactly `window_size` samples long
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position of the frame in the sequence
    pub index: usize,
    /// Offset of the first sample in the source buffer
    pub offset: usize,
    /// Number of real samples; the remainder is zero padding
    pub valid_len: usize,
    pub samples: Vec<f32>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_padded(&self) -> bool {
        self.valid_len < self.samples.len()
    }

    /// Apply a window function to this frame's samples in place
    pub fn apply_window(&mut self, window: WindowFunction) {
        window.apply(&mut self.samples);
    }
}

/// Produces overlapping frames from a sample buffer
#[derive(Debug, Clone)]
pub struct Framer {
    window_size: usize,
    hop_size: usize,
    window: WindowFunction,
    coefficients: Vec<f32>,
}

impl Framer {
    /// Create a framer yielding un-windowed (rectangular) frames
    ///
    /// # Errors
    /// `InvalidConfiguration` if `window_size == 0`, `hop_size == 0` or `hop_size > window_size`
    pub fn new(window_size: usize, hop_size: usize) -> Result<Self, AnalysisError> {
        Self::with_window(window_size, hop_size, WindowFunction::Rectangular)
    }

    /// Create a framer that applies `window` to every frame it yields
    pub fn with_window(
        window_size: usize,
        hop_size: usize,
        window: WindowFunction,
    ) -> Result<Self, AnalysisError> {
        validate_framing(window_size, hop_size)?;
        Ok(Self {
            window_size,
            hop_size,
            window,
            coefficients: window.coefficients(window_size),
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of frames `frames()` yields for a buffer of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else if len <= self.window_size {
            1
        } else {
            (len - self.window_size).div_ceil(self.hop_size) + 1
        }
    }

    /// Lazily iterate over the frames of `buffer`
    pub fn frames<'a>(&'a self, buffer: &'a [f32]) -> Frames<'a> {
        Frames {
            framer: self,
            buffer,
            next_index: 0,
            done: buffer.is_empty(),
        }
    }

    fn build_frame(&self, buffer: &[f32], index: usize) -> Frame {
        let offset = index * self.hop_size;
        let end = (offset + self.window_size).min(buffer.len());
        let valid_len = end - offset;

        let mut samples = Vec::with_capacity(self.window_size);
        samples.extend_from_slice(&buffer[offset..end]);
        samples.resize(self.window_size, 0.0);

        if self.window != WindowFunction::Rectangular {
            for (sample, w) in samples.iter_mut().zip(self.coefficients.iter()) {
                *sample *= w;
            }
        }

        Frame {
            index,
            offset,
            valid_len,
            samples,
        }
    }
}

/// Lazy frame iterator returned by [`Framer::frames`]
pub struct Frames<'a> {
    framer: &'a Framer,
    buffer: &'a [f32],
    next_index: usize,
    done: bool,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.done {
            return None;
        }

        let index = self.next_index;
        let offset = index * self.framer.hop_size;
        if offset >= self.buffer.len() {
            self.done = true;
            return None;
        }

        // The frame reaching (or passing) the end of the buffer is the last one
        if offset + self.framer.window_size >= self.buffer.len() {
            self.done = true;
        } else {
            self.next_index += 1;
        }

        Some(self.framer.build_frame(self.buffer, index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.done {
            0
        } else {
            self.framer
                .frame_count(self.buffer.len())
                .saturating_sub(self.next_index)
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames<'_> {}
