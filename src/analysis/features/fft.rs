// FFT module - Fast Fourier Transform computation
//
// Magnitude spectra for feature extraction, plus a complex forward/inverse
// pair for the frequency-domain stages of noise suppression (spectral
// subtraction resynthesis, band-pass mask). Windowing is the caller's job:
// frames arrive here already tapered.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::AnalysisError;

/// Smallest frame length accepted for magnitude spectra
pub const MIN_FFT_SIZE: usize = 32;
/// Largest frame length accepted for magnitude spectra
pub const MAX_FFT_SIZE: usize = 32768;

/// Whether `len` is a power of two inside the supported range
pub fn is_supported_size(len: usize) -> bool {
    len.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&len)
}

/// Magnitude spectrum of one frame
///
/// Holds `fft_size / 2` bins: DC through the bin just below Nyquist.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    magnitudes: Vec<f32>,
    sample_rate: u32,
    fft_size: usize,
}

impl Spectrum {
    pub fn new(magnitudes: Vec<f32>, sample_rate: u32, fft_size: usize) -> Self {
        Self {
            magnitudes,
            sample_rate,
            fft_size,
        }
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Width of one bin in Hz
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    /// Center frequency of `bin` in Hz
    pub fn frequency_of(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_width()
    }

    /// Nearest bin to `frequency_hz`, if it lies inside the spectrum
    pub fn bin_of(&self, frequency_hz: f32) -> Option<usize> {
        if !frequency_hz.is_finite() || frequency_hz < 0.0 {
            return None;
        }
        let bin = (frequency_hz / self.bin_width()).round() as usize;
        (bin < self.magnitudes.len()).then_some(bin)
    }
}

/// FFT processor shared by feature extraction and noise suppression
pub struct FftProcessor {
    fft_planner: Mutex<FftPlanner<f32>>,
    sample_rate: u32,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate used to label spectrum bins
    pub fn new(sample_rate: u32) -> Self {
        Self {
            fft_planner: Mutex::new(FftPlanner::new()),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn plan(&self, len: usize, inverse: bool) -> Arc<dyn Fft<f32>> {
        // The planner only caches plans, so a poisoned lock is still usable
        let mut planner = self
            .fft_planner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if inverse {
            planner.plan_fft_inverse(len)
        } else {
            planner.plan_fft_forward(len)
        }
    }

    /// Compute the magnitude spectrum of an already windowed frame
    ///
    /// # Returns
    /// Spectrum of `frame.len() / 2` bins holding `sqrt(re² + im²)`
    ///
    /// # Errors
    /// `InvalidFrameLength` unless the frame length is a supported power of two
    pub fn magnitude_spectrum(&self, frame: &[f32]) -> Result<Spectrum, AnalysisError> {
        let fft_size = frame.len();
        if !is_supported_size(fft_size) {
            return Err(AnalysisError::InvalidFrameLength { length: fft_size });
        }

        let bins = self.forward(frame);
        let magnitudes = bins[..fft_size / 2].iter().map(|c| c.norm()).collect();
        Ok(Spectrum::new(magnitudes, self.sample_rate, fft_size))
    }

    /// Forward transform of real samples (any length)
    pub fn forward(&self, samples: &[f32]) -> Vec<Complex<f32>> {
        let mut buffer: Vec<Complex<f32>> =
            samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
        if !buffer.is_empty() {
            self.plan(buffer.len(), false).process(&mut buffer);
        }
        buffer
    }

    /// Inverse transform back to real samples, normalized by 1/N
    pub fn inverse(&self, mut bins: Vec<Complex<f32>>) -> Vec<f32> {
        if bins.is_empty() {
            return Vec::new();
        }
        let len = bins.len();
        self.plan(len, true).process(&mut bins);
        let scale = 1.0 / len as f32;
        bins.iter().map(|c| c.re * scale).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(sample_rate: u32, frequency: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_spectrum_length_is_half_window() {
        let processor = FftProcessor::new(16000);
        for size in [32usize, 64, 256, 1024, 2048, 4096] {
            let spectrum = processor.magnitude_spectrum(&vec![0.25; size]).unwrap();
            assert_eq!(spectrum.len(), size / 2);
            assert_eq!(spectrum.fft_size(), size);
        }
    }

    #[test]
    fn test_unsupported_sizes_rejected() {
        let processor = FftProcessor::new(16000);
        for size in [0usize, 16, 1000, 2047, 65536] {
            assert_eq!(
                processor.magnitude_spectrum(&vec![0.0; size]),
                Err(AnalysisError::InvalidFrameLength { length: size })
            );
        }
    }

    #[test]
    fn test_magnitudes_non_negative_and_peak_at_tone() {
        let processor = FftProcessor::new(16000);
        // 500 Hz sits exactly on bin 64 for a 2048-point FFT at 16 kHz
        let spectrum = processor
            .magnitude_spectrum(&sine(16000, 500.0, 2048))
            .unwrap();
        assert!(spectrum.magnitudes().iter().all(|&m| m >= 0.0));

        let (peak, _) = spectrum
            .magnitudes()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(peak, 64);
        assert_eq!(spectrum.bin_of(500.0), Some(64));
        assert!((spectrum.frequency_of(64) - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_dc_bin_included() {
        let processor = FftProcessor::new(8000);
        let spectrum = processor.magnitude_spectrum(&vec![1.0; 64]).unwrap();
        assert!((spectrum.magnitudes()[0] - 64.0).abs() < 1e-3);
    }

    #[test]
    fn test_forward_inverse_restores_signal() {
        let processor = FftProcessor::new(16000);
        let signal = sine(16000, 440.0, 300);
        let restored = processor.inverse(processor.forward(&signal));
        for (a, b) in signal.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
