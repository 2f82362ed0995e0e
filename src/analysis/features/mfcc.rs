// MFCC module - Mel-frequency cepstral coefficients
//
// Triangular mel-spaced filters are applied to the power spectrum, the band
// energies are log-compressed and decorrelated with an orthonormal DCT-II.
// Filter weights are computed once per (sample rate, FFT size) pair.

use super::fft::Spectrum;

/// Added to band energies before the log so empty bands stay finite
const LOG_FLOOR: f32 = 1e-10;

/// Hz to mel scale conversion
#[inline]
pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Mel to Hz conversion
#[inline]
pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// One triangular filter: first bin and the weights from there on
struct MelFilter {
    start_bin: usize,
    weights: Vec<f32>,
}

/// Mel filterbank plus DCT for MFCC extraction
pub struct MelFilterbank {
    filters: Vec<MelFilter>,
    fft_size: usize,
}

impl MelFilterbank {
    /// Build a filterbank for the given spectrum layout
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `fft_size` - FFT size the spectra were computed with
    /// * `num_filters` - Number of triangular filters
    /// * `low_hz` / `high_hz` - Filterbank edges; `high_hz` is clamped to Nyquist
    pub fn new(
        sample_rate: u32,
        fft_size: usize,
        num_filters: usize,
        low_hz: f32,
        high_hz: f32,
    ) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        let mel_low = hz_to_mel(low_hz.max(0.0));
        let mel_high = hz_to_mel(high_hz.min(nyquist));
        let bin_hz = sample_rate as f32 / fft_size as f32;
        let num_bins = fft_size / 2;

        // num_filters + 2 equally spaced mel points; each filter spans three
        let step = (mel_high - mel_low) / (num_filters + 1) as f32;
        let edges_hz: Vec<f32> = (0..num_filters + 2)
            .map(|i| mel_to_hz(mel_low + step * i as f32))
            .collect();

        let filters = edges_hz
            .windows(3)
            .map(|edge| {
                let (start_hz, center_hz, end_hz) = (edge[0], edge[1], edge[2]);
                let start_bin = (start_hz / bin_hz).ceil() as usize;
                let end_bin = ((end_hz / bin_hz).floor() as usize).min(num_bins.saturating_sub(1));

                let weights = (start_bin..=end_bin)
                    .map(|bin| {
                        let freq = bin as f32 * bin_hz;
                        let weight = if freq <= center_hz {
                            (freq - start_hz) / (center_hz - start_hz)
                        } else {
                            (end_hz - freq) / (end_hz - center_hz)
                        };
                        weight.clamp(0.0, 1.0)
                    })
                    .collect();

                MelFilter { start_bin, weights }
            })
            .collect();

        Self { filters, fft_size }
    }

    pub fn num_filters(&self) -> usize {
        self.filters.len()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Log mel band energies of a magnitude spectrum
    pub fn log_energies(&self, spectrum: &Spectrum) -> Vec<f32> {
        let magnitudes = spectrum.magnitudes();
        self.filters
            .iter()
            .map(|filter| {
                let energy: f32 = filter
                    .weights
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &w)| magnitudes.get(filter.start_bin + i).map(|&m| m * m * w))
                    .sum();
                (energy + LOG_FLOOR).ln()
            })
            .collect()
    }

    /// Compute the first `num_coefficients` MFCCs of a magnitude spectrum
    ///
    /// # Returns
    /// Exactly `num_coefficients` values (zeros past the number of filters)
    pub fn compute(&self, spectrum: &Spectrum, num_coefficients: usize) -> Vec<f32> {
        let log_energies = self.log_energies(spectrum);
        let n = log_energies.len();
        if n == 0 {
            return vec![0.0; num_coefficients];
        }

        // Orthonormal DCT-II
        let n_f = n as f32;
        (0..num_coefficients)
            .map(|k| {
                if k >= n {
                    return 0.0;
                }
                let scale = if k == 0 {
                    (1.0 / n_f).sqrt()
                } else {
                    (2.0 / n_f).sqrt()
                };
                let sum: f32 = log_energies
                    .iter()
                    .enumerate()
                    .map(|(i, &e)| {
                        e * (std::f32::consts::PI * k as f32 * (i as f32 + 0.5) / n_f).cos()
                    })
                    .sum();
                scale * sum
            })
            .collect()
    }
}
