// NoiseProfile - rolling estimate of the background noise
//
// Holds a broadband floor (linear amplitude, never negative) and, once quiet
// frames have been observed, a per-bin noise magnitude spectrum. One profile
// lives for one monitoring session and is shared between the threads that
// analyze its windows.

use std::sync::{Arc, RwLock};

use crate::error::AnalysisError;

/// Lowest level reported in dB; anything quieter is clamped here
pub const MIN_DB: f32 = -120.0;

/// Convert dBFS to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to dBFS, clamped at [`MIN_DB`]
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if !linear.is_finite() || linear <= db_to_linear(MIN_DB) {
        MIN_DB
    } else {
        (20.0 * linear.log10()).max(MIN_DB)
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Background noise estimate for one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoiseProfile {
    floor_linear: f32,
    noise_spectrum: Option<Vec<f32>>,
    floor_updates: u64,
    spectrum_updates: u64,
}

impl NoiseProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadband floor as linear amplitude (>= 0)
    pub fn floor_linear(&self) -> f32 {
        self.floor_linear
    }

    /// Broadband floor in dBFS
    pub fn floor_db(&self) -> f32 {
        linear_to_db(self.floor_linear)
    }

    /// Whether any floor estimate has been folded in yet
    pub fn has_floor(&self) -> bool {
        self.floor_updates > 0
    }

    /// Per-bin noise magnitudes (bins 0..=N/2 of the frame FFT)
    pub fn noise_spectrum(&self) -> Option<&[f32]> {
        self.noise_spectrum.as_deref()
    }

    pub fn floor_updates(&self) -> u64 {
        self.floor_updates
    }

    pub fn spectrum_updates(&self) -> u64 {
        self.spectrum_updates
    }

    /// Fold a new floor estimate into the profile
    ///
    /// The first estimate seeds the floor. Later ones are blended as
    /// `smoothing × previous + (1 - smoothing) × estimate`, so a run of
    /// louder estimates never lowers the floor.
    ///
    /// # Returns
    /// The updated floor (linear)
    pub fn update_floor(&mut self, estimate: f32, smoothing: f32) -> f32 {
        let estimate = sanitize(estimate);
        self.floor_linear = if self.floor_updates == 0 {
            estimate
        } else {
            sanitize(smoothing * self.floor_linear + (1.0 - smoothing) * estimate)
        };
        self.floor_updates += 1;
        self.floor_linear
    }

    /// Fold the magnitudes of a quiet frame into the noise spectrum
    ///
    /// A length change (different frame size) reseeds the spectrum.
    pub fn update_spectrum(&mut self, magnitudes: &[f32], smoothing: f32) {
        match self.noise_spectrum.as_mut() {
            Some(current) if current.len() == magnitudes.len() => {
                for (noise, &observed) in current.iter_mut().zip(magnitudes) {
                    *noise = sanitize(smoothing * *noise + (1.0 - smoothing) * sanitize(observed));
                }
            }
            _ => {
                self.noise_spectrum = Some(magnitudes.iter().map(|&m| sanitize(m)).collect());
            }
        }
        self.spectrum_updates += 1;
    }

    /// Forget everything; used when a new monitoring session starts
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// NoiseProfile shared across analysis threads
///
/// Readers may observe a slightly stale floor; noise changes slowly compared
/// with a frame, so that is acceptable. Lock poisoning is reported as
/// `AnalysisError::LockPoisoned`.
#[derive(Debug, Clone, Default)]
pub struct SharedNoiseProfile {
    inner: Arc<RwLock<NoiseProfile>>,
}

impl SharedNoiseProfile {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> AnalysisError {
        AnalysisError::LockPoisoned {
            component: "NoiseProfile".to_string(),
        }
    }

    /// Run `f` with shared access
    pub fn read<R>(&self, f: impl FnOnce(&NoiseProfile) -> R) -> Result<R, AnalysisError> {
        let guard = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(f(&guard))
    }

    /// Run `f` with exclusive access
    pub fn update<R>(&self, f: impl FnOnce(&mut NoiseProfile) -> R) -> Result<R, AnalysisError> {
        let mut guard = self.inner.write().map_err(|_| Self::poisoned())?;
        Ok(f(&mut guard))
    }

    /// Copy of the current profile
    pub fn snapshot(&self) -> Result<NoiseProfile, AnalysisError> {
        self.read(NoiseProfile::clone)
    }

    pub fn reset(&self) -> Result<(), AnalysisError> {
        self.update(NoiseProfile::reset)
    }
}
