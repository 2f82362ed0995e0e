// Adaptive gate - hysteresis gate driven by a block-RMS envelope
//
// The envelope is the RMS of consecutive blocks of `block_size` samples. The
// gate opens when a block rises above `floor × open_factor` and only closes
// again once a block drops below `floor × close_factor`. Blocks that fall
// between the two thresholds keep the previous state, which stops the gate
// chattering on a level hovering at the threshold.

use crate::config::NoiseSuppressionConfig;

/// Hysteresis gate parameters
#[derive(Debug, Clone)]
pub struct AdaptiveGate {
    open_factor: f32,
    close_factor: f32,
    attenuation: f32,
    block_size: usize,
}

impl AdaptiveGate {
    pub fn new(config: &NoiseSuppressionConfig) -> Self {
        Self {
            open_factor: config.gate_open_factor,
            close_factor: config.gate_close_factor,
            attenuation: config.gate_attenuation,
            block_size: config.gate_block_size.max(1),
        }
    }

    pub fn open_threshold(&self, noise_floor: f32) -> f32 {
        noise_floor * self.open_factor
    }

    pub fn close_threshold(&self, noise_floor: f32) -> f32 {
        noise_floor * self.close_factor
    }

    /// Gate a frame in place
    ///
    /// The gate starts closed at every frame, so leading blocks between the two
    /// thresholds are attenuated.
    ///
    /// # Returns
    /// Number of blocks that were attenuated
    pub fn apply(&self, frame: &mut [f32], noise_floor: f32) -> usize {
        let open_threshold = self.open_threshold(noise_floor);
        let close_threshold = self.close_threshold(noise_floor);

        let mut is_open = false;
        let mut closed_blocks = 0;
        for block in frame.chunks_mut(self.block_size) {
            let rms = (block.iter().map(|&x| x * x).sum::<f32>() / block.len() as f32).sqrt();

            if !is_open && rms > open_threshold {
                is_open = true;
            } else if is_open && rms < close_threshold {
                is_open = false;
            }

            if !is_open {
                closed_blocks += 1;
                for sample in block.iter_mut() {
                    *sample *= self.attenuation;
                }
            }
        }
        closed_blocks
    }
}
