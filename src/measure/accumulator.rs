use serde::{Deserialize, Serialize};

/// Scalar-observable estimator using the blocking method.
///
/// Consecutive measurements are grouped into blocks to suppress
/// autocorrelation when estimating the error of the mean. When all blocks
/// fill up, neighboring blocks are merged pairwise and the block depth
/// doubles, so the accumulator handles runs of any length in fixed
/// memory. The full state is serializable so a checkpointed run resumes
/// with identical statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Accumulator {
    total_inputs: u64,
    block_depth: u64,
    active_block: usize,
    block_filling: u64,
    blocks: Vec<f64>,
    blocks_sq: Vec<f64>,
}

impl Accumulator {
    /// Creates an accumulator with `n_blocks` blocks, initially holding
    /// one measurement each.
    ///
    /// # Panics
    /// Panics if `n_blocks` is not a power of 2.
    pub fn new(n_blocks: usize) -> Self {
        assert!(
            n_blocks.is_power_of_two(),
            "block count must be a power of 2, got {}",
            n_blocks
        );
        Self {
            total_inputs: 0,
            block_depth: 1,
            active_block: 0,
            block_filling: 0,
            blocks: vec![0.0; n_blocks],
            blocks_sq: vec![0.0; n_blocks],
        }
    }

    /// Total number of measurements added.
    pub fn size(&self) -> u64 {
        self.total_inputs
    }

    /// Adds a measurement, merging blocks when they all filled up.
    pub fn add(&mut self, val: f64) {
        let n_blocks = self.blocks.len();
        let n_blocks_half = n_blocks / 2;

        self.blocks[self.active_block] += val;
        self.blocks_sq[self.active_block] += val * val;
        self.total_inputs += 1;
        self.block_filling += 1;

        if self.block_filling == self.block_depth {
            self.block_filling = 0;
            self.active_block += 1;

            if self.active_block == n_blocks {
                self.active_block = n_blocks_half;
                self.block_depth *= 2;
                for i in 0..n_blocks_half {
                    self.blocks[i] = self.blocks[2 * i] + self.blocks[2 * i + 1];
                    self.blocks_sq[i] = self.blocks_sq[2 * i] + self.blocks_sq[2 * i + 1];
                }
                for i in n_blocks_half..n_blocks {
                    self.blocks[i] = 0.0;
                    self.blocks_sq[i] = 0.0;
                }
            }
        }
    }

    /// Mean, error of the mean, autocorrelation time and standard
    /// deviation of the added measurements. `None` before the first
    /// measurement.
    pub fn statistics(&self) -> Option<(f64, f64, f64, f64)> {
        if self.total_inputs == 0 {
            return None;
        }

        let mean = self.blocks.iter().take(self.active_block + 1).sum::<f64>()
            / self.total_inputs as f64;
        let variance = -mean * mean
            + self
                .blocks_sq
                .iter()
                .take(self.active_block + 1)
                .sum::<f64>()
                / self.total_inputs as f64;

        let mut error_square = 0.0;
        for block_sum in self.blocks.iter().take(self.active_block) {
            let block_mean = block_sum / self.block_depth as f64;
            let diff = block_mean - mean;
            error_square += diff * diff;
        }
        let filled_weight = self.block_depth as f64 / self.total_inputs as f64;
        error_square *= filled_weight * filled_weight;
        if self.block_filling > 0 {
            let active_mean = self.blocks[self.active_block] / self.block_filling as f64;
            let weight_last = self.block_filling as f64 / self.total_inputs as f64;
            let diff_last = weight_last * (active_mean - mean);
            error_square += diff_last * diff_last;
        }

        let autocorr_time = self.total_inputs as f64 * error_square / variance;

        Some((mean, error_square.sqrt(), autocorr_time, variance.sqrt()))
    }

    /// Drops all measurements, restoring the initial state.
    pub fn clear(&mut self) {
        self.total_inputs = 0;
        self.block_depth = 1;
        self.active_block = 0;
        self.block_filling = 0;
        self.blocks.fill(0.0);
        self.blocks_sq.fill(0.0);
    }
}
