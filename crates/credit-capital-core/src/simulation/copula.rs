//! Correlated obligor shocks.
//!
//! Paths are cut into fixed blocks of [`BLOCK_SIZE`]. Block `b` draws from a
//! ChaCha20 stream seeded with the run seed and stream id `b`, so the numbers
//! a path sees depend only on the seed and its index, never on how blocks are
//! spread over threads. Within a path the systematic factor X is drawn first,
//! then one ε per obligor in obligor order.

use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use statrs::distribution::Normal;
use std::ops::Range;

use crate::distribution::standard_normal;
use crate::CreditCapitalResult;

/// Paths per random stream.
pub const BLOCK_SIZE: usize = 4_096;

/// Draws correlated standard-normal shocks for a fixed set of factor weights.
#[derive(Debug, Clone)]
pub struct ShockGenerator {
    seed: u64,
    normal: Normal,
    /// (systematic, idiosyncratic) weight per obligor
    weights: Vec<(f64, f64)>,
}

impl ShockGenerator {
    pub fn new(seed: u64, weights: Vec<(f64, f64)>) -> CreditCapitalResult<Self> {
        Ok(ShockGenerator {
            seed,
            normal: standard_normal()?,
            weights,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn num_obligors(&self) -> usize {
        self.weights.len()
    }

    /// Independent stream for block `block`.
    pub fn block_rng(&self, block: usize) -> ChaCha20Rng {
        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
        rng.set_stream(block as u64);
        rng
    }

    /// Fill `shocks` with one path's Z_i = a_i·X + b_i·ε_i. Returns X.
    pub fn draw_path<R: Rng>(&self, rng: &mut R, shocks: &mut [f64]) -> f64 {
        let x: f64 = rng.sample(&self.normal);
        for (z, &(a, b)) in shocks.iter_mut().zip(&self.weights) {
            let eps: f64 = rng.sample(&self.normal);
            *z = a * x + b * eps;
        }
        x
    }

    /// Shocks for paths `0..num_paths`, path-major (`[path * obligors + i]`).
    pub fn sample(&self, num_paths: usize) -> Vec<f64> {
        let n = self.num_obligors();
        let mut out = vec![0.0; num_paths * n];
        for (block, range) in block_ranges(num_paths).into_iter().enumerate() {
            let mut rng = self.block_rng(block);
            for path in range {
                self.draw_path(&mut rng, &mut out[path * n..(path + 1) * n]);
            }
        }
        out
    }
}

/// Path ranges of every block, in order.
pub fn block_ranges(num_paths: usize) -> Vec<Range<usize>> {
    (0..num_paths)
        .step_by(BLOCK_SIZE)
        .map(|start| start..(start + BLOCK_SIZE).min(num_paths))
        .collect()
}

/// The configured seed, or a fresh one from OS entropy.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| OsRng.next_u64())
}
