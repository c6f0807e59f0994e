//! Layer assignment for new nodes.
//!
//! Levels follow the geometric distribution `floor(-ln(u) * (1 / ln(m)))`,
//! capped by the configured maximum. Each rayon worker owns a seeded RNG
//! derived from the base seed with SplitMix64 so parallel builds never share
//! generator state; callers outside the pool fall back to a shared generator.

use std::sync::Mutex;

use rand::{Rng, SeedableRng, distributions::Standard, rngs::SmallRng};
use rayon::{current_num_threads, current_thread_index};

use crate::error::{IndexError, Result};

/// SplitMix64 increment (the 64-bit golden ratio) used for per-worker seed
/// derivation.
const WORKER_SEED_SPACING: u64 = 0x9E37_79B9_7F4A_7C15;
const SPLITMIX_MULT_A: u64 = 0xBF58_476D_1CE4_E5B9;
const SPLITMIX_MULT_B: u64 = 0x94D0_49BB_1331_11EB;

/// Smallest uniform draw fed into the logarithm, keeping levels finite.
const MIN_DRAW: f64 = 1e-12;

#[inline]
pub(crate) fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(WORKER_SEED_SPACING);
    state = (state ^ (state >> 30)).wrapping_mul(SPLITMIX_MULT_A);
    state = (state ^ (state >> 27)).wrapping_mul(SPLITMIX_MULT_B);
    state ^ (state >> 31)
}

#[inline]
fn mix_worker_seed(base_seed: u64, worker_index: usize) -> u64 {
    splitmix64(base_seed ^ ((worker_index as u64 + 1).wrapping_mul(WORKER_SEED_SPACING)))
}

#[derive(Debug)]
pub(crate) struct LevelSampler {
    multiplier: f64,
    max_level: usize,
    fallback: Mutex<SmallRng>,
    workers: Vec<Mutex<SmallRng>>,
}

impl LevelSampler {
    pub(crate) fn new(m: usize, max_level: usize, base_seed: u64) -> Self {
        let multiplier = level_multiplier(m);
        let workers = (0..current_num_threads())
            .map(|idx| Mutex::new(SmallRng::seed_from_u64(mix_worker_seed(base_seed, idx))))
            .collect();
        Self {
            multiplier,
            max_level,
            fallback: Mutex::new(SmallRng::seed_from_u64(base_seed)),
            workers,
        }
    }

    /// Samples a layer using the calling worker's generator, or the fallback
    /// generator when called outside the thread pool.
    pub(crate) fn sample(&self) -> Result<usize> {
        if let Some(index) = current_thread_index() {
            if let Some(rng) = self.workers.get(index) {
                let mut guard = rng.lock().map_err(|_| IndexError::LockPoisoned {
                    resource: "worker rng",
                })?;
                return Ok(self.sample_from(&mut guard));
            }
        }
        let mut rng = self.fallback.lock().map_err(|_| IndexError::LockPoisoned {
            resource: "level rng",
        })?;
        Ok(self.sample_from(&mut rng))
    }

    pub(crate) fn sample_from(&self, rng: &mut SmallRng) -> usize {
        let draw: f64 = rng.sample(Standard);
        let draw = draw.clamp(MIN_DRAW, 1.0 - f64::EPSILON);
        let level = (-draw.ln() * self.multiplier).floor();
        if level >= self.max_level as f64 {
            self.max_level
        } else {
            level as usize
        }
    }
}

/// `1 / ln(m)`; falls back to `1.0` for `m == 1` where the logarithm is zero.
fn level_multiplier(m: usize) -> f64 {
    let ln_m = (m as f64).ln();
    if ln_m > 0.0 { ln_m.recip() } else { 1.0 }
}
