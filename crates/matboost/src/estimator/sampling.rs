//! Row and column sampling for tree growing.
//!
//! Both samplers draw without replacement through a partial Fisher-Yates
//! shuffle on a seeded `Xoshiro256PlusPlus`, so a tree's sample depends only
//! on its seed.

use rand::SeedableRng;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Golden-ratio increment used to derive per-level seeds.
const LEVEL_SEED_STEP: u64 = 0x9E37_79B9_7F4A_7C15;

// =============================================================================
// RowSampler
// =============================================================================

/// Draws `ceil(n * subsample)` rows for each tree.
#[derive(Debug, Clone, Copy)]
pub struct RowSampler {
    subsample: f64,
}

impl RowSampler {
    pub fn new(subsample: f64) -> Self {
        debug_assert!(subsample > 0.0 && subsample <= 1.0);
        Self { subsample }
    }

    pub fn is_enabled(&self) -> bool {
        self.subsample < 1.0
    }

    /// Sorted row indices of the sample.
    pub fn sample(&self, n_rows: usize, seed: u64) -> Vec<u32> {
        if !self.is_enabled() || n_rows == 0 {
            return (0..n_rows as u32).collect();
        }
        let sample_size = ((n_rows as f64 * self.subsample).ceil() as usize).clamp(1, n_rows);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        partial_shuffle_sorted((0..n_rows as u32).collect(), sample_size, &mut rng)
    }
}

// =============================================================================
// ColumnSampler
// =============================================================================

/// Samples features once per tree and again at each depth level.
///
/// Level samples are drawn from the tree sample, so the features seen at a
/// node are the intersection of both draws.
#[derive(Debug, Clone)]
pub struct ColumnSampler {
    n_features: u32,
    colsample_bytree: f64,
    colsample_bylevel: f64,
    tree_features: Vec<u32>,
    tree_seed: u64,
}

impl ColumnSampler {
    pub fn new(n_features: u32, colsample_bytree: f64, colsample_bylevel: f64) -> Self {
        Self {
            n_features,
            colsample_bytree,
            colsample_bylevel,
            tree_features: (0..n_features).collect(),
            tree_seed: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.colsample_bytree < 1.0 || self.colsample_bylevel < 1.0
    }

    /// Draw the features of a new tree.
    pub fn sample_for_tree(&mut self, seed: u64) {
        self.tree_seed = seed;
        let all: Vec<u32> = (0..self.n_features).collect();
        self.tree_features = if self.colsample_bytree >= 1.0 {
            all
        } else {
            let k = sample_size(all.len(), self.colsample_bytree);
            partial_shuffle_sorted(all, k, &mut Xoshiro256PlusPlus::seed_from_u64(seed))
        };
    }

    pub fn tree_features(&self) -> &[u32] {
        &self.tree_features
    }

    /// Features available at `depth` of the current tree.
    pub fn level_features(&self, depth: u32) -> Vec<u32> {
        if self.colsample_bylevel >= 1.0 {
            return self.tree_features.clone();
        }
        let level_seed = self
            .tree_seed
            .wrapping_add((depth as u64 + 1).wrapping_mul(LEVEL_SEED_STEP));
        let k = sample_size(self.tree_features.len(), self.colsample_bylevel);
        partial_shuffle_sorted(
            self.tree_features.clone(),
            k,
            &mut Xoshiro256PlusPlus::seed_from_u64(level_seed),
        )
    }
}

fn sample_size(n: usize, rate: f64) -> usize {
    if n == 0 {
        return 0;
    }
    ((n as f64 * rate).ceil() as usize).clamp(1, n)
}

/// Keep `k` random items of `items`, returned sorted.
fn partial_shuffle_sorted(mut items: Vec<u32>, k: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<u32> {
    let n = items.len();
    for i in 0..k.min(n) {
        let j = rng.gen_range(i..n);
        items.swap(i, j);
    }
    items.truncate(k.min(n));
    items.sort_unstable();
    items
}
