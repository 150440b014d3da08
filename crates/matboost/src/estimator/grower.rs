//! Depth-wise tree growing on binned features.
//!
//! Each node builds one gradient histogram per candidate feature (in
//! parallel when allowed), scans it left to right and keeps the best valid
//! split. Missing values are tried on both sides when a node has any.

use super::binning::{BinnedMatrix, MISSING_BIN};
use super::gain::GainParams;
use super::objective::GradPair;
use super::sampling::ColumnSampler;
use super::tree::{NodeId, Tree, TreeNode};
use crate::utils::Parallelism;

/// Splits must improve the objective by more than this.
const MIN_SPLIT_GAIN: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
struct SplitCandidate {
    feature: u32,
    bin: u32,
    gain: f64,
    default_left: bool,
}

/// Grows one tree for one output.
#[derive(Debug, Clone)]
pub struct TreeGrower<'a> {
    binned: &'a BinnedMatrix,
    gain: &'a GainParams,
    max_depth: u32,
    parallelism: Parallelism,
}

impl<'a> TreeGrower<'a> {
    pub fn new(binned: &'a BinnedMatrix, gain: &'a GainParams, max_depth: u32, parallelism: Parallelism) -> Self {
        Self { binned, gain, max_depth, parallelism }
    }

    /// Grow a tree on `rows` using the gradients of one output.
    ///
    /// `grads` is indexed by row of the binned matrix.
    pub fn grow(&self, grads: &[GradPair], rows: Vec<u32>, columns: &ColumnSampler) -> Tree {
        let mut nodes = Vec::new();
        self.grow_node(grads, rows, 0, columns, &mut nodes);
        Tree::new(nodes)
    }

    fn grow_node(
        &self,
        grads: &[GradPair],
        rows: Vec<u32>,
        depth: u32,
        columns: &ColumnSampler,
        nodes: &mut Vec<TreeNode>,
    ) -> NodeId {
        let id = nodes.len() as NodeId;
        let total = rows.iter().fold(GradPair::default(), |acc, &r| acc + grads[r as usize]);
        nodes.push(TreeNode::leaf(self.gain.compute_leaf_weight(total.grad, total.hess)));

        if depth >= self.max_depth || rows.len() < 2 {
            return id;
        }
        let features = columns.level_features(depth);
        let Some(best) = self.find_best_split(grads, &rows, total, features) else {
            return id;
        };

        let bins = self.binned.feature_bins(best.feature as usize);
        let (left_rows, right_rows): (Vec<u32>, Vec<u32>) = rows.into_iter().partition(|&r| {
            let bin = bins[r as usize];
            if bin == MISSING_BIN { best.default_left } else { bin <= best.bin }
        });

        let threshold = self.binned.cuts(best.feature as usize)[best.bin as usize];
        let left = self.grow_node(grads, left_rows, depth + 1, columns, nodes);
        let right = self.grow_node(grads, right_rows, depth + 1, columns, nodes);

        let mut node = TreeNode::split(best.feature, best.bin, threshold, best.default_left);
        node.left = left;
        node.right = right;
        nodes[id as usize] = node;
        id
    }

    fn find_best_split(
        &self,
        grads: &[GradPair],
        rows: &[u32],
        total: GradPair,
        features: Vec<u32>,
    ) -> Option<SplitCandidate> {
        self.parallelism
            .maybe_par_map(features, |f| self.best_split_for_feature(f, grads, rows, total))
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, c| match best {
                Some(b) if b.gain >= c.gain => Some(b),
                _ => Some(c),
            })
    }

    fn best_split_for_feature(
        &self,
        feature: u32,
        grads: &[GradPair],
        rows: &[u32],
        total: GradPair,
    ) -> Option<SplitCandidate> {
        let n_bins = self.binned.n_bins(feature as usize);
        if n_bins < 2 {
            return None;
        }
        let bins = self.binned.feature_bins(feature as usize);

        let mut hist = vec![GradPair::default(); n_bins];
        let mut missing = GradPair::default();
        let mut n_missing = 0usize;
        for &r in rows {
            let g = grads[r as usize];
            match bins[r as usize] {
                MISSING_BIN => {
                    missing += g;
                    n_missing += 1;
                }
                b => hist[b as usize] += g,
            }
        }

        let directions: &[bool] = if n_missing > 0 { &[true, false] } else { &[false] };
        let mut best: Option<SplitCandidate> = None;
        let mut left = GradPair::default();
        for (bin, &bucket) in hist.iter().enumerate().take(n_bins - 1) {
            left += bucket;
            for &default_left in directions {
                let l = if default_left { left + missing } else { left };
                let r = total - l;
                if !self.gain.is_valid_split(l.hess, r.hess) {
                    continue;
                }
                let gain = self.gain.compute_gain(l.grad, l.hess, r.grad, r.hess, total.grad, total.hess);
                if best.is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin: bin as u32, gain, default_left });
                }
            }
        }
        best.filter(|c| c.gain > MIN_SPLIT_GAIN)
    }
}
