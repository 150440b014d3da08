//! Feature quantization for split finding.
//!
//! Each feature gets an increasing list of cut points whose last entry is
//! `+inf`; a value falls into the first bin whose cut is strictly greater
//! than it. Splitting after bin `b` therefore means `value < cuts[b]` goes
//! left, which is exactly the threshold stored in the tree. `NaN` values get
//! [`MISSING_BIN`] and follow the split's default direction.

use ndarray::ArrayView2;

use super::params::TreeMethod;
use crate::utils::Parallelism;

/// Bin index of a missing value.
pub const MISSING_BIN: u32 = u32::MAX;

/// Training matrix quantized feature by feature.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    /// `cuts[f]`: upper bounds of the bins of feature `f`.
    cuts: Vec<Vec<f64>>,
    /// `bins[f][row]`: bin of `row` for feature `f`.
    bins: Vec<Vec<u32>>,
    n_rows: usize,
}

impl BinnedMatrix {
    /// Quantize `x` (`n_rows × n_features`).
    pub fn from_features(x: ArrayView2<f64>, method: TreeMethod, parallelism: Parallelism) -> Self {
        let max_bins = match method {
            TreeMethod::Hist { max_bins } => Some(max_bins as usize),
            TreeMethod::Exact => None,
        };
        let per_feature = parallelism.maybe_par_map(0..x.ncols(), |f| {
            let column = x.column(f);
            let cuts = compute_cuts(column.iter().copied(), max_bins);
            let bins = column.iter().map(|&v| bin_of(&cuts, v)).collect();
            (cuts, bins)
        });
        let (cuts, bins) = per_feature.into_iter().unzip();
        Self { cuts, bins, n_rows: x.nrows() }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.cuts.len()
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.cuts[feature].len()
    }

    pub fn cuts(&self, feature: usize) -> &[f64] {
        &self.cuts[feature]
    }

    pub fn feature_bins(&self, feature: usize) -> &[u32] {
        &self.bins[feature]
    }
}

/// Bin of `value` given `cuts`.
pub fn bin_of(cuts: &[f64], value: f64) -> u32 {
    if value.is_nan() {
        return MISSING_BIN;
    }
    cuts.partition_point(|&c| c <= value) as u32
}

/// Cut points for one feature.
///
/// With `max_bins = None`, or when the feature has at most `max_bins`
/// distinct values, every distinct value gets its own bin (cuts at the
/// midpoints). Otherwise cuts are taken at evenly spaced quantiles.
fn compute_cuts(values: impl Iterator<Item = f64>, max_bins: Option<usize>) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
    sorted.sort_unstable_by(f64::total_cmp);

    let mut distinct = sorted.clone();
    distinct.dedup();

    let mut cuts: Vec<f64> = match max_bins {
        Some(max_bins) if distinct.len() > max_bins => {
            let n = sorted.len();
            let mut cuts: Vec<f64> = (1..max_bins).map(|q| sorted[q * n / max_bins]).collect();
            cuts.dedup();
            // A cut at the minimum would leave its bin empty.
            cuts.retain(|&c| c > sorted[0]);
            cuts
        }
        _ => distinct.windows(2).map(|w| w[0] + (w[1] - w[0]) / 2.0).collect(),
    };
    cuts.push(f64::INFINITY);
    cuts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn distinct_values_get_own_bins() {
        let cuts = compute_cuts([3.0, 1.0, 2.0, 1.0].into_iter(), Some(256));
        assert_eq!(cuts, vec![1.5, 2.5, f64::INFINITY]);
        assert_eq!(bin_of(&cuts, 1.0), 0);
        assert_eq!(bin_of(&cuts, 2.0), 1);
        assert_eq!(bin_of(&cuts, 3.0), 2);
        assert_eq!(bin_of(&cuts, f64::NAN), MISSING_BIN);
    }

    #[test]
    fn constant_and_empty_features_have_one_bin() {
        assert_eq!(compute_cuts([5.0, 5.0].into_iter(), None), vec![f64::INFINITY]);
        assert_eq!(compute_cuts([f64::NAN].into_iter(), None), vec![f64::INFINITY]);
    }

    #[test]
    fn hist_caps_bin_count() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let cuts = compute_cuts(values.iter().copied(), Some(16));
        assert!(cuts.len() <= 16);
        assert!(cuts.len() > 8);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn matrix_layout_is_per_feature() {
        let x = array![[0.0, 10.0], [1.0, f64::NAN], [2.0, 10.0]];
        let m = BinnedMatrix::from_features(x.view(), TreeMethod::Exact, Parallelism::Sequential);
        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.n_features(), 2);
        assert_eq!(m.feature_bins(0), &[0, 1, 2]);
        assert_eq!(m.feature_bins(1), &[0, MISSING_BIN, 0]);
        assert_eq!(m.n_bins(1), 1);
    }

    proptest! {
        #[test]
        fn bins_agree_with_thresholds(values in prop::collection::vec(-1e3f64..1e3, 1..200), max_bins in 2usize..32) {
            let cuts = compute_cuts(values.iter().copied(), Some(max_bins));
            for &v in &values {
                let b = bin_of(&cuts, v) as usize;
                prop_assert!(b < cuts.len());
                prop_assert!(v < cuts[b]);
                if b > 0 {
                    prop_assert!(v >= cuts[b - 1]);
                }
            }
        }
    }
}
