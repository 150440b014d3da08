//! Mean imputation of missing feature values.

use ndarray::{Array2, ArrayView2, Axis};

use super::{PipelineError, Transformer};

/// Replaces missing cells with the column mean of the fitted data.
///
/// `NaN` and `±inf` both count as missing: they are left out of the mean and
/// replaced on transform.
///
/// Columns with no observed value during `fit` are dropped from the output,
/// so the transformed width can be smaller than the input width.
#[derive(Debug, Clone, Default)]
pub struct SimpleImputer {
    n_features_in: usize,
    /// `(input column, fill value)` for every kept column.
    statistics: Vec<(usize, f64)>,
}

impl SimpleImputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input columns kept by the fitted imputer, ascending.
    pub fn kept_columns(&self) -> Vec<usize> {
        self.statistics.iter().map(|&(col, _)| col).collect()
    }

    /// Fill value of every kept column.
    pub fn fill_values(&self) -> Vec<f64> {
        self.statistics.iter().map(|&(_, mean)| mean).collect()
    }
}

impl Transformer for SimpleImputer {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<(), PipelineError> {
        if x.nrows() == 0 {
            return Err(PipelineError::EmptyInput);
        }
        self.n_features_in = x.ncols();
        self.statistics = x
            .axis_iter(Axis(1))
            .enumerate()
            .filter_map(|(col, values)| {
                let (sum, count) = values
                    .iter()
                    .filter(|v| v.is_finite())
                    .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
                (count > 0).then(|| (col, sum / count as f64))
            })
            .collect();

        let dropped = self.n_features_in - self.statistics.len();
        if dropped > 0 {
            tracing::debug!(dropped, "imputer dropped columns with no observed values");
        }
        Ok(())
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, PipelineError> {
        if x.ncols() != self.n_features_in {
            return Err(PipelineError::FeatureCountMismatch { expected: self.n_features_in, got: x.ncols() });
        }
        let mut out = Array2::zeros((x.nrows(), self.statistics.len()));
        for (j, &(col, mean)) in self.statistics.iter().enumerate() {
            for (dst, &v) in out.column_mut(j).iter_mut().zip(x.column(col)) {
                *dst = if v.is_finite() { v } else { mean };
            }
        }
        Ok(out)
    }

    fn n_features_out(&self) -> usize {
        self.statistics.len()
    }
}
