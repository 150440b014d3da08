//! Standardization to zero mean and unit variance.

use ndarray::{Array2, ArrayView2, Axis};

use super::{PipelineError, Transformer};

/// Relative spread below which a column counts as constant.
const CONSTANT_TOL: f64 = 1e-12;

/// Centers each column on its mean and divides by its population standard
/// deviation. Constant columns keep a scale of 1.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<(), PipelineError> {
        if x.nrows() == 0 {
            return Err(PipelineError::EmptyInput);
        }
        let n = x.nrows() as f64;
        let (mean, scale) = x
            .axis_iter(Axis(1))
            .map(|col| {
                let mean = col.sum() / n;
                let var = col.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                let scale = if std <= CONSTANT_TOL * mean.abs().max(1.0) { 1.0 } else { std };
                (mean, scale)
            })
            .unzip();
        self.mean = mean;
        self.scale = scale;
        Ok(())
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, PipelineError> {
        if x.ncols() != self.mean.len() {
            return Err(PipelineError::FeatureCountMismatch { expected: self.mean.len(), got: x.ncols() });
        }
        let mut out = x.to_owned();
        for ((mut col, &mean), &scale) in out.axis_iter_mut(Axis(1)).zip(&self.mean).zip(&self.scale) {
            col.mapv_inplace(|v| (v - mean) / scale);
        }
        Ok(out)
    }

    fn n_features_out(&self) -> usize {
        self.mean.len()
    }
}
