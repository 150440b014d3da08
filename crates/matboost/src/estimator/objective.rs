//! Training objectives.
//!
//! Predictions and gradients use an output-major layout: shape
//! `[n_outputs, n_rows]`, so each output's values are contiguous.
//!
//! - [`SquaredLoss`]: regression
//! - [`LogisticLoss`]: binary classification on `{0, 1}` targets
//! - [`SoftmaxLoss`]: multiclass classification on class indices

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut2};

/// Minimum hessian for the classification losses.
const HESS_MIN: f64 = 1e-6;

/// First and second derivative of the loss for one row and output.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradPair {
    pub grad: f64,
    pub hess: f64,
}

impl GradPair {
    pub fn new(grad: f64, hess: f64) -> Self {
        Self { grad, hess }
    }
}

impl std::ops::AddAssign for GradPair {
    fn add_assign(&mut self, rhs: Self) {
        self.grad += rhs.grad;
        self.hess += rhs.hess;
    }
}

impl std::ops::Add for GradPair {
    type Output = GradPair;

    fn add(self, rhs: Self) -> GradPair {
        GradPair::new(self.grad + rhs.grad, self.hess + rhs.hess)
    }
}

impl std::ops::Sub for GradPair {
    type Output = GradPair;

    fn sub(self, rhs: Self) -> GradPair {
        GradPair::new(self.grad - rhs.grad, self.hess - rhs.hess)
    }
}

/// A loss function the booster can minimize.
pub trait ObjectiveFn: Send + Sync {
    /// Number of raw outputs per sample.
    fn n_outputs(&self) -> usize;

    /// Fill `grads` (`[n_outputs, n_rows]`) for the current raw predictions.
    fn compute_gradients(
        &self,
        predictions: ArrayView2<f64>,
        targets: ArrayView1<f64>,
        grads: ArrayViewMut2<GradPair>,
    );

    /// Optimal constant raw prediction, one value per output.
    fn base_score(&self, targets: ArrayView1<f64>) -> Vec<f64>;

    /// Mean loss of raw predictions, for progress logs.
    fn loss(&self, predictions: ArrayView2<f64>, targets: ArrayView1<f64>) -> f64;

    fn name(&self) -> &'static str;
}

// =============================================================================
// SquaredLoss
// =============================================================================

/// `½ (p - y)²`
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredLoss;

impl ObjectiveFn for SquaredLoss {
    fn n_outputs(&self) -> usize {
        1
    }

    fn compute_gradients(
        &self,
        predictions: ArrayView2<f64>,
        targets: ArrayView1<f64>,
        mut grads: ArrayViewMut2<GradPair>,
    ) {
        for ((g, &p), &y) in grads.row_mut(0).iter_mut().zip(predictions.row(0)).zip(targets) {
            *g = GradPair::new(p - y, 1.0);
        }
    }

    fn base_score(&self, targets: ArrayView1<f64>) -> Vec<f64> {
        vec![targets.mean().unwrap_or(0.0)]
    }

    fn loss(&self, predictions: ArrayView2<f64>, targets: ArrayView1<f64>) -> f64 {
        let n = targets.len().max(1) as f64;
        predictions
            .row(0)
            .iter()
            .zip(targets)
            .map(|(&p, &y)| (p - y).powi(2))
            .sum::<f64>()
            / n
    }

    fn name(&self) -> &'static str {
        "squared_error"
    }
}

// =============================================================================
// LogisticLoss
// =============================================================================

/// Binary cross-entropy on the logit scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticLoss;

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl ObjectiveFn for LogisticLoss {
    fn n_outputs(&self) -> usize {
        1
    }

    fn compute_gradients(
        &self,
        predictions: ArrayView2<f64>,
        targets: ArrayView1<f64>,
        mut grads: ArrayViewMut2<GradPair>,
    ) {
        for ((g, &m), &y) in grads.row_mut(0).iter_mut().zip(predictions.row(0)).zip(targets) {
            let p = sigmoid(m);
            *g = GradPair::new(p - y, (p * (1.0 - p)).max(HESS_MIN));
        }
    }

    fn base_score(&self, targets: ArrayView1<f64>) -> Vec<f64> {
        let rate = targets.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        vec![(rate / (1.0 - rate)).ln()]
    }

    fn loss(&self, predictions: ArrayView2<f64>, targets: ArrayView1<f64>) -> f64 {
        let n = targets.len().max(1) as f64;
        predictions
            .row(0)
            .iter()
            .zip(targets)
            .map(|(&m, &y)| {
                let p = sigmoid(m).clamp(1e-15, 1.0 - 1e-15);
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum::<f64>()
            / n
    }

    fn name(&self) -> &'static str {
        "binary_logistic"
    }
}

// =============================================================================
// SoftmaxLoss
// =============================================================================

/// Multiclass cross-entropy; targets are class indices `0..n_classes`.
#[derive(Debug, Clone, Copy)]
pub struct SoftmaxLoss {
    n_classes: usize,
}

impl SoftmaxLoss {
    pub fn new(n_classes: usize) -> Self {
        debug_assert!(n_classes >= 2);
        Self { n_classes }
    }
}

/// Row-wise softmax of `[n_outputs, n_rows]` margins, same layout.
pub(crate) fn softmax(margins: ArrayView2<f64>) -> Array2<f64> {
    let mut probs = margins.to_owned();
    for mut column in probs.columns_mut() {
        let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        column.mapv_inplace(|m| (m - max).exp());
        let sum = column.sum();
        column.mapv_inplace(|e| e / sum);
    }
    probs
}

impl ObjectiveFn for SoftmaxLoss {
    fn n_outputs(&self) -> usize {
        self.n_classes
    }

    fn compute_gradients(
        &self,
        predictions: ArrayView2<f64>,
        targets: ArrayView1<f64>,
        mut grads: ArrayViewMut2<GradPair>,
    ) {
        let probs = softmax(predictions);
        for class in 0..self.n_classes {
            for (row, g) in grads.row_mut(class).iter_mut().enumerate() {
                let p = probs[[class, row]];
                let y = if targets[row] as usize == class { 1.0 } else { 0.0 };
                *g = GradPair::new(p - y, (2.0 * p * (1.0 - p)).max(HESS_MIN));
            }
        }
    }

    fn base_score(&self, _targets: ArrayView1<f64>) -> Vec<f64> {
        vec![0.0; self.n_classes]
    }

    fn loss(&self, predictions: ArrayView2<f64>, targets: ArrayView1<f64>) -> f64 {
        let n = targets.len().max(1) as f64;
        let probs = softmax(predictions);
        targets
            .iter()
            .enumerate()
            .map(|(row, &y)| -probs[[y as usize, row]].max(1e-15).ln())
            .sum::<f64>()
            / n
    }

    fn name(&self) -> &'static str {
        "multi_softmax"
    }
}

// =============================================================================
// Objective Enum
// =============================================================================

/// Objective selector, delegating to the concrete losses.
#[derive(Debug, Clone, Copy)]
pub enum Objective {
    SquaredLoss(SquaredLoss),
    LogisticLoss(LogisticLoss),
    SoftmaxLoss(SoftmaxLoss),
}

impl Objective {
    pub fn squared() -> Self {
        Self::SquaredLoss(SquaredLoss)
    }

    pub fn logistic() -> Self {
        Self::LogisticLoss(LogisticLoss)
    }

    pub fn softmax(n_classes: usize) -> Self {
        Self::SoftmaxLoss(SoftmaxLoss::new(n_classes))
    }

    fn inner(&self) -> &dyn ObjectiveFn {
        match self {
            Self::SquaredLoss(inner) => inner,
            Self::LogisticLoss(inner) => inner,
            Self::SoftmaxLoss(inner) => inner,
        }
    }
}

impl ObjectiveFn for Objective {
    fn n_outputs(&self) -> usize {
        self.inner().n_outputs()
    }

    fn compute_gradients(
        &self,
        predictions: ArrayView2<f64>,
        targets: ArrayView1<f64>,
        grads: ArrayViewMut2<GradPair>,
    ) {
        self.inner().compute_gradients(predictions, targets, grads)
    }

    fn base_score(&self, targets: ArrayView1<f64>) -> Vec<f64> {
        self.inner().base_score(targets)
    }

    fn loss(&self, predictions: ArrayView2<f64>, targets: ArrayView1<f64>) -> f64 {
        self.inner().loss(predictions, targets)
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}
