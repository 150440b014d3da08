//! Summary metrics reported per benchmark run.
//!
//! - [`Mae`]: mean absolute error, for regression tasks
//! - [`Accuracy`]: fraction of exactly matching labels, for classification

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// A scalar score of predictions against targets.
pub trait MetricFn {
    /// Compute the metric over rows with a known target.
    ///
    /// Rows whose target is `NaN` (unlabelled samples) are left out; when no
    /// labelled row remains the score is `0.0`.
    fn compute(&self, predictions: ArrayView1<f64>, targets: ArrayView1<f64>) -> f64;

    fn higher_is_better(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// `(prediction, target)` pairs whose target is known.
fn labelled<'a, 'b>(
    predictions: ArrayView1<'a, f64>,
    targets: ArrayView1<'b, f64>,
) -> impl Iterator<Item = (f64, f64)> {
    predictions
        .into_iter()
        .zip(targets)
        .filter(|(_, t)| !t.is_nan())
        .map(|(&p, &t)| (p, t))
}

/// Mean absolute error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mae;

impl MetricFn for Mae {
    fn compute(&self, predictions: ArrayView1<f64>, targets: ArrayView1<f64>) -> f64 {
        let (sum_ae, n) = labelled(predictions, targets)
            .fold((0.0, 0usize), |(s, n), (p, t)| (s + (p - t).abs(), n + 1));
        if n == 0 {
            return 0.0;
        }
        sum_ae / n as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "mae"
    }
}

/// Classification accuracy on label values.
///
/// Predictions are class labels (not probabilities); a sample counts as
/// correct when the predicted label equals the target exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl MetricFn for Accuracy {
    fn compute(&self, predictions: ArrayView1<f64>, targets: ArrayView1<f64>) -> f64 {
        let (correct, n) = labelled(predictions, targets)
            .fold((0usize, 0usize), |(c, n), (p, t)| (c + usize::from(p == t), n + 1));
        if n == 0 {
            return 0.0;
        }
        correct as f64 / n as f64
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "accuracy"
    }
}

/// Metric selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Mae,
    Accuracy,
}

impl MetricFn for Metric {
    fn compute(&self, predictions: ArrayView1<f64>, targets: ArrayView1<f64>) -> f64 {
        match self {
            Self::Mae => Mae.compute(predictions, targets),
            Self::Accuracy => Accuracy.compute(predictions, targets),
        }
    }

    fn higher_is_better(&self) -> bool {
        match self {
            Self::Mae => Mae.higher_is_better(),
            Self::Accuracy => Accuracy.higher_is_better(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Mae => Mae.name(),
            Self::Accuracy => Accuracy.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn mae_basic() {
        let preds = array![1.0, 2.0, 3.0];
        let targets = array![1.5, 2.0, 1.0];
        assert_abs_diff_eq!(Mae.compute(preds.view(), targets.view()), 2.5 / 3.0, epsilon = 1e-12);
        assert!(!Mae.higher_is_better());
    }

    #[test]
    fn accuracy_exact_match() {
        let preds = array![1.0, 0.0, 1.0, 1.0];
        let targets = array![1.0, 1.0, 1.0, 0.0];
        assert_abs_diff_eq!(Accuracy.compute(preds.view(), targets.view()), 0.5);
        assert!(Accuracy.higher_is_better());
    }

    #[test]
    fn empty_inputs_score_zero() {
        let empty = ndarray::Array1::<f64>::zeros(0);
        assert_eq!(Metric::Mae.compute(empty.view(), empty.view()), 0.0);
        assert_eq!(Metric::Accuracy.compute(empty.view(), empty.view()), 0.0);
    }

    #[test]
    fn unlabelled_rows_are_left_out() {
        let preds = array![1.0, 5.0, 0.0];
        let targets = array![2.0, f64::NAN, 0.0];
        assert_abs_diff_eq!(Mae.compute(preds.view(), targets.view()), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(Accuracy.compute(preds.view(), targets.view()), 0.5);

        let unknown = array![f64::NAN];
        assert_eq!(Mae.compute(array![1.0].view(), unknown.view()), 0.0);
    }

    #[test]
    fn enum_dispatch_names() {
        assert_eq!(Metric::Mae.name(), "mae");
        assert_eq!(Metric::Accuracy.name(), "accuracy");
    }
}
