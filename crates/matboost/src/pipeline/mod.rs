//! Imputer → scaler → boosted-tree model.
//!
//! Every stage is fit on the training partition only; `predict` replays the
//! fitted transforms before calling the estimator.

mod impute;
mod scale;

pub use impute::SimpleImputer;
pub use scale::StandardScaler;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::estimator::{Estimator, EstimatorConfig, EstimatorError, make_estimator};
use crate::task::TaskKind;

/// Errors from a pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("cannot fit on an empty matrix")]
    EmptyInput,

    #[error("expected {expected} feature columns, got {got}")]
    FeatureCountMismatch { expected: usize, got: usize },

    #[error("pipeline has not been fitted")]
    NotFitted,

    #[error(transparent)]
    Estimator(#[from] EstimatorError),
}

/// A fitted column transformation.
pub trait Transformer {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<(), PipelineError>;

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, PipelineError>;

    /// Output width after `fit`.
    fn n_features_out(&self) -> usize;

    fn fit_transform(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>, PipelineError> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// The model fit for one property.
pub struct Pipeline {
    task: TaskKind,
    imputer: SimpleImputer,
    scaler: StandardScaler,
    estimator: Box<dyn Estimator>,
    fitted: bool,
}

impl Pipeline {
    /// Pipeline with the estimator the task calls for.
    pub fn new(task: TaskKind, config: &EstimatorConfig) -> Self {
        Self::with_estimator(task, make_estimator(task.estimator(), config.clone()))
    }

    /// Pipeline around a caller-supplied estimator.
    pub fn with_estimator(task: TaskKind, estimator: Box<dyn Estimator>) -> Self {
        Self {
            task,
            imputer: SimpleImputer::new(),
            scaler: StandardScaler::new(),
            estimator,
            fitted: false,
        }
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn imputer(&self) -> &SimpleImputer {
        &self.imputer
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), PipelineError> {
        self.fitted = false;
        let imputed = self.imputer.fit_transform(x)?;
        let scaled = self.scaler.fit_transform(imputed.view())?;
        self.estimator.fit(scaled.view(), y)?;
        self.fitted = true;
        Ok(())
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, PipelineError> {
        if !self.fitted {
            return Err(PipelineError::NotFitted);
        }
        let imputed = self.imputer.transform(x)?;
        let scaled = self.scaler.transform(imputed.view())?;
        Ok(self.estimator.predict(scaled.view())?)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("task", &self.task)
            .field("imputer", &self.imputer)
            .field("scaler", &self.scaler)
            .field("fitted", &self.fitted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{SamplingParams, TreeParams};
    use ndarray::{Array2, array};

    fn config() -> EstimatorConfig {
        EstimatorConfig::builder()
            .n_estimators(40)
            .num_parallel_tree(1)
            .learning_rate(0.3)
            .tree(TreeParams::depth_wise(3))
            .sampling(SamplingParams::none())
            .n_threads(1)
            .build()
            .unwrap()
    }

    #[test]
    fn regression_pipeline_handles_missing_cells() {
        let x = Array2::from_shape_fn((20, 3), |(r, c)| match c {
            0 => r as f64,
            1 => f64::NAN,
            _ => if r % 5 == 0 { f64::NAN } else { 1.0 },
        });
        let y = Array1::from_shape_fn(20, |r| if r < 10 { 0.0 } else { 10.0 });
        let mut pipeline = Pipeline::new(TaskKind::Regression, &config());
        pipeline.fit(x.view(), y.view()).unwrap();
        assert_eq!(pipeline.imputer().kept_columns(), vec![0, 2]);

        let pred = pipeline.predict(array![[2.0, 1.0, 1.0], [17.0, f64::NAN, f64::NAN]].view()).unwrap();
        assert!(pred[0] < 1.0);
        assert!(pred[1] > 9.0);
    }

    #[test]
    fn classification_pipeline_returns_original_labels() {
        let x = Array2::from_shape_fn((20, 1), |(r, _)| r as f64 * 100.0);
        let y = Array1::from_shape_fn(20, |r| if r < 10 { 1.0 } else { 4.0 });
        let mut pipeline = Pipeline::new(TaskKind::Classification, &config());
        pipeline.fit(x.view(), y.view()).unwrap();
        let pred = pipeline.predict(array![[0.0], [1900.0]].view()).unwrap();
        assert_eq!(pred, array![1.0, 4.0]);
    }

    #[test]
    fn predict_before_fit_fails() {
        let pipeline = Pipeline::new(TaskKind::Regression, &config());
        assert!(matches!(pipeline.predict(array![[1.0]].view()), Err(PipelineError::NotFitted)));
    }

    #[test]
    fn estimator_errors_surface() {
        let mut pipeline = Pipeline::new(TaskKind::Classification, &config());
        let err = pipeline.fit(array![[1.0], [2.0]].view(), array![3.0, 3.0].view()).unwrap_err();
        assert!(matches!(err, PipelineError::Estimator(EstimatorError::SingleClass)));
    }

    #[test]
    fn unknown_training_target_is_rejected() {
        let x = Array2::from_shape_fn((4, 1), |(r, _)| r as f64);
        let y = array![1.0, f64::NAN, 2.0, 3.0];
        let mut pipeline = Pipeline::new(TaskKind::Regression, &config());
        let err = pipeline.fit(x.view(), y.view()).unwrap_err();
        assert!(matches!(err, PipelineError::Estimator(EstimatorError::NonFiniteTarget(1))));
    }
}
