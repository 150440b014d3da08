//! Native gradient-boosted tree estimators.
//!
//! # Parameter Groups
//!
//! Configuration is organized into semantic groups composed by
//! [`EstimatorConfig`]:
//! - [`TreeParams`]: depth and split finding ([`TreeMethod`])
//! - [`RegularizationParams`]: L1/L2 penalties and split constraints
//! - [`SamplingParams`]: row and column subsampling
//!
//! # Training
//!
//! Features are quantized once into a [`binning::BinnedMatrix`]; each round
//! computes gradients from the [`Objective`] and grows `num_parallel_tree`
//! trees depth-wise. [`GbdtRegressor`] and [`GbdtClassifier`] implement the
//! [`Estimator`] seam used by the pipeline.

pub mod binning;
mod config;
mod gain;
mod grower;
mod model;
mod objective;
mod params;
mod sampling;
mod tree;

pub use config::{ConfigError, EstimatorConfig, Verbosity};
pub use gain::GainParams;
pub use grower::TreeGrower;
pub use model::{Booster, GbdtClassifier, GbdtRegressor};
pub use objective::{GradPair, LogisticLoss, Objective, ObjectiveFn, SoftmaxLoss, SquaredLoss};
pub use params::{ParamValidationError, RegularizationParams, SamplingParams, TreeMethod, TreeParams};
pub use sampling::{ColumnSampler, RowSampler};
pub use tree::{NodeId, Tree, TreeNode};

use ndarray::{Array1, ArrayView1, ArrayView2};

/// Errors from fitting or predicting.
#[derive(Debug, thiserror::Error)]
pub enum EstimatorError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("feature matrix has {rows_x} rows but {rows_y} targets")]
    ShapeMismatch { rows_x: usize, rows_y: usize },

    #[error("model was trained on {expected} features, got {got}")]
    FeatureCountMismatch { expected: usize, got: usize },

    #[error("target at row {0} is not finite")]
    NonFiniteTarget(usize),

    #[error("classification needs at least two distinct labels")]
    SingleClass,

    #[error("estimator has not been fitted")]
    NotFitted,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Which estimator a task trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorKind {
    Regressor,
    Classifier,
}

/// A supervised model over dense `f64` features.
///
/// `NaN` feature values are treated as missing.
pub trait Estimator: Send {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), EstimatorError>;

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EstimatorError>;
}

/// Build an unfitted estimator of the given kind.
pub fn make_estimator(kind: EstimatorKind, config: EstimatorConfig) -> Box<dyn Estimator> {
    match kind {
        EstimatorKind::Regressor => Box::new(GbdtRegressor::new(config)),
        EstimatorKind::Classifier => Box::new(GbdtClassifier::new(config)),
    }
}
