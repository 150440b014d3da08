//! Estimator configuration with builder pattern.
//!
//! [`EstimatorConfig`] carries every hyperparameter of the boosted-tree
//! estimator. It composes the nested parameter groups and uses `bon` for the
//! builder, with validation in `build()`.
//!
//! ```
//! use matboost::estimator::{EstimatorConfig, SamplingParams, TreeParams};
//!
//! // Benchmark defaults
//! let config = EstimatorConfig::builder().build().unwrap();
//! assert_eq!(config.n_estimators, 10000);
//!
//! // A small model
//! let config = EstimatorConfig::builder()
//!     .n_estimators(50)
//!     .num_parallel_tree(1)
//!     .tree(TreeParams::depth_wise(3))
//!     .sampling(SamplingParams::none())
//!     .build()
//!     .unwrap();
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use super::params::{ParamValidationError, RegularizationParams, SamplingParams, TreeParams};

// =============================================================================
// Verbosity
// =============================================================================

/// How much the estimator logs while training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    #[default]
    Silent,
    Warning,
    /// Periodic progress.
    Info,
    /// Every boosting round.
    Debug,
}

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("learning_rate must be positive, got {0}")]
    InvalidLearningRate(f64),

    #[error("n_estimators must be at least 1")]
    InvalidNEstimators,

    #[error("num_parallel_tree must be at least 1")]
    InvalidNumParallelTree,

    #[error(transparent)]
    InvalidParam(#[from] ParamValidationError),
}

// =============================================================================
// EstimatorConfig
// =============================================================================

/// Hyperparameters of the boosted-tree estimator.
///
/// # Structure
///
/// - **Boosting**: `n_estimators`, `num_parallel_tree`, `learning_rate`
/// - **Tree**: depth and split method via [`TreeParams`]
/// - **Regularization**: via [`RegularizationParams`]
/// - **Sampling**: via [`SamplingParams`]
/// - **Resources**: seed, threads, verbosity
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
pub struct EstimatorConfig {
    // === Boosting parameters ===
    /// Number of boosting rounds. Default: 10000.
    #[builder(default = 10000)]
    pub n_estimators: u32,

    /// Trees grown per round and output, averaged into one step (random
    /// forest inside each boosting round). Default: 8.
    #[builder(default = 8)]
    pub num_parallel_tree: u32,

    /// Shrinkage applied to every round. Default: 0.1.
    #[builder(default = 0.1)]
    pub learning_rate: f64,

    // === Nested parameter groups ===
    #[builder(default)]
    pub tree: TreeParams,

    #[builder(default)]
    pub regularization: RegularizationParams,

    #[builder(default)]
    pub sampling: SamplingParams,

    // === Resources ===
    /// Random seed for row and column sampling. Default: 0.
    #[builder(default = 0)]
    pub seed: u64,

    /// Worker threads; 0 uses every core. Default: 0.
    #[builder(default = 0)]
    pub n_threads: usize,

    #[builder(default)]
    pub verbosity: Verbosity,
}

impl<S: estimator_config_builder::IsComplete> EstimatorConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any parameter is out of range.
    pub fn build(self) -> Result<EstimatorConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.learning_rate > 0.0) {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }
        if self.n_estimators == 0 {
            return Err(ConfigError::InvalidNEstimators);
        }
        if self.num_parallel_tree == 0 {
            return Err(ConfigError::InvalidNumParallelTree);
        }
        self.tree.validate()?;
        self.regularization.validate()?;
        self.sampling.validate()?;
        Ok(())
    }

    /// Scale applied to each tree's leaves.
    pub fn leaf_scale(&self) -> f64 {
        self.learning_rate / self.num_parallel_tree as f64
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            n_estimators: 10000,
            num_parallel_tree: 8,
            learning_rate: 0.1,
            tree: TreeParams::default(),
            regularization: RegularizationParams::default(),
            sampling: SamplingParams::default(),
            seed: 0,
            n_threads: 0,
            verbosity: Verbosity::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::params::TreeMethod;

    #[test]
    fn test_default_config_matches_benchmark_settings() {
        let config = EstimatorConfig::builder().build().unwrap();
        assert_eq!(config, EstimatorConfig::default());
        assert_eq!(config.n_estimators, 10000);
        assert_eq!(config.num_parallel_tree, 8);
        assert_eq!(config.learning_rate, 0.1);
        assert_eq!(config.regularization.lambda, 0.01);
        assert_eq!(config.regularization.alpha, 0.01);
        assert_eq!(config.sampling.subsample, 0.85);
        assert_eq!(config.sampling.colsample_bytree, 0.3);
        assert_eq!(config.sampling.colsample_bylevel, 0.5);
        assert_eq!(config.tree.tree_method, TreeMethod::Hist { max_bins: 256 });
        assert!((config.leaf_scale() - 0.0125).abs() < 1e-15);
    }

    #[test]
    fn test_invalid_learning_rate() {
        let result = EstimatorConfig::builder().learning_rate(0.0).build();
        assert!(matches!(result, Err(ConfigError::InvalidLearningRate(_))));
        let result = EstimatorConfig::builder().learning_rate(f64::NAN).build();
        assert!(matches!(result, Err(ConfigError::InvalidLearningRate(_))));
    }

    #[test]
    fn test_invalid_counts() {
        let result = EstimatorConfig::builder().n_estimators(0).build();
        assert!(matches!(result, Err(ConfigError::InvalidNEstimators)));
        let result = EstimatorConfig::builder().num_parallel_tree(0).build();
        assert!(matches!(result, Err(ConfigError::InvalidNumParallelTree)));
    }

    #[test]
    fn test_nested_errors_propagate() {
        let result = EstimatorConfig::builder()
            .sampling(SamplingParams { subsample: 1.5, ..Default::default() })
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParam(ParamValidationError::InvalidSubsample(_)))
        ));
    }

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Debug > Verbosity::Info);
        assert!(Verbosity::Info > Verbosity::Warning);
        assert!(Verbosity::Warning > Verbosity::Silent);
    }
}
