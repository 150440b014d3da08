//! Benchmark run configuration.
//!
//! [`BenchmarkConfig`] is built once (by the CLI, from flags or a TOML run
//! file) and handed to the runner; nothing reads global state.
//!
//! ```
//! use matboost::config::BenchmarkConfig;
//! use matboost::task::TaskKind;
//!
//! let config = BenchmarkConfig::builder()
//!     .task(TaskKind::Regression)
//!     .databases(vec!["dft_3d".to_string()])
//!     .benchmarks_dir("benchmarks".into())
//!     .dataset_dir("datasets".into())
//!     .build()
//!     .unwrap();
//! assert_eq!(config.shuffle_seed, 123);
//! ```

use std::path::{Path, PathBuf};

use bon::Builder;
use serde::Deserialize;

use crate::cache::{DEFAULT_SHUFFLE_SEED, FeatureWidth};
use crate::estimator::{
    ConfigError, EstimatorConfig, RegularizationParams, SamplingParams, TreeMethod, TreeParams, Verbosity,
};
use crate::task::TaskKind;

/// Errors from validating or loading a run configuration.
#[derive(Debug, thiserror::Error)]
pub enum BenchmarkConfigError {
    #[error("at least one database is required")]
    NoDatabases,

    #[error("database and property names must be non-empty")]
    EmptyName,

    #[error("estimator: {0}")]
    Estimator(#[from] ConfigError),

    #[error("unknown tree_method {0:?} (expected \"hist\" or \"exact\")")]
    UnknownTreeMethod(String),

    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("invalid run file: {0}")]
    Parse(#[from] toml::de::Error),
}

// =============================================================================
// BenchmarkConfig
// =============================================================================

/// Everything one benchmark invocation needs.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
pub struct BenchmarkConfig {
    #[builder(default)]
    pub task: TaskKind,

    /// Databases to benchmark, in run order.
    pub databases: Vec<String>,

    /// Properties to run; `None` runs every property with a split archive.
    pub properties: Option<Vec<String>>,

    /// Root holding `SinglePropertyPrediction/` and `SinglePropertyClass/`.
    pub benchmarks_dir: PathBuf,

    /// Directory of `{database}.json` record files.
    pub dataset_dir: PathBuf,

    /// Where `X_{database}.csv` and checkpoints live.
    #[builder(default = PathBuf::from("."))]
    pub cache_dir: PathBuf,

    /// Where prediction archives are written.
    #[builder(default = PathBuf::from("."))]
    pub output_dir: PathBuf,

    #[builder(default)]
    pub estimator: EstimatorConfig,

    #[builder(default)]
    pub feature_width: FeatureWidth,

    /// Seed of the record shuffle before featurization.
    #[builder(default = DEFAULT_SHUFFLE_SEED)]
    pub shuffle_seed: u64,

    /// Threads for featurization; 0 uses every core.
    #[builder(default = 0)]
    pub n_threads: usize,
}

impl<S: benchmark_config_builder::IsComplete> BenchmarkConfigBuilder<S> {
    /// Build and validate the configuration.
    pub fn build(self) -> Result<BenchmarkConfig, BenchmarkConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl BenchmarkConfig {
    pub fn validate(&self) -> Result<(), BenchmarkConfigError> {
        if self.databases.is_empty() {
            return Err(BenchmarkConfigError::NoDatabases);
        }
        let mut names = self.databases.iter().chain(self.properties.iter().flatten());
        if names.any(|name| name.trim().is_empty()) {
            return Err(BenchmarkConfigError::EmptyName);
        }
        self.estimator.validate()?;
        Ok(())
    }

    /// Load a TOML run file.
    pub fn from_toml_file(path: &Path) -> Result<Self, BenchmarkConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| BenchmarkConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, BenchmarkConfigError> {
        toml::from_str::<BenchmarkFile>(text)?.into_config()
    }
}

// =============================================================================
// Run file
// =============================================================================

/// On-disk form of [`BenchmarkConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkFile {
    #[serde(default)]
    pub task: TaskKind,
    pub databases: Vec<String>,
    pub properties: Option<Vec<String>>,
    pub benchmarks_dir: PathBuf,
    pub dataset_dir: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub feature_width: FeatureWidth,
    pub shuffle_seed: Option<u64>,
    pub n_threads: Option<usize>,
    #[serde(default)]
    pub estimator: EstimatorSection,
}

/// Flat `[estimator]` table; unset keys keep the benchmark defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimatorSection {
    pub n_estimators: Option<u32>,
    pub num_parallel_tree: Option<u32>,
    pub learning_rate: Option<f64>,
    pub max_depth: Option<u32>,
    /// `"hist"` or `"exact"`.
    pub tree_method: Option<String>,
    pub max_bins: Option<u32>,
    pub reg_lambda: Option<f64>,
    pub reg_alpha: Option<f64>,
    pub min_child_weight: Option<f64>,
    pub min_split_loss: Option<f64>,
    pub subsample: Option<f64>,
    pub colsample_bytree: Option<f64>,
    pub colsample_bylevel: Option<f64>,
    pub seed: Option<u64>,
    pub n_threads: Option<usize>,
    pub verbosity: Option<Verbosity>,
}

impl EstimatorSection {
    pub fn into_config(self) -> Result<EstimatorConfig, BenchmarkConfigError> {
        let defaults = EstimatorConfig::default();

        let max_bins = self.max_bins.unwrap_or(256);
        let tree_method = match self.tree_method.as_deref() {
            None | Some("hist") => TreeMethod::Hist { max_bins },
            Some("exact") => TreeMethod::Exact,
            Some(other) => return Err(BenchmarkConfigError::UnknownTreeMethod(other.to_string())),
        };
        let tree = TreeParams {
            max_depth: self.max_depth.unwrap_or(defaults.tree.max_depth),
            tree_method,
        };
        let regularization = RegularizationParams {
            lambda: self.reg_lambda.unwrap_or(defaults.regularization.lambda),
            alpha: self.reg_alpha.unwrap_or(defaults.regularization.alpha),
            min_child_weight: self.min_child_weight.unwrap_or(defaults.regularization.min_child_weight),
            min_split_loss: self.min_split_loss.unwrap_or(defaults.regularization.min_split_loss),
        };
        let sampling = SamplingParams {
            subsample: self.subsample.unwrap_or(defaults.sampling.subsample),
            colsample_bytree: self.colsample_bytree.unwrap_or(defaults.sampling.colsample_bytree),
            colsample_bylevel: self.colsample_bylevel.unwrap_or(defaults.sampling.colsample_bylevel),
        };

        Ok(EstimatorConfig::builder()
            .maybe_n_estimators(self.n_estimators)
            .maybe_num_parallel_tree(self.num_parallel_tree)
            .maybe_learning_rate(self.learning_rate)
            .tree(tree)
            .regularization(regularization)
            .sampling(sampling)
            .maybe_seed(self.seed)
            .maybe_n_threads(self.n_threads)
            .maybe_verbosity(self.verbosity)
            .build()?)
    }
}

impl BenchmarkFile {
    pub fn into_config(self) -> Result<BenchmarkConfig, BenchmarkConfigError> {
        let estimator = self.estimator.into_config()?;
        BenchmarkConfig::builder()
            .task(self.task)
            .databases(self.databases)
            .maybe_properties(self.properties)
            .benchmarks_dir(self.benchmarks_dir)
            .dataset_dir(self.dataset_dir)
            .maybe_cache_dir(self.cache_dir)
            .maybe_output_dir(self.output_dir)
            .estimator(estimator)
            .feature_width(self.feature_width)
            .maybe_shuffle_seed(self.shuffle_seed)
            .maybe_n_threads(self.n_threads)
            .build()
    }
}
