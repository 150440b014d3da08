//! matboost: a reproducible materials-property benchmark harness.
//!
//! Given a materials database, the harness builds a fixed-width feature table
//! once, reconstructs the train/validation/test partitions of every target
//! property from bundled split archives, fits an imputer → scaler →
//! gradient-boosted-trees pipeline on the training rows and writes the test
//! predictions as a zipped CSV named after the task, property and database.
//!
//! # Key Types
//!
//! - [`FeatureCache`] / [`FeatureTable`] - per-database feature tables
//! - [`SplitLoader`] / [`SplitBundle`] - split archives
//! - [`align`] / [`AlignedSampleMatrix`] - identifier joins
//! - [`Pipeline`] / [`EstimatorConfig`] - the model
//! - [`BenchmarkRunner`] / [`BenchmarkConfig`] - the run loop
//!
//! # Running
//!
//! Build a [`BenchmarkConfig`] (or load a TOML run file) and call
//! [`BenchmarkRunner::run`]. Runs are idempotent: a property whose archive
//! already exists is skipped.

pub mod align;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod estimator;
pub mod featurize;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod runner;
pub mod split;
pub mod structure;
pub mod task;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use align::{AlignedSampleMatrix, AlignmentError, PartitionKind, align};
pub use cache::{CacheError, DatabaseSpec, FeatureCache, FeatureTable, FeatureWidth};
pub use config::{BenchmarkConfig, BenchmarkConfigError};
pub use dataset::{DatasetRecord, DatasetSource, JsonDatasetSource, MemoryDatasetSource};
pub use error::BenchError;
pub use estimator::{Estimator, EstimatorConfig, EstimatorError, GbdtClassifier, GbdtRegressor};
pub use featurize::{BasicStructureFeaturizer, Featurizer};
pub use metrics::{Metric, MetricFn};
pub use output::{ArtifactKey, CompletionStore, FsCompletionStore, PredictionWriter};
pub use pipeline::{Pipeline, PipelineError};
pub use runner::{BenchmarkRunner, DatabaseOutcome, PropertyOutcome, RunReport, RunStatus};
pub use split::{SplitBundle, SplitError, SplitLoader};
pub use structure::Structure;
pub use task::TaskKind;
pub use utils::{Parallelism, run_with_threads};
