//! Crate-level error aggregating every component failure.

use crate::align::AlignmentError;
use crate::cache::CacheError;
use crate::config::BenchmarkConfigError;
use crate::output::OutputError;
use crate::pipeline::PipelineError;
use crate::split::SplitError;

/// Any error the benchmark can hit.
///
/// Components return their own error types; this is the union the runner
/// and the binary work with.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("configuration: {0}")]
    Config(#[from] BenchmarkConfigError),

    #[error("feature cache: {0}")]
    Cache(#[from] CacheError),

    #[error("split: {0}")]
    Split(#[from] SplitError),

    #[error("alignment: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("output: {0}")]
    Output(#[from] OutputError),
}
