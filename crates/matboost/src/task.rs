//! Benchmark task kinds.
//!
//! Everything that differs between a regression and a classification
//! benchmark lives in one [`TaskProfile`] row: the benchmark directory, the
//! artifact suffix, the summary metric and which estimator to fit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::estimator::EstimatorKind;
use crate::metrics::Metric;

/// Type of benchmark task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskKind {
    /// Continuous target, scored by MAE.
    #[default]
    #[serde(rename = "SinglePropertyPrediction", alias = "regression")]
    Regression,
    /// Discrete target, scored by accuracy.
    #[serde(rename = "SinglePropertyClass", alias = "classification")]
    Classification,
}

/// Static properties of a task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskProfile {
    /// Directory under the benchmarks root, also the task segment of artifact names.
    pub dir_name: &'static str,
    /// Last segment of artifact names.
    pub suffix: &'static str,
    pub metric: Metric,
    pub estimator: EstimatorKind,
}

const REGRESSION: TaskProfile = TaskProfile {
    dir_name: "SinglePropertyPrediction",
    suffix: "mae",
    metric: Metric::Mae,
    estimator: EstimatorKind::Regressor,
};

const CLASSIFICATION: TaskProfile = TaskProfile {
    dir_name: "SinglePropertyClass",
    suffix: "acc",
    metric: Metric::Accuracy,
    estimator: EstimatorKind::Classifier,
};

impl TaskKind {
    pub const ALL: [TaskKind; 2] = [TaskKind::Regression, TaskKind::Classification];

    pub const fn profile(self) -> &'static TaskProfile {
        match self {
            Self::Regression => &REGRESSION,
            Self::Classification => &CLASSIFICATION,
        }
    }

    pub fn dir_name(self) -> &'static str {
        self.profile().dir_name
    }

    pub fn suffix(self) -> &'static str {
        self.profile().suffix
    }

    pub fn metric(self) -> Metric {
        self.profile().metric
    }

    pub fn estimator(self) -> EstimatorKind {
        self.profile().estimator
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Error for an unrecognised task name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task {0:?} (expected SinglePropertyPrediction or SinglePropertyClass)")]
pub struct ParseTaskError(pub String);

impl FromStr for TaskKind {
    type Err = ParseTaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SinglePropertyPrediction" | "regression" => Ok(Self::Regression),
            "SinglePropertyClass" | "classification" => Ok(Self::Classification),
            other => Err(ParseTaskError(other.to_string())),
        }
    }
}
