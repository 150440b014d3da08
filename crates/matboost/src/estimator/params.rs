//! Nested parameter groups for the boosted-tree estimator.
//!
//! Parameters are grouped by concern:
//! - [`TreeParams`]: tree depth and split-finding method
//! - [`RegularizationParams`]: L1/L2 penalties and split constraints
//! - [`SamplingParams`]: row and column subsampling rates
//!
//! Defaults are the benchmark settings, not the usual library defaults.

use serde::{Deserialize, Serialize};

// =============================================================================
// TreeParams
// =============================================================================

/// How candidate split points are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TreeMethod {
    /// Quantile sketch with at most `max_bins` bins per feature.
    Hist { max_bins: u32 },
    /// Every distinct training value is a candidate.
    Exact,
}

impl Default for TreeMethod {
    fn default() -> Self {
        Self::Hist { max_bins: 256 }
    }
}

/// Tree structure parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    /// Maximum depth of a tree; the root is depth 0. Default: 6.
    pub max_depth: u32,
    pub tree_method: TreeMethod,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self { max_depth: 6, tree_method: TreeMethod::default() }
    }
}

impl TreeParams {
    pub fn depth_wise(max_depth: u32) -> Self {
        Self { max_depth, ..Default::default() }
    }

    pub fn with_tree_method(mut self, tree_method: TreeMethod) -> Self {
        self.tree_method = tree_method;
        self
    }

    pub fn validate(&self) -> Result<(), ParamValidationError> {
        if self.max_depth == 0 {
            return Err(ParamValidationError::InvalidMaxDepth(self.max_depth));
        }
        if let TreeMethod::Hist { max_bins } = self.tree_method {
            if max_bins < 2 {
                return Err(ParamValidationError::InvalidMaxBins(max_bins));
            }
        }
        Ok(())
    }
}

// =============================================================================
// RegularizationParams
// =============================================================================

/// Regularization parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularizationParams {
    /// L2 penalty on leaf weights. Default: 0.01.
    pub lambda: f64,

    /// L1 penalty on leaf weights. Default: 0.01.
    pub alpha: f64,

    /// Minimum hessian sum in each child of a split. Default: 1.0.
    pub min_child_weight: f64,

    /// Minimum loss reduction to make a split (gamma). Default: 0.0.
    pub min_split_loss: f64,
}

impl Default for RegularizationParams {
    fn default() -> Self {
        Self {
            lambda: 0.01,
            alpha: 0.01,
            min_child_weight: 1.0,
            min_split_loss: 0.0,
        }
    }
}

impl RegularizationParams {
    pub fn validate(&self) -> Result<(), ParamValidationError> {
        if !(self.lambda >= 0.0) {
            return Err(ParamValidationError::InvalidLambda(self.lambda));
        }
        if !(self.alpha >= 0.0) {
            return Err(ParamValidationError::InvalidAlpha(self.alpha));
        }
        if !(self.min_child_weight >= 0.0) {
            return Err(ParamValidationError::InvalidMinChildWeight(self.min_child_weight));
        }
        if !(self.min_split_loss >= 0.0) {
            return Err(ParamValidationError::InvalidMinSplitLoss(self.min_split_loss));
        }
        Ok(())
    }
}

// =============================================================================
// SamplingParams
// =============================================================================

/// Row and column subsampling rates, each in (0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    /// Fraction of rows drawn for each tree. Default: 0.85.
    pub subsample: f64,

    /// Fraction of features drawn for each tree. Default: 0.3.
    pub colsample_bytree: f64,

    /// Fraction of the tree's features drawn at each depth level. Default: 0.5.
    ///
    /// Applied on top of `colsample_bytree`.
    pub colsample_bylevel: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            subsample: 0.85,
            colsample_bytree: 0.3,
            colsample_bylevel: 0.5,
        }
    }
}

impl SamplingParams {
    /// No subsampling at all.
    pub fn none() -> Self {
        Self { subsample: 1.0, colsample_bytree: 1.0, colsample_bylevel: 1.0 }
    }

    pub fn validate(&self) -> Result<(), ParamValidationError> {
        let in_range = |v: f64| v > 0.0 && v <= 1.0;
        if !in_range(self.subsample) {
            return Err(ParamValidationError::InvalidSubsample(self.subsample));
        }
        if !in_range(self.colsample_bytree) {
            return Err(ParamValidationError::InvalidColsampleBytree(self.colsample_bytree));
        }
        if !in_range(self.colsample_bylevel) {
            return Err(ParamValidationError::InvalidColsampleBylevel(self.colsample_bylevel));
        }
        Ok(())
    }

    pub fn has_row_sampling(&self) -> bool {
        self.subsample < 1.0
    }

    pub fn has_col_sampling(&self) -> bool {
        self.colsample_bytree < 1.0 || self.colsample_bylevel < 1.0
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Parameter validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamValidationError {
    #[error("max_depth must be >= 1, got {0}")]
    InvalidMaxDepth(u32),

    #[error("max_bins must be >= 2, got {0}")]
    InvalidMaxBins(u32),

    #[error("lambda must be >= 0, got {0}")]
    InvalidLambda(f64),

    #[error("alpha must be >= 0, got {0}")]
    InvalidAlpha(f64),

    #[error("min_child_weight must be >= 0, got {0}")]
    InvalidMinChildWeight(f64),

    #[error("min_split_loss must be >= 0, got {0}")]
    InvalidMinSplitLoss(f64),

    #[error("subsample must be in (0, 1], got {0}")]
    InvalidSubsample(f64),

    #[error("colsample_bytree must be in (0, 1], got {0}")]
    InvalidColsampleBytree(f64),

    #[error("colsample_bylevel must be in (0, 1], got {0}")]
    InvalidColsampleBylevel(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_params_default() {
        let params = TreeParams::default();
        assert_eq!(params.max_depth, 6);
        assert_eq!(params.tree_method, TreeMethod::Hist { max_bins: 256 });
        assert!(params.validate().is_ok());
    }

    #[test]
    fn tree_params_validation() {
        assert!(matches!(TreeParams::depth_wise(0).validate(), Err(ParamValidationError::InvalidMaxDepth(0))));
        let tiny = TreeParams::depth_wise(3).with_tree_method(TreeMethod::Hist { max_bins: 1 });
        assert!(matches!(tiny.validate(), Err(ParamValidationError::InvalidMaxBins(1))));
        let exact = TreeParams::depth_wise(3).with_tree_method(TreeMethod::Exact);
        assert!(exact.validate().is_ok());
    }

    #[test]
    fn regularization_params_validation() {
        assert!(RegularizationParams::default().validate().is_ok());

        let invalid_lambda = RegularizationParams { lambda: -1.0, ..Default::default() };
        assert!(matches!(invalid_lambda.validate(), Err(ParamValidationError::InvalidLambda(_))));

        let nan_alpha = RegularizationParams { alpha: f64::NAN, ..Default::default() };
        assert!(matches!(nan_alpha.validate(), Err(ParamValidationError::InvalidAlpha(_))));
    }

    #[test]
    fn sampling_params_defaults_and_validation() {
        let params = SamplingParams::default();
        assert!(params.validate().is_ok());
        assert!(params.has_row_sampling());
        assert!(params.has_col_sampling());
        assert!(!SamplingParams::none().has_col_sampling());

        let invalid_zero = SamplingParams { subsample: 0.0, ..Default::default() };
        assert!(matches!(invalid_zero.validate(), Err(ParamValidationError::InvalidSubsample(_))));

        let invalid_over = SamplingParams { colsample_bylevel: 1.5, ..Default::default() };
        assert!(matches!(invalid_over.validate(), Err(ParamValidationError::InvalidColsampleBylevel(_))));
    }

    #[test]
    fn tree_method_serde() {
        let hist: TreeMethod = serde_json::from_str(r#"{"kind": "hist", "max_bins": 64}"#).unwrap();
        assert_eq!(hist, TreeMethod::Hist { max_bins: 64 });
        let exact: TreeMethod = serde_json::from_str(r#"{"kind": "exact"}"#).unwrap();
        assert_eq!(exact, TreeMethod::Exact);
    }
}
