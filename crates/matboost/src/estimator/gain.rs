//! Split gain and leaf weight computation.

use super::params::RegularizationParams;

// =============================================================================
// Gain Parameters
// =============================================================================

/// Parameters for split gain computation and leaf weight calculation.
///
/// Static for the lifetime of training.
#[derive(Clone, Debug)]
pub struct GainParams {
    /// L2 regularization (lambda).
    pub reg_lambda: f64,
    /// L1 regularization (alpha).
    pub reg_alpha: f64,
    /// Minimum split gain (gamma).
    pub min_split_loss: f64,
    /// Minimum sum of hessians per child.
    pub min_child_weight: f64,
}

impl Default for GainParams {
    fn default() -> Self {
        Self::from(&RegularizationParams::default())
    }
}

impl From<&RegularizationParams> for GainParams {
    fn from(params: &RegularizationParams) -> Self {
        Self {
            reg_lambda: params.lambda,
            reg_alpha: params.alpha,
            min_split_loss: params.min_split_loss,
            min_child_weight: params.min_child_weight,
        }
    }
}

impl GainParams {
    /// L1 soft thresholding of a gradient sum.
    #[inline]
    fn threshold_l1(&self, grad: f64) -> f64 {
        if grad > self.reg_alpha {
            grad - self.reg_alpha
        } else if grad < -self.reg_alpha {
            grad + self.reg_alpha
        } else {
            0.0
        }
    }

    /// Structure score `T(G)² / (H + λ)` of one node.
    #[inline]
    fn score(&self, grad: f64, hess: f64) -> f64 {
        let t = self.threshold_l1(grad);
        t * t / (hess + self.reg_lambda)
    }

    /// Compute the split gain using the XGBoost formula.
    ///
    /// ```text
    /// gain = 0.5 * [T(G_L)²/(H_L + λ) + T(G_R)²/(H_R + λ) - T(G_P)²/(H_P + λ)] - γ
    /// ```
    ///
    /// `T` is L1 soft thresholding by α.
    #[inline]
    pub fn compute_gain(
        &self,
        grad_left: f64,
        hess_left: f64,
        grad_right: f64,
        hess_right: f64,
        grad_parent: f64,
        hess_parent: f64,
    ) -> f64 {
        0.5 * (self.score(grad_left, hess_left) + self.score(grad_right, hess_right)
            - self.score(grad_parent, hess_parent))
            - self.min_split_loss
    }

    /// Check if both children carry enough hessian.
    #[inline]
    pub fn is_valid_split(&self, hess_left: f64, hess_right: f64) -> bool {
        hess_left >= self.min_child_weight && hess_right >= self.min_child_weight
    }

    /// Leaf weight with L1 and L2 regularization.
    ///
    /// ```text
    /// weight = -T(G) / (H + λ)
    /// ```
    #[inline]
    pub fn compute_leaf_weight(&self, grad_sum: f64, hess_sum: f64) -> f64 {
        -self.threshold_l1(grad_sum) / (hess_sum + self.reg_lambda)
    }
}
