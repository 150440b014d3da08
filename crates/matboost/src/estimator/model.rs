//! Gradient-boosted tree ensembles.
//!
//! [`Booster`] is the raw additive model: a base score per output plus, for
//! every boosting round and output, `num_parallel_tree` trees whose leaves
//! are scaled by `learning_rate / num_parallel_tree`. [`GbdtRegressor`] and
//! [`GbdtClassifier`] wrap it behind the [`Estimator`] seam.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::binning::BinnedMatrix;
use super::config::{EstimatorConfig, Verbosity};
use super::gain::GainParams;
use super::grower::TreeGrower;
use super::objective::{GradPair, Objective, ObjectiveFn, sigmoid, softmax};
use super::sampling::{ColumnSampler, RowSampler};
use super::tree::Tree;
use super::{Estimator, EstimatorError};
use crate::utils::{Parallelism, run_with_threads};

/// Rounds between progress logs at `Verbosity::Info`.
const LOG_PERIOD: u32 = 100;

/// Derive a per-tree seed from the configured seed.
fn tree_seed(seed: u64, round: u32, output: usize, tree: u32) -> u64 {
    let mut h = seed ^ 0x9E37_79B9_7F4A_7C15;
    for part in [round as u64, output as u64, tree as u64] {
        h = (h ^ part).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h ^= h >> 31;
    }
    h
}

// =============================================================================
// Booster
// =============================================================================

/// A trained additive tree model producing raw margins.
#[derive(Debug, Clone)]
pub struct Booster {
    objective: Objective,
    base_score: Vec<f64>,
    /// `trees[output]`: every tree of that output, in training order.
    trees: Vec<Vec<Tree>>,
    n_features: usize,
}

impl Booster {
    /// Fit a booster on `x` (`n_rows × n_features`) and encoded `targets`.
    pub fn train(
        x: ArrayView2<f64>,
        targets: ArrayView1<f64>,
        objective: Objective,
        config: &EstimatorConfig,
    ) -> Result<Self, EstimatorError> {
        config.validate()?;
        check_training_data(x, targets)?;
        run_with_threads(config.n_threads, |parallelism| Self::train_inner(x, targets, objective, config, parallelism))
    }

    fn train_inner(
        x: ArrayView2<f64>,
        targets: ArrayView1<f64>,
        objective: Objective,
        config: &EstimatorConfig,
        parallelism: Parallelism,
    ) -> Result<Self, EstimatorError> {
        let (n_rows, n_features) = x.dim();
        let n_outputs = objective.n_outputs();
        let base_score = objective.base_score(targets);

        let binned = BinnedMatrix::from_features(x, config.tree.tree_method, parallelism);
        let gain = GainParams::from(&config.regularization);
        let grower = TreeGrower::new(&binned, &gain, config.tree.max_depth, parallelism);
        let row_sampler = RowSampler::new(config.sampling.subsample);
        let leaf_scale = config.leaf_scale();

        let mut predictions = Array2::zeros((n_outputs, n_rows));
        for (k, mut row) in predictions.axis_iter_mut(Axis(0)).enumerate() {
            row.fill(base_score[k]);
        }
        let mut grads = Array2::<GradPair>::default((n_outputs, n_rows));
        let mut trees: Vec<Vec<Tree>> = vec![Vec::new(); n_outputs];

        if config.verbosity >= Verbosity::Info {
            tracing::info!(
                objective = objective.name(),
                rows = n_rows,
                features = n_features,
                rounds = config.n_estimators,
                parallel_trees = config.num_parallel_tree,
                "training booster"
            );
        }

        for round in 0..config.n_estimators {
            objective.compute_gradients(predictions.view(), targets, grads.view_mut());

            for k in 0..n_outputs {
                let output_grads = grads.row(k).to_vec();
                let round_trees = parallelism.maybe_par_map(0..config.num_parallel_tree, |t| {
                    let seed = tree_seed(config.seed, round, k, t);
                    let rows = row_sampler.sample(n_rows, seed);
                    let mut columns = ColumnSampler::new(
                        n_features as u32,
                        config.sampling.colsample_bytree,
                        config.sampling.colsample_bylevel,
                    );
                    columns.sample_for_tree(seed.rotate_left(17));
                    let mut tree = grower.grow(&output_grads, rows, &columns);
                    tree.scale_leaves(leaf_scale);
                    tree
                });

                let mut output_preds = predictions.row_mut(k);
                for tree in &round_trees {
                    for (i, pred) in output_preds.iter_mut().enumerate() {
                        *pred += tree.predict_row(x.row(i));
                    }
                }
                trees[k].extend(round_trees);
            }

            let last = round + 1 == config.n_estimators;
            if config.verbosity >= Verbosity::Debug
                || (config.verbosity >= Verbosity::Info && (round % LOG_PERIOD == 0 || last))
            {
                let loss = objective.loss(predictions.view(), targets);
                tracing::info!(round, train_loss = loss, "boosting round");
            }
        }

        Ok(Self { objective, base_score, trees, n_features })
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_outputs(&self) -> usize {
        self.trees.len()
    }

    /// Total number of trees across outputs.
    pub fn n_trees(&self) -> usize {
        self.trees.iter().map(Vec::len).sum()
    }

    /// Raw margins, `[n_outputs, n_rows]`.
    pub fn predict_raw(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, EstimatorError> {
        if x.ncols() != self.n_features {
            return Err(EstimatorError::FeatureCountMismatch { expected: self.n_features, got: x.ncols() });
        }
        let mut out = Array2::zeros((self.n_outputs(), x.nrows()));
        for (k, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
            for (i, value) in row.iter_mut().enumerate() {
                let sample = x.row(i);
                *value = self.base_score[k] + self.trees[k].iter().map(|t| t.predict_row(sample)).sum::<f64>();
            }
        }
        Ok(out)
    }
}

fn check_training_data(x: ArrayView2<f64>, targets: ArrayView1<f64>) -> Result<(), EstimatorError> {
    if x.nrows() == 0 {
        return Err(EstimatorError::EmptyTrainingSet);
    }
    if x.nrows() != targets.len() {
        return Err(EstimatorError::ShapeMismatch { rows_x: x.nrows(), rows_y: targets.len() });
    }
    if let Some(row) = targets.iter().position(|v| !v.is_finite()) {
        return Err(EstimatorError::NonFiniteTarget(row));
    }
    Ok(())
}

// =============================================================================
// Regressor
// =============================================================================

/// Squared-error boosted regressor.
#[derive(Debug, Clone)]
pub struct GbdtRegressor {
    config: EstimatorConfig,
    booster: Option<Booster>,
}

impl GbdtRegressor {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config, booster: None }
    }

    pub fn booster(&self) -> Option<&Booster> {
        self.booster.as_ref()
    }
}

impl Estimator for GbdtRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), EstimatorError> {
        self.booster = Some(Booster::train(x, y, Objective::squared(), &self.config)?);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EstimatorError> {
        let booster = self.booster.as_ref().ok_or(EstimatorError::NotFitted)?;
        Ok(booster.predict_raw(x)?.row(0).to_owned())
    }
}

// =============================================================================
// Classifier
// =============================================================================

/// Boosted classifier over arbitrary numeric labels.
///
/// Labels are encoded as indices into their sorted distinct values; two
/// classes train a logistic model, more train softmax. Predictions are
/// mapped back to the original label values.
#[derive(Debug, Clone)]
pub struct GbdtClassifier {
    config: EstimatorConfig,
    classes: Vec<f64>,
    booster: Option<Booster>,
}

impl GbdtClassifier {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config, classes: Vec::new(), booster: None }
    }

    /// Distinct training labels, ascending.
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn booster(&self) -> Option<&Booster> {
        self.booster.as_ref()
    }

    fn encode(&self, y: ArrayView1<f64>) -> Array1<f64> {
        y.mapv(|v| self.classes.partition_point(|&c| c < v) as f64)
    }
}

impl Estimator for GbdtClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), EstimatorError> {
        check_training_data(x, y)?;
        let mut classes = y.to_vec();
        classes.sort_unstable_by(f64::total_cmp);
        classes.dedup();
        if classes.len() < 2 {
            return Err(EstimatorError::SingleClass);
        }
        self.classes = classes;

        let objective = if self.classes.len() == 2 {
            Objective::logistic()
        } else {
            Objective::softmax(self.classes.len())
        };
        let encoded = self.encode(y);
        self.booster = Some(Booster::train(x, encoded.view(), objective, &self.config)?);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EstimatorError> {
        let booster = self.booster.as_ref().ok_or(EstimatorError::NotFitted)?;
        let raw = booster.predict_raw(x)?;
        let labels = if self.classes.len() == 2 {
            raw.row(0).mapv(|m| if sigmoid(m) > 0.5 { self.classes[1] } else { self.classes[0] })
        } else {
            let probs = softmax(raw.view());
            probs
                .columns()
                .into_iter()
                .map(|col| {
                    let best = col
                        .iter()
                        .enumerate()
                        .fold((0, f64::NEG_INFINITY), |acc, (k, &p)| if p > acc.1 { (k, p) } else { acc });
                    self.classes[best.0]
                })
                .collect()
        };
        Ok(labels)
    }
}
