//! The boosted-tree estimators learn simple synthetic signals.

use ndarray::{Array1, Array2, Axis};
use rstest::rstest;

use matboost::estimator::{Estimator, EstimatorConfig, GbdtClassifier, GbdtRegressor, TreeMethod, TreeParams};
use matboost::metrics::{Accuracy, Mae, MetricFn};
use matboost::testing::{split_indices, synthetic_regression};

fn config(tree_method: TreeMethod, n_threads: usize) -> EstimatorConfig {
    EstimatorConfig::builder()
        .n_estimators(120)
        .num_parallel_tree(2)
        .learning_rate(0.2)
        .tree(TreeParams::depth_wise(4).with_tree_method(tree_method))
        .seed(42)
        .n_threads(n_threads)
        .build()
        .unwrap()
}

fn split(x: &Array2<f64>, y: &Array1<f64>) -> (Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>) {
    let (train, test) = split_indices(x.nrows(), 0.25, 11);
    (
        x.select(Axis(0), &train),
        y.select(Axis(0), &train),
        x.select(Axis(0), &test),
        y.select(Axis(0), &test),
    )
}

#[rstest]
#[case::hist(TreeMethod::Hist { max_bins: 64 })]
#[case::exact(TreeMethod::Exact)]
fn regressor_beats_mean_baseline(#[case] tree_method: TreeMethod) {
    let (x, y, _) = synthetic_regression(400, 5, 7, 0.02);
    let (x_train, y_train, x_test, y_test) = split(&x, &y);

    let mut model = GbdtRegressor::new(config(tree_method, 1));
    model.fit(x_train.view(), y_train.view()).unwrap();
    let predictions = model.predict(x_test.view()).unwrap();

    let mean = y_train.mean().unwrap();
    let baseline = Mae.compute(Array1::from_elem(y_test.len(), mean).view(), y_test.view());
    let mae = Mae.compute(predictions.view(), y_test.view());
    assert!(mae < 0.6 * baseline, "mae {mae} vs baseline {baseline}");
}

#[test]
fn classifier_learns_threshold_rule() {
    let (x, _, _) = synthetic_regression(400, 4, 3, 0.0);
    let y = x.map_axis(Axis(1), |row| if row[0] + row[1] > 1.0 { 1.0 } else { 0.0 });
    let (x_train, y_train, x_test, y_test) = split(&x, &y);

    let mut model = GbdtClassifier::new(config(TreeMethod::default(), 1));
    model.fit(x_train.view(), y_train.view()).unwrap();
    assert_eq!(model.classes(), [0.0, 1.0]);

    let predictions = model.predict(x_test.view()).unwrap();
    assert!(predictions.iter().all(|&p| p == 0.0 || p == 1.0));
    let accuracy = Accuracy.compute(predictions.view(), y_test.view());
    assert!(accuracy > 0.85, "accuracy {accuracy}");
}

#[test]
fn thread_count_does_not_change_predictions() {
    let (x, y, _) = synthetic_regression(200, 6, 5, 0.1);

    let mut sequential = GbdtRegressor::new(config(TreeMethod::default(), 1));
    sequential.fit(x.view(), y.view()).unwrap();
    let mut parallel = GbdtRegressor::new(config(TreeMethod::default(), 4));
    parallel.fit(x.view(), y.view()).unwrap();

    assert_eq!(sequential.predict(x.view()).unwrap(), parallel.predict(x.view()).unwrap());
}
