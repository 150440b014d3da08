//! Feature cache lifecycle: build, reuse, checkpoints and failed rows.

use std::fs;

use matboost::cache::{CacheError, DatabaseSpec, FeatureCache, FeatureTable};
use matboost::dataset::{DatasetSource, JsonDatasetSource, MemoryDatasetSource};
use matboost::featurize::{BasicStructureFeaturizer, Featurizer};
use matboost::testing::{CountingFeaturizer, cubic_record, synthetic_records, write_dataset_json};
use matboost::utils::Parallelism;

fn records() -> MemoryDatasetSource {
    MemoryDatasetSource::new().with_database(
        "toy",
        vec![
            cubic_record("JVASP-1", "Si", 5.4, 0.5),
            cubic_record("JVASP-2", "Xx", 3.0, 1.5),
            cubic_record("JVASP-3", "Fe", 2.9, -0.25),
            cubic_record("JVASP-4", "Cu", 3.6, 2.0),
        ],
    )
}

#[test]
fn existing_table_skips_featurization() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FeatureCache::new(dir.path());
    let spec = DatabaseSpec::new("toy", 3);

    let first = CountingFeaturizer::new(3);
    let built = cache.ensure_features(&spec, &records(), &first).unwrap();
    assert_eq!(first.calls(), 4);

    let second = CountingFeaturizer::new(3);
    let reused = cache.ensure_features(&spec, &MemoryDatasetSource::new(), &second).unwrap();
    assert_eq!(second.calls(), 0);
    assert_eq!(reused.ids().collect::<Vec<_>>(), built.ids().collect::<Vec<_>>());
    for id in built.ids() {
        let (a, b) = (built.row(id).unwrap(), reused.row(id).unwrap());
        assert!(a.iter().zip(b.iter()).all(|(x, y)| x == y || (x.is_nan() && y.is_nan())));
    }
}

#[test]
fn hand_written_table_is_keyed_by_id_column() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FeatureCache::new(dir.path());
    fs::write(
        cache.table_path("dft_2d"),
        ",id,formula,f0,f1\n0,17,MoS2,1.0,nan\n1,3,WSe2,,4.5\n",
    )
    .unwrap();

    let featurizer = CountingFeaturizer::new(2);
    let table = cache
        .ensure_features(&DatabaseSpec::new("dft_2d", 2), &MemoryDatasetSource::new(), &featurizer)
        .unwrap();
    assert_eq!(featurizer.calls(), 0);
    assert_eq!(table.id_column(), "id");
    assert_eq!(table.row("3").unwrap()[1], 4.5);
    assert!(table.row("17").unwrap()[1].is_nan());
    assert_eq!(table.leading_value("17", "formula"), Some("MoS2"));
}

#[test]
fn rebuild_is_byte_identical_and_keeps_failed_rows() {
    let (dir_a, dir_b) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let spec = DatabaseSpec::new("toy", 2);

    let cache_a = FeatureCache::new(dir_a.path()).with_parallelism(Parallelism::Parallel);
    let cache_b = FeatureCache::new(dir_b.path()).with_parallelism(Parallelism::Sequential);
    let table = cache_a.ensure_features(&spec, &records(), &CountingFeaturizer::new(2)).unwrap();
    cache_b.ensure_features(&spec, &records(), &CountingFeaturizer::new(2)).unwrap();

    let bytes_a = fs::read(cache_a.table_path("toy")).unwrap();
    let bytes_b = fs::read(cache_b.table_path("toy")).unwrap();
    assert_eq!(bytes_a, bytes_b);

    assert_eq!(table.n_rows(), 4);
    assert!(table.row("JVASP-2").unwrap().iter().all(|v| v.is_nan()));
    let text = String::from_utf8(bytes_a).unwrap();
    let failed_line = text.lines().find(|l| l.contains("JVASP-2")).unwrap();
    assert_eq!(failed_line, "1,JVASP-2,1.5,,");
}

#[test]
fn different_shuffle_seed_permutes_rows_not_content() {
    let (dir_a, dir_b) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let spec = DatabaseSpec::new("syn", 2);
    let source = MemoryDatasetSource::new().with_database("syn", synthetic_records(30, 9));

    let a = FeatureCache::new(dir_a.path())
        .ensure_features(&spec, &source, &CountingFeaturizer::new(2))
        .unwrap();
    let b = FeatureCache::new(dir_b.path())
        .with_shuffle_seed(7)
        .ensure_features(&spec, &source, &CountingFeaturizer::new(2))
        .unwrap();

    assert_ne!(a.ids().collect::<Vec<_>>(), b.ids().collect::<Vec<_>>());
    for id in a.ids() {
        assert_eq!(a.row(id).unwrap(), b.row(id).unwrap());
    }
}

#[test]
fn checkpoint_is_reused_without_the_source() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FeatureCache::new(dir.path());
    let spec = DatabaseSpec::new("toy", 2);
    cache.ensure_features(&spec, &records(), &CountingFeaturizer::new(2)).unwrap();
    assert!(cache.checkpoint_path("toy").exists());

    fs::remove_file(cache.table_path("toy")).unwrap();
    let empty = MemoryDatasetSource::new();
    assert!(empty.load("toy").is_err());

    let featurizer = CountingFeaturizer::new(2);
    let table = cache.ensure_features(&spec, &empty, &featurizer).unwrap();
    assert_eq!(table.n_rows(), 4);
    assert_eq!(featurizer.calls(), 4);
}

#[test]
fn singular_lattice_becomes_a_missing_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut flat = cubic_record("flat", "Si", 3.0, 0.0);
    flat.atoms.lattice_mat[2] = [0.0, 0.0, 0.0];
    let source = MemoryDatasetSource::new().with_database("toy", vec![flat, cubic_record("ok", "Si", 3.0, 1.0)]);

    let featurizer = CountingFeaturizer::new(2);
    let table = FeatureCache::new(dir.path())
        .ensure_features(&DatabaseSpec::new("toy", 2), &source, &featurizer)
        .unwrap();
    assert_eq!(featurizer.calls(), 1);
    assert!(table.row("flat").unwrap().iter().all(|v| v.is_nan()));
    assert!(table.row("ok").unwrap().iter().all(|v| v.is_finite()));
}

#[test]
fn json_source_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    write_dataset_json(&data_dir, "syn", &synthetic_records(12, 1)).unwrap();

    let featurizer = BasicStructureFeaturizer;
    let spec = DatabaseSpec::new("syn", featurizer.n_features());
    let table = FeatureCache::new(dir.path().join("cache"))
        .ensure_features(&spec, &JsonDatasetSource::new(&data_dir), &featurizer)
        .unwrap();

    assert_eq!(table.n_rows(), 12);
    assert_eq!(table.n_features(), 17);
    assert_eq!(table.leading_columns(), ["", "jid", "linear_target", "is_large"]);
    let flag = table.leading_value("JVASP-0", "is_large").unwrap();
    assert!(flag == "True" || flag == "False");
}

#[test]
fn width_mismatch_and_missing_dataset_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FeatureCache::new(dir.path());

    let err = cache
        .ensure_features(&DatabaseSpec::new("toy", 145), &records(), &CountingFeaturizer::new(2))
        .unwrap_err();
    assert!(matches!(err, CacheError::FeatureCountMismatch { expected: 145, got: 2, .. }));

    let err = cache
        .ensure_features(&DatabaseSpec::new("nope", 2), &records(), &CountingFeaturizer::new(2))
        .unwrap_err();
    assert!(matches!(err, CacheError::Source(_)));
    assert!(!cache.table_path("nope").exists());
}

#[test]
fn feature_table_survives_a_write_read_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let table = FeatureCache::new(dir.path())
        .ensure_features(&DatabaseSpec::new("toy", 2), &records(), &CountingFeaturizer::new(2))
        .unwrap();
    let read = FeatureTable::read_csv(&dir.path().join("X_toy.csv"), 2).unwrap();
    assert_eq!(read.leading_columns(), table.leading_columns());
    assert_eq!(read.feature_columns(), table.feature_columns());
    assert_eq!(read.leading_value("JVASP-4", "target"), Some("2.0"));
}
