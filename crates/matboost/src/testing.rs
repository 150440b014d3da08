//! Fixtures shared by unit and integration tests.
//!
//! Everything here is deterministic for a given seed.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array1, Array2};
use rand::prelude::*;
use serde_json::{Value, json};
use zip::write::SimpleFileOptions;

use crate::cache::FeatureTable;
use crate::dataset::DatasetRecord;
use crate::featurize::{FeaturizeError, Featurizer, atomic_number};
use crate::split::SplitBundle;
use crate::structure::Structure;

// =============================================================================
// Records and structures
// =============================================================================

/// Simple cubic cell of edge `a` with one site at the origin.
pub fn cubic_structure(element: &str, a: f64) -> Structure {
    Structure {
        lattice_mat: [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]],
        coords: vec![[0.0, 0.0, 0.0]],
        elements: vec![element.to_string()],
        cartesian: false,
    }
}

/// A `jid`-keyed record holding a cubic cell and one `target` property.
pub fn cubic_record(id: &str, element: &str, a: f64, target: f64) -> DatasetRecord {
    DatasetRecord {
        id: id.to_string(),
        id_column: "jid".to_string(),
        atoms: cubic_structure(element, a),
        properties: vec![("target".to_string(), json!(target))],
    }
}

/// `n` cubic records `JVASP-{i}` with random cells and two properties:
/// `linear_target = 2a - 0.1 Z` and `is_large = a > 3`.
pub fn synthetic_records(n: usize, seed: u64) -> Vec<DatasetRecord> {
    const ELEMENTS: [&str; 6] = ["Li", "C", "Si", "Fe", "Cu", "Ag"];
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let element = ELEMENTS[rng.gen_range(0..ELEMENTS.len())];
            let a = 2.0 + 2.0 * rng.r#gen::<f64>();
            let z = atomic_number(element).map_or(0.0, f64::from);
            let mut record = cubic_record(&format!("JVASP-{i}"), element, a, 0.0);
            record.properties = vec![
                ("linear_target".to_string(), json!(2.0 * a - 0.1 * z)),
                ("is_large".to_string(), json!(a > 3.0)),
            ];
            record
        })
        .collect()
}

/// Write records as a JARVIS-style JSON array at `{dir}/{name}.json`.
pub fn write_dataset_json(dir: &Path, name: &str, records: &[DatasetRecord]) -> std::io::Result<()> {
    let objects: Vec<Value> = records
        .iter()
        .map(|r| {
            let mut object = serde_json::Map::new();
            object.insert(r.id_column.clone(), json!(r.id));
            object.insert("atoms".to_string(), json!(r.atoms));
            for (key, value) in &r.properties {
                object.insert(key.clone(), value.clone());
            }
            Value::Object(object)
        })
        .collect();
    fs::create_dir_all(dir)?;
    fs::write(dir.join(format!("{name}.json")), serde_json::to_vec(&objects)?)
}

// =============================================================================
// Featurizers
// =============================================================================

/// Featurizer that counts its calls.
///
/// Feature `j` is `(j + 1) * a + Z` for the first site; structures with an
/// unknown element symbol fail.
#[derive(Debug, Default)]
pub struct CountingFeaturizer {
    width: usize,
    calls: AtomicUsize,
}

impl CountingFeaturizer {
    pub fn new(width: usize) -> Self {
        Self { width, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Featurizer for CountingFeaturizer {
    fn feature_labels(&self) -> Vec<String> {
        (0..self.width).map(|j| format!("f{j}")).collect()
    }

    fn featurize(&self, structure: &Structure) -> Result<Vec<f64>, FeaturizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let symbol = structure.elements.first().map(String::as_str).unwrap_or_default();
        let z = atomic_number(symbol).ok_or_else(|| FeaturizeError::UnknownElement(symbol.to_string()))?;
        let a = structure.lattice_lengths()[0];
        Ok((0..self.width).map(|j| (j + 1) as f64 * a + f64::from(z)).collect())
    }
}

// =============================================================================
// Tables and splits
// =============================================================================

/// A table keyed by `ids` (column `jid`); row `i`, feature `j` holds `10 i + j`.
pub fn feature_table(ids: &[&str], n_features: usize) -> FeatureTable {
    let leading = ids
        .iter()
        .enumerate()
        .map(|(i, id)| vec![i.to_string(), id.to_string()])
        .collect();
    let features = Array2::from_shape_fn((ids.len(), n_features), |(i, j)| (10 * i + j) as f64);
    let columns = (0..n_features).map(|j| format!("f{j}")).collect();
    FeatureTable::new(vec![String::new(), "jid".to_string()], columns, 1, leading, features)
        .expect("fixture table is well formed")
}

/// Write `bundle` as the single entry `entry_name` of a zip at `path`.
pub fn write_split_archive(path: &Path, entry_name: &str, bundle: &SplitBundle) -> zip::result::ZipResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut zip = zip::ZipWriter::new(fs::File::create(path)?);
    zip.start_file(entry_name, SimpleFileOptions::default())?;
    zip.write_all(&serde_json::to_vec(bundle).map_err(std::io::Error::from)?)?;
    zip.finish()?;
    Ok(())
}

// =============================================================================
// Synthetic matrices
// =============================================================================

/// Uniform features in `[0, 1)` and a linear target with uniform noise.
///
/// Returns `(x, y, weights)`.
pub fn synthetic_regression(rows: usize, cols: usize, seed: u64, noise: f64) -> (Array2<f64>, Array1<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x = Array2::from_shape_simple_fn((rows, cols), || rng.r#gen::<f64>());
    let weights: Vec<f64> = (0..cols).map(|_| rng.r#gen::<f64>() * 2.0 - 1.0).collect();
    let y = x
        .rows()
        .into_iter()
        .map(|row| {
            let score: f64 = row.iter().zip(&weights).map(|(v, w)| v * w).sum();
            score + (rng.r#gen::<f64>() * 2.0 - 1.0) * noise
        })
        .collect();
    (x, y, weights)
}

/// Deterministic `(train, test)` row indices.
pub fn split_indices(rows: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..rows).collect();
    idx.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((rows as f64) * test_fraction).round() as usize;
    let (test, train) = idx.split_at(n_test.min(rows));
    (train.to_vec(), test.to_vec())
}
