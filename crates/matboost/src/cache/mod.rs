//! Per-database feature cache.
//!
//! Featurizing a whole materials database is the expensive step of a run, so
//! it happens once per database and the result is kept under the cache
//! directory:
//!
//! - `structure_{db}.json`: every record with its canonicalized structure
//!   (the checkpoint, written before featurization starts),
//! - `X_{db}.csv`: the shuffled records with their scalar properties and
//!   feature vectors (see [`FeatureTable`]).
//!
//! When `X_{db}.csv` exists it is returned as is and nothing is recomputed.

mod table;

pub use table::FeatureTable;

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::{DatasetError, DatasetRecord, DatasetSource};
use crate::featurize::{Featurizer, featurize_batch};
use crate::structure::Structure;
use crate::utils::{Parallelism, write_atomic};

/// Seed of the record shuffle applied before featurization.
pub const DEFAULT_SHUFFLE_SEED: u64 = 123;

/// Descriptor width of the matminer feature set on `ssub`.
pub const SSUB_N_FEATURES: usize = 145;

/// Descriptor width of the matminer feature set on every other database.
pub const DEFAULT_N_FEATURES: usize = 273;

/// Errors that make a database's features unavailable.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dataset error: {0}")]
    Source(#[from] DatasetError),

    #[error("featurizer produces {got} features, database {database} expects {expected}")]
    FeatureCountMismatch { database: String, expected: usize, got: usize },

    #[error("malformed feature table: {0}")]
    MalformedTable(String),
}

// =============================================================================
// DatabaseSpec
// =============================================================================

/// A database to benchmark and the width of its feature table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSpec {
    pub name: String,
    pub n_features: usize,
}

impl DatabaseSpec {
    pub fn new(name: impl Into<String>, n_features: usize) -> Self {
        Self { name: name.into(), n_features }
    }

    /// Width used by the matminer descriptor tables.
    pub fn matminer_width(name: &str) -> usize {
        if name == "ssub" { SSUB_N_FEATURES } else { DEFAULT_N_FEATURES }
    }
}

/// How the feature-table width of a database is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureWidth {
    /// Whatever the configured featurizer produces.
    #[default]
    Featurizer,
    /// The matminer table widths (145 for `ssub`, 273 otherwise).
    Matminer,
    /// A fixed width for every database.
    #[serde(untagged)]
    Fixed(usize),
}

impl FeatureWidth {
    pub fn resolve(self, database: &str, featurizer: &dyn Featurizer) -> usize {
        match self {
            Self::Featurizer => featurizer.n_features(),
            Self::Matminer => DatabaseSpec::matminer_width(database),
            Self::Fixed(n) => n,
        }
    }

    pub fn spec_for(self, database: &str, featurizer: &dyn Featurizer) -> DatabaseSpec {
        DatabaseSpec::new(database, self.resolve(database, featurizer))
    }
}

// =============================================================================
// Checkpoint
// =============================================================================

/// One record of the canonical checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Position of the record in the source.
    pub index: usize,
    /// Whether `record.atoms` is in canonical form. When canonicalization
    /// failed the original structure is kept and the row is not featurized.
    pub canonical: bool,
    pub record: DatasetRecord,
}

impl CheckpointEntry {
    fn from_record(index: usize, mut record: DatasetRecord) -> Self {
        match record.atoms.canonicalize() {
            Ok(atoms) => {
                record.atoms = atoms;
                Self { index, canonical: true, record }
            }
            Err(err) => {
                tracing::warn!(id = %record.id, %err, "could not canonicalize structure");
                Self { index, canonical: false, record }
            }
        }
    }

    fn structure(&self) -> Option<&Structure> {
        self.canonical.then_some(&self.record.atoms)
    }
}

// =============================================================================
// FeatureCache
// =============================================================================

/// Builds and reuses per-database feature tables under one directory.
#[derive(Debug, Clone)]
pub struct FeatureCache {
    dir: PathBuf,
    shuffle_seed: u64,
    parallelism: Parallelism,
}

impl FeatureCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            shuffle_seed: DEFAULT_SHUFFLE_SEED,
            parallelism: Parallelism::from_threads(0),
        }
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = seed;
        self
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, database: &str) -> PathBuf {
        self.dir.join(format!("X_{database}.csv"))
    }

    pub fn checkpoint_path(&self, database: &str) -> PathBuf {
        self.dir.join(format!("structure_{database}.json"))
    }

    /// Return the feature table of `spec`, building it if it is not cached.
    pub fn ensure_features(
        &self,
        spec: &DatabaseSpec,
        source: &dyn DatasetSource,
        featurizer: &dyn Featurizer,
    ) -> Result<FeatureTable, CacheError> {
        let table_path = self.table_path(&spec.name);
        if table_path.exists() {
            tracing::info!(database = %spec.name, path = %table_path.display(), "reusing cached features");
            return FeatureTable::read_csv(&table_path, spec.n_features);
        }

        let width = featurizer.n_features();
        if width != spec.n_features {
            return Err(CacheError::FeatureCountMismatch {
                database: spec.name.clone(),
                expected: spec.n_features,
                got: width,
            });
        }

        let mut entries = self.load_or_build_checkpoint(&spec.name, source)?;
        entries.shuffle(&mut StdRng::seed_from_u64(self.shuffle_seed));

        tracing::info!(database = %spec.name, records = entries.len(), "featurizing");
        let items: Vec<Option<&Structure>> = entries.iter().map(CheckpointEntry::structure).collect();
        let batch = featurize_batch(featurizer, &items, self.parallelism);
        if batch.n_failed() > 0 {
            tracing::warn!(
                database = %spec.name,
                failed = batch.n_failed(),
                total = entries.len(),
                "featurization failed for some records, their features are left empty"
            );
        }

        let table = assemble_table(&entries, featurizer.feature_labels(), batch.rows)?;
        table.write_csv(&table_path)?;
        tracing::info!(database = %spec.name, path = %table_path.display(), "wrote feature table");
        Ok(table)
    }

    fn load_or_build_checkpoint(
        &self,
        database: &str,
        source: &dyn DatasetSource,
    ) -> Result<Vec<CheckpointEntry>, CacheError> {
        let path = self.checkpoint_path(database);
        if path.exists() {
            tracing::info!(database, path = %path.display(), "reusing structure checkpoint");
            let file = fs::File::open(&path)?;
            return Ok(serde_json::from_reader(BufReader::new(file))?);
        }

        let records = source.load(database)?;
        let entries: Vec<CheckpointEntry> = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| CheckpointEntry::from_record(index, record))
            .collect();
        write_atomic(&path, |out| Ok(serde_json::to_writer(out, &entries)?))?;
        Ok(entries)
    }
}

/// Leading columns: source position, identifier, then the union of scalar
/// property keys in first-appearance order.
fn assemble_table(
    entries: &[CheckpointEntry],
    feature_columns: Vec<String>,
    features: ndarray::Array2<f64>,
) -> Result<FeatureTable, CacheError> {
    let id_column = entries
        .first()
        .map(|e| e.record.id_column.clone())
        .unwrap_or_else(|| "id".to_string());

    let mut property_keys: Vec<&str> = Vec::new();
    for entry in entries {
        for (key, _) in &entry.record.properties {
            if !property_keys.contains(&key.as_str()) {
                property_keys.push(key);
            }
        }
    }

    let leading_columns: Vec<String> = ["", id_column.as_str()]
        .into_iter()
        .chain(property_keys.iter().copied())
        .map(str::to_string)
        .collect();

    let leading = entries
        .iter()
        .map(|entry| {
            let mut cells = Vec::with_capacity(leading_columns.len());
            cells.push(entry.index.to_string());
            cells.push(entry.record.id.clone());
            cells.extend(
                property_keys
                    .iter()
                    .map(|key| entry.record.property(key).map(format_value).unwrap_or_default()),
            );
            cells
        })
        .collect();

    FeatureTable::new(leading_columns, feature_columns, 1, leading, features)
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
