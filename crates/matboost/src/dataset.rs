//! Raw dataset records and the sources that provide them.
//!
//! A [`DatasetRecord`] is one database entry: an identifier, an atomic
//! structure, and whatever scalar properties the database carries. Records
//! come from a [`DatasetSource`]; [`JsonDatasetSource`] reads the
//! JARVIS-style JSON dumps (`{dir}/{name}.json`, an array of objects).

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::structure::Structure;

/// Columns tried, in order, for a record's identifier.
pub const ID_COLUMNS: [&str; 2] = ["id", "jid"];

/// Key holding the structure in a raw record.
pub const ATOMS_KEY: &str = "atoms";

/// Errors raised while loading raw records.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset {name} not found at {path}")]
    NotFound { name: String, path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

/// One raw database entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Sample identifier, kept verbatim.
    pub id: String,
    /// Name of the column the identifier came from (`id` or `jid`).
    pub id_column: String,
    pub atoms: Structure,
    /// Scalar properties in source order.
    pub properties: Vec<(String, Value)>,
}

impl DatasetRecord {
    /// Parse a JARVIS-style JSON object.
    ///
    /// Nested (array/object) fields other than `atoms` are not properties and
    /// are skipped.
    pub fn from_json(index: usize, object: Map<String, Value>) -> Result<Self, DatasetError> {
        let invalid = |reason: String| DatasetError::InvalidRecord { index, reason };

        let (id_column, id) = ID_COLUMNS
            .iter()
            .find_map(|&col| object.get(col).and_then(scalar_to_id).map(|id| (col.to_string(), id)))
            .ok_or_else(|| invalid("no `id` or `jid` field".to_string()))?;

        let atoms = object
            .get(ATOMS_KEY)
            .cloned()
            .ok_or_else(|| invalid("no `atoms` field".to_string()))
            .and_then(|v| serde_json::from_value::<Structure>(v).map_err(|e| invalid(e.to_string())))?;

        let properties = object
            .into_iter()
            .filter(|(key, value)| key != ATOMS_KEY && *key != id_column && is_scalar(value))
            .collect();

        Ok(Self { id, id_column, atoms, properties })
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn scalar_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Provides the raw records of a named database.
pub trait DatasetSource: Send + Sync {
    /// Load every record of `database`, in source order.
    fn load(&self, database: &str) -> Result<Vec<DatasetRecord>, DatasetError>;
}

/// Reads `{root}/{database}.json`, a JSON array of record objects.
#[derive(Debug, Clone)]
pub struct JsonDatasetSource {
    root: PathBuf,
}

impl JsonDatasetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, database: &str) -> PathBuf {
        self.root.join(format!("{database}.json"))
    }

    fn read(path: &Path) -> Result<Vec<Map<String, Value>>, DatasetError> {
        let file = fs::File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

impl DatasetSource for JsonDatasetSource {
    fn load(&self, database: &str) -> Result<Vec<DatasetRecord>, DatasetError> {
        let path = self.path_for(database);
        if !path.exists() {
            return Err(DatasetError::NotFound { name: database.to_string(), path });
        }
        Self::read(&path)?
            .into_iter()
            .enumerate()
            .map(|(index, object)| DatasetRecord::from_json(index, object))
            .collect()
    }
}

/// In-memory source, mostly useful for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatasetSource {
    databases: Vec<(String, Vec<DatasetRecord>)>,
}

impl MemoryDatasetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, name: impl Into<String>, records: Vec<DatasetRecord>) -> Self {
        self.databases.push((name.into(), records));
        self
    }
}

impl DatasetSource for MemoryDatasetSource {
    fn load(&self, database: &str) -> Result<Vec<DatasetRecord>, DatasetError> {
        self.databases
            .iter()
            .find(|(name, _)| name == database)
            .map(|(_, records)| records.clone())
            .ok_or_else(|| DatasetError::NotFound {
                name: database.to_string(),
                path: PathBuf::from("<memory>"),
            })
    }
}
