//! Benchmark split bundles.
//!
//! Each `(database, property)` benchmark ships as
//! `{benchmarks}/{task}/{db}_{prop}.json.zip`, a zip archive holding one JSON
//! document `{db}_{prop}.json`:
//!
//! ```text
//! { "train": {"JVASP-1": 0.5, ...}, "val": {...}, "test": {...} }
//! ```
//!
//! `val` may be absent. Partition order is the order of keys in the file and
//! is kept exactly, duplicates included.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::task::TaskKind;

const ARCHIVE_SUFFIX: &str = ".json.zip";

/// Errors raised while loading a split bundle.
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("split archive not found: {0}")]
    NotFound(PathBuf),

    #[error("entry {entry} missing from {archive}")]
    MissingEntry { archive: PathBuf, entry: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Labels and partitions
// =============================================================================

/// A target value as stored in a split file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Number(f64),
    Bool(bool),
    Text(String),
    /// JSON `null`: the sample has no known target.
    Null,
}

impl Label {
    /// Numeric value of the label; booleans map to 0/1, strings must parse
    /// and `null` becomes `NaN`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null => Some(f64::NAN),
        }
    }
}

impl From<f64> for Label {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

/// Ordered `id → label` entries of one partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition(pub Vec<(String, Label)>);

impl Partition {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Label)> {
        self.0.iter().map(|(id, label)| (id.as_str(), label))
    }
}

impl<K: Into<String>, L: Into<Label>> FromIterator<(K, L)> for Partition {
    fn from_iter<I: IntoIterator<Item = (K, L)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, l)| (k.into(), l.into())).collect())
    }
}

impl Serialize for Partition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, label) in &self.0 {
            map.serialize_entry(id, label)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Partition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PartitionVisitor;

        impl<'de> Visitor<'de> for PartitionVisitor {
            type Value = Partition;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of sample id to label")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Partition, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, label)) = access.next_entry::<String, Label>()? {
                    entries.push((id, label));
                }
                Ok(Partition(entries))
            }
        }

        deserializer.deserialize_map(PartitionVisitor)
    }
}

/// The three partitions of one benchmark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitBundle {
    pub train: Partition,
    #[serde(default)]
    pub val: Partition,
    pub test: Partition,
}

impl SplitBundle {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, SplitError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// =============================================================================
// SplitLoader
// =============================================================================

/// Locates and reads split archives of one task.
#[derive(Debug, Clone)]
pub struct SplitLoader {
    task_dir: PathBuf,
}

impl SplitLoader {
    pub fn new(benchmarks_dir: impl Into<PathBuf>, task: TaskKind) -> Self {
        Self { task_dir: benchmarks_dir.into().join(task.dir_name()) }
    }

    pub fn task_dir(&self) -> &std::path::Path {
        &self.task_dir
    }

    pub fn archive_path(&self, database: &str, property: &str) -> PathBuf {
        self.task_dir.join(format!("{database}_{property}{ARCHIVE_SUFFIX}"))
    }

    pub fn load_split(&self, database: &str, property: &str) -> Result<SplitBundle, SplitError> {
        let archive_path = self.archive_path(database, property);
        if !archive_path.is_file() {
            return Err(SplitError::NotFound(archive_path));
        }
        let entry_name = format!("{database}_{property}.json");
        let mut archive = zip::ZipArchive::new(fs::File::open(&archive_path)?)?;
        let entry = match archive.by_name(&entry_name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(SplitError::MissingEntry { archive: archive_path, entry: entry_name });
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_reader(entry)?)
    }

    /// Properties with a split archive for `database`, sorted by name.
    pub fn properties(&self, database: &str) -> Result<Vec<String>, SplitError> {
        if !self.task_dir.is_dir() {
            return Err(SplitError::NotFound(self.task_dir.clone()));
        }
        let prefix = format!("{database}_");
        let mut props = Vec::new();
        for entry in fs::read_dir(&self.task_dir)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(prop) = name.strip_prefix(&prefix).and_then(|rest| rest.strip_suffix(ARCHIVE_SUFFIX)) {
                if !prop.is_empty() {
                    props.push(prop.to_string());
                }
            }
        }
        props.sort();
        Ok(props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_split_archive;

    #[test]
    fn partition_keeps_order_and_duplicates() {
        let bundle = SplitBundle::from_json_slice(
            br#"{"train": {"b": 1, "a": 2.5, "b": "3"}, "test": {"z": true}}"#,
        )
        .unwrap();
        let ids: Vec<_> = bundle.train.ids().collect();
        assert_eq!(ids, ["b", "a", "b"]);
        assert_eq!(bundle.train.0[2].1.as_f64(), Some(3.0));
        assert_eq!(bundle.test.0[0].1.as_f64(), Some(1.0));
        assert!(bundle.val.is_empty());
    }

    #[test]
    fn missing_test_is_a_parse_error() {
        let err = SplitBundle::from_json_slice(br#"{"train": {"a": 1}}"#).unwrap_err();
        assert!(matches!(err, SplitError::Json(_)));
    }

    #[test]
    fn null_label_parses_as_missing() {
        let bundle = SplitBundle::from_json_slice(br#"{"train": {"a": 1.0, "b": 2.0}, "test": {"c": null}}"#).unwrap();
        assert_eq!(bundle.test.0[0], ("c".to_string(), Label::Null));
        assert!(bundle.test.0[0].1.as_f64().unwrap().is_nan());

        let json = serde_json::to_string(&bundle.test).unwrap();
        assert_eq!(json, r#"{"c":null}"#);
    }

    #[test]
    fn non_numeric_text_label() {
        assert_eq!(Label::Text("metal".into()).as_f64(), None);
        assert_eq!(Label::Text(" 0.25 ".into()).as_f64(), Some(0.25));
    }

    #[test]
    fn loads_archive_and_lists_properties() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SplitLoader::new(dir.path(), TaskKind::Regression);
        let bundle = SplitBundle {
            train: [("a", 1.0), ("b", 2.0)].into_iter().collect(),
            val: Partition::default(),
            test: [("c", 3.0)].into_iter().collect(),
        };
        write_split_archive(&loader.archive_path("toy", "gap"), "toy_gap.json", &bundle).unwrap();
        write_split_archive(&loader.archive_path("toy", "bulk_modulus"), "toy_bulk_modulus.json", &bundle).unwrap();
        write_split_archive(&loader.archive_path("other", "gap"), "other_gap.json", &bundle).unwrap();

        assert_eq!(loader.properties("toy").unwrap(), ["bulk_modulus", "gap"]);
        assert_eq!(loader.load_split("toy", "gap").unwrap(), bundle);
    }

    #[test]
    fn missing_archive_and_entry() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SplitLoader::new(dir.path(), TaskKind::Classification);
        assert!(matches!(loader.load_split("toy", "gap"), Err(SplitError::NotFound(_))));

        write_split_archive(&loader.archive_path("toy", "gap"), "wrong.json", &SplitBundle::default()).unwrap();
        assert!(matches!(loader.load_split("toy", "gap"), Err(SplitError::MissingEntry { .. })));
    }
}
