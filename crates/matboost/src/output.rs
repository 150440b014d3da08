//! Run artifacts: naming, completion checks and prediction archives.
//!
//! A finished `(task, property, database)` run leaves
//! `AI-{task}-{property}-{database}-test-{suffix}.csv.zip` in the output
//! directory. Either that archive or the plain CSV marks the run complete.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ndarray::ArrayView1;
use zip::write::SimpleFileOptions;

use crate::task::TaskKind;
use crate::utils::write_atomic;

/// Errors while writing predictions.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{ids} ids but {predictions} predictions")]
    LengthMismatch { ids: usize, predictions: usize },
}

/// Identity of one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub task: TaskKind,
    pub property: String,
    pub database: String,
}

impl ArtifactKey {
    pub fn new(task: TaskKind, property: impl Into<String>, database: impl Into<String>) -> Self {
        Self { task, property: property.into(), database: database.into() }
    }

    /// Name of the prediction CSV.
    pub fn file_name(&self) -> String {
        format!(
            "AI-{}-{}-{}-test-{}.csv",
            self.task.dir_name(),
            self.property,
            self.database,
            self.task.suffix()
        )
    }

    /// Name of the archived predictions.
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.file_name())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.task, self.database, self.property)
    }
}

// =============================================================================
// Completion
// =============================================================================

/// Answers whether a run already produced its artifact.
pub trait CompletionStore {
    fn has_completed(&self, key: &ArtifactKey) -> bool;
}

/// Looks for either artifact file in an output directory.
#[derive(Debug, Clone)]
pub struct FsCompletionStore {
    dir: PathBuf,
}

impl FsCompletionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CompletionStore for FsCompletionStore {
    fn has_completed(&self, key: &ArtifactKey) -> bool {
        self.dir.join(key.archive_name()).exists() || self.dir.join(key.file_name()).exists()
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Writes `id,prediction` tables and archives them.
#[derive(Debug, Clone)]
pub struct PredictionWriter {
    dir: PathBuf,
}

impl PredictionWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn csv_path(&self, key: &ArtifactKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn archive_path(&self, key: &ArtifactKey) -> PathBuf {
        self.dir.join(key.archive_name())
    }

    /// Write the CSV, archive it, then remove the CSV.
    ///
    /// Returns the archive path.
    pub fn write(&self, key: &ArtifactKey, ids: &[String], predictions: ArrayView1<f64>) -> Result<PathBuf, OutputError> {
        if ids.len() != predictions.len() {
            return Err(OutputError::LengthMismatch { ids: ids.len(), predictions: predictions.len() });
        }
        let csv_path = self.csv_path(key);
        write_predictions_csv(&csv_path, ids, predictions)?;

        let archive_path = self.archive_path(key);
        archive_single_file(&csv_path, &archive_path, &key.file_name())?;
        fs::remove_file(&csv_path)?;
        tracing::debug!(path = %archive_path.display(), rows = ids.len(), "wrote predictions");
        Ok(archive_path)
    }
}

fn write_predictions_csv(path: &Path, ids: &[String], predictions: ArrayView1<f64>) -> Result<(), OutputError> {
    write_atomic(path, |out| {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(["id", "prediction"])?;
        for (id, value) in ids.iter().zip(predictions) {
            writer.write_record([id.as_str(), value.to_string().as_str()])?;
        }
        writer.flush()?;
        Ok(())
    })?;
    Ok(())
}

/// Zip `source` into `archive` as one deflated entry called `entry_name`.
fn archive_single_file(source: &Path, archive: &Path, entry_name: &str) -> Result<(), OutputError> {
    let content = fs::read(source)?;
    write_atomic(archive, |out| {
        let mut zip = zip::ZipWriter::new(out);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        zip.start_file(entry_name, options)?;
        zip.write_all(&content)?;
        zip.finish()?;
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Read;

    fn key() -> ArtifactKey {
        ArtifactKey::new(TaskKind::Regression, "formation_energy_peratom", "dft_3d")
    }

    #[test]
    fn artifact_names() {
        assert_eq!(
            key().file_name(),
            "AI-SinglePropertyPrediction-formation_energy_peratom-dft_3d-test-mae.csv"
        );
        let clf = ArtifactKey::new(TaskKind::Classification, "magmom", "dft_3d");
        assert_eq!(clf.archive_name(), "AI-SinglePropertyClass-magmom-dft_3d-test-acc.csv.zip");
    }

    #[test]
    fn writes_archive_and_removes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PredictionWriter::new(dir.path().join("out"));
        let ids = vec!["JVASP-2".to_string(), "JVASP-1".to_string()];
        let archive = writer.write(&key(), &ids, array![0.5, 1.0].view()).unwrap();

        assert!(!writer.csv_path(&key()).exists());
        let mut zip = zip::ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
        let mut text = String::new();
        zip.by_name(&key().file_name()).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "id,prediction\nJVASP-2,0.5\nJVASP-1,1\n");
    }

    #[test]
    fn completion_sees_either_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCompletionStore::new(dir.path());
        assert!(!store.has_completed(&key()));

        fs::write(dir.path().join(key().file_name()), "id,prediction\n").unwrap();
        assert!(store.has_completed(&key()));

        let other = ArtifactKey::new(TaskKind::Regression, "bulk_modulus_kv", "dft_3d");
        fs::write(dir.path().join(other.archive_name()), b"").unwrap();
        assert!(store.has_completed(&other));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PredictionWriter::new(dir.path());
        let err = writer.write(&key(), &["a".to_string()], array![1.0, 2.0].view()).unwrap_err();
        assert!(matches!(err, OutputError::LengthMismatch { ids: 1, predictions: 2 }));
    }
}
