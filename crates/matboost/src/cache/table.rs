//! The persisted feature table.
//!
//! On disk a table is a CSV file with a header row: some leading metadata
//! columns (source position, identifier, scalar properties) followed by
//! exactly `n_features` numeric columns. Missing values are empty cells;
//! `nan` is accepted on input as well.

use std::collections::HashMap;
use std::path::Path;

use ndarray::{Array2, ArrayView1, ArrayView2};

use super::CacheError;
use crate::dataset::ID_COLUMNS;
use crate::utils::write_atomic;

/// Feature vectors keyed by sample identifier.
///
/// Lookups go through the identifier index only; row positions are an
/// implementation detail of the file.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    leading_columns: Vec<String>,
    feature_columns: Vec<String>,
    id_column: usize,
    leading: Vec<Vec<String>>,
    features: Array2<f64>,
    index: HashMap<String, usize>,
}

impl FeatureTable {
    /// Assemble a table, checking shapes and identifier uniqueness.
    pub fn new(
        leading_columns: Vec<String>,
        feature_columns: Vec<String>,
        id_column: usize,
        leading: Vec<Vec<String>>,
        features: Array2<f64>,
    ) -> Result<Self, CacheError> {
        if id_column >= leading_columns.len() {
            return Err(CacheError::MalformedTable(format!(
                "identifier column {id_column} out of range for {} leading columns",
                leading_columns.len()
            )));
        }
        if features.dim() != (leading.len(), feature_columns.len()) {
            return Err(CacheError::MalformedTable(format!(
                "feature block is {:?}, expected ({}, {})",
                features.dim(),
                leading.len(),
                feature_columns.len()
            )));
        }
        let mut index = HashMap::with_capacity(leading.len());
        for (row, cells) in leading.iter().enumerate() {
            if cells.len() != leading_columns.len() {
                return Err(CacheError::MalformedTable(format!(
                    "row {row} has {} leading cells, expected {}",
                    cells.len(),
                    leading_columns.len()
                )));
            }
            if index.insert(cells[id_column].clone(), row).is_some() {
                return Err(CacheError::MalformedTable(format!(
                    "duplicate identifier {:?}",
                    cells[id_column]
                )));
            }
        }
        Ok(Self { leading_columns, feature_columns, id_column, leading, features, index })
    }

    pub fn n_rows(&self) -> usize {
        self.leading.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_columns.len()
    }

    pub fn leading_columns(&self) -> &[String] {
        &self.leading_columns
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Name of the identifier column.
    pub fn id_column(&self) -> &str {
        &self.leading_columns[self.id_column]
    }

    /// Identifiers in file order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.leading.iter().map(|cells| cells[self.id_column].as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Feature vector of `id`.
    pub fn row(&self, id: &str) -> Option<ArrayView1<'_, f64>> {
        self.index.get(id).map(|&r| self.features.row(r))
    }

    /// Leading cell of `id` in `column`.
    pub fn leading_value(&self, id: &str, column: &str) -> Option<&str> {
        let row = *self.index.get(id)?;
        let col = self.leading_columns.iter().position(|c| c == column)?;
        Some(self.leading[row][col].as_str())
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    // =========================================================================
    // CSV
    // =========================================================================

    /// Read a table whose last `n_features` columns are the features.
    ///
    /// The identifier column is `id` if present, else `jid`, else the first
    /// column.
    pub fn read_csv(path: &Path, n_features: usize) -> Result<Self, CacheError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if header.len() <= n_features {
            return Err(CacheError::MalformedTable(format!(
                "{} has {} columns, need at least {} features plus an identifier",
                path.display(),
                header.len(),
                n_features
            )));
        }
        let n_leading = header.len() - n_features;
        let leading_columns = header[..n_leading].to_vec();
        let feature_columns = header[n_leading..].to_vec();
        let id_column = ID_COLUMNS
            .iter()
            .find_map(|name| leading_columns.iter().position(|c| c == name))
            .unwrap_or(0);

        let mut leading = Vec::new();
        let mut values = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            leading.push(record.iter().take(n_leading).map(str::to_string).collect());
            for (col, cell) in record.iter().skip(n_leading).enumerate() {
                values.push(parse_cell(cell).ok_or_else(|| {
                    CacheError::MalformedTable(format!(
                        "row {row}, column {:?}: not a number: {cell:?}",
                        feature_columns[col]
                    ))
                })?);
            }
        }
        let features = Array2::from_shape_vec((leading.len(), n_features), values)
            .map_err(|e| CacheError::MalformedTable(e.to_string()))?;
        Self::new(leading_columns, feature_columns, id_column, leading, features)
    }

    /// Write the table through a staging file.
    pub fn write_csv(&self, path: &Path) -> Result<(), CacheError> {
        write_atomic(path, |out| {
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(self.leading_columns.iter().chain(&self.feature_columns))?;
            for (cells, features) in self.leading.iter().zip(self.features.rows()) {
                let numeric = features.iter().map(|&v| format_cell(v));
                writer.write_record(cells.iter().cloned().chain(numeric))?;
            }
            writer.flush()?;
            Ok(())
        })?;
        Ok(())
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    cell.parse().ok()
}

fn format_cell(value: f64) -> String {
    if value.is_nan() { String::new() } else { value.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::fs;

    fn sample() -> FeatureTable {
        FeatureTable::new(
            vec!["".into(), "jid".into(), "formula".into()],
            vec!["f0".into(), "f1".into()],
            1,
            vec![
                vec!["2".into(), "JVASP-3".into(), "NaCl".into()],
                vec!["0".into(), "JVASP-1".into(), "Si".into()],
            ],
            array![[1.5, f64::NAN], [0.25, -3.0]],
        )
        .unwrap()
    }

    #[test]
    fn lookup_is_by_identifier() {
        let t = sample();
        assert_eq!(t.id_column(), "jid");
        assert_eq!(t.row("JVASP-1").unwrap().to_vec(), vec![0.25, -3.0]);
        assert!(t.row("JVASP-2").is_none());
        assert_eq!(t.leading_value("JVASP-3", "formula"), Some("NaCl"));
    }

    #[test]
    fn csv_round_trip_keeps_missing_cells_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("X_toy.csv");
        sample().write_csv(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, ",jid,formula,f0,f1\n2,JVASP-3,NaCl,1.5,\n0,JVASP-1,Si,0.25,-3\n");

        let back = FeatureTable::read_csv(&path, 2).unwrap();
        assert_eq!(back.n_rows(), 2);
        assert_eq!(back.feature_columns(), ["f0", "f1"]);
        assert!(back.row("JVASP-3").unwrap()[1].is_nan());
        assert_eq!(back.row("JVASP-1").unwrap()[1], -3.0);
    }

    #[test]
    fn reads_nan_literal_and_prefers_id_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("X.csv");
        fs::write(&path, "jid,id,f0\nA,7,nan\nB,8,2\n").unwrap();
        let t = FeatureTable::read_csv(&path, 1).unwrap();
        assert_eq!(t.id_column(), "id");
        assert!(t.row("7").unwrap()[0].is_nan());
        assert_eq!(t.row("8").unwrap()[0], 2.0);
    }

    #[test]
    fn falls_back_to_first_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("X.csv");
        fs::write(&path, "name,f0\nfoo,1\n").unwrap();
        let t = FeatureTable::read_csv(&path, 1).unwrap();
        assert_eq!(t.id_column(), "name");
        assert!(t.contains("foo"));
    }

    #[test]
    fn rejects_duplicate_ids_and_bad_cells() {
        let dir = tempfile::tempdir().unwrap();
        let dup = dir.path().join("dup.csv");
        fs::write(&dup, "id,f0\na,1\na,2\n").unwrap();
        assert!(matches!(FeatureTable::read_csv(&dup, 1), Err(CacheError::MalformedTable(_))));

        let bad = dir.path().join("bad.csv");
        fs::write(&bad, "id,f0\na,abc\n").unwrap();
        assert!(matches!(FeatureTable::read_csv(&bad, 1), Err(CacheError::MalformedTable(_))));

        let narrow = dir.path().join("narrow.csv");
        fs::write(&narrow, "f0,f1\n1,2\n").unwrap();
        assert!(matches!(FeatureTable::read_csv(&narrow, 2), Err(CacheError::MalformedTable(_))));
    }
}
