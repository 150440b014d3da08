//! Joins a split bundle against a feature table.
//!
//! The aligned matrix stacks the partitions as `train ++ val ++ test`; every
//! row is looked up in the feature table by identifier. Partition views are
//! taken from the front (train) and from the back (val, test) of the stack.

use std::collections::HashMap;
use std::fmt;

use ndarray::{Array2, ArrayView1, ArrayView2, s};

use crate::cache::FeatureTable;
use crate::split::SplitBundle;

/// Which partition a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    Train,
    Val,
    Test,
}

impl PartitionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that prevent building the aligned matrix.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlignmentError {
    #[error("sample {id:?} from {partition} is not in the feature table")]
    MissingId { id: String, partition: PartitionKind },

    #[error("sample {id:?} appears in both {first} and {second}")]
    DuplicateId { id: String, first: PartitionKind, second: PartitionKind },

    #[error("label of sample {id:?} is not numeric")]
    NonNumericLabel { id: String },

    #[error("{0} partition is empty")]
    EmptyPartition(PartitionKind),
}

/// Features and targets of every split sample, in `train ++ val ++ test` order.
#[derive(Debug, Clone)]
pub struct AlignedSampleMatrix {
    pub ids: Vec<String>,
    /// `n × n_features`
    pub x: Array2<f64>,
    /// `n × 1`
    pub y: Array2<f64>,
    pub n_train: usize,
    pub n_val: usize,
    pub n_test: usize,
}

/// Borrowed rows of one partition.
#[derive(Debug, Clone, Copy)]
pub struct PartitionView<'a> {
    pub ids: &'a [String],
    pub x: ArrayView2<'a, f64>,
    pub y: ArrayView1<'a, f64>,
}

impl PartitionView<'_> {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl AlignedSampleMatrix {
    pub fn n_samples(&self) -> usize {
        self.ids.len()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    fn view(&self, start: usize, end: usize) -> PartitionView<'_> {
        PartitionView {
            ids: &self.ids[start..end],
            x: self.x.slice(s![start..end, ..]),
            y: self.y.slice(s![start..end, 0]),
        }
    }

    pub fn train(&self) -> PartitionView<'_> {
        self.view(0, self.n_train)
    }

    pub fn val(&self) -> PartitionView<'_> {
        let n = self.n_samples();
        self.view(n - self.n_val - self.n_test, n - self.n_test)
    }

    pub fn test(&self) -> PartitionView<'_> {
        let n = self.n_samples();
        self.view(n - self.n_test, n)
    }
}

/// Build the aligned matrix for `bundle` from `table`.
pub fn align(table: &FeatureTable, bundle: &SplitBundle) -> Result<AlignedSampleMatrix, AlignmentError> {
    if bundle.train.is_empty() {
        return Err(AlignmentError::EmptyPartition(PartitionKind::Train));
    }
    if bundle.test.is_empty() {
        return Err(AlignmentError::EmptyPartition(PartitionKind::Test));
    }

    let partitions = [
        (PartitionKind::Train, &bundle.train),
        (PartitionKind::Val, &bundle.val),
        (PartitionKind::Test, &bundle.test),
    ];
    let n = bundle.train.len() + bundle.val.len() + bundle.test.len();
    let n_features = table.n_features();

    let mut seen: HashMap<&str, PartitionKind> = HashMap::with_capacity(n);
    let mut ids = Vec::with_capacity(n);
    let mut x = Array2::zeros((n, n_features));
    let mut y = Array2::zeros((n, 1));

    let entries = partitions
        .iter()
        .flat_map(|(kind, partition)| partition.iter().map(move |(id, label)| (*kind, id, label)));
    for (row, (kind, id, label)) in entries.enumerate() {
        if let Some(&first) = seen.get(id) {
            return Err(AlignmentError::DuplicateId { id: id.to_string(), first, second: kind });
        }
        seen.insert(id, kind);

        let features = table
            .row(id)
            .ok_or_else(|| AlignmentError::MissingId { id: id.to_string(), partition: kind })?;
        let target = label
            .as_f64()
            .ok_or_else(|| AlignmentError::NonNumericLabel { id: id.to_string() })?;

        x.row_mut(row).assign(&features);
        y[[row, 0]] = target;
        ids.push(id.to_string());
    }

    Ok(AlignedSampleMatrix {
        ids,
        x,
        y,
        n_train: bundle.train.len(),
        n_val: bundle.val.len(),
        n_test: bundle.test.len(),
    })
}
