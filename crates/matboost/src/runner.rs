//! The benchmark loop over databases and properties.
//!
//! For each database the runner resolves the properties to run, makes sure
//! the feature table exists, then runs every pending property: load split,
//! align, fit, predict, archive. A property whose artifact already exists is
//! skipped. Failures are contained: a property failure never stops the next
//! property, a feature-cache failure only stops its own database.

use std::fmt;
use std::time::{Duration, Instant};

use crate::align::align;
use crate::cache::{FeatureCache, FeatureTable};
use crate::config::BenchmarkConfig;
use crate::dataset::{DatasetSource, JsonDatasetSource};
use crate::error::BenchError;
use crate::featurize::{BasicStructureFeaturizer, Featurizer};
use crate::metrics::MetricFn;
use crate::output::{ArtifactKey, CompletionStore, FsCompletionStore, PredictionWriter};
use crate::pipeline::Pipeline;
use crate::split::SplitLoader;
use crate::utils::run_with_threads;

// =============================================================================
// Report
// =============================================================================

/// Final state of one `(database, property)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// The artifact already existed.
    Skipped,
    Done {
        /// MAE or accuracy on the test partition.
        metric: f64,
        n_train: usize,
        n_val: usize,
        n_test: usize,
        elapsed: Duration,
    },
    Failed { reason: String },
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyOutcome {
    pub key: ArtifactKey,
    pub status: RunStatus,
}

/// What happened to one database.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseOutcome {
    Completed { database: String, properties: Vec<PropertyOutcome> },
    /// The feature table could not be built or read; no property ran.
    CacheFailed { database: String, reason: String },
    /// The split directory could not be listed.
    ListingFailed { database: String, reason: String },
}

impl DatabaseOutcome {
    pub fn database(&self) -> &str {
        match self {
            Self::Completed { database, .. }
            | Self::CacheFailed { database, .. }
            | Self::ListingFailed { database, .. } => database,
        }
    }

    pub fn properties(&self) -> &[PropertyOutcome] {
        match self {
            Self::Completed { properties, .. } => properties,
            _ => &[],
        }
    }
}

/// Outcomes of a whole run, in run order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub databases: Vec<DatabaseOutcome>,
}

impl RunReport {
    pub fn properties(&self) -> impl Iterator<Item = &PropertyOutcome> {
        self.databases.iter().flat_map(DatabaseOutcome::properties)
    }

    fn count(&self, label: &str) -> usize {
        self.properties().filter(|p| p.status.label() == label).count()
    }

    pub fn n_done(&self) -> usize {
        self.count("done")
    }

    pub fn n_skipped(&self) -> usize {
        self.count("skipped")
    }

    pub fn n_failed(&self) -> usize {
        self.count("failed")
    }

    /// Databases that produced no property outcomes because of an error.
    pub fn n_failed_databases(&self) -> usize {
        self.databases
            .iter()
            .filter(|d| !matches!(d, DatabaseOutcome::Completed { .. }))
            .count()
    }

    /// Whether every attempted property ended done or skipped.
    pub fn is_success(&self) -> bool {
        self.n_failed() == 0 && self.n_failed_databases() == 0
    }

    pub fn find(&self, database: &str, property: &str) -> Option<&PropertyOutcome> {
        self.properties()
            .find(|p| p.key.database == database && p.key.property == property)
    }

    /// Plain-text summary table.
    pub fn summary_table(&self) -> String {
        let mut rows: Vec<[String; 7]> = vec![[
            "database".into(),
            "property".into(),
            "status".into(),
            "metric".into(),
            "train".into(),
            "val".into(),
            "test".into(),
        ]];
        for outcome in &self.databases {
            match outcome {
                DatabaseOutcome::Completed { properties, .. } => {
                    rows.extend(properties.iter().map(property_row));
                }
                DatabaseOutcome::CacheFailed { database, reason } | DatabaseOutcome::ListingFailed { database, reason } => {
                    rows.push([database.clone(), "*".into(), "failed".into(), reason.clone(), "".into(), "".into(), "".into()]);
                }
            }
        }

        let mut widths = [0usize; 7];
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.len());
            }
        }
        let mut out = String::new();
        for row in &rows {
            let line: Vec<String> = row
                .iter()
                .zip(widths)
                .map(|(cell, w)| format!("{cell:<w$}"))
                .collect();
            out.push_str(line.join("  ").trim_end());
            out.push('\n');
        }
        out.push_str(&format!(
            "\n{} done, {} skipped, {} failed\n",
            self.n_done(),
            self.n_skipped(),
            self.n_failed() + self.n_failed_databases()
        ));
        out
    }
}

fn property_row(outcome: &PropertyOutcome) -> [String; 7] {
    let key = &outcome.key;
    let (metric, train, val, test) = match &outcome.status {
        RunStatus::Done { metric, n_train, n_val, n_test, .. } => (
            format!("{}={metric:.4}", key.task.metric().name()),
            n_train.to_string(),
            n_val.to_string(),
            n_test.to_string(),
        ),
        RunStatus::Failed { reason } => (reason.clone(), String::new(), String::new(), String::new()),
        RunStatus::Skipped => Default::default(),
    };
    [
        key.database.clone(),
        key.property.clone(),
        outcome.status.label().to_string(),
        metric,
        train,
        val,
        test,
    ]
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary_table())
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Drives one benchmark configuration.
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    source: Box<dyn DatasetSource>,
    featurizer: Box<dyn Featurizer>,
    completion: Box<dyn CompletionStore>,
}

impl BenchmarkRunner {
    /// Runner reading `{dataset_dir}/{db}.json`, featurizing with
    /// [`BasicStructureFeaturizer`] and checking completion in `output_dir`.
    pub fn new(config: BenchmarkConfig) -> Self {
        let source = JsonDatasetSource::new(&config.dataset_dir);
        let completion = FsCompletionStore::new(&config.output_dir);
        Self {
            config,
            source: Box::new(source),
            featurizer: Box::new(BasicStructureFeaturizer),
            completion: Box::new(completion),
        }
    }

    pub fn with_source(mut self, source: impl DatasetSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_featurizer(mut self, featurizer: impl Featurizer + 'static) -> Self {
        self.featurizer = Box::new(featurizer);
        self
    }

    pub fn with_completion_store(mut self, store: impl CompletionStore + 'static) -> Self {
        self.completion = Box::new(store);
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run every configured database in order.
    pub fn run(&self) -> RunReport {
        tracing::info!(
            task = %self.config.task,
            databases = self.config.databases.len(),
            "starting benchmark"
        );
        let databases = self.config.databases.iter().map(|db| self.run_database(db)).collect();
        let report = RunReport { databases };
        tracing::info!(
            done = report.n_done(),
            skipped = report.n_skipped(),
            failed = report.n_failed(),
            "benchmark finished"
        );
        report
    }

    pub fn run_database(&self, database: &str) -> DatabaseOutcome {
        let loader = SplitLoader::new(&self.config.benchmarks_dir, self.config.task);
        let properties = match &self.config.properties {
            Some(properties) => properties.clone(),
            None => match loader.properties(database) {
                Ok(properties) => properties,
                Err(err) => {
                    tracing::warn!(database, %err, "cannot list split archives");
                    return DatabaseOutcome::ListingFailed { database: database.to_string(), reason: err.to_string() };
                }
            },
        };
        tracing::info!(database, properties = properties.len(), "processing database");

        let keys: Vec<ArtifactKey> = properties
            .iter()
            .map(|p| ArtifactKey::new(self.config.task, p.as_str(), database))
            .collect();
        let pending: Vec<bool> = keys.iter().map(|k| !self.completion.has_completed(k)).collect();

        // The table is only needed when some property still has to run.
        let table = if pending.iter().any(|&p| p) {
            match self.ensure_table(database) {
                Ok(table) => Some(table),
                Err(err) => {
                    tracing::warn!(database, %err, "feature cache unavailable, skipping database");
                    return DatabaseOutcome::CacheFailed { database: database.to_string(), reason: err.to_string() };
                }
            }
        } else {
            None
        };

        let outcomes = keys
            .into_iter()
            .zip(pending)
            .map(|(key, pending)| match (&table, pending) {
                (Some(table), true) => self.run_property(key, table, &loader),
                _ => {
                    tracing::info!(artifact = %key.archive_name(), "already completed, skipping");
                    PropertyOutcome { key, status: RunStatus::Skipped }
                }
            })
            .collect();
        DatabaseOutcome::Completed { database: database.to_string(), properties: outcomes }
    }

    fn ensure_table(&self, database: &str) -> Result<FeatureTable, BenchError> {
        let spec = self.config.feature_width.spec_for(database, self.featurizer.as_ref());
        let source = self.source.as_ref();
        let featurizer = self.featurizer.as_ref();
        let cache_dir = &self.config.cache_dir;
        let shuffle_seed = self.config.shuffle_seed;
        let table = run_with_threads(self.config.n_threads, |parallelism| {
            FeatureCache::new(cache_dir)
                .with_shuffle_seed(shuffle_seed)
                .with_parallelism(parallelism)
                .ensure_features(&spec, source, featurizer)
        })?;
        Ok(table)
    }

    /// Run one property against an already-built feature table.
    pub fn run_property(&self, key: ArtifactKey, table: &FeatureTable, loader: &SplitLoader) -> PropertyOutcome {
        if self.completion.has_completed(&key) {
            return PropertyOutcome { key, status: RunStatus::Skipped };
        }
        tracing::info!(database = %key.database, property = %key.property, "running property");
        let status = match self.execute(&key, table, loader) {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(database = %key.database, property = %key.property, %err, "property failed");
                RunStatus::Failed { reason: err.to_string() }
            }
        };
        PropertyOutcome { key, status }
    }

    fn execute(&self, key: &ArtifactKey, table: &FeatureTable, loader: &SplitLoader) -> Result<RunStatus, BenchError> {
        let started = Instant::now();
        let bundle = loader.load_split(&key.database, &key.property)?;
        let matrix = align(table, &bundle)?;
        let (train, val, test) = (matrix.train(), matrix.val(), matrix.test());
        tracing::debug!(
            train = train.len(),
            val = val.len(),
            test = test.len(),
            features = matrix.n_features(),
            "aligned split"
        );

        let mut pipeline = Pipeline::new(self.config.task, &self.config.estimator);
        pipeline.fit(train.x, train.y)?;
        let predictions = pipeline.predict(test.x)?;

        let metric_fn = key.task.metric();
        let metric = metric_fn.compute(predictions.view(), test.y);
        let archive = PredictionWriter::new(&self.config.output_dir).write(key, test.ids, predictions.view())?;

        let elapsed = started.elapsed();
        tracing::info!(
            database = %key.database,
            property = %key.property,
            metric = metric_fn.name(),
            value = metric,
            elapsed_s = elapsed.as_secs_f64(),
            archive = %archive.display(),
            "property done"
        );
        Ok(RunStatus::Done { metric, n_train: train.len(), n_val: val.len(), n_test: test.len(), elapsed })
    }
}

impl fmt::Debug for BenchmarkRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchmarkRunner").field("config", &self.config).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    fn key(property: &str) -> ArtifactKey {
        ArtifactKey::new(TaskKind::Regression, property, "dft_3d")
    }

    fn done(metric: f64) -> RunStatus {
        RunStatus::Done { metric, n_train: 3, n_val: 0, n_test: 2, elapsed: Duration::from_millis(5) }
    }

    fn report() -> RunReport {
        RunReport {
            databases: vec![
                DatabaseOutcome::Completed {
                    database: "dft_3d".into(),
                    properties: vec![
                        PropertyOutcome { key: key("gap"), status: done(0.25) },
                        PropertyOutcome { key: key("bulk"), status: RunStatus::Skipped },
                        PropertyOutcome { key: key("shear"), status: RunStatus::Failed { reason: "boom".into() } },
                    ],
                },
                DatabaseOutcome::CacheFailed { database: "ssub".into(), reason: "no data".into() },
            ],
        }
    }

    #[test]
    fn report_counts() {
        let report = report();
        assert_eq!(report.n_done(), 1);
        assert_eq!(report.n_skipped(), 1);
        assert_eq!(report.n_failed(), 1);
        assert_eq!(report.n_failed_databases(), 1);
        assert!(!report.is_success());
        assert_eq!(report.find("dft_3d", "gap").unwrap().status, done(0.25));
        assert!(report.find("ssub", "gap").is_none());
    }

    #[test]
    fn summary_table_lists_every_row() {
        let table = report().summary_table();
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("database"));
        assert!(lines[1].contains("gap") && lines[1].contains("done") && lines[1].contains("mae=0.2500"));
        assert!(lines[2].contains("skipped"));
        assert!(lines[3].contains("boom"));
        assert!(lines[4].starts_with("ssub") && lines[4].contains("no data"));
        assert!(table.ends_with("1 done, 1 skipped, 2 failed\n"));
    }
}
