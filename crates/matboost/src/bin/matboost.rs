//! Command-line front end of the benchmark runner.
//!
//! Usage:
//!   matboost --config run.toml
//!   matboost --task SinglePropertyPrediction --database dft_3d \
//!       --benchmarks-dir benchmarks --dataset-dir datasets
//!
//! Flags given together with `--config` override the run file. Logging goes
//! through `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use matboost::cache::FeatureWidth;
use matboost::config::BenchmarkConfig;
use matboost::runner::BenchmarkRunner;
use matboost::task::TaskKind;

#[derive(Debug, Parser)]
#[command(name = "matboost", version, about = "Materials-property benchmark with boosted trees")]
struct Args {
    /// TOML run file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// SinglePropertyPrediction (regression) or SinglePropertyClass.
    #[arg(long)]
    task: Option<TaskKind>,

    /// Database to benchmark; repeat for several.
    #[arg(long = "database", value_name = "NAME")]
    databases: Vec<String>,

    /// Property to run; repeat for several. Default: every split archive.
    #[arg(long = "property", value_name = "NAME")]
    properties: Vec<String>,

    /// Root of the split archives.
    #[arg(long)]
    benchmarks_dir: Option<PathBuf>,

    /// Directory of `{database}.json` record files.
    #[arg(long)]
    dataset_dir: Option<PathBuf>,

    /// Where feature tables and structure checkpoints are cached.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Where prediction archives are written.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// `featurizer`, `matminer` or a fixed column count.
    #[arg(long, value_parser = parse_feature_width)]
    feature_width: Option<FeatureWidth>,

    /// Boosting rounds.
    #[arg(long)]
    n_estimators: Option<u32>,

    /// Worker threads for featurization and training; 0 uses every core.
    #[arg(long)]
    threads: Option<usize>,
}

fn parse_feature_width(value: &str) -> Result<FeatureWidth, String> {
    match value {
        "featurizer" => Ok(FeatureWidth::Featurizer),
        "matminer" => Ok(FeatureWidth::Matminer),
        other => other
            .parse()
            .map(FeatureWidth::Fixed)
            .map_err(|_| format!("expected featurizer, matminer or a number, got {other:?}")),
    }
}

fn load_config(args: Args) -> anyhow::Result<BenchmarkConfig> {
    let mut config = match &args.config {
        Some(path) => {
            BenchmarkConfig::from_toml_file(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => BenchmarkConfig::builder()
            .databases(args.databases.clone())
            .benchmarks_dir(args.benchmarks_dir.clone().context("--benchmarks-dir is required without --config")?)
            .dataset_dir(args.dataset_dir.clone().context("--dataset-dir is required without --config")?)
            .build()?,
    };

    if let Some(task) = args.task {
        config.task = task;
    }
    if !args.databases.is_empty() {
        config.databases = args.databases;
    }
    if !args.properties.is_empty() {
        config.properties = Some(args.properties);
    }
    if let Some(dir) = args.benchmarks_dir {
        config.benchmarks_dir = dir;
    }
    if let Some(dir) = args.dataset_dir {
        config.dataset_dir = dir;
    }
    if let Some(dir) = args.cache_dir {
        config.cache_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(width) = args.feature_width {
        config.feature_width = width;
    }
    if let Some(n) = args.n_estimators {
        config.estimator.n_estimators = n;
    }
    if let Some(n) = args.threads {
        config.n_threads = n;
        config.estimator.n_threads = n;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config(Args::parse())?;
    let report = BenchmarkRunner::new(config).run();
    print!("{report}");

    Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
