//! Collector entrypoint: load configuration, run once, publish the CSV.
//!
//! Exit status: 0 when the dataset was written (even degraded), 2 when no
//! source returned anything, 1 on configuration or IO errors.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_news_collector::config::keywords::{load_keywords_default, load_keywords_from};
use trend_news_collector::config::signals::{load_signals_default, load_signals_from};
use trend_news_collector::metrics::Metrics;
use trend_news_collector::{Credentials, Pipeline, PipelineConfig, PipelineError};

#[derive(Debug, Parser)]
#[command(name = "trend-news-collector", version, about)]
struct Cli {
    /// Pipeline settings (TOML).
    #[arg(long, env = "PIPELINE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Country keyword configuration (TOML or JSON).
    #[arg(long, env = "KEYWORDS_PATH")]
    keywords: Option<PathBuf>,

    /// Trend signals (JSON).
    #[arg(long, env = "TREND_SIGNALS_PATH")]
    signals: Option<PathBuf>,

    /// Overrides `output_path` from the pipeline config.
    #[arg(long, env = "OUTPUT_PATH")]
    output: Option<PathBuf>,
}

/// RUST_LOG filter (default `info`); `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(p) => PipelineConfig::load_from(p)?,
        None => PipelineConfig::load_default()?,
    };
    if let Some(out) = cli.output {
        config.output_path = out;
    }
    let keywords = match &cli.keywords {
        Some(p) => load_keywords_from(p)?,
        None => load_keywords_default()?,
    };
    let signals = match &cli.signals {
        Some(p) => load_signals_from(p)?,
        None => load_signals_default()?,
    };

    let metrics = match Metrics::install() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "prometheus recorder not installed, metrics disabled");
            None
        }
    };

    let credentials = Credentials::from_env();
    info!(credentials = ?credentials, "credentials loaded");
    let pipeline = Pipeline::from_config(config, keywords, &credentials)
        .context("building adapters and classifiers")?;

    let result = pipeline.run_and_publish(&signals, Utc::now()).await;

    if let (Some(m), Some(path)) = (&metrics, &pipeline.config().metrics_path) {
        if let Err(e) = m.write_textfile(path) {
            warn!(path = %path.display(), error = %e, "writing metrics textfile failed");
        }
    }

    let report = result?;
    if !report.run.warnings.is_empty() {
        warn!(warnings = report.run.warnings.len(), "run completed with degraded sources");
    }
    info!(
        path = %report.path.display(),
        written = report.written,
        "collector finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local runs; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<PipelineError>() {
            Some(PipelineError::AllSourcesFailed { .. }) => {
                error!(error = %e, "no articles collected, previous dataset left untouched");
                ExitCode::from(2)
            }
            _ => {
                error!(error = format!("{e:#}"), "collector failed");
                ExitCode::from(1)
            }
        },
    }
}
