// src/metrics.rs
use std::fs;
use std::io;
use std::path::Path;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metric descriptions, so series carry help text in the export.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "collector_articles_fetched_total",
            "Raw articles returned by adapters."
        );
        describe_counter!(
            "collector_provider_errors_total",
            "Adapter calls that degraded to an empty result."
        );
        describe_counter!(
            "collector_classifications_total",
            "Classifier calls by provider and outcome."
        );
        describe_counter!(
            "collector_records_written_total",
            "Canonical records written to the dataset."
        );
        describe_histogram!("collector_fetch_ms", "Adapter call time in milliseconds.");
        describe_gauge!(
            "collector_last_run_ts",
            "Unix ts when the collector last finished a run."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder as the global metrics sink.
    pub fn install() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Write the exposition text (node-exporter textfile style: tmp + rename).
    pub fn write_textfile(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("prom.tmp");
        fs::write(&tmp, self.handle.render())?;
        fs::rename(tmp, path)
    }
}
