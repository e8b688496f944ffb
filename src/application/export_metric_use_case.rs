// ============================================================
// Layer 2 — Export Metric Use Case
// ============================================================
// Writes the constructor arguments of a registered metric to a
// JSON file so the scorer can rebuild the identical metric:
//
//   Step 1: Resolve the metric name       (Layer 3 - domain)
//   Step 2: Construct it with defaults    (Layer 3 - domain)
//   Step 3: Save its configuration        (Layer 6 - infra)
//
// The name is resolved before anything is constructed or
// written, so an unsupported name leaves no output file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::constants::PERPLEXITY;
use crate::domain::error::Result;
use crate::domain::metric::{Metric, MetricConfig, MetricKind};
use crate::infra::metric_store::save_config;

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetricConfig {
    /// Registry key of the metric to export
    pub metric: String,
    /// Destination JSON file
    pub output: PathBuf,
}

impl Default for ExportMetricConfig {
    fn default() -> Self {
        Self {
            metric: PERPLEXITY.to_string(),
            output: PathBuf::from("metric.json"),
        }
    }
}

// ─── ExportMetricUseCase ──────────────────────────────────────────────────────
pub struct ExportMetricUseCase {
    config: ExportMetricConfig,
}

impl ExportMetricUseCase {
    pub fn new(config: ExportMetricConfig) -> Self {
        Self { config }
    }

    /// Export the metric; returns the configuration that was written.
    pub fn execute(&self) -> Result<MetricConfig> {
        let cfg = &self.config;

        let kind: MetricKind = cfg.metric.parse()?;
        let metric = Metric::create(kind);
        save_config(&cfg.output, metric.config())?;

        tracing::info!("Exported {} config to '{}'", metric.name(), cfg.output.display());
        Ok(metric.config().clone())
    }
}
