// ============================================================
// Layer 6 — Metric Config Store
// ============================================================
// Saves and restores a metric's constructor arguments as a
// flat JSON object (`metric.json` or similar), e.g.
//
//   {
//     "metric": "perplexity",
//     "name": "perplexity",
//     "output_name": "softmax_output",
//     "label_name": "target_label",
//     "ignore_label": 0,
//     "axis": -1
//   }
//
// Reference: Rust Book §9 (Error Handling)

use std::{fs, path::Path};

use crate::domain::error::{ExportError, Result};
use crate::domain::metric::MetricConfig;

/// Write a metric configuration as pretty-printed JSON.
pub fn save_config(path: impl AsRef<Path>, config: &MetricConfig) -> Result<()> {
    let path = path.as_ref();

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| ExportError::format(format!("cannot encode metric config: {e}")))?;
    fs::write(path, json).map_err(|e| ExportError::write(path, e))?;

    tracing::debug!("Saved metric config to '{}'", path.display());
    Ok(())
}

/// Read a metric configuration back.
/// Invalid JSON or unexpected keys are format errors.
pub fn load_config(path: impl AsRef<Path>) -> Result<MetricConfig> {
    let path = path.as_ref();

    let json = fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
    serde_json::from_str(&json).map_err(|e| {
        ExportError::format(format!("metric config '{}': {e}", path.display()))
    })
}
