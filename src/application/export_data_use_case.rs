// ============================================================
// Layer 2 — Export Validation Data Use Case
// ============================================================
// Turns a bucketed dataset shard into the two dictionaries the
// scorer reads:
//
//   Step 1: Load the shard                (Layer 4 - data)
//   Step 2: Select bucket 0               (Layer 4 - data)
//   Step 3: Write <prefix>.data           {source, target}
//   Step 4: Write <prefix>.label          {target_label}
//
// A shard without buckets fails in step 2, before any file is
// written. A failure in step 4 leaves step 3's file behind.

use serde::{Deserialize, Serialize};
use std::{ffi::OsString, path::{Path, PathBuf}};

use crate::data::shard::ParallelDataSet;
use crate::data::tensor_dict::NamedTensors;
use crate::domain::constants::{
    DATA_SUFFIX, LABEL_SUFFIX, SOURCE_NAME, TARGET_LABEL_NAME, TARGET_NAME,
};
use crate::domain::error::Result;

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDataConfig {
    /// Dataset shard to read
    pub shard:         PathBuf,
    /// Output prefix; `.data` and `.label` are appended
    pub output_prefix: PathBuf,
}

/// Files produced by one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedData {
    pub data:     PathBuf,
    pub label:    PathBuf,
    pub examples: usize,
}

// ─── ExportDataUseCase ────────────────────────────────────────────────────────
pub struct ExportDataUseCase {
    config: ExportDataConfig,
}

impl ExportDataUseCase {
    pub fn new(config: ExportDataConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ExportedData> {
        let cfg = &self.config;

        // ── Step 1: Load the shard ───────────────────────────────────────────
        let shard = ParallelDataSet::load(&cfg.shard)?;
        tracing::info!(
            "Loaded shard '{}' with {} bucket(s)",
            cfg.shard.display(),
            shard.num_buckets()
        );

        // ── Step 2: First bucket only ────────────────────────────────────────
        let bucket   = shard.bucket(0)?;
        let examples = bucket.source.shape.first().copied().unwrap_or(0);

        // ── Step 3 and 4: Write both dictionaries ────────────────────────────
        let mut data = NamedTensors::new();
        data.insert(SOURCE_NAME, bucket.source.clone());
        data.insert(TARGET_NAME, bucket.target.clone());

        let mut label = NamedTensors::new();
        label.insert(TARGET_LABEL_NAME, bucket.label.clone());

        let data_path  = with_suffix(&cfg.output_prefix, DATA_SUFFIX);
        let label_path = with_suffix(&cfg.output_prefix, LABEL_SUFFIX);
        data.save(&data_path)?;
        label.save(&label_path)?;

        tracing::info!(
            "Wrote {} examples to '{}' and '{}'",
            examples,
            data_path.display(),
            label_path.display()
        );
        Ok(ExportedData { data: data_path, label: label_path, examples })
    }
}

/// `valid` + `.data` → `valid.data`, keeping any existing extension.
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}
