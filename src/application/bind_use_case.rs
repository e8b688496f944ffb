// ============================================================
// Layer 2 — Bind Model Use Case
// ============================================================
// A "can this model be bound" check for a trained artifact pair:
//
//   Step 1: Load the graph                (Layer 5 - ml)
//   Step 2: Load and split parameters     (Layer 6 - infra)
//   Step 3: Build placeholder descriptors (source, target, label)
//   Step 4: Bind                          (Layer 5 - ml)
//
// No batch is run. The placeholders use the default bucket
// lengths; source carries a trailing factor axis.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::artifact::{DataDesc, ModuleSummary};
use crate::domain::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_BUCKET_KEY, NUM_SOURCE_FACTORS, SOURCE_NAME, TARGET_LABEL_NAME,
    TARGET_NAME,
};
use crate::domain::error::{ExportError, Result};
use crate::ml::runtime::TensorRuntime;

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindConfig {
    pub symbol:       PathBuf,
    pub params:       PathBuf,
    pub batch_size:   usize,
    /// Bind for training (gradients) rather than inference
    pub for_training: bool,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            symbol:       PathBuf::from("symbol.json"),
            params:       PathBuf::from("params.best"),
            batch_size:   DEFAULT_BATCH_SIZE,
            for_training: true,
        }
    }
}

/// Data and label descriptors for a `batch_size` placeholder batch:
/// source [B, S, factors], target [B, T], label [B, T].
pub fn placeholder_shapes(batch_size: usize) -> (Vec<DataDesc>, Vec<DataDesc>) {
    let (source_len, target_len) = DEFAULT_BUCKET_KEY;
    let data = vec![
        DataDesc::new(SOURCE_NAME, vec![batch_size, source_len, NUM_SOURCE_FACTORS]),
        DataDesc::new(TARGET_NAME, vec![batch_size, target_len]),
    ];
    let label = vec![DataDesc::new(TARGET_LABEL_NAME, vec![batch_size, target_len])];
    (data, label)
}

// ─── BindUseCase ──────────────────────────────────────────────────────────────
pub struct BindUseCase<R: TensorRuntime> {
    config:  BindConfig,
    runtime: R,
}

impl<R: TensorRuntime> BindUseCase<R> {
    pub fn new(config: BindConfig, runtime: R) -> Self {
        Self { config, runtime }
    }

    /// Bind the model and describe the result.
    pub fn execute(&self) -> Result<ModuleSummary> {
        let cfg = &self.config;
        if cfg.batch_size == 0 {
            return Err(ExportError::invalid_argument("batch size must be at least 1"));
        }

        // ── Step 1 and 2: Artifacts ──────────────────────────────────────────
        let graph  = self.runtime.load_graph(&cfg.symbol)?;
        let params = self.runtime.load_params(&cfg.params)?;

        // ── Step 3: Placeholder shapes ───────────────────────────────────────
        let (data_shapes, label_shapes) = placeholder_shapes(cfg.batch_size);
        for desc in data_shapes.iter().chain(&label_shapes) {
            tracing::debug!("Placeholder {desc}");
        }

        // ── Step 4: Bind ─────────────────────────────────────────────────────
        let module = self.runtime.bind(
            &graph, &data_shapes, &label_shapes, &params, cfg.for_training,
        )?;
        let summary = self.runtime.summary(&module);

        tracing::info!(
            "Bound '{}' for {}: {} parameters, output {} {:?}",
            cfg.symbol.display(),
            if summary.for_training { "training" } else { "inference" },
            summary.num_params,
            summary.output_name,
            summary.output_shape
        );
        Ok(summary)
    }
}
