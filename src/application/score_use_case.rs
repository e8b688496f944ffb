// ============================================================
// Layer 2 — Score Model Use Case
// ============================================================
// Re-scores a trained model against an exported validation set:
//
//   Step 1: Load graph and parameters     (Layer 5/6)
//   Step 2: Rebuild the metric            (Layer 3/6)
//   Step 3: Load data and label tensors   (Layer 4 - data)
//   Step 4: Batch them in file order      (Layer 4 - data)
//   Step 5: Bind for inference            (Layer 5 - ml)
//   Step 6: Forward each batch, update    (Layer 5 + Layer 3)
//   Step 7: Report name/value pairs
//
// The metric accumulates per token, so the short final batch
// contributes exactly its own positions.

use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::data::tensor_dict::NamedTensors;
use crate::domain::constants::DEFAULT_BATCH_SIZE;
use crate::domain::error::{ExportError, Result};
use crate::domain::metric::Metric;
use crate::domain::traits::BatchSource;
use crate::infra::metric_store::load_config;
use crate::ml::graph::Graph;
use crate::ml::runtime::TensorRuntime;

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub symbol:     PathBuf,
    pub params:     PathBuf,
    /// Metric configuration JSON written by export-metric
    pub metric:     PathBuf,
    /// `<prefix>.data` written by export-validation-data
    pub data:       PathBuf,
    /// `<prefix>.label` written by export-validation-data
    pub label:      PathBuf,
    pub batch_size: usize,
    /// Also write the results as a JSON object here
    pub output:     Option<PathBuf>,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            symbol:     PathBuf::from("symbol.json"),
            params:     PathBuf::from("params.best"),
            metric:     PathBuf::from("metric.json"),
            data:       PathBuf::from("valid.data"),
            label:      PathBuf::from("valid.label"),
            batch_size: DEFAULT_BATCH_SIZE,
            output:     None,
        }
    }
}

/// Outcome of one scoring run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    /// (name, value) pairs in metric order
    pub metrics:  Vec<(String, f64)>,
    pub examples: usize,
    pub batches:  usize,
    /// Label positions that were scored
    pub tokens:   usize,
}

impl ScoreReport {
    /// Results as a flat JSON object; non-finite values become null.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .metrics
            .iter()
            .map(|(name, value)| (name.clone(), serde_json::Value::from(*value)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

// ─── ScoreUseCase ─────────────────────────────────────────────────────────────
pub struct ScoreUseCase<R: TensorRuntime> {
    config:  ScoreConfig,
    runtime: R,
}

impl<R: TensorRuntime> ScoreUseCase<R> {
    pub fn new(config: ScoreConfig, runtime: R) -> Self {
        Self { config, runtime }
    }

    pub fn execute(&self) -> Result<ScoreReport> {
        let cfg = &self.config;

        // ── Step 1: Model artifacts ──────────────────────────────────────────
        let graph  = self.runtime.load_graph(&cfg.symbol)?;
        let params = self.runtime.load_params(&cfg.params)?;

        // ── Step 2: Metric ───────────────────────────────────────────────────
        let mut metric = Metric::from_config(&load_config(&cfg.metric)?)?;
        check_metric_matches_graph(&metric, &graph)?;

        // ── Step 3 and 4: Validation batches ─────────────────────────────────
        let data  = NamedTensors::load(&cfg.data)?;
        let label = NamedTensors::load(&cfg.label)?;
        let batches = self.runtime.batch_iterate(&graph, &data, &label, cfg.batch_size)?;
        let examples = batches.num_examples();
        tracing::info!("Scoring {examples} examples in batches of {}", cfg.batch_size);

        // ── Step 5: Bind for inference ───────────────────────────────────────
        let module = self.runtime.bind(
            &graph, batches.provide_data(), batches.provide_label(), &params, false,
        )?;

        // ── Step 6: Forward and accumulate ───────────────────────────────────
        let mut num_batches = 0;
        for batch in batches {
            let prediction = self.runtime.forward(&module, &batch)?;
            metric.update(&prediction.labels, &prediction.probs, prediction.classes)?;
            num_batches += 1;
            tracing::debug!("Batch {num_batches}: {} tokens scored so far", metric.tokens());
        }

        // ── Step 7: Report ───────────────────────────────────────────────────
        let report = ScoreReport {
            metrics:  metric.name_values(),
            examples,
            batches:  num_batches,
            tokens:   metric.tokens(),
        };
        tracing::info!(
            "Scored {} tokens over {} batch(es)",
            report.tokens,
            report.batches
        );

        if let Some(path) = &cfg.output {
            let json = serde_json::to_string_pretty(&report.to_json())
                .map_err(|e| ExportError::format(format!("cannot encode results: {e}")))?;
            fs::write(path, json).map_err(|e| ExportError::write(path, e))?;
            tracing::info!("Wrote results to '{}'", path.display());
        }
        Ok(report)
    }
}

/// The metric must read the graph's output and the label that output
/// is scored against; batches only carry that label.
fn check_metric_matches_graph(metric: &Metric, graph: &Graph) -> Result<()> {
    let config = metric.config();
    let output = graph.output_name();
    if config.output_name != output {
        return Err(ExportError::format(format!(
            "metric reads output '{}' but the graph produces '{output}'",
            config.output_name
        )));
    }
    let label = graph.output_label();
    if config.label_name != label {
        return Err(ExportError::format(format!(
            "metric reads label '{}' but '{output}' is scored against '{label}'",
            config.label_name
        )));
    }
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::{MetricConfig, MetricKind};

    const GRAPH: &str = r#"{
        "nodes": [
            {"name": "emb", "op": "embedding", "input": "target", "weight": "w"},
            {"name": "softmax", "op": "softmax_output", "input": "emb", "label": "target_label"}
        ],
        "output": "softmax"
    }"#;

    #[test]
    fn test_metric_names_must_match_graph() {
        let graph = Graph::from_json(GRAPH).unwrap();

        let ok = Metric::create(MetricKind::Perplexity);
        assert!(check_metric_matches_graph(&ok, &graph).is_ok());

        let mut cfg = MetricConfig::for_kind(MetricKind::Accuracy);
        cfg.output_name = "decoder_output".into();
        let wrong_output = Metric::from_config(&cfg).unwrap();
        assert!(matches!(
            check_metric_matches_graph(&wrong_output, &graph),
            Err(ExportError::Format(_))
        ));

        let mut cfg = MetricConfig::for_kind(MetricKind::Accuracy);
        cfg.label_name = "source_label".into();
        let wrong_label = Metric::from_config(&cfg).unwrap();
        assert!(matches!(
            check_metric_matches_graph(&wrong_label, &graph),
            Err(ExportError::Format(_))
        ));
    }

    #[test]
    fn test_metric_must_read_the_scored_label() {
        let graph = Graph::from_json(
            r#"{
                "label_names": ["target_label", "other_label"],
                "nodes": [
                    {"name": "emb", "op": "embedding", "input": "target", "weight": "w"},
                    {"name": "softmax", "op": "softmax_output", "input": "emb", "label": "target_label"}
                ],
                "output": "softmax"
            }"#,
        )
        .unwrap();

        let scored = Metric::create(MetricKind::Accuracy);
        assert!(check_metric_matches_graph(&scored, &graph).is_ok());

        // declared by the graph, but not what the output is scored against
        let mut cfg = MetricConfig::for_kind(MetricKind::Accuracy);
        cfg.label_name = "other_label".into();
        let other = Metric::from_config(&cfg).unwrap();
        assert!(matches!(
            check_metric_matches_graph(&other, &graph),
            Err(ExportError::Format(_))
        ));
    }

    #[test]
    fn test_report_json_turns_nan_into_null() {
        let report = ScoreReport {
            metrics:  vec![("perplexity".into(), f64::NAN), ("accuracy".into(), 0.5)],
            examples: 0,
            batches:  0,
            tokens:   0,
        };
        let json = report.to_json();
        assert!(json["perplexity"].is_null());
        assert_eq!(json["accuracy"], 0.5);
    }
}
