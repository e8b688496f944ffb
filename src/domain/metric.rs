// ============================================================
// Layer 3 — Evaluation Metrics
// ============================================================
// Token-level accumulators that score softmax outputs against
// label ids, plus the registry that maps a metric name to its
// constructor and the flat JSON configuration that rebuilds it.
//
// Both metrics skip label positions equal to `ignore_label`
// (the padding id by default) and accumulate per token, so the
// final value does not depend on how examples were batched.
//
//   perplexity = exp( Σ -ln(max(p[label], 1e-10)) / tokens )
//   accuracy   = Σ [argmax(p) == label] / tokens
//
// Plain Rust only — the ml layer converts tensors to slices
// before calling `update`.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::constants::{
    ACCURACY, PAD_ID, PERPLEXITY, SOFTMAX_OUTPUT_NAME, TARGET_LABEL_NAME,
};
use crate::domain::error::{ExportError, Result};

/// Probabilities are clamped to this before taking the log.
const MIN_PROB: f64 = 1e-10;

// ─── Registry ─────────────────────────────────────────────────────────────────

/// The fixed set of metrics that can be exported and rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Accuracy,
    Perplexity,
}

impl MetricKind {
    pub const ALL: [MetricKind; 2] = [MetricKind::Accuracy, MetricKind::Perplexity];

    /// Registry key of this metric.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Accuracy   => ACCURACY,
            MetricKind::Perplexity => PERPLEXITY,
        }
    }

    /// Look a registry key up, `None` if it is not registered.
    pub fn lookup(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing a user-supplied name: anything outside the registry
/// is an invalid argument.
impl FromStr for MetricKind {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::lookup(s).ok_or_else(|| {
            ExportError::invalid_argument(format!(
                "unsupported metric '{s}', choose one of: {}, {}",
                ACCURACY, PERPLEXITY
            ))
        })
    }
}

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_output_name() -> String { SOFTMAX_OUTPUT_NAME.to_string() }
fn default_label_name() -> String { TARGET_LABEL_NAME.to_string() }
fn default_ignore_label() -> Option<i64> { Some(PAD_ID) }
fn default_axis() -> i64 { -1 }

/// Flat, JSON-serialisable constructor arguments of a metric.
///
/// Only `metric` is required; `{"metric": "perplexity"}` rebuilds the
/// default perplexity metric. Unknown keys are rejected because each
/// field is handed to the constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricConfig {
    /// Registry key (`accuracy` or `perplexity`)
    pub metric: String,

    /// Reported name; falls back to the registry key
    #[serde(default)]
    pub name: Option<String>,

    /// Graph output the metric reads predictions from
    #[serde(default = "default_output_name")]
    pub output_name: String,

    /// Label tensor the metric compares against
    #[serde(default = "default_label_name")]
    pub label_name: String,

    /// Label id excluded from scoring, `null` scores every position
    #[serde(default = "default_ignore_label")]
    pub ignore_label: Option<i64>,

    /// Class axis of the prediction tensor
    #[serde(default = "default_axis")]
    pub axis: i64,
}

impl MetricConfig {
    /// Default constructor arguments for a registered metric.
    pub fn for_kind(kind: MetricKind) -> Self {
        Self {
            metric:       kind.as_str().to_string(),
            name:         Some(kind.as_str().to_string()),
            output_name:  default_output_name(),
            label_name:   default_label_name(),
            ignore_label: default_ignore_label(),
            axis:         default_axis(),
        }
    }
}

// ─── Accumulators ─────────────────────────────────────────────────────────────

/// Validates one batch and yields (label, class-probabilities) pairs
/// for the positions that are scored.
fn scored_positions<'a>(
    labels:       &'a [i64],
    probs:        &'a [f32],
    classes:      usize,
    ignore_label: Option<i64>,
) -> Result<impl Iterator<Item = (usize, &'a [f32])> + 'a> {
    if classes == 0 {
        return Err(ExportError::shape_mismatch("prediction has zero classes"));
    }
    if probs.len() != labels.len() * classes {
        return Err(ExportError::shape_mismatch(format!(
            "{} predictions of {} classes do not cover {} labels",
            probs.len(), classes, labels.len()
        )));
    }
    if let Some(&bad) = labels
        .iter()
        .filter(|&&l| Some(l) != ignore_label)
        .find(|&&l| l < 0 || l as usize >= classes)
    {
        return Err(ExportError::shape_mismatch(format!(
            "label id {bad} outside the {classes} output classes"
        )));
    }

    Ok(labels
        .iter()
        .zip(probs.chunks_exact(classes))
        .filter(move |&(&l, _)| Some(l) != ignore_label)
        .map(|(&l, row)| (l as usize, row)))
}

/// Running token-level perplexity.
#[derive(Debug, Clone)]
pub struct Perplexity {
    config:   MetricConfig,
    loss_sum: f64,
    tokens:   usize,
}

impl Perplexity {
    fn update(&mut self, labels: &[i64], probs: &[f32], classes: usize) -> Result<()> {
        for (label, row) in scored_positions(labels, probs, classes, self.config.ignore_label)? {
            self.loss_sum -= (row[label] as f64).max(MIN_PROB).ln();
            self.tokens   += 1;
        }
        Ok(())
    }

    fn value(&self) -> f64 {
        if self.tokens == 0 {
            return f64::NAN;
        }
        (self.loss_sum / self.tokens as f64).exp()
    }
}

/// Running token-level accuracy.
#[derive(Debug, Clone)]
pub struct Accuracy {
    config:  MetricConfig,
    correct: usize,
    tokens:  usize,
}

impl Accuracy {
    fn update(&mut self, labels: &[i64], probs: &[f32], classes: usize) -> Result<()> {
        for (label, row) in scored_positions(labels, probs, classes, self.config.ignore_label)? {
            if argmax(row) == label {
                self.correct += 1;
            }
            self.tokens += 1;
        }
        Ok(())
    }

    fn value(&self) -> f64 {
        if self.tokens == 0 {
            return f64::NAN;
        }
        self.correct as f64 / self.tokens as f64
    }
}

/// Index of the largest value; ties resolve to the lowest index.
fn argmax(row: &[f32]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv { (i, v) } else { (bi, bv) }
        })
        .0
}

// ─── Metric ───────────────────────────────────────────────────────────────────

/// A live metric built from the registry.
#[derive(Debug, Clone)]
pub enum Metric {
    Accuracy(Accuracy),
    Perplexity(Perplexity),
}

impl Metric {
    /// Construct a registered metric with its default arguments.
    pub fn create(kind: MetricKind) -> Self {
        Self::build(kind, MetricConfig::for_kind(kind))
    }

    /// Rebuild a metric from an exported configuration.
    ///
    /// An unregistered `metric` key or an unsupported `axis` is a
    /// format error of the configuration file.
    pub fn from_config(config: &MetricConfig) -> Result<Self> {
        let kind = MetricKind::lookup(&config.metric).ok_or_else(|| {
            ExportError::format(format!(
                "metric config names unknown metric '{}'", config.metric
            ))
        })?;
        if config.axis != -1 {
            return Err(ExportError::format(format!(
                "metric axis {} unsupported, only the class axis -1 is", config.axis
            )));
        }

        let mut config = config.clone();
        if config.name.is_none() {
            config.name = Some(kind.as_str().to_string());
        }
        Ok(Self::build(kind, config))
    }

    fn build(kind: MetricKind, config: MetricConfig) -> Self {
        match kind {
            MetricKind::Accuracy => Metric::Accuracy(Accuracy {
                config, correct: 0, tokens: 0,
            }),
            MetricKind::Perplexity => Metric::Perplexity(Perplexity {
                config, loss_sum: 0.0, tokens: 0,
            }),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Accuracy(_)   => MetricKind::Accuracy,
            Metric::Perplexity(_) => MetricKind::Perplexity,
        }
    }

    /// Constructor arguments that rebuild this metric.
    pub fn config(&self) -> &MetricConfig {
        match self {
            Metric::Accuracy(m)   => &m.config,
            Metric::Perplexity(m) => &m.config,
        }
    }

    /// Reported name of the metric.
    pub fn name(&self) -> &str {
        self.config().name.as_deref().unwrap_or(self.kind().as_str())
    }

    /// Accumulate one batch.
    ///
    /// `labels` holds one id per position, `probs` holds `classes`
    /// probabilities per position in the same order.
    pub fn update(&mut self, labels: &[i64], probs: &[f32], classes: usize) -> Result<()> {
        match self {
            Metric::Accuracy(m)   => m.update(labels, probs, classes),
            Metric::Perplexity(m) => m.update(labels, probs, classes),
        }
    }

    /// Number of label positions scored so far.
    pub fn tokens(&self) -> usize {
        match self {
            Metric::Accuracy(m)   => m.tokens,
            Metric::Perplexity(m) => m.tokens,
        }
    }

    /// Current (name, value) pairs; `NaN` before any token was scored.
    pub fn name_values(&self) -> Vec<(String, f64)> {
        let value = match self {
            Metric::Accuracy(m)   => m.value(),
            Metric::Perplexity(m) => m.value(),
        };
        vec![(self.name().to_string(), value)]
    }

    pub fn reset(&mut self) {
        match self {
            Metric::Accuracy(m) => {
                m.correct = 0;
                m.tokens  = 0;
            }
            Metric::Perplexity(m) => {
                m.loss_sum = 0.0;
                m.tokens   = 0;
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_rejects_unknown_name() {
        let err = "bleu".parse::<MetricKind>().unwrap_err();
        assert!(matches!(err, ExportError::InvalidArgument(_)));
        assert_eq!("accuracy".parse::<MetricKind>().unwrap(), MetricKind::Accuracy);
    }

    #[test]
    fn test_config_roundtrip_rebuilds_same_metric() {
        for kind in MetricKind::ALL {
            let metric = Metric::create(kind);
            let json   = serde_json::to_string(metric.config()).unwrap();
            let back: MetricConfig = serde_json::from_str(&json).unwrap();
            let rebuilt = Metric::from_config(&back).unwrap();
            assert_eq!(rebuilt.name(), metric.name());
            assert_eq!(rebuilt.config(), metric.config());
        }
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg: MetricConfig = serde_json::from_str(r#"{"metric": "perplexity"}"#).unwrap();
        let metric = Metric::from_config(&cfg).unwrap();
        assert_eq!(metric.name(), "perplexity");
        assert_eq!(metric.config().ignore_label, Some(PAD_ID));
        assert_eq!(metric.config().output_name, SOFTMAX_OUTPUT_NAME);
    }

    #[test]
    fn test_unknown_metric_in_config_is_format_error() {
        let cfg: MetricConfig = serde_json::from_str(r#"{"metric": "bleu"}"#).unwrap();
        assert!(matches!(Metric::from_config(&cfg), Err(ExportError::Format(_))));
    }

    #[test]
    fn test_unknown_config_key_is_rejected() {
        let parsed = serde_json::from_str::<MetricConfig>(r#"{"metric": "accuracy", "beam": 5}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_perplexity_skips_padding() {
        let mut m = Metric::create(MetricKind::Perplexity);
        // two classes; position 2 is padding and must not count
        let labels = [1, 1, 0];
        let probs  = [0.5, 0.5, 0.5, 0.5, 0.9, 0.1];
        m.update(&labels, &probs, 2).unwrap();
        assert_eq!(m.tokens(), 2);
        let (_, value) = m.name_values()[0].clone();
        assert!((value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_accuracy_counts_argmax_hits() {
        let mut m = Metric::create(MetricKind::Accuracy);
        let labels = [1, 2, 2, 0];
        let probs  = [
            0.1, 0.8, 0.1,
            0.1, 0.8, 0.1,
            0.0, 0.2, 0.8,
            1.0, 0.0, 0.0,
        ];
        m.update(&labels, &probs, 3).unwrap();
        assert_eq!(m.tokens(), 3);
        let (name, value) = m.name_values()[0].clone();
        assert_eq!(name, "accuracy");
        assert!((value - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_label_out_of_range_is_shape_mismatch() {
        let mut m = Metric::create(MetricKind::Accuracy);
        let err = m.update(&[3], &[0.5, 0.5], 2).unwrap_err();
        assert!(matches!(err, ExportError::ShapeMismatch(_)));
    }

    #[test]
    fn test_empty_metric_is_nan_until_updated() {
        let mut m = Metric::create(MetricKind::Perplexity);
        assert!(m.name_values()[0].1.is_nan());
        m.update(&[1], &[0.0, 1.0], 2).unwrap();
        assert!((m.name_values()[0].1 - 1.0).abs() < 1e-9);
        m.reset();
        assert_eq!(m.tokens(), 0);
    }
}
