// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// One clap Parser per binary, each with its flags:
//
//   export-metric           -m/--metric  -o/--output
//   export-validation-data  -s/--shard   -o/--output
//   run-model               -s/--symbol  -p/--params
//                           -b/--batch-size --inference-only
//   score-model             -s -p -m -d -l -b -o --device
//
// clap's derive macros generate --help, required-flag errors
// and the string → usize / enum conversions.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::application::bind_use_case::BindConfig;
use crate::application::export_data_use_case::ExportDataConfig;
use crate::application::export_metric_use_case::ExportMetricConfig;
use crate::application::score_use_case::ScoreConfig;
use crate::domain::constants::DEFAULT_BATCH_SIZE;
use crate::domain::metric::MetricKind;

/// Metric names accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricChoice {
    Accuracy,
    Perplexity,
}

impl From<MetricChoice> for MetricKind {
    fn from(choice: MetricChoice) -> Self {
        match choice {
            MetricChoice::Accuracy   => MetricKind::Accuracy,
            MetricChoice::Perplexity => MetricKind::Perplexity,
        }
    }
}

/// Tensor backend to run the model on.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Device {
    /// CPU through burn's ndarray backend
    #[default]
    Cpu,
    /// GPU through burn's wgpu backend
    Wgpu,
}

// ─── export-metric ────────────────────────────────────────────────────────────
/// Write the configuration of an evaluation metric as JSON.
#[derive(Parser, Debug)]
#[command(name = "export-metric", version, about)]
pub struct ExportMetricArgs {
    /// Metric to export
    #[arg(short, long, value_enum, default_value_t = MetricChoice::Perplexity)]
    pub metric: MetricChoice,

    /// Destination JSON file
    #[arg(short, long)]
    pub output: PathBuf,
}

impl From<ExportMetricArgs> for ExportMetricConfig {
    fn from(a: ExportMetricArgs) -> Self {
        ExportMetricConfig {
            metric: MetricKind::from(a.metric).as_str().to_string(),
            output: a.output,
        }
    }
}

// ─── export-validation-data ───────────────────────────────────────────────────
/// Export bucket 0 of a dataset shard as <prefix>.data and <prefix>.label.
#[derive(Parser, Debug)]
#[command(name = "export-validation-data", version, about)]
pub struct ExportValidationDataArgs {
    /// Dataset shard to read
    #[arg(short, long)]
    pub shard: PathBuf,

    /// Output prefix
    #[arg(short, long)]
    pub output: PathBuf,
}

impl From<ExportValidationDataArgs> for ExportDataConfig {
    fn from(a: ExportValidationDataArgs) -> Self {
        ExportDataConfig {
            shard:         a.shard,
            output_prefix: a.output,
        }
    }
}

// ─── run-model ────────────────────────────────────────────────────────────────
/// Bind a trained model to placeholder shapes and report the result.
#[derive(Parser, Debug)]
#[command(name = "run-model", version, about)]
pub struct RunModelArgs {
    /// Graph description (symbol JSON)
    #[arg(short, long)]
    pub symbol: PathBuf,

    /// Parameter file with arg:/aux: keys
    #[arg(short, long)]
    pub params: PathBuf,

    /// Sentences per placeholder batch
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Bind for inference instead of training
    #[arg(long)]
    pub inference_only: bool,
}

impl From<RunModelArgs> for BindConfig {
    fn from(a: RunModelArgs) -> Self {
        BindConfig {
            symbol:       a.symbol,
            params:       a.params,
            batch_size:   a.batch_size,
            for_training: !a.inference_only,
        }
    }
}

// ─── score-model ──────────────────────────────────────────────────────────────
/// Score a trained model on an exported validation set.
#[derive(Parser, Debug)]
#[command(name = "score-model", version, about)]
pub struct ScoreModelArgs {
    /// Graph description (symbol JSON)
    #[arg(short, long)]
    pub symbol: PathBuf,

    /// Parameter file with arg:/aux: keys
    #[arg(short, long)]
    pub params: PathBuf,

    /// Metric configuration JSON
    #[arg(short, long)]
    pub metric: PathBuf,

    /// Validation data (<prefix>.data)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Validation labels (<prefix>.label)
    #[arg(short, long)]
    pub label: PathBuf,

    /// Sentences per batch
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Also write the results as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Tensor backend
    #[arg(long, value_enum, default_value_t = Device::Cpu)]
    pub device: Device,
}

impl From<ScoreModelArgs> for ScoreConfig {
    fn from(a: ScoreModelArgs) -> Self {
        ScoreConfig {
            symbol:     a.symbol,
            params:     a.params,
            metric:     a.metric,
            data:       a.data,
            label:      a.label,
            batch_size: a.batch_size,
            output:     a.output,
        }
    }
}
