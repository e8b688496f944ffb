// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Every binary is a thin `main` that calls `launch::<Args>()`:
//
//   1. set up logging (stderr, so stdout carries only results)
//   2. parse its arguments with clap
//   3. convert them into a use-case config and run it
//   4. print results as `name=value` lines
//
// Errors are logged with their kind and turn into exit code 1.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::backend::{NdArray, Wgpu};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::application::{
    bind_use_case::BindUseCase,
    export_data_use_case::ExportDataUseCase,
    export_metric_use_case::ExportMetricUseCase,
    score_use_case::{ScoreReport, ScoreUseCase},
};
use crate::domain::artifact::ModuleSummary;
use crate::domain::error::ExportError;
use crate::ml::runtime::BurnRuntime;
use commands::{
    Device, ExportMetricArgs, ExportValidationDataArgs, RunModelArgs, ScoreModelArgs,
};

/// Log filter used when RUST_LOG is not set.
pub const DEFAULT_LOG_DIRECTIVE: &str = "nmt_export=info";

/// Install the fmt subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A parsed command line that knows how to run itself.
pub trait Command: Parser {
    fn run(self) -> Result<()>;
}

/// Entry point shared by all binaries.
pub fn launch<C: Command>() -> ExitCode {
    init_tracing();
    match C::parse().run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(kind = error_kind(&err), "{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Kind of a failed run, as named by the error taxonomy.
pub fn error_kind(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<ExportError>().map_or("Error", ExportError::kind)
}

// ─── Commands ─────────────────────────────────────────────────────────────────

impl Command for ExportMetricArgs {
    fn run(self) -> Result<()> {
        let config = ExportMetricUseCase::new(self.into()).execute()?;
        println!("metric={}", config.metric);
        Ok(())
    }
}

impl Command for ExportValidationDataArgs {
    fn run(self) -> Result<()> {
        let out = ExportDataUseCase::new(self.into()).execute()?;
        println!("data={}", out.data.display());
        println!("label={}", out.label.display());
        Ok(())
    }
}

impl Command for RunModelArgs {
    fn run(self) -> Result<()> {
        // Binding is a shape check, CPU is always enough
        let runtime = BurnRuntime::<NdArray>::default();
        let summary = BindUseCase::new(self.into(), runtime).execute()?;

        summary_lines(&summary).iter().for_each(|line| println!("{line}"));
        Ok(())
    }
}

impl Command for ScoreModelArgs {
    fn run(self) -> Result<()> {
        let device = self.device;
        tracing::info!("Scoring on {device:?}");

        let report = match device {
            Device::Cpu  => ScoreUseCase::new(self.into(), BurnRuntime::<NdArray>::default()).execute()?,
            Device::Wgpu => ScoreUseCase::new(self.into(), BurnRuntime::<Wgpu>::default()).execute()?,
        };
        report_lines(&report).iter().for_each(|line| println!("{line}"));
        Ok(())
    }
}

/// `name=shape` per descriptor, then the output and parameter count.
fn summary_lines(summary: &ModuleSummary) -> Vec<String> {
    summary
        .data_shapes
        .iter()
        .chain(&summary.label_shapes)
        .map(|desc| format!("{}={:?}", desc.name, desc.shape))
        .chain([
            format!("{}={:?}", summary.output_name, summary.output_shape),
            format!("num_params={}", summary.num_params),
        ])
        .collect()
}

/// One `name=value` line per metric.
fn report_lines(report: &ScoreReport) -> Vec<String> {
    report
        .metrics
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::DataDesc;

    fn failed_kind<C: Command>(argv: &[&str]) -> &'static str {
        let err = C::try_parse_from(argv).unwrap().run().unwrap_err();
        error_kind(&err)
    }

    #[test]
    fn test_missing_inputs_fail_with_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str| dir.path().join(name).to_string_lossy().into_owned();

        assert_eq!(
            failed_kind::<ExportValidationDataArgs>(&["export-validation-data", "-s", &p("shard"), "-o", &p("valid")]),
            "NotFound"
        );
        assert_eq!(
            failed_kind::<RunModelArgs>(&["run-model", "-s", &p("symbol.json"), "-p", &p("params")]),
            "NotFound"
        );
        assert_eq!(
            failed_kind::<ScoreModelArgs>(&[
                "score-model", "-s", &p("symbol.json"), "-p", &p("params"), "-m", &p("metric.json"),
                "-d", &p("valid.data"), "-l", &p("valid.label"),
            ]),
            "NotFound"
        );
        assert!(!dir.path().join("valid.data").exists());
    }

    #[test]
    fn test_unwritable_metric_output_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("no_such_dir").join("metric.json");
        let out = out.to_string_lossy();
        assert_eq!(failed_kind::<ExportMetricArgs>(&["export-metric", "-o", &out]), "IOError");
    }

    #[test]
    fn test_export_metric_runs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("metric.json");
        let args = ExportMetricArgs::try_parse_from(["export-metric", "-m", "accuracy", "-o", &out.to_string_lossy()])
            .unwrap();
        args.run().unwrap();
        assert!(out.exists());
    }

    #[test]
    fn test_foreign_errors_have_generic_kind() {
        assert_eq!(error_kind(&anyhow::anyhow!("boom")), "Error");
        assert_eq!(error_kind(&ExportError::format("bad").into()), "FormatError");
    }

    #[test]
    fn test_stdout_lines() {
        let report = ScoreReport {
            metrics:  vec![("perplexity".into(), 2.5)],
            examples: 4,
            batches:  2,
            tokens:   6,
        };
        assert_eq!(report_lines(&report), vec!["perplexity=2.5"]);

        let summary = ModuleSummary {
            data_shapes:  vec![DataDesc::new("source", vec![2, 100, 1])],
            label_shapes: vec![DataDesc::new("target_label", vec![2, 100])],
            output_name:  "softmax_output".into(),
            output_shape: vec![2, 100, 8],
            num_params:   3,
            for_training: true,
        };
        assert_eq!(
            summary_lines(&summary),
            vec![
                "source=[2, 100, 1]",
                "target_label=[2, 100]",
                "softmax_output=[2, 100, 8]",
                "num_params=3",
            ]
        );
    }
}
