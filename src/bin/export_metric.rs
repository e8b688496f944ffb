//! Write a metric configuration as JSON.

use std::process::ExitCode;

use nmt_export::cli::{commands::ExportMetricArgs, launch};

fn main() -> ExitCode {
    launch::<ExportMetricArgs>()
}
