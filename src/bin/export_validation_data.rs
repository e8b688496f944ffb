//! Export validation tensors from a dataset shard.

use std::process::ExitCode;

use nmt_export::cli::{commands::ExportValidationDataArgs, launch};

fn main() -> ExitCode {
    launch::<ExportValidationDataArgs>()
}
