//! Bind a trained model to placeholder shapes.

use std::process::ExitCode;

use nmt_export::cli::{commands::RunModelArgs, launch};

fn main() -> ExitCode {
    launch::<RunModelArgs>()
}
