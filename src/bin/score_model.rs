//! Score a trained model on an exported validation set.

use std::process::ExitCode;

use nmt_export::cli::{commands::ScoreModelArgs, launch};

fn main() -> ExitCode {
    launch::<ScoreModelArgs>()
}
