//! Revisar CLI
//!
//! Inspection-orchestration entry point for the revisar library.
//!
//! # Usage
//!
//! ```bash
//! # Analyze detection sets
//! revisar analyze detections.json --threshold 5.0
//!
//! # Staging store operations
//! revisar staged list
//! revisar staged count
//! revisar staged promote-all
//!
//! # Promote staged samples and retrain
//! revisar retrain --epochs 15
//! ```

use clap::Parser;
use revisar::cli::{run_command, Cli};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
