//! CLI module for revisar
//!
//! Argument definitions and command handlers for the inspection
//! orchestration tool.

mod commands;

pub use commands::run_command;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Active-learning orchestration for chip void inspection
#[derive(Debug, Parser)]
#[command(name = "revisar", version, about)]
pub struct Cli {
    /// Path to a YAML config file (defaults apply when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze a detection set and print statistics and per-component rows
    Analyze(AnalyzeArgs),
    /// Operate on the validated-sample staging store
    Staged(StagedArgs),
    /// Promote staged samples and run a retraining job to completion
    Retrain(RetrainArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// JSON files, each holding an array of detection masks
    #[arg(required = true)]
    pub detections: Vec<PathBuf>,

    /// Void-rate threshold in percent (overrides config)
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Args)]
pub struct StagedArgs {
    #[command(subcommand)]
    pub action: StagedAction,
}

#[derive(Debug, Subcommand)]
pub enum StagedAction {
    /// List staged samples, newest first
    List,
    /// Print the number of staged samples
    Count,
    /// Delete one staged sample
    Delete { id: String },
    /// Promote one staged sample into the training corpus
    Promote { id: String },
    /// Promote every staged sample; failures are skipped
    PromoteAll,
}

#[derive(Debug, Args)]
pub struct RetrainArgs {
    /// Training epochs (overrides config)
    #[arg(long)]
    pub epochs: Option<u32>,

    /// Batch size (overrides config)
    #[arg(long)]
    pub batch_size: Option<u32>,

    /// Early-stopping patience (overrides config)
    #[arg(long)]
    pub patience: Option<u32>,

    /// Skip promoting staged samples before training
    #[arg(long)]
    pub no_promote: bool,
}
