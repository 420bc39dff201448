//! CLI command implementations

use std::fs;
use std::time::Duration;

use crate::analysis::{analyze_with_reports, summarize, AnalysisResult, DetectionMask};
use crate::cli::{AnalyzeArgs, Cli, Command, RetrainArgs, StagedAction, StagedArgs};
use crate::config::Config;
use crate::retrain::{
    CommandProcedure, JobStatus, RetrainOrchestrator, RetrainOverrides,
};
use crate::staging::SampleStore;

/// Poll interval while waiting for a retraining job to finish.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => Config::from_yaml_file(path).map_err(|e| e.to_string())?,
        None => Config::default(),
    };

    match cli.command {
        Command::Analyze(args) => run_analyze(args, &config),
        Command::Staged(args) => run_staged(args, &config),
        Command::Retrain(args) => run_retrain(args, &config),
    }
}

fn open_store(config: &Config) -> Result<SampleStore, String> {
    SampleStore::new(&config.staging_dir, &config.corpus_dir).map_err(|e| e.to_string())
}

fn run_analyze(args: AnalyzeArgs, config: &Config) -> Result<(), String> {
    let threshold = args.threshold.unwrap_or(config.void_rate_threshold);
    let mut results = Vec::with_capacity(args.detections.len());

    for path in &args.detections {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        let masks: Vec<DetectionMask> = serde_json::from_str(&json)
            .map_err(|e| format!("invalid detection set {}: {e}", path.display()))?;

        let (result, reports) = analyze_with_reports(&masks, threshold);
        let output = serde_json::json!({
            "image": path,
            "result": result,
            "components": reports,
        });
        println!("{}", serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?);
        results.push(result);
    }

    if results.len() > 1 {
        print_summary(&results);
    }
    Ok(())
}

fn run_staged(args: StagedArgs, config: &Config) -> Result<(), String> {
    let store = open_store(config)?;

    match args.action {
        StagedAction::List => {
            let records = store.list().map_err(|e| e.to_string())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&records).map_err(|e| e.to_string())?
            );
        }
        StagedAction::Count => {
            println!("{}", store.count().map_err(|e| e.to_string())?);
        }
        StagedAction::Delete { id } => {
            if store.delete(&id).map_err(|e| e.to_string())? {
                println!("deleted {id}");
            } else {
                return Err(format!("sample not found: {id}"));
            }
        }
        StagedAction::Promote { id } => {
            let (image, labels) = store.promote(&id).map_err(|e| e.to_string())?;
            println!("promoted {id}");
            println!("  image:  {}", image.display());
            println!("  labels: {}", labels.display());
        }
        StagedAction::PromoteAll => {
            let total = store.count().map_err(|e| e.to_string())?;
            let promoted = store.promote_all().map_err(|e| e.to_string())?;
            println!("promoted {}/{} staged samples", promoted.len(), total);
        }
    }

    Ok(())
}

fn run_retrain(args: RetrainArgs, config: &Config) -> Result<(), String> {
    if !args.no_promote {
        let store = open_store(config)?;
        let promoted = store.promote_all().map_err(|e| e.to_string())?;
        println!("promoted {} staged samples into the corpus", promoted.len());
    }

    let procedure = CommandProcedure::new(config.train_command.clone(), &config.model_artifact);
    let orchestrator = RetrainOrchestrator::new(procedure, &config.runs_dir, config.retrain);

    let job_id = orchestrator
        .start(RetrainOverrides {
            epochs: args.epochs,
            batch_size: args.batch_size,
            patience: args.patience,
        })
        .map_err(|e| e.to_string())?;
    println!("started retraining job {job_id}");

    // Poll until the job reaches a terminal state
    loop {
        let Some(job) = orchestrator.status(&job_id) else {
            return Err(format!("job disappeared: {job_id}"));
        };

        match job.status {
            JobStatus::InProgress => {
                println!("  epoch {}/{}", job.epochs_completed, job.total_epochs);
                std::thread::sleep(POLL_INTERVAL);
            }
            JobStatus::Completed => {
                let artifact = job
                    .best_artifact
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                println!("retraining completed: {artifact}");
                return Ok(());
            }
            JobStatus::Failed => {
                return Err(format!(
                    "retraining failed: {}",
                    job.error_message.unwrap_or_else(|| "unknown error".to_string())
                ));
            }
        }
    }
}

fn print_summary(results: &[AnalysisResult]) {
    let summary = summarize(results);
    println!(
        "images: {}  avg: {:.2}%  min: {:.2}%  max: {:.2}%",
        summary.num_images, summary.avg_void_rate, summary.min_void_rate, summary.max_void_rate
    );
}
