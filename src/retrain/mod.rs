//! Retraining Orchestrator
//!
//! Enforces single-flight retraining and exposes asynchronous job status.
//! Training itself is an opaque external task behind the
//! [`TrainingProcedure`] trait; the orchestrator launches it on a detached
//! thread, records the outcome on the job table, and derives progress by
//! tailing the metrics file the training process appends to its run
//! directory.
//!
//! # Architecture
//!
//! - **[`RetrainOrchestrator`]**: owns the lock-guarded job table
//! - **[`TrainingJob`]**: lifecycle record, `in_progress -> completed | failed`
//! - **[`TrainingProcedure`]**: pluggable external training task
//! - **[`progress`]**: best-effort metrics-file tailing
//!
//! Jobs are never deleted; the table is the process-lifetime audit history.
//! There is no cancellation: a job reaches a terminal state only when its
//! background thread finishes.
//!
//! # Example
//!
//! ```
//! use revisar::retrain::{RetrainOrchestrator, RetrainParams};
//! use std::path::PathBuf;
//!
//! // A stand-in procedure that "trains" instantly.
//! struct Noop;
//! impl revisar::retrain::TrainingProcedure for Noop {
//!     fn run(&self, _params: &RetrainParams) -> revisar::retrain::TrainOutcome {
//!         Ok(PathBuf::from("models/best.pt"))
//!     }
//! }
//!
//! let orchestrator = RetrainOrchestrator::new(Noop, "runs", RetrainParams::default());
//! let job_id = orchestrator.start(Default::default()).unwrap();
//! let job = orchestrator.status(&job_id).unwrap();
//! assert_eq!(job.id, job_id);
//! ```

pub mod progress;


use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of a training job. There is no cancelled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Background training thread is running
    InProgress,
    /// Training finished and produced an artifact
    Completed,
    /// Training finished with an error
    Failed,
}

/// One retraining job. Created by [`RetrainOrchestrator::start`], mutated
/// only by the orchestrator, retained for the life of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingJob {
    /// Generated unique id
    pub id: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Epochs the job was started with
    pub total_epochs: u32,
    /// Epochs observed complete so far; monotonically non-decreasing
    pub epochs_completed: u32,
    /// Artifact produced by a completed run
    pub best_artifact: Option<PathBuf>,
    /// Human-readable failure text for a failed run
    pub error_message: Option<String>,
}

/// Training parameters, also the per-start override set. `None` fields fall
/// back to the orchestrator's configured defaults.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RetrainOverrides {
    pub epochs: Option<u32>,
    pub batch_size: Option<u32>,
    pub patience: Option<u32>,
}

/// Resolved training parameters handed to the external procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrainParams {
    pub epochs: u32,
    pub batch_size: u32,
    pub patience: u32,
}

impl Default for RetrainParams {
    /// Active-learning retraining defaults: short runs with aggressive
    /// early stopping.
    fn default() -> Self {
        Self { epochs: 15, batch_size: 8, patience: 5 }
    }
}

impl RetrainParams {
    fn with_overrides(self, overrides: RetrainOverrides) -> Self {
        Self {
            epochs: overrides.epochs.unwrap_or(self.epochs),
            batch_size: overrides.batch_size.unwrap_or(self.batch_size),
            patience: overrides.patience.unwrap_or(self.patience),
        }
    }
}

/// Errors from orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A retraining job is already in progress. Non-fatal; retry after the
    /// running job reaches a terminal state.
    #[error("retraining already in progress: job {job_id}")]
    Conflict { job_id: String },
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Outcome of one external training run: the best-artifact path, or the
/// error to record on the job.
pub type TrainOutcome = std::result::Result<PathBuf, Box<dyn std::error::Error + Send + Sync>>;

/// The opaque external training task.
///
/// Implementations are expected to write progress as an append-only
/// `results.csv` in a `train*` subdirectory of the runs directory, one row
/// per completed epoch with the 0-based epoch index in the first column.
/// `run` blocks until training finishes.
pub trait TrainingProcedure: Send + Sync + 'static {
    fn run(&self, params: &RetrainParams) -> TrainOutcome;
}

/// Runs training as an external command (teacher-model training scripts are
/// separate processes). The configured command is extended with
/// `--epochs N --batch N --patience N`; a non-zero exit is a failure with
/// the captured stderr as the error text.
#[derive(Debug, Clone)]
pub struct CommandProcedure {
    command: Vec<String>,
    /// Artifact the training script writes on success
    artifact: PathBuf,
}

impl CommandProcedure {
    /// `command` is the program and its leading arguments; `artifact` is the
    /// best-model path the script produces.
    #[must_use]
    pub fn new(command: Vec<String>, artifact: impl Into<PathBuf>) -> Self {
        Self { command, artifact: artifact.into() }
    }
}

impl TrainingProcedure for CommandProcedure {
    fn run(&self, params: &RetrainParams) -> TrainOutcome {
        let (program, args) = self
            .command
            .split_first()
            .ok_or("training command is empty")?;

        let output = Command::new(program)
            .args(args)
            .arg("--epochs")
            .arg(params.epochs.to_string())
            .arg("--batch")
            .arg(params.batch_size.to_string())
            .arg("--patience")
            .arg(params.patience.to_string())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let text = if stderr.trim().is_empty() {
                format!("training command exited with {}", output.status)
            } else {
                stderr.into_owned()
            };
            return Err(text.into());
        }

        if !self.artifact.exists() {
            return Err("best model not found after training".into());
        }

        Ok(self.artifact.clone())
    }
}

/// Single-flight retraining orchestrator.
///
/// The job table is the one shared mutable resource; every read and write of
/// job state, including the "is anything in progress" check that guards
/// `start`, happens inside its mutex. Cloning the orchestrator shares the
/// table.
#[derive(Clone)]
pub struct RetrainOrchestrator {
    jobs: Arc<Mutex<HashMap<String, TrainingJob>>>,
    procedure: Arc<dyn TrainingProcedure>,
    runs_dir: PathBuf,
    defaults: RetrainParams,
}

impl RetrainOrchestrator {
    pub fn new(
        procedure: impl TrainingProcedure,
        runs_dir: impl AsRef<Path>,
        defaults: RetrainParams,
    ) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            procedure: Arc::new(procedure),
            runs_dir: runs_dir.as_ref().to_path_buf(),
            defaults,
        }
    }

    /// Start a retraining job on a detached background thread and return its
    /// id immediately.
    ///
    /// Fails with [`OrchestratorError::Conflict`] when any job is still
    /// `in_progress`. The conflict check and the new job's insertion share
    /// one critical section, so two racing `start` calls cannot both pass.
    pub fn start(&self, overrides: RetrainOverrides) -> Result<String> {
        let params = self.defaults.with_overrides(overrides);
        let id = Uuid::new_v4().to_string();

        {
            let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(running) = jobs.values().find(|j| j.status == JobStatus::InProgress) {
                return Err(OrchestratorError::Conflict { job_id: running.id.clone() });
            }

            jobs.insert(
                id.clone(),
                TrainingJob {
                    id: id.clone(),
                    status: JobStatus::InProgress,
                    start_time: Utc::now(),
                    end_time: None,
                    total_epochs: params.epochs,
                    epochs_completed: 0,
                    best_artifact: None,
                    error_message: None,
                },
            );
        }

        tracing::info!(job_id = %id, epochs = params.epochs, "starting retraining job");

        let jobs = Arc::clone(&self.jobs);
        let procedure = Arc::clone(&self.procedure);
        let job_id = id.clone();
        thread::spawn(move || {
            let outcome = procedure.run(&params);

            let mut jobs = jobs.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(job) = jobs.get_mut(&job_id) {
                job.end_time = Some(Utc::now());
                match outcome {
                    Ok(artifact) => {
                        job.status = JobStatus::Completed;
                        job.best_artifact = Some(artifact);
                        job.epochs_completed = job.total_epochs;
                        tracing::info!(job_id = %job_id, "retraining completed");
                    }
                    Err(e) => {
                        job.status = JobStatus::Failed;
                        job.error_message = Some(e.to_string());
                        tracing::warn!(job_id = %job_id, error = %e, "retraining failed");
                    }
                }
            }
        });

        Ok(id)
    }

    /// Look up a job. For an `in_progress` job the stored progress is first
    /// refreshed from the external metrics file, best-effort; terminal jobs
    /// are returned as-is. `None` for an unknown id.
    pub fn status(&self, job_id: &str) -> Option<TrainingJob> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let job = jobs.get_mut(job_id)?;
        if job.status == JobStatus::InProgress {
            Self::refresh_progress(&self.runs_dir, job);
        }
        Some(job.clone())
    }

    /// The job with the most recent `start_time`, with the same progress
    /// refresh applied as [`status`](Self::status).
    pub fn latest(&self) -> Option<TrainingJob> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let id = jobs
            .values()
            .max_by_key(|j| j.start_time)
            .map(|j| j.id.clone())?;
        let job = jobs.get_mut(&id)?;
        if job.status == JobStatus::InProgress {
            Self::refresh_progress(&self.runs_dir, job);
        }
        Some(job.clone())
    }

    /// All tracked jobs, in no particular order.
    pub fn jobs(&self) -> Vec<TrainingJob> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.values().cloned().collect()
    }

    /// Whether any tracked job is currently `in_progress`.
    pub fn is_in_progress(&self) -> bool {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.values().any(|j| j.status == JobStatus::InProgress)
    }

    /// Best-effort refresh. Progress only ever moves forward: a stale or
    /// partial read never regresses `epochs_completed`, and a read failure
    /// never changes job status.
    fn refresh_progress(runs_dir: &Path, job: &mut TrainingJob) {
        if let Some(completed) = progress::poll_epochs_completed(runs_dir) {
            if completed > job.epochs_completed {
                job.epochs_completed = completed;
            }
        }
    }
}
