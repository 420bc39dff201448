//! Integration tests for the active-learning loop: validation feeds the
//! staging store, promotion feeds the corpus, the orchestrator runs
//! retraining and exposes polled status.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use revisar::analysis::{analyze_with_reports, BBox, DetectionMask, MaskClass};
use revisar::retrain::{
    JobStatus, RetrainOrchestrator, RetrainOverrides, RetrainParams, TrainOutcome,
    TrainingProcedure,
};
use revisar::staging::SampleStore;

// ============================================================================
// Fixtures
// ============================================================================

/// Fake trainer: writes a metrics file the way the external training process
/// would, then produces an artifact.
struct FakeTrainer {
    runs_dir: PathBuf,
    artifact: PathBuf,
}

impl TrainingProcedure for FakeTrainer {
    fn run(&self, params: &RetrainParams) -> TrainOutcome {
        let run_dir = self.runs_dir.join("train");
        fs::create_dir_all(&run_dir)?;

        let mut csv = String::from("epoch,train/box_loss\n");
        for epoch in 0..params.epochs {
            csv.push_str(&format!("{epoch},{}\n", 1.0 / f64::from(epoch + 1)));
        }
        fs::write(run_dir.join("results.csv"), csv)?;

        fs::write(&self.artifact, b"weights")?;
        Ok(self.artifact.clone())
    }
}

fn stage_sample(store: &SampleStore, dir: &TempDir, name: &str) -> String {
    let image = dir.path().join(format!("{name}.png"));
    let labels = dir.path().join(format!("{name}.txt"));
    fs::write(&image, name.as_bytes()).unwrap();
    fs::write(&labels, "0 0.1 0.1 0.3 0.1 0.3 0.3\n").unwrap();

    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), "operator-correction".to_string());
    store.save(&image, &labels, metadata).unwrap()
}

fn wait_for_terminal(orchestrator: &RetrainOrchestrator, job_id: &str) -> revisar::TrainingJob {
    for _ in 0..500 {
        let job = orchestrator.status(job_id).expect("job exists");
        if job.status != JobStatus::InProgress {
            return job;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("job never finished");
}

// ============================================================================
// Full loop
// ============================================================================

#[test]
fn test_validate_promote_retrain_cycle() {
    let dir = TempDir::new().unwrap();
    let store =
        SampleStore::new(dir.path().join("staging"), dir.path().join("corpus")).unwrap();

    // A correction arrives from validation
    let id = stage_sample(&store, &dir, "board-0042");
    assert_eq!(store.count().unwrap(), 1);

    // Retrain request: promote everything, then start the job
    let promoted = store.promote_all().unwrap();
    assert_eq!(promoted.len(), 1);
    assert!(dir.path().join("corpus/images/board-0042.png").exists());
    assert!(dir.path().join("corpus/labels/board-0042.txt").exists());

    // Promotion keeps the staged copy for provenance
    assert!(store.get(&id).unwrap().is_some());

    let runs_dir = dir.path().join("runs");
    let artifact = dir.path().join("best.pt");
    let orchestrator = RetrainOrchestrator::new(
        FakeTrainer { runs_dir: runs_dir.clone(), artifact: artifact.clone() },
        &runs_dir,
        RetrainParams { epochs: 3, batch_size: 2, patience: 1 },
    );

    let job_id = orchestrator.start(RetrainOverrides::default()).unwrap();
    let job = wait_for_terminal(&orchestrator, &job_id);

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.best_artifact, Some(artifact));
    assert_eq!(job.epochs_completed, 3);
    assert_eq!(job.total_epochs, 3);
    assert!(!orchestrator.is_in_progress());
    assert_eq!(orchestrator.latest().unwrap().id, job_id);
}

#[test]
fn test_conflict_surfaces_before_any_thread_work() {
    let dir = TempDir::new().unwrap();

    // Trainer that parks until the test ends
    struct Parked;
    impl TrainingProcedure for Parked {
        fn run(&self, _params: &RetrainParams) -> TrainOutcome {
            std::thread::sleep(Duration::from_millis(500));
            Ok(PathBuf::from("best.pt"))
        }
    }

    let orchestrator =
        RetrainOrchestrator::new(Parked, dir.path(), RetrainParams::default());
    let first = orchestrator.start(RetrainOverrides::default()).unwrap();
    assert!(orchestrator.start(RetrainOverrides::default()).is_err());
    assert_eq!(orchestrator.jobs().len(), 1);
    assert_eq!(orchestrator.jobs()[0].id, first);
}

// ============================================================================
// Analysis feeding validation
// ============================================================================

#[test]
fn test_analysis_verdict_drives_correction_decision() {
    // A failing board: 8% void rate against a 5% threshold
    let masks = vec![
        DetectionMask::new(MaskClass::Component, 0.92, 50_000, BBox::new(0.0, 0.0, 400.0, 400.0)),
        DetectionMask::new(MaskClass::Defect, 0.85, 3_000, BBox::new(40.0, 40.0, 80.0, 80.0)),
        DetectionMask::new(MaskClass::Defect, 0.78, 1_000, BBox::new(200.0, 200.0, 230.0, 230.0)),
    ];

    let (result, reports) = analyze_with_reports(&masks, 5.0);
    assert_eq!(result.void_rate_percent, 8.0);
    assert!(!result.is_usable);

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].matched_defect_count, 2);
    assert!((reports[0].void_percent - 0.08).abs() < 1e-12);
    assert!((reports[0].max_void_percent - 0.06).abs() < 1e-12);
}
