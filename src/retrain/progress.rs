//! Best-effort training progress derivation.
//!
//! The external training process appends one row per completed epoch to
//! `results.csv` inside its run directory (`<runs_dir>/train*`). This module
//! locates the most recently modified run directory and derives the number
//! of completed epochs from the last row. Every failure mode — missing
//! directory, missing file, transiently locked file, malformed rows —
//! degrades to "no update this poll", never an error: progress staleness is
//! acceptable, a failed read must not disturb job state.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Attempts before giving up on a locked/unreadable metrics file.
const READ_ATTEMPTS: u32 = 3;
/// Pause between attempts. Total wait stays within the polling budget.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Derive the completed-epoch count for the current training run, if any.
pub fn poll_epochs_completed(runs_dir: &Path) -> Option<u32> {
    let run_dir = latest_run_dir(runs_dir)?;
    let metrics = run_dir.join("results.csv");
    let content = read_with_retry(&metrics)?;
    epochs_from_metrics(&content)
}

/// Most recently modified `train*` subdirectory of the runs directory.
pub fn latest_run_dir(runs_dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(runs_dir).ok()?;

    let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let is_train = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with("train"));
        if !is_train {
            continue;
        }
        let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
            continue;
        };
        if best.as_ref().map_or(true, |(t, _)| modified > *t) {
            best = Some((modified, path));
        }
    }

    best.map(|(_, path)| path)
}

/// Read the metrics file, retrying while the training process holds it.
/// A file that does not exist at all is not retried.
fn read_with_retry(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    for attempt in 0..READ_ATTEMPTS {
        match fs::read_to_string(path) {
            Ok(content) => return Some(content),
            Err(_) if attempt + 1 < READ_ATTEMPTS => thread::sleep(RETRY_DELAY),
            Err(_) => return None,
        }
    }
    None
}

/// Parse the completed-epoch count from metrics CSV content.
///
/// The first column of each data row is the 0-based epoch index; the count
/// is the last row's index plus one. When the index cell fails to parse
/// (e.g. a partially written trailing row), the data-row count stands in.
fn epochs_from_metrics(content: &str) -> Option<u32> {
    // Header row + at least one data row
    let rows: Vec<&str> = content
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .collect();
    let last = rows.last()?;

    let parsed = last
        .split(',')
        .next()
        .and_then(|cell| cell.trim().parse::<f64>().ok())
        .map(|epoch| epoch as u32 + 1);

    Some(parsed.unwrap_or(rows.len() as u32))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{epochs_from_metrics, latest_run_dir, poll_epochs_completed};

    // -----------------------------------------------------------------------
    // Metrics parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_epochs_from_wellformed_csv() {
        let csv = "epoch,train/box_loss,metrics/mAP50\n0,1.2,0.1\n1,1.0,0.3\n2,0.8,0.5\n";
        assert_eq!(epochs_from_metrics(csv), Some(3));
    }

    #[test]
    fn test_epochs_from_float_index() {
        // Some writers emit the epoch index as a float
        let csv = "epoch,loss\n0.0,1.2\n1.0,1.0\n";
        assert_eq!(epochs_from_metrics(csv), Some(2));
    }

    #[test]
    fn test_epochs_header_only() {
        assert_eq!(epochs_from_metrics("epoch,loss\n"), None);
    }

    #[test]
    fn test_epochs_empty_file() {
        assert_eq!(epochs_from_metrics(""), None);
    }

    #[test]
    fn test_epochs_unparsable_last_row_falls_back_to_count() {
        // Partially written trailing row: count the data rows instead
        let csv = "epoch,loss\n0,1.2\n1,1.0\ngarbage,";
        assert_eq!(epochs_from_metrics(csv), Some(3));
    }

    #[test]
    fn test_epochs_ignores_trailing_blank_lines() {
        let csv = "epoch,loss\n0,1.2\n\n\n";
        assert_eq!(epochs_from_metrics(csv), Some(1));
    }

    // -----------------------------------------------------------------------
    // Run directory discovery
    // -----------------------------------------------------------------------

    #[test]
    fn test_latest_run_dir_picks_most_recent() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("train");
        let new = dir.path().join("train2");
        fs::create_dir(&old).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::create_dir(&new).unwrap();

        assert_eq!(latest_run_dir(dir.path()), Some(new));
    }

    #[test]
    fn test_latest_run_dir_ignores_non_train_entries() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("validate")).unwrap();
        fs::write(dir.path().join("train.log"), "not a dir").unwrap();

        assert_eq!(latest_run_dir(dir.path()), None);
    }

    #[test]
    fn test_latest_run_dir_missing_runs_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(latest_run_dir(&dir.path().join("nope")), None);
    }

    // -----------------------------------------------------------------------
    // End-to-end poll
    // -----------------------------------------------------------------------

    #[test]
    fn test_poll_reads_latest_run() {
        let dir = TempDir::new().unwrap();
        let run = dir.path().join("train3");
        fs::create_dir(&run).unwrap();
        fs::write(run.join("results.csv"), "epoch,loss\n0,1.0\n1,0.9\n").unwrap();

        assert_eq!(poll_epochs_completed(dir.path()), Some(2));
    }

    #[test]
    fn test_poll_run_without_metrics_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("train")).unwrap();
        assert_eq!(poll_epochs_completed(dir.path()), None);
    }
}
