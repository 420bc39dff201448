//! Configuration schema and YAML loader.
//!
//! All knobs live in one serde struct with production defaults; deployments
//! override them from a YAML file. Paths are resolved relative to the
//! process working directory.

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retrain::RetrainParams;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Crate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Staging store root (`images/`, `labels/`, `metadata/`)
    pub staging_dir: PathBuf,
    /// Training corpus root (append-only `images/`, `labels/`)
    pub corpus_dir: PathBuf,
    /// Directory where the external trainer creates `train*` run dirs
    pub runs_dir: PathBuf,
    /// Best-model artifact the trainer writes on success
    pub model_artifact: PathBuf,
    /// Maximum acceptable global void rate, in percent
    pub void_rate_threshold: f64,
    /// Retraining hyperparameter defaults
    pub retrain: RetrainParams,
    /// External training command (program plus leading arguments);
    /// `--epochs/--batch/--patience` are appended per job
    pub train_command: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("staging"),
            corpus_dir: PathBuf::from("dataset/train"),
            runs_dir: PathBuf::from("runs/segment"),
            model_artifact: PathBuf::from("models/best.pt"),
            void_rate_threshold: 5.0,
            retrain: RetrainParams::default(),
            train_command: vec!["python".to_string(), "backend/train.py".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from a YAML file. Missing keys take their
    /// defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}
