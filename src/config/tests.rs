//! Tests for the config module

use std::fs;

use tempfile::TempDir;

use super::{Config, ConfigError};

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.void_rate_threshold, 5.0);
    assert_eq!(config.retrain.epochs, 15);
    assert_eq!(config.retrain.batch_size, 8);
    assert_eq!(config.retrain.patience, 5);
    assert_eq!(config.staging_dir, std::path::Path::new("staging"));
    assert!(!config.train_command.is_empty());
}

#[test]
fn test_from_yaml_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("revisar.yaml");
    fs::write(
        &path,
        "void_rate_threshold: 7.5\nstaging_dir: /data/staging\nretrain:\n  epochs: 30\n  batch_size: 16\n  patience: 8\n",
    )
    .unwrap();

    let config = Config::from_yaml_file(&path).unwrap();
    assert_eq!(config.void_rate_threshold, 7.5);
    assert_eq!(config.staging_dir, std::path::Path::new("/data/staging"));
    assert_eq!(config.retrain.epochs, 30);
    // Unspecified keys keep their defaults
    assert_eq!(config.corpus_dir, std::path::Path::new("dataset/train"));
}

#[test]
fn test_from_yaml_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = Config::from_yaml_file(dir.path().join("nope.yaml"));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn test_from_yaml_malformed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "void_rate_threshold: [not, a, number]\n").unwrap();

    let result = Config::from_yaml_file(&path);
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_config_serde_roundtrip() {
    let config = Config::default();
    let yaml = serde_yaml::to_string(&config).unwrap();
    let back: Config = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(back.void_rate_threshold, config.void_rate_threshold);
    assert_eq!(back.retrain, config.retrain);
}
