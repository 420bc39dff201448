//! Validated Sample Store
//!
//! Durable staging area for human-corrected samples awaiting promotion into
//! the training corpus. Each sample is an image plus a polygon label file
//! plus a JSON metadata record, keyed by a generated id:
//!
//! ```text
//! staging/
//!   images/{id}.{ext}
//!   labels/{id}.txt
//!   metadata/{id}.json
//! ```
//!
//! Promotion copies the staged artifacts into the append-only corpus
//! directories (`images/`, `labels/`) under their **original** filenames.
//! The staged copy survives promotion; the metadata record is the
//! provenance trail.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use revisar::staging::SampleStore;
//!
//! # fn main() -> revisar::staging::Result<()> {
//! let store = SampleStore::new("staging", "dataset/train")?;
//! let id = store.save("corrected.png", "corrected.txt", HashMap::new())?;
//! let (corpus_image, corpus_labels) = store.promote(&id)?;
//! assert!(corpus_image.exists() && corpus_labels.exists());
//! # Ok(())
//! # }
//! ```


use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from sample store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No staged sample exists under this id.
    #[error("sample not found: {id}")]
    NotFound { id: String },

    /// A corpus file with the same name already exists. The corpus is
    /// append-only; promotion never overwrites.
    #[error("corpus file already exists: {path}")]
    CorpusCollision { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Metadata record for one staged sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Generated unique id
    pub id: String,
    /// Path the image was validated from
    pub original_image_path: PathBuf,
    /// Path the labels were validated from
    pub original_labels_path: PathBuf,
    /// Staged image copy
    pub image_path: PathBuf,
    /// Staged labels copy
    pub labels_path: PathBuf,
    /// When the sample was staged
    pub saved_at: DateTime<Utc>,
    /// Free-form caller-supplied metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Staging store for validated samples.
///
/// All operations go through the filesystem; two stores pointed at the same
/// directories observe each other's writes.
#[derive(Debug, Clone)]
pub struct SampleStore {
    images_dir: PathBuf,
    labels_dir: PathBuf,
    metadata_dir: PathBuf,
    corpus_images_dir: PathBuf,
    corpus_labels_dir: PathBuf,
}

impl SampleStore {
    /// Open a store rooted at `staging_dir`, promoting into `corpus_dir`.
    /// Creates the staging subdirectories if they do not exist. The corpus
    /// directories are created lazily on first promotion.
    pub fn new(staging_dir: impl AsRef<Path>, corpus_dir: impl AsRef<Path>) -> Result<Self> {
        let staging_dir = staging_dir.as_ref();
        let corpus_dir = corpus_dir.as_ref();

        let store = Self {
            images_dir: staging_dir.join("images"),
            labels_dir: staging_dir.join("labels"),
            metadata_dir: staging_dir.join("metadata"),
            corpus_images_dir: corpus_dir.join("images"),
            corpus_labels_dir: corpus_dir.join("labels"),
        };

        fs::create_dir_all(&store.images_dir)?;
        fs::create_dir_all(&store.labels_dir)?;
        fs::create_dir_all(&store.metadata_dir)?;

        Ok(store)
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.metadata_dir.join(format!("{id}.json"))
    }

    /// Stage a validated sample. Copies the image and label artifacts into
    /// the store under a fresh id and writes the metadata record. The
    /// caller's originals are left untouched.
    ///
    /// Returns the generated sample id.
    pub fn save(
        &self,
        image: impl AsRef<Path>,
        labels: impl AsRef<Path>,
        metadata: HashMap<String, String>,
    ) -> Result<String> {
        let image = image.as_ref();
        let labels = labels.as_ref();
        let id = Uuid::new_v4().to_string();

        let ext = image
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let image_dest = self.images_dir.join(format!("{id}{ext}"));
        let labels_dest = self.labels_dir.join(format!("{id}.txt"));

        fs::copy(image, &image_dest)?;
        fs::copy(labels, &labels_dest)?;

        let record = SampleRecord {
            id: id.clone(),
            original_image_path: image.to_path_buf(),
            original_labels_path: labels.to_path_buf(),
            image_path: image_dest,
            labels_path: labels_dest,
            saved_at: Utc::now(),
            metadata,
        };

        let json = serde_json::to_string_pretty(&record)?;
        fs::write(self.metadata_path(&id), json)?;

        tracing::debug!(id = %id, "staged validated sample");
        Ok(id)
    }

    /// All staged records, newest first by `saved_at`.
    pub fn list(&self) -> Result<Vec<SampleRecord>> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.metadata_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                let json = fs::read_to_string(&path)?;
                let record: SampleRecord = serde_json::from_str(&json)?;
                records.push(record);
            }
        }

        records.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(records)
    }

    /// Look up one staged record. `Ok(None)` for an unknown id.
    pub fn get(&self, id: &str) -> Result<Option<SampleRecord>> {
        let path = self.metadata_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Copy a staged sample into the training corpus.
    ///
    /// Corpus files keep the sample's original filenames; an existing file
    /// under either name fails the promotion rather than being overwritten.
    /// The staged copy is not deleted.
    ///
    /// Returns the corpus paths of the image and labels.
    pub fn promote(&self, id: &str) -> Result<(PathBuf, PathBuf)> {
        let record = self.get(id)?.ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        fs::create_dir_all(&self.corpus_images_dir)?;
        fs::create_dir_all(&self.corpus_labels_dir)?;

        let image_name = record
            .original_image_path
            .file_name()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        let labels_name = record
            .original_labels_path
            .file_name()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        let image_dest = self.corpus_images_dir.join(image_name);
        let labels_dest = self.corpus_labels_dir.join(labels_name);

        if image_dest.exists() {
            return Err(StoreError::CorpusCollision { path: image_dest });
        }
        if labels_dest.exists() {
            return Err(StoreError::CorpusCollision { path: labels_dest });
        }

        fs::copy(&record.image_path, &image_dest)?;
        fs::copy(&record.labels_path, &labels_dest)?;

        tracing::info!(id = %id, image = %image_dest.display(), "promoted sample to corpus");
        Ok((image_dest, labels_dest))
    }

    /// Promote every currently staged sample.
    ///
    /// Operates on a snapshot of [`list`](Self::list) taken at call time.
    /// A failing record is logged and skipped; partial success is the
    /// expected outcome under load.
    pub fn promote_all(&self) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut promoted = Vec::new();

        for record in self.list()? {
            match self.promote(&record.id) {
                Ok(paths) => promoted.push(paths),
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "skipping sample during promotion");
                }
            }
        }

        Ok(promoted)
    }

    /// Remove a staged sample (image, labels, metadata). Returns whether a
    /// record existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let Some(record) = self.get(id)? else {
            return Ok(false);
        };

        if record.image_path.exists() {
            fs::remove_file(&record.image_path)?;
        }
        if record.labels_path.exists() {
            fs::remove_file(&record.labels_path)?;
        }
        fs::remove_file(self.metadata_path(id))?;

        Ok(true)
    }

    /// Number of staged samples.
    pub fn count(&self) -> Result<usize> {
        let mut n = 0;
        for entry in fs::read_dir(&self.metadata_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                n += 1;
            }
        }
        Ok(n)
    }
}
