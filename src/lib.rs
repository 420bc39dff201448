//! # revisar
//!
//! Active-learning orchestration for chip void inspection.
//!
//! An external detector classifies image regions as component or
//! void/defect; this crate turns those detections into usability verdicts,
//! stages the human-corrected samples, and drives model retraining:
//!
//! - **[`analysis`]**: pure geometric analysis — global void rate,
//!   defect-to-component matching, per-component report rows, and the
//!   usable/scrap verdict
//! - **[`staging`]**: filesystem store for validated samples pending
//!   promotion into the append-only training corpus
//! - **[`retrain`]**: single-flight retraining jobs on detached background
//!   threads, with best-effort progress derived from the trainer's metrics
//!   file
//! - **[`config`]**: YAML-backed configuration with production defaults
//! - **[`cli`]**: command-line front end
//!
//! The detector, segmenter and training procedure themselves are external
//! collaborators; the crate only consumes their outputs (detection masks,
//! the metrics file, the model artifact).
//!
//! # Example
//!
//! ```
//! use revisar::analysis::{analyze, BBox, DetectionMask, MaskClass};
//!
//! let masks = vec![
//!     DetectionMask::new(MaskClass::Component, 0.95, 20_000, BBox::new(0.0, 0.0, 200.0, 200.0)),
//!     DetectionMask::new(MaskClass::Defect, 0.80, 400, BBox::new(50.0, 50.0, 70.0, 70.0)),
//! ];
//!
//! let result = analyze(&masks, 5.0);
//! assert_eq!(result.void_rate_percent, 2.0);
//! assert!(result.is_usable);
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod retrain;
pub mod staging;

pub use analysis::{AnalysisResult, ComponentReport, DetectionMask, MaskClass};
pub use config::Config;
pub use retrain::{JobStatus, RetrainOrchestrator, TrainingJob};
pub use staging::{SampleRecord, SampleStore};
