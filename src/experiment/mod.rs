//! Experiment Tracking Schema
//!
//! The documents a run store holds for each run.
//!
//! ## Schema Overview
//!
//! ```text
//! RunRecord (config, status)
//!     │
//!     ├──< MetricRecord (N) [step-ordered samples, stored separately]
//!     └──< ArtifactRecord (N) [content-addressed blobs]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use trueno_sweep::config::Config;
//! use trueno_sweep::experiment::{MetricRecord, RunRecord, RunStatus};
//!
//! let mut run = RunRecord::new("run-001", "mnist", Config::new());
//! run.start();
//!
//! let metric = MetricRecord::new(run.id(), "loss", 0, 0.5);
//!
//! run.complete(RunStatus::Completed);
//! assert_eq!(run.status(), RunStatus::Completed);
//! ```

mod artifact_record;
mod metric_record;
mod run_record;

pub use artifact_record::ArtifactRecord;
pub use metric_record::MetricRecord;
pub use run_record::{RunRecord, RunRecordBuilder, RunStatus};
