//! Run Store - persistence for run documents, metric samples and blobs
//!
//! Provides:
//! - [`RunStore`]: the storage interface the driver, artifact and frame
//!   modules are written against
//! - [`RunQuery`]: conjunctive config-equality match used by the
//!   duplicate-run guard
//! - [`MemoryRunStore`]: `DashMap`-backed, lost on process exit
//! - [`DirRunStore`]: one JSON document per run under a directory, shareable
//!   between processes
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use trueno_sweep::config::Config;
//! use trueno_sweep::experiment::{RunRecord, RunStatus};
//! use trueno_sweep::store::{MemoryRunStore, RunQuery, RunStore};
//!
//! # fn main() -> trueno_sweep::Result<()> {
//! let store = MemoryRunStore::new();
//! let config = Config::from_value(json!({"lr": 0.1, "seed": 7})).unwrap();
//! store.put_run(
//!     &RunRecord::builder("1", "mnist")
//!         .config(config)
//!         .status(RunStatus::Completed)
//!         .build(),
//! )?;
//!
//! let query = RunQuery::from_config(&Config::from_value(json!({"lr": 0.1})).unwrap());
//! assert_eq!(store.count_matching(&query)?, 1);
//! # Ok(())
//! # }
//! ```

mod dir;
mod memory;
mod query;

pub use dir::DirRunStore;
pub use memory::MemoryRunStore;
pub use query::{ConfigPath, RunQuery};

use crate::experiment::{MetricRecord, RunRecord};
use crate::Result;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;

/// Prefix of content-addressed blob handles.
pub const HANDLE_PREFIX: &str = "sha256:";

/// Storage interface for run documents, metric samples and artifact blobs.
///
/// Methods take `&self` so a store can be shared by the driver and the run
/// context of the experiment it is executing.
pub trait RunStore {
    /// Allocate a fresh run id.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot allocate an id.
    fn allocate_run_id(&self) -> Result<String>;

    /// Insert or replace a run document.
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be written.
    fn put_run(&self, run: &RunRecord) -> Result<()>;

    /// Get a run document by id.
    ///
    /// # Errors
    ///
    /// Returns error if the document exists but cannot be read.
    fn get_run(&self, id: &str) -> Result<Option<RunRecord>>;

    /// Delete a run document. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails to delete it.
    fn delete_run(&self, id: &str) -> Result<bool>;

    /// All run documents, ordered by start time then id.
    ///
    /// # Errors
    ///
    /// Returns error if any document cannot be read.
    fn runs(&self) -> Result<Vec<RunRecord>>;

    /// Append a metric sample.
    ///
    /// # Errors
    ///
    /// Returns error if the sample cannot be written.
    fn add_metric(&self, metric: MetricRecord) -> Result<()>;

    /// All metric samples of a run, ordered by key then step.
    ///
    /// # Errors
    ///
    /// Returns error if the samples cannot be read.
    fn metrics_for_run(&self, run_id: &str) -> Result<Vec<MetricRecord>>;

    /// Delete every metric sample of a run. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails to delete them.
    fn delete_metrics(&self, run_id: &str) -> Result<usize>;

    /// Store a blob and return its content-addressed handle.
    ///
    /// # Errors
    ///
    /// Returns error if the blob cannot be written.
    fn put_blob(&self, bytes: &[u8]) -> Result<String>;

    /// Fetch a blob by handle.
    ///
    /// # Errors
    ///
    /// Returns `Error::BlobNotFound` for unknown handles.
    fn get_blob(&self, handle: &str) -> Result<Vec<u8>>;

    /// Number of runs whose configuration satisfies `query`.
    ///
    /// # Errors
    ///
    /// Returns error if the runs cannot be listed.
    fn count_matching(&self, query: &RunQuery) -> Result<usize> {
        Ok(self.runs()?.iter().filter(|run| query.matches(run)).count())
    }

    /// Runs whose configuration satisfies `query`.
    ///
    /// # Errors
    ///
    /// Returns error if the runs cannot be listed.
    fn find(&self, query: &RunQuery) -> Result<Vec<RunRecord>> {
        Ok(self
            .runs()?
            .into_iter()
            .filter(|run| query.matches(run))
            .collect())
    }
}

/// Content address of a blob: `sha256:<hex digest>`.
#[must_use]
pub fn content_address(bytes: &[u8]) -> String {
    format!("{HANDLE_PREFIX}{:x}", Sha256::digest(bytes))
}

/// Order runs by start time, then by id (numeric ids compare numerically).
pub(crate) fn sort_runs(runs: &mut [RunRecord]) {
    runs.sort_by(|a, b| {
        a.started_at()
            .cmp(&b.started_at())
            .then_with(|| compare_ids(a.id(), b.id()))
    });
}

fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Order metric samples by key, then step.
pub(crate) fn sort_metrics(metrics: &mut [MetricRecord]) {
    metrics.sort_by(|a, b| a.key().cmp(b.key()).then_with(|| a.step().cmp(&b.step())));
}
