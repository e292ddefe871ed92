//! In-memory run store using `DashMap`.
//!
//! The default backend for tests and single-process sweeps; data is lost on
//! process exit. For a store shared between processes, use `DirRunStore`.

use super::{content_address, sort_metrics, sort_runs, RunStore};
use crate::experiment::{MetricRecord, RunRecord};
use crate::{Error, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory run store.
///
/// Run ids are allocated sequentially (`"1"`, `"2"`, ...). Interior
/// mutability through `DashMap` lets the driver and a running experiment's
/// context write to the same `&MemoryRunStore`.
///
/// # Example
///
/// ```rust
/// use trueno_sweep::store::{MemoryRunStore, RunStore};
///
/// # fn main() -> trueno_sweep::Result<()> {
/// let store = MemoryRunStore::new();
/// let handle = store.put_blob(b"payload")?;
/// assert_eq!(store.get_blob(&handle)?, b"payload".to_vec());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: DashMap<String, RunRecord>,
    metrics: DashMap<String, Vec<MetricRecord>>,
    blobs: DashMap<String, Vec<u8>>,
    last_id: AtomicU64,
}

impl MemoryRunStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of run documents.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Total number of metric samples across all runs.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    /// Check if the store holds no runs, metrics or blobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty() && self.metrics.is_empty() && self.blobs.is_empty()
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.runs.clear();
        self.metrics.clear();
        self.blobs.clear();
    }
}

impl RunStore for MemoryRunStore {
    fn allocate_run_id(&self) -> Result<String> {
        // Skip ids taken by runs inserted with explicit ids
        loop {
            let id = (self.last_id.fetch_add(1, Ordering::Relaxed) + 1).to_string();
            if !self.runs.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    fn put_run(&self, run: &RunRecord) -> Result<()> {
        self.runs.insert(run.id().to_string(), run.clone());
        Ok(())
    }

    fn get_run(&self, id: &str) -> Result<Option<RunRecord>> {
        Ok(self.runs.get(id).map(|entry| entry.value().clone()))
    }

    fn delete_run(&self, id: &str) -> Result<bool> {
        Ok(self.runs.remove(id).is_some())
    }

    fn runs(&self) -> Result<Vec<RunRecord>> {
        let mut runs: Vec<RunRecord> = self.runs.iter().map(|e| e.value().clone()).collect();
        sort_runs(&mut runs);
        Ok(runs)
    }

    fn add_metric(&self, metric: MetricRecord) -> Result<()> {
        self.metrics
            .entry(metric.run_id().to_string())
            .or_default()
            .push(metric);
        Ok(())
    }

    fn metrics_for_run(&self, run_id: &str) -> Result<Vec<MetricRecord>> {
        let mut metrics = self
            .metrics
            .get(run_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        sort_metrics(&mut metrics);
        Ok(metrics)
    }

    fn delete_metrics(&self, run_id: &str) -> Result<usize> {
        Ok(self
            .metrics
            .remove(run_id)
            .map_or(0, |(_, samples)| samples.len()))
    }

    fn put_blob(&self, bytes: &[u8]) -> Result<String> {
        let handle = content_address(bytes);
        self.blobs
            .entry(handle.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(handle)
    }

    fn get_blob(&self, handle: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(handle)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::BlobNotFound(handle.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_store_default() {
        let store = MemoryRunStore::new();
        assert!(store.is_empty());
        assert_eq!(store.run_count(), 0);
        assert_eq!(store.metric_count(), 0);
    }

    #[test]
    fn test_sequential_ids_skip_taken() {
        let store = MemoryRunStore::new();
        store
            .put_run(&RunRecord::new("2", "exp", Config::new()))
            .unwrap();
        assert_eq!(store.allocate_run_id().unwrap(), "1");
        assert_eq!(store.allocate_run_id().unwrap(), "3");
    }

    #[test]
    fn test_put_get_delete_run() {
        let store = MemoryRunStore::new();
        let mut run = RunRecord::new("1", "exp", Config::new());
        store.put_run(&run).unwrap();
        run.start();
        store.put_run(&run).unwrap();

        assert_eq!(store.run_count(), 1);
        assert_eq!(store.get_run("1").unwrap(), Some(run));
        assert!(store.delete_run("1").unwrap());
        assert!(!store.delete_run("1").unwrap());
        assert!(store.get_run("1").unwrap().is_none());
    }

    #[test]
    fn test_metrics_ordering_and_delete() {
        let store = MemoryRunStore::new();

        // Add out of order
        store.add_metric(MetricRecord::new("1", "loss", 2, 0.2)).unwrap();
        store.add_metric(MetricRecord::new("1", "loss", 0, 0.0)).unwrap();
        store.add_metric(MetricRecord::new("1", "loss", 1, 0.1)).unwrap();
        store.add_metric(MetricRecord::new("2", "loss", 0, 9.0)).unwrap();

        let metrics = store.metrics_for_run("1").unwrap();
        let steps: Vec<u64> = metrics.iter().map(MetricRecord::step).collect();
        assert_eq!(steps, vec![0, 1, 2]);

        assert_eq!(store.delete_metrics("1").unwrap(), 3);
        assert_eq!(store.metric_count(), 1);
    }

    #[test]
    fn test_blobs_are_deduplicated() {
        let store = MemoryRunStore::new();
        let a = store.put_blob(b"same").unwrap();
        let b = store.put_blob(b"same").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.blob_count(), 1);
        assert!(matches!(
            store.get_blob("sha256:missing"),
            Err(Error::BlobNotFound(_))
        ));
    }
}
