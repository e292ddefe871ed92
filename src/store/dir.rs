//! Directory-backed run store.
//!
//! Layout:
//!
//! ```text
//! <root>/runs/<id>.json        run document
//! <root>/metrics/<id>.json     array of metric samples
//! <root>/blobs/<hex digest>    artifact blob
//! ```
//!
//! Documents are written to a temporary file and renamed into place, so a
//! concurrent reader never sees a half-written run. Run ids are UUIDs, so
//! several processes can share one root.

use super::{content_address, sort_metrics, sort_runs, RunStore, HANDLE_PREFIX};
use crate::experiment::{MetricRecord, RunRecord};
use crate::{Error, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

const RUNS_DIR: &str = "runs";
const METRICS_DIR: &str = "metrics";
const BLOBS_DIR: &str = "blobs";

/// Run store persisted as JSON documents under a root directory.
#[derive(Debug, Clone)]
pub struct DirRunStore {
    root: PathBuf,
}

impl DirRunStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns error if the directory layout cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [RUNS_DIR, METRICS_DIR, BLOBS_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self { root })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_path(&self, id: &str) -> Result<PathBuf> {
        check_file_stem(id)?;
        Ok(self.root.join(RUNS_DIR).join(format!("{id}.json")))
    }

    fn metrics_path(&self, run_id: &str) -> Result<PathBuf> {
        check_file_stem(run_id)?;
        Ok(self.root.join(METRICS_DIR).join(format!("{run_id}.json")))
    }

    fn blob_path(&self, handle: &str) -> Result<PathBuf> {
        let digest = handle
            .strip_prefix(HANDLE_PREFIX)
            .filter(|hex| !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| Error::BlobNotFound(handle.to_string()))?;
        Ok(self.root.join(BLOBS_DIR).join(digest))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| Error::StorageError(format!("no parent for {}", path.display())))?;
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(bytes)?;
        file.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

fn check_file_stem(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::StorageError(format!(
            "run id '{id}' is not usable as a file name"
        )))
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_optional(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl RunStore for DirRunStore {
    fn allocate_run_id(&self) -> Result<String> {
        Ok(Uuid::new_v4().to_string())
    }

    fn put_run(&self, run: &RunRecord) -> Result<()> {
        let path = self.run_path(run.id())?;
        self.write_atomic(&path, &serde_json::to_vec_pretty(run)?)
    }

    fn get_run(&self, id: &str) -> Result<Option<RunRecord>> {
        read_optional(&self.run_path(id)?)?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(Error::from))
            .transpose()
    }

    fn delete_run(&self, id: &str) -> Result<bool> {
        remove_optional(&self.run_path(id)?)
    }

    fn runs(&self) -> Result<Vec<RunRecord>> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(self.root.join(RUNS_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // Deleted between listing and reading
            if let Some(bytes) = read_optional(&path)? {
                runs.push(serde_json::from_slice(&bytes)?);
            }
        }
        sort_runs(&mut runs);
        Ok(runs)
    }

    fn add_metric(&self, metric: MetricRecord) -> Result<()> {
        let path = self.metrics_path(metric.run_id())?;
        let mut samples: Vec<MetricRecord> = match read_optional(&path)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        samples.push(metric);
        self.write_atomic(&path, &serde_json::to_vec(&samples)?)
    }

    fn metrics_for_run(&self, run_id: &str) -> Result<Vec<MetricRecord>> {
        let mut samples: Vec<MetricRecord> = match read_optional(&self.metrics_path(run_id)?)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        sort_metrics(&mut samples);
        Ok(samples)
    }

    fn delete_metrics(&self, run_id: &str) -> Result<usize> {
        let count = self.metrics_for_run(run_id)?.len();
        remove_optional(&self.metrics_path(run_id)?)?;
        Ok(count)
    }

    fn put_blob(&self, bytes: &[u8]) -> Result<String> {
        let handle = content_address(bytes);
        let path = self.blob_path(&handle)?;
        if !path.exists() {
            self.write_atomic(&path, bytes)?;
        }
        Ok(handle)
    }

    fn get_blob(&self, handle: &str) -> Result<Vec<u8>> {
        read_optional(&self.blob_path(handle)?)?
            .ok_or_else(|| Error::BlobNotFound(handle.to_string()))
    }
}
