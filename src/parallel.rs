//! Configuration folder queue
//!
//! Several worker processes can share one sweep by draining a folder of
//! `config_<i>.json` files. A worker claims a file by renaming it to a hidden
//! name unique to its process id; only one rename of a given file can
//! succeed, so no configuration is handed out twice. The claimed file is
//! read, deleted and yielded.
//!
//! ```rust
//! use serde_json::json;
//! use trueno_sweep::grid::nested_parameter_grid;
//! use trueno_sweep::parallel::{dump_configs_to_tempdir, ConfigFolderQueue};
//!
//! # fn main() -> trueno_sweep::Result<()> {
//! let configs = nested_parameter_grid(&json!({"lr": [0.1, 0.01]}))?;
//! let folder = dump_configs_to_tempdir(&configs)?;
//!
//! let queue = ConfigFolderQueue::open(&folder)?;
//! assert_eq!(queue.remaining(), 2);
//! let drained: Vec<_> = queue.collect::<Result<_, _>>()?;
//! assert_eq!(drained.len(), 2);
//! assert!(!folder.exists());
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::{io, Error, Result};
use rand::seq::SliceRandom;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const CONFIG_FILE_PREFIX: &str = "config_";
const CONFIG_FILE_EXT: &str = "json";
const CLAIM_SUFFIX: &str = "claim";

/// Write one `config_<i>.json` per configuration into `folder`, creating it
/// if needed. Returns the paths written.
///
/// # Errors
///
/// Returns error if the folder or a file cannot be written.
pub fn dump_configs_to_folder(configs: &[Config], folder: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let folder = folder.as_ref();
    fs::create_dir_all(folder)?;
    let mut paths = Vec::with_capacity(configs.len());
    for (i, config) in configs.iter().enumerate() {
        let path = folder.join(format!("{CONFIG_FILE_PREFIX}{i}.{CONFIG_FILE_EXT}"));
        io::save_json(config, &path)?;
        paths.push(path);
    }
    tracing::debug!(folder = %folder.display(), count = configs.len(), "dumped configurations");
    Ok(paths)
}

/// Write the configurations into a fresh folder under the system temp
/// directory and return its path.
///
/// The folder is not cleaned up automatically; draining it with a
/// [`ConfigFolderQueue`] removes it.
///
/// # Errors
///
/// Returns error if the folder or a file cannot be written.
pub fn dump_configs_to_tempdir(configs: &[Config]) -> Result<PathBuf> {
    let folder = tempfile::Builder::new().prefix("sweep-").tempdir()?.into_path();
    dump_configs_to_folder(configs, &folder)?;
    Ok(folder)
}

/// Iterator that claims, loads and deletes configuration files.
#[derive(Debug, Clone)]
pub struct ConfigFolderQueue {
    folder: PathBuf,
    randomise: bool,
}

impl ConfigFolderQueue {
    /// Open a queue over `folder`, picking files at random.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedExtension` if a visible entry is not a
    /// `.json` file, or an I/O error if the folder cannot be listed.
    pub fn open(folder: impl AsRef<Path>) -> Result<Self> {
        let folder = folder.as_ref().to_path_buf();
        for entry in fs::read_dir(&folder)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) {
                continue;
            }
            if Path::new(&name).extension().and_then(|ext| ext.to_str()) != Some(CONFIG_FILE_EXT) {
                return Err(Error::UnsupportedExtension(name));
            }
        }
        Ok(Self {
            folder,
            randomise: true,
        })
    }

    /// Pick files at random (`true`, the default) or in index order.
    #[must_use]
    pub const fn randomise(mut self, randomise: bool) -> Self {
        self.randomise = randomise;
        self
    }

    /// Folder being drained.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Number of unclaimed configuration files (0 once the folder is gone).
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending().map_or(0, |files| files.len())
    }

    fn pending(&self) -> Option<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.folder).ok()?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .filter(|entry| !is_hidden(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            .collect();
        files.sort_by_key(|path| (file_index(path), path.clone()));
        Some(files)
    }

    fn claim_path(&self, path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.folder
            .join(format!(".{name}.{}.{CLAIM_SUFFIX}", std::process::id()))
    }

    /// Claim one file. `None` once the folder is empty or gone.
    fn claim_next(&self) -> Option<Result<PathBuf>> {
        loop {
            let mut files = self.pending()?;
            if files.is_empty() {
                match fs::remove_dir(&self.folder) {
                    Ok(()) => tracing::debug!(folder = %self.folder.display(), "queue drained, folder removed"),
                    Err(e) => tracing::debug!(
                        folder = %self.folder.display(),
                        error = %e,
                        "queue drained, folder left in place"
                    ),
                }
                return None;
            }
            if self.randomise {
                files.shuffle(&mut rand::thread_rng());
            }

            let candidate = &files[0];
            let claimed = self.claim_path(candidate);
            match fs::rename(candidate, &claimed) {
                Ok(()) => {
                    tracing::info!(remaining = files.len() - 1, "claimed {}", candidate.display());
                    return Some(Ok(claimed));
                }
                // Another worker got there first
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

impl Iterator for ConfigFolderQueue {
    type Item = Result<Config>;

    fn next(&mut self) -> Option<Self::Item> {
        let claimed = match self.claim_next()? {
            Ok(path) => path,
            Err(e) => return Some(Err(e)),
        };
        let loaded = io::load_json_as(&claimed, io::JsonDialect::Json);
        if let Err(e) = fs::remove_file(&claimed) {
            tracing::warn!(path = %claimed.display(), error = %e, "could not delete claimed configuration");
        }
        Some(loaded)
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn file_index(path: &Path) -> usize {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix(CONFIG_FILE_PREFIX))
        .and_then(|index| index.parse().ok())
        .unwrap_or(usize::MAX)
}
