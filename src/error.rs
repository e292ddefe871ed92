//! Error types for trueno-sweep
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-sweep error types
#[derive(Error, Debug)]
pub enum Error {
    /// Parameter grid nested deeper than one level of groups
    #[error("Nesting depth exceeded at '{key}': only one level of nested parameter groups is supported (found depth {depth})")]
    DepthExceeded {
        /// Path of the offending entry
        key: String,
        /// Depth at which it was found
        depth: usize,
    },

    /// Top-level key collides with the flattened-path separator
    #[error("Parameter key '{0}' contains the reserved separator '.'\nRename the key; '.' joins group and parameter names in flattened paths")]
    ReservedSeparator(String),

    /// Malformed parameter grid
    #[error("Invalid parameter grid: {0}")]
    InvalidGrid(String),

    /// Nested configuration block does not name an ingredient
    #[error("Configuration block '{key}' does not correspond to an ingredient (available: {available:?})")]
    UnknownIngredient {
        /// Key of the nested block
        key: String,
        /// Ingredient names registered on the experiment
        available: Vec<String>,
    },

    /// Parameter missing from a run's configuration
    #[error("Parameter '{0}' is not in the run configuration")]
    MissingParameter(String),

    /// Artifact content type tag not recognised
    #[error("Unsupported content type '{0}'\nAllowed content types are array.csv, table.csv, bincode")]
    UnsupportedContentType(String),

    /// Artifact value cannot be written with the requested content type
    #[error("Content type {content_type} cannot store a {value_kind} value")]
    ContentTypeMismatch {
        /// Requested content type tag
        content_type: String,
        /// Kind of value that was supplied
        value_kind: String,
    },

    /// File extension does not select a known format
    #[error("Unsupported file extension for '{0}': expected .json or .json5")]
    UnsupportedExtension(String),

    /// Artifact blob missing from the store
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    /// Experiment main function returned an error
    #[error("Run {run_id} failed:\n{trace}")]
    RunFailed {
        /// Id of the failed run
        run_id: String,
        /// Debug rendering of the error chain
        trace: String,
    },

    /// Malformed artifact or table data
    #[error("Decode error: {0}")]
    Decode(String),

    /// Storage error (run store backend)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON5 error
    #[error("JSON5 error: {0}")]
    Json5(#[from] json5::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Bincode error
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[cfg(feature = "parquet")]
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
