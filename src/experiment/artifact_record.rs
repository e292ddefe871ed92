//! Artifact Record - descriptor of a side-value saved by a run

use crate::artifact::ContentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Artifact Record names a blob in the run store and says how to decode it.
///
/// ## Handle Format
///
/// Blobs are content-addressed; the `handle` follows `algorithm:hex_digest`,
/// e.g. `sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    name: String,
    content_type: ContentType,
    handle: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create a new artifact record stamped with the current time.
    ///
    /// # Arguments
    ///
    /// * `name` - Name the run saved the artifact under
    /// * `content_type` - Encoding of the blob
    /// * `handle` - Store handle of the blob (e.g., "sha256:abc123")
    /// * `size_bytes` - Size of the blob in bytes
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        content_type: ContentType,
        handle: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            name: name.into(),
            content_type,
            handle: handle.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Get the artifact name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the declared content type.
    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Get the store handle.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Get the blob size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
