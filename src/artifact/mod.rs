//! Run artifacts
//!
//! A run saves side-values (arrays, tables, arbitrary objects) under a name.
//! Each content type has one encoder and one decoder:
//!
//! | `ContentType` | tag         | value            | encoding                       |
//! |---------------|-------------|------------------|--------------------------------|
//! | `ArrayCsv`    | `array.csv` | `NumericArray`   | CSV, no header                 |
//! | `TableCsv`    | `table.csv` | `Table`          | CSV, header + index column     |
//! | `Opaque`      | `bincode`   | anything         | bincode envelope               |
//!
//! Saving stages the encoded value in a temporary file, stores it as a blob,
//! attaches an [`ArtifactRecord`] to the run and removes the file. Resolving
//! walks a [`RunFrame`] and decodes every artifact, keeping going past
//! artifacts that fail.

mod array;
mod opaque;
mod table;

pub use array::NumericArray;
pub use opaque::OpaqueObject;
pub use table::Table;

use crate::driver::RunContext;
use crate::experiment::{ArtifactRecord, RunRecord};
use crate::frame::RunFrame;
use crate::store::RunStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::str::FromStr;

/// Encoding of a stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    /// Numeric array as header-less CSV
    #[serde(rename = "array.csv")]
    ArrayCsv,
    /// Labelled table as CSV with an index column
    #[serde(rename = "table.csv")]
    TableCsv,
    /// Any serde value as a bincode envelope
    #[serde(rename = "bincode")]
    Opaque,
}

impl ContentType {
    /// All supported content types.
    pub const ALL: [Self; 3] = [Self::ArrayCsv, Self::TableCsv, Self::Opaque];

    /// Tag stored in artifact records.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::ArrayCsv => "array.csv",
            Self::TableCsv => "table.csv",
            Self::Opaque => "bincode",
        }
    }

    /// Check that `value` can be written with this content type.
    ///
    /// # Errors
    ///
    /// Returns `Error::ContentTypeMismatch` for an array content type given
    /// a non-array, or a table content type given a non-table.
    pub fn check(self, value: &ArtifactValue) -> Result<()> {
        let ok = match self {
            Self::ArrayCsv => matches!(value, ArtifactValue::Array(_)),
            Self::TableCsv => matches!(value, ArtifactValue::Table(_)),
            Self::Opaque => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::ContentTypeMismatch {
                content_type: self.tag().to_string(),
                value_kind: value.kind().to_string(),
            })
        }
    }

    /// Encode `value` into `writer`.
    ///
    /// # Errors
    ///
    /// Returns error on a content type mismatch or a failed write.
    pub fn encode<W: Write>(self, value: &ArtifactValue, mut writer: W) -> Result<()> {
        self.check(value)?;
        match (self, value) {
            (Self::ArrayCsv, ArtifactValue::Array(array)) => array.write_csv(writer),
            (Self::TableCsv, ArtifactValue::Table(table)) => table.write_csv(writer),
            (Self::Opaque, ArtifactValue::Object(object)) => {
                writer.write_all(&object.to_bytes()?)?;
                Ok(())
            }
            (Self::Opaque, ArtifactValue::Array(array)) => {
                writer.write_all(&OpaqueObject::encode(array)?.to_bytes()?)?;
                Ok(())
            }
            (Self::Opaque, ArtifactValue::Table(table)) => {
                writer.write_all(&OpaqueObject::encode(table)?.to_bytes()?)?;
                Ok(())
            }
            _ => unreachable!("rejected by check"),
        }
    }

    /// Decode bytes written by [`ContentType::encode`].
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not valid for this content type.
    pub fn decode(self, bytes: &[u8]) -> Result<ArtifactValue> {
        match self {
            Self::ArrayCsv => NumericArray::read_csv(bytes).map(ArtifactValue::Array),
            Self::TableCsv => Table::read_csv(bytes).map(ArtifactValue::Table),
            Self::Opaque => OpaqueObject::from_bytes(bytes).map(ArtifactValue::Object),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ct| ct.tag() == tag)
            .ok_or_else(|| Error::UnsupportedContentType(tag.to_string()))
    }
}

/// An in-memory artifact value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactValue {
    /// Numeric array
    Array(NumericArray),
    /// Labelled table
    Table(Table),
    /// Opaque serialized object
    Object(OpaqueObject),
}

impl ArtifactValue {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Array(_) => "array",
            Self::Table(_) => "table",
            Self::Object(_) => "object",
        }
    }

    /// The array, if this is one.
    #[must_use]
    pub const fn as_array(&self) -> Option<&NumericArray> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// The table, if this is one.
    #[must_use]
    pub const fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }

    /// The opaque object, if this is one.
    #[must_use]
    pub const fn as_object(&self) -> Option<&OpaqueObject> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl From<NumericArray> for ArtifactValue {
    fn from(array: NumericArray) -> Self {
        Self::Array(array)
    }
}

impl From<Table> for ArtifactValue {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

impl From<OpaqueObject> for ArtifactValue {
    fn from(object: OpaqueObject) -> Self {
        Self::Object(object)
    }
}

/// Save `value` to the current run under `name`.
///
/// The content type is validated against the value before anything is
/// written. Without a store the value is still encoded (so encoding errors
/// surface) but nothing is recorded.
///
/// # Errors
///
/// Returns error on a content type mismatch, an encoding failure, or a
/// store write failure.
pub fn save_artifact(
    ctx: &mut RunContext<'_>,
    value: &ArtifactValue,
    name: &str,
    content_type: ContentType,
) -> Result<()> {
    content_type.check(value)?;

    let staged = tempfile::Builder::new()
        .prefix("artifact-")
        .suffix(&format!(".{}", content_type.tag()))
        .tempfile()?;
    {
        let mut writer = BufWriter::new(staged.as_file());
        content_type.encode(value, &mut writer)?;
        writer.flush()?;
    }
    let bytes = fs::read(staged.path())?;

    match ctx.store() {
        Some(store) => {
            let handle = store.put_blob(&bytes)?;
            let record = ArtifactRecord::new(name, content_type, handle, bytes.len() as u64);
            ctx.attach_artifact(record)?;
        }
        None => tracing::debug!(
            run_id = ctx.run_id(),
            artifact = name,
            "no run store attached, artifact not recorded"
        ),
    }

    staged.close()?;
    Ok(())
}

/// Save with a content type given by its tag (`"array.csv"`, ...).
///
/// # Errors
///
/// Returns `Error::UnsupportedContentType` for an unknown tag, before any
/// I/O, otherwise as [`save_artifact`].
pub fn save_artifact_as(
    ctx: &mut RunContext<'_>,
    value: &ArtifactValue,
    name: &str,
    content_type: &str,
) -> Result<()> {
    let content_type = content_type.parse()?;
    save_artifact(ctx, value, name, content_type)
}

/// Fetch and decode one artifact.
///
/// # Errors
///
/// Returns error if the blob is missing or does not decode.
pub fn load_artifact(store: &dyn RunStore, artifact: &ArtifactRecord) -> Result<ArtifactValue> {
    let bytes = store.get_blob(artifact.handle())?;
    artifact.content_type().decode(&bytes)
}

/// Decoded artifacts of one run, by artifact name.
pub type RunArtifacts = BTreeMap<String, Result<ArtifactValue>>;

/// Decode every artifact of a run.
///
/// Failures are logged and kept in the artifact's slot.
#[must_use]
pub fn resolve_run_artifacts(store: &dyn RunStore, run: &RunRecord) -> RunArtifacts {
    resolve_list(store, run.id(), run.artifacts())
}

/// Decode every artifact of every row in `frame`, keyed by run id.
///
/// One bad artifact does not stop the pass: its slot holds the error and
/// a warning is logged.
#[must_use]
pub fn resolve_artifacts(store: &dyn RunStore, frame: &RunFrame) -> BTreeMap<String, RunArtifacts> {
    frame
        .rows()
        .iter()
        .map(|row| (row.id().to_string(), resolve_list(store, row.id(), row.artifacts())))
        .collect()
}

fn resolve_list(store: &dyn RunStore, run_id: &str, artifacts: &[ArtifactRecord]) -> RunArtifacts {
    artifacts
        .iter()
        .map(|artifact| {
            let loaded = load_artifact(store, artifact);
            if let Err(e) = &loaded {
                tracing::warn!(
                    run_id,
                    artifact = artifact.name(),
                    content_type = %artifact.content_type(),
                    error = %e,
                    "could not load artifact"
                );
            }
            (artifact.name().to_string(), loaded)
        })
        .collect()
}
