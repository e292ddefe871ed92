//! Opaque serialized objects
//!
//! Any serde type can be stored as an artifact. The payload is `bincode`,
//! which is not self-describing, so it is wrapped in an envelope carrying the
//! Rust type name; [`OpaqueObject::decode`] refuses to decode into a
//! different type.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A `bincode` payload tagged with the type it was encoded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueObject {
    type_name: String,
    payload: Vec<u8>,
}

impl OpaqueObject {
    /// Encode a value.
    ///
    /// # Errors
    ///
    /// Returns error if `bincode` cannot serialize the value.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            type_name: std::any::type_name::<T>().to_string(),
            payload: bincode::serialize(value)?,
        })
    }

    /// Decode back into `T`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the object was encoded from another type,
    /// or a bincode error if the payload is malformed.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let expected = std::any::type_name::<T>();
        if self.type_name != expected {
            return Err(Error::Decode(format!(
                "object holds a {}, not a {expected}",
                self.type_name
            )));
        }
        Ok(bincode::deserialize(&self.payload)?)
    }

    /// Type name recorded at encode time.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Size of the encoded payload.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Serialize the envelope.
    ///
    /// # Errors
    ///
    /// Returns a bincode error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Parse an envelope written by [`OpaqueObject::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns a bincode error if `bytes` is not an envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
