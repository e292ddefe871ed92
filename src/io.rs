//! Save/load helpers for configuration files and serialized objects
//!
//! JSON dialect is picked from the file extension:
//! - `.json`: strict JSON via `serde_json`
//! - `.json5`: JSON5 (comments, trailing commas, unquoted keys)
//!
//! Arbitrary serde types can be stored as opaque `bincode` blobs with
//! [`save_object`] / [`load_object`].

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// JSON dialect selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonDialect {
    /// Strict JSON
    Json,
    /// JSON5
    Json5,
}

impl JsonDialect {
    /// Select the dialect for `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedExtension` unless the path ends in
    /// `.json` or `.json5`.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("json5") => Ok(Self::Json5),
            _ => Err(Error::UnsupportedExtension(path.display().to_string())),
        }
    }
}

/// Load a JSON or JSON5 file into any deserializable type.
///
/// # Errors
///
/// Returns error if the extension is unsupported, the file cannot be read,
/// or its contents do not parse.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    load_json_as(path, JsonDialect::from_path(path)?)
}

/// Load a file in an explicit dialect, whatever its extension.
///
/// # Errors
///
/// Returns error if the file cannot be read or its contents do not parse.
pub fn load_json_as<T: DeserializeOwned>(path: impl AsRef<Path>, dialect: JsonDialect) -> Result<T> {
    let path = path.as_ref();
    match dialect {
        JsonDialect::Json => {
            let reader = BufReader::new(File::open(path)?);
            Ok(serde_json::from_reader(reader)?)
        }
        JsonDialect::Json5 => {
            let text = fs::read_to_string(path)?;
            Ok(json5::from_str(&text)?)
        }
    }
}

/// Save a value as JSON or JSON5, chosen by the file extension.
///
/// # Errors
///
/// Returns error if the extension is unsupported or the file cannot be written.
pub fn save_json<T: Serialize>(data: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = match JsonDialect::from_path(path)? {
        JsonDialect::Json => serde_json::to_string(data)?,
        JsonDialect::Json5 => json5::to_string(data)?,
    };
    fs::write(path, text)?;
    Ok(())
}

/// Serialize any serde type to `path` with `bincode`.
///
/// # Errors
///
/// Returns error if serialization or the write fails.
pub fn save_object<T: Serialize + ?Sized>(obj: &T, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    bincode::serialize_into(&mut writer, obj)?;
    writer.flush()?;
    Ok(())
}

/// Load an object previously written by [`save_object`].
///
/// # Errors
///
/// Returns error if the file cannot be read or does not decode as `T`.
pub fn load_object<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(bincode::deserialize_from(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn test_dialect_from_extension() {
        assert_eq!(
            JsonDialect::from_path(Path::new("a/b.json")).unwrap(),
            JsonDialect::Json
        );
        assert_eq!(
            JsonDialect::from_path(Path::new("b.json5")).unwrap(),
            JsonDialect::Json5
        );
        assert!(matches!(
            JsonDialect::from_path(Path::new("b.yaml")),
            Err(Error::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_json_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let data = json!({"lr": 0.1, "model": {"depth": 3}});

        save_json(&data, &path).unwrap();
        let loaded: Value = load_json(&path).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_json5_accepts_comments_and_trailing_commas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json5");
        fs::write(
            &path,
            "{\n  // learning rates to try\n  lr: [0.1, 0.01,],\n  name: 'run',\n}\n",
        )
        .unwrap();

        let loaded: Value = load_json(&path).unwrap();
        assert_eq!(loaded, json!({"lr": [0.1, 0.01], "name": "run"}));
    }

    #[test]
    fn test_unsupported_extension_fails_before_io() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.txt");
        let result = save_json(&json!({}), &path);
        assert!(matches!(result, Err(Error::UnsupportedExtension(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_object_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("object.bin");
        let mut obj = BTreeMap::new();
        obj.insert("weights".to_string(), vec![0.5_f64, 1.5, -2.0]);

        save_object(&obj, &path).unwrap();
        let loaded: BTreeMap<String, Vec<f64>> = load_object(&path).unwrap();
        assert_eq!(loaded, obj);
    }
}
