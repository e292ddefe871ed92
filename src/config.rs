//! Concrete configurations
//!
//! A [`Config`] is one fully-resolved assignment of parameter values. Top
//! level entries are either plain values or a group (JSON object) holding the
//! parameters of a named ingredient:
//!
//! ```text
//! { "seed": 1, "dataset": { "path": "a.csv", "batch": 32 } }
//! ```
//!
//! Flattened paths join group and parameter with [`KEY_SEPARATOR`]
//! (`dataset.batch`), which is why top-level keys may not contain it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Separator joining a group key and an inner key in flattened paths.
pub const KEY_SEPARATOR: &str = ".";

/// A concrete configuration: parameter name to value, with at most one level
/// of named groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    entries: BTreeMap<String, Value>,
}

impl Config {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from a JSON object.
    ///
    /// Returns `None` when `value` is not an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        }
    }

    /// Convert into a JSON object value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.entries.into_iter().collect::<Map<String, Value>>())
    }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a top-level entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Get an entry inside a group.
    #[must_use]
    pub fn get_nested(&self, group: &str, key: &str) -> Option<&Value> {
        self.entries.get(group)?.as_object()?.get(key)
    }

    /// True if `key` exists at the top level.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace a top-level entry, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Remove a top-level entry.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Iterate over top-level entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Keys whose values are groups (JSON objects).
    pub fn group_keys(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, v)| v.is_object())
            .map(|(k, _)| k.as_str())
    }

    /// Split into the top-level scalar entries and the named groups.
    #[must_use]
    pub fn split_groups(self) -> (Self, BTreeMap<String, Map<String, Value>>) {
        let mut top = Self::new();
        let mut groups = BTreeMap::new();
        for (key, value) in self.entries {
            match value {
                Value::Object(inner) => {
                    groups.insert(key, inner);
                }
                other => {
                    top.entries.insert(key, other);
                }
            }
        }
        (top, groups)
    }

    /// Flatten to `(path, value)` pairs, descending one level into groups.
    ///
    /// Group entries become `group.key`; objects deeper than that are kept
    /// whole as values.
    #[must_use]
    pub fn flatten(&self) -> Vec<(String, &Value)> {
        let mut out = Vec::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            match value {
                Value::Object(inner) => {
                    for (inner_key, inner_value) in inner {
                        out.push((join_path(key, inner_key), inner_value));
                    }
                }
                other => out.push((key.clone(), other)),
            }
        }
        out
    }

    /// Overlay `updates` on top of `self`.
    ///
    /// Groups present on both sides are merged key by key; everything else
    /// is replaced.
    pub fn merge(&mut self, updates: &Self) {
        for (key, value) in &updates.entries {
            match (self.entries.get_mut(key), value) {
                (Some(Value::Object(base)), Value::Object(inner)) => {
                    for (k, v) in inner {
                        base.insert(k.clone(), v.clone());
                    }
                }
                _ => {
                    self.entries.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

impl FromIterator<(String, Value)> for Config {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Config {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.entries) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{:?}", self.entries),
        }
    }
}

/// Join a group key and an inner key into a flattened path.
#[must_use]
pub fn join_path(group: &str, key: &str) -> String {
    format!("{group}{KEY_SEPARATOR}{key}")
}

/// Compare two config values, treating numbers by numeric value.
///
/// `1` and `1.0` match, as they do in document stores.
#[must_use]
pub fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_match(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_match(x, y)))
        }
        _ => a == b,
    }
}
