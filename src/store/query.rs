//! Config match expressions
//!
//! A [`RunQuery`] is a conjunction of `config.<path> == value` clauses. It is
//! a superset check: a run matches when every clause holds, whatever other
//! fields its configuration has.

use crate::config::{values_match, Config, KEY_SEPARATOR};
use crate::experiment::RunRecord;
use serde_json::Value;
use std::fmt;

/// Location of a value inside a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    group: Option<String>,
    key: String,
}

impl ConfigPath {
    /// A top-level key.
    #[must_use]
    pub fn top(key: impl Into<String>) -> Self {
        Self {
            group: None,
            key: key.into(),
        }
    }

    /// A key inside a group.
    #[must_use]
    pub fn nested(group: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            key: key.into(),
        }
    }

    /// Resolve the path in `config`.
    #[must_use]
    pub fn lookup<'a>(&self, config: &'a Config) -> Option<&'a Value> {
        match &self.group {
            Some(group) => config.get_nested(group, &self.key),
            None => config.get(&self.key),
        }
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "config{KEY_SEPARATOR}{group}{KEY_SEPARATOR}{}", self.key),
            None => write!(f, "config{KEY_SEPARATOR}{}", self.key),
        }
    }
}

/// Conjunctive equality match over run configurations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunQuery {
    clauses: Vec<(ConfigPath, Value)>,
}

impl RunQuery {
    /// An empty query, which matches every run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `path == value` clause.
    #[must_use]
    pub fn eq(mut self, path: ConfigPath, value: Value) -> Self {
        self.clauses.push((path, value));
        self
    }

    /// Build the match expression for a configuration.
    ///
    /// Top-level values become `config.<key>` clauses; for each group every
    /// inner value becomes a `config.<group>.<key>` clause.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut query = Self::new();
        for (key, value) in config.iter() {
            match value {
                Value::Object(inner) => {
                    for (inner_key, inner_value) in inner {
                        query = query.eq(ConfigPath::nested(key, inner_key), inner_value.clone());
                    }
                }
                other => query = query.eq(ConfigPath::top(key), other.clone()),
            }
        }
        query
    }

    /// Number of clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// True if the query has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// True if every clause holds for the run's configuration.
    #[must_use]
    pub fn matches(&self, run: &RunRecord) -> bool {
        self.matches_config(run.config())
    }

    /// True if every clause holds for `config`.
    #[must_use]
    pub fn matches_config(&self, config: &Config) -> bool {
        self.clauses.iter().all(|(path, expected)| {
            path.lookup(config)
                .is_some_and(|actual| values_match(actual, expected))
        })
    }
}

impl fmt::Display for RunQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$and[")?;
        for (i, (path, value)) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{path} == {value}")?;
        }
        f.write_str("]")
    }
}
