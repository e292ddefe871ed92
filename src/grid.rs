//! Nested parameter grid
//!
//! Expands a parameter description into every concrete [`Config`]. A
//! description maps parameter names to candidate lists, and may group the
//! parameters of a named ingredient one level down:
//!
//! ```rust
//! use serde_json::json;
//! use trueno_sweep::grid::ParameterGrid;
//!
//! let grid = ParameterGrid::from_value(&json!({
//!     "seed": [1, 2, 3],
//!     "dataset": { "location": ["folder1", "folder2"] },
//!     "trainer": { "lr": [0.01, 0.1] }
//! }))?;
//!
//! assert_eq!(grid.len(), 12);
//! let first = grid.get(0).unwrap();
//! assert_eq!(first.get_nested("dataset", "location"), Some(&json!("folder1")));
//! # Ok::<(), trueno_sweep::Error>(())
//! ```
//!
//! The description is parsed into a tree (candidate leaves under named
//! groups) and expanded by a recursive Cartesian product, so no key
//! mangling is involved. Keys are visited in sorted order: the first key is
//! the outermost loop and the last key varies fastest.

use crate::config::{Config, KEY_SEPARATOR};
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Maximum nesting depth: top-level parameters plus one level of groups.
pub const MAX_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq)]
enum ParamNode {
    Candidates(Vec<Value>),
    Group(BTreeMap<String, ParamNode>),
}

impl ParamNode {
    fn parse(path: &str, value: &Value, depth: usize) -> Result<Self> {
        match value {
            Value::Object(inner) => {
                if depth >= MAX_DEPTH {
                    return Err(Error::DepthExceeded {
                        key: path.to_string(),
                        depth: depth + 1,
                    });
                }
                let mut children = BTreeMap::new();
                for (key, child) in inner {
                    let child_path = format!("{path}{KEY_SEPARATOR}{key}");
                    children.insert(key.clone(), Self::parse(&child_path, child, depth + 1)?);
                }
                Ok(Self::Group(children))
            }
            Value::Array(candidates) if candidates.is_empty() => Err(Error::InvalidGrid(format!(
                "parameter '{path}' has no candidate values"
            ))),
            Value::Array(candidates) => Ok(Self::Candidates(candidates.clone())),
            scalar => Ok(Self::Candidates(vec![scalar.clone()])),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Candidates(values) => values.len(),
            Self::Group(children) => product_len(children),
        }
    }

    fn expand(&self) -> Vec<Value> {
        match self {
            Self::Candidates(values) => values.clone(),
            Self::Group(children) => expand_product(children)
                .into_iter()
                .map(Value::Object)
                .collect(),
        }
    }

    fn nth(&self, index: usize) -> Value {
        match self {
            Self::Candidates(values) => values[index].clone(),
            Self::Group(children) => Value::Object(nth_of_product(children, index)),
        }
    }
}

fn product_len(axes: &BTreeMap<String, ParamNode>) -> usize {
    axes.values()
        .fold(1usize, |acc, node| acc.saturating_mul(node.len()))
}

fn expand_product(axes: &BTreeMap<String, ParamNode>) -> Vec<Map<String, Value>> {
    let expanded: Vec<(&String, Vec<Value>)> =
        axes.iter().map(|(key, node)| (key, node.expand())).collect();
    let mut outputs = Vec::with_capacity(product_len(axes));
    cartesian(&expanded, 0, Map::new(), &mut outputs);
    outputs
}

fn cartesian(
    axes: &[(&String, Vec<Value>)],
    idx: usize,
    current: Map<String, Value>,
    outputs: &mut Vec<Map<String, Value>>,
) {
    if idx == axes.len() {
        outputs.push(current);
        return;
    }
    let (key, values) = &axes[idx];
    for value in values {
        let mut next = current.clone();
        next.insert((*key).clone(), value.clone());
        cartesian(axes, idx + 1, next, outputs);
    }
}

// Mixed-radix decode; the last axis is the least significant digit.
fn nth_of_product(axes: &BTreeMap<String, ParamNode>, mut index: usize) -> Map<String, Value> {
    let mut digits = Vec::with_capacity(axes.len());
    for (key, node) in axes.iter().rev() {
        let radix = node.len();
        digits.push((key, node, index % radix));
        index /= radix;
    }
    digits
        .into_iter()
        .rev()
        .map(|(key, node, digit)| (key.clone(), node.nth(digit)))
        .collect()
}

/// A parsed parameter description, ready for expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    root: BTreeMap<String, ParamNode>,
}

impl ParameterGrid {
    /// Parse a parameter description.
    ///
    /// Each entry is a list of candidates, a single scalar (one candidate),
    /// or a group object whose entries follow the same rules.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedSeparator` if a top-level key contains `.`
    ///   (checked before anything else)
    /// - `Error::DepthExceeded` if a group contains another group
    /// - `Error::InvalidGrid` if the root is not an object or a candidate
    ///   list is empty
    pub fn from_value(description: &Value) -> Result<Self> {
        let Value::Object(entries) = description else {
            return Err(Error::InvalidGrid(
                "parameter description must be an object".to_string(),
            ));
        };

        if let Some(key) = entries.keys().find(|key| key.contains(KEY_SEPARATOR)) {
            return Err(Error::ReservedSeparator(key.clone()));
        }

        let mut root = BTreeMap::new();
        for (key, value) in entries {
            root.insert(key.clone(), ParamNode::parse(key, value, 1)?);
        }
        Ok(Self { root })
    }

    /// Number of concrete configurations, computed without expanding.
    #[must_use]
    pub fn len(&self) -> usize {
        product_len(&self.root)
    }

    /// True if the grid yields no configurations.
    ///
    /// Empty candidate lists are rejected at parse time, so this only
    /// happens for an empty description, which still yields one empty
    /// configuration. Provided for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the top-level entries that are groups.
    #[must_use]
    pub fn group_keys(&self) -> Vec<&str> {
        self.root
            .iter()
            .filter(|(_, node)| matches!(node, ParamNode::Group(_)))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// The `index`-th configuration in expansion order, if in range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Config> {
        if index >= self.len() {
            return None;
        }
        Some(nth_of_product(&self.root, index).into_iter().collect())
    }

    /// Iterate lazily over all configurations in expansion order.
    pub fn iter(&self) -> impl Iterator<Item = Config> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    /// Expand into every concrete configuration.
    #[must_use]
    pub fn expand(&self) -> Vec<Config> {
        expand_product(&self.root)
            .into_iter()
            .map(|entries| entries.into_iter().collect())
            .collect()
    }
}

/// Expand a nested parameter description into all concrete configurations.
///
/// Shorthand for `ParameterGrid::from_value(description)?.expand()`.
///
/// # Errors
///
/// See [`ParameterGrid::from_value`].
pub fn nested_parameter_grid(description: &Value) -> Result<Vec<Config>> {
    Ok(ParameterGrid::from_value(description)?.expand())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_grid() {
        let configs = nested_parameter_grid(&json!({"v1": [1, 2], "v2": [1, 2, 3]})).unwrap();
        assert_eq!(configs.len(), 6);
        assert_eq!(configs[0].get("v1"), Some(&json!(1)));
        assert_eq!(configs[0].get("v2"), Some(&json!(1)));
        assert_eq!(configs[1].get("v2"), Some(&json!(2)));
        assert_eq!(configs[5].get("v1"), Some(&json!(2)));
        assert_eq!(configs[5].get("v2"), Some(&json!(3)));
    }

    #[test]
    fn test_nested_grid_order() {
        let configs =
            nested_parameter_grid(&json!({"v1": [1, 2], "v2_nest": {"v2.1": [3, 4]}})).unwrap();
        let values: Vec<Value> = configs.into_iter().map(Config::into_value).collect();
        assert_eq!(
            values,
            vec![
                json!({"v1": 1, "v2_nest": {"v2.1": 3}}),
                json!({"v1": 1, "v2_nest": {"v2.1": 4}}),
                json!({"v1": 2, "v2_nest": {"v2.1": 3}}),
                json!({"v1": 2, "v2_nest": {"v2.1": 4}}),
            ]
        );
    }

    #[test]
    fn test_scalar_is_single_candidate() {
        let grid = ParameterGrid::from_value(&json!({"lr": 0.1, "depth": [2, 4]})).unwrap();
        assert_eq!(grid.len(), 2);
        assert!(grid.iter().all(|c| c.get("lr") == Some(&json!(0.1))));
    }

    #[test]
    fn test_depth_error() {
        let result = ParameterGrid::from_value(&json!({"a": {"b": {"c": [1, 2, 3]}}}));
        match result {
            Err(Error::DepthExceeded { key, depth }) => {
                assert_eq!(key, "a.b");
                assert_eq!(depth, 3);
            }
            other => panic!("expected depth error, got {other:?}"),
        }
    }

    #[test]
    fn test_reserved_separator_checked_first() {
        // Also too deep, but the separator check wins
        let result = ParameterGrid::from_value(&json!({"a.b": [1], "c": {"d": {"e": 1}}}));
        assert!(matches!(result, Err(Error::ReservedSeparator(key)) if key == "a.b"));
    }

    #[test]
    fn test_separator_allowed_in_inner_keys() {
        assert!(ParameterGrid::from_value(&json!({"g": {"x.y": [1]}})).is_ok());
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let result = ParameterGrid::from_value(&json!({"lr": []}));
        assert!(matches!(result, Err(Error::InvalidGrid(_))));
    }

    #[test]
    fn test_root_must_be_object() {
        let result = ParameterGrid::from_value(&json!([1, 2]));
        assert!(matches!(result, Err(Error::InvalidGrid(_))));
    }

    #[test]
    fn test_get_matches_expand() {
        let grid = ParameterGrid::from_value(&json!({
            "a": [1, 2, 3],
            "g": {"x": ["p", "q"], "y": [true, false]},
            "z": [0.5, 1.5]
        }))
        .unwrap();
        let expanded = grid.expand();
        assert_eq!(expanded.len(), grid.len());
        for (i, config) in expanded.iter().enumerate() {
            assert_eq!(grid.get(i).as_ref(), Some(config));
        }
        assert!(grid.get(grid.len()).is_none());
        assert_eq!(grid.group_keys(), vec!["g"]);
    }

    #[test]
    fn test_empty_description_yields_one_empty_config() {
        let grid = ParameterGrid::from_value(&json!({})).unwrap();
        assert_eq!(grid.len(), 1);
        assert!(!grid.is_empty());
        assert!(grid.expand()[0].is_empty());
    }
}
