//! Run frames
//!
//! A [`RunFrame`] is a row-per-run table assembled from a [`RunStore`]:
//!
//! | column                  | source                                        |
//! |-------------------------|-----------------------------------------------|
//! | `id`, `status`          | run document                                  |
//! | `config.<key>`          | top-level configuration value                 |
//! | `config.<group>.<key>`  | value inside an ingredient block              |
//! | `metrics.<name>`        | step-ordered metric samples                   |
//!
//! Lists in the configuration become tuples so rows can be grouped on them;
//! [`average_metrics_over_seed`] then folds rows that differ only in their
//! seed into one row of mean / std summaries.

mod aggregate;
mod export;

pub use aggregate::{
    average_metrics_over_seed, format_float, AggregateOptions, MetricSummary, SeedAveragedFrame,
    SeedAveragedRow,
};
#[cfg(feature = "parquet")]
pub use export::{read_parquet, write_parquet};

use crate::config::{join_path, Config};
use crate::experiment::{ArtifactRecord, RunStatus};
use crate::store::RunStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Column prefix for configuration values.
pub const CONFIG_PREFIX: &str = "config";

/// Column prefix for metrics.
pub const METRICS_PREFIX: &str = "metrics";

/// Key of a single-entry mapping that encodes a tuple.
pub const TUPLE_TAG: &str = "py/tuple";

/// Column name for a configuration path.
#[must_use]
pub fn config_column(path: &str) -> String {
    join_path(CONFIG_PREFIX, path)
}

/// Column name for a metric.
#[must_use]
pub fn metric_column(name: &str) -> String {
    join_path(METRICS_PREFIX, name)
}

/// A configuration value as it appears in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigCell {
    /// Null, bool, number or string
    Scalar(Value),
    /// A list, or a tagged tuple mapping
    Tuple(Vec<Value>),
    /// A mapping that could not be converted
    Raw(Value),
}

impl ConfigCell {
    /// Convert a configuration value. Lists and `{"py/tuple": [...]}`
    /// mappings become tuples; any other mapping stays `Raw`.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::Tuple(items.clone()),
            Value::Object(map) => match map.get(TUPLE_TAG) {
                Some(Value::Array(items)) if map.len() == 1 => Self::Tuple(items.clone()),
                _ => Self::Raw(value.clone()),
            },
            other => Self::Scalar(other.clone()),
        }
    }

    /// Key used to group rows with equal values.
    #[must_use]
    pub fn group_key(&self) -> GroupKey {
        match self {
            Self::Scalar(value) | Self::Raw(value) => GroupKey::from_value(value),
            Self::Tuple(items) => GroupKey::Tuple(items.iter().map(GroupKey::from_value).collect()),
        }
    }

    /// True for cells that were left unconverted.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

impl fmt::Display for ConfigCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(Value::String(s)) => f.write_str(s),
            Self::Scalar(value) | Self::Raw(value) => write!(f, "{value}"),
            Self::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        Value::String(s) => f.write_str(s)?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str(")")
            }
        }
    }
}

/// Grouping and ordering key of a configuration cell.
///
/// Numbers compare by value, so `1` and `1.0` share a group and `9` sorts
/// before `10`. A missing column groups as `Null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    /// Null or missing
    Null,
    /// Boolean
    Bool(bool),
    /// Any JSON number
    Number(NumberKey),
    /// String
    Text(String),
    /// List or tagged tuple
    Tuple(Vec<GroupKey>),
    /// Unconverted mapping, by sorted key
    Map(Vec<(String, GroupKey)>),
}

impl GroupKey {
    /// Build the key of a JSON value.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(NumberKey::new(n.as_f64().unwrap_or(f64::NAN))),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => Self::Tuple(items.iter().map(Self::from_value).collect()),
            Value::Object(map) => {
                let mut entries: Vec<(String, Self)> = map
                    .iter()
                    .map(|(key, value)| (key.clone(), Self::from_value(value)))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                Self::Map(entries)
            }
        }
    }
}

/// A number ordered with `f64::total_cmp`; `-0.0` is folded into `0.0`.
#[derive(Debug, Clone, Copy)]
pub struct NumberKey(f64);

impl NumberKey {
    fn new(value: f64) -> Self {
        Self(if value == 0.0 { 0.0 } else { value })
    }
}

impl PartialEq for NumberKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for NumberKey {}

impl PartialOrd for NumberKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NumberKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::hash::Hash for NumberKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// A metric as it appears in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricCell {
    /// A single value
    Scalar(f64),
    /// Step-ordered samples
    Series(Vec<f64>),
}

impl MetricCell {
    /// The value, if this is a scalar.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            Self::Series(_) => None,
        }
    }

    /// All samples.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        match self {
            Self::Scalar(value) => std::slice::from_ref(value),
            Self::Series(values) => values,
        }
    }
}

/// One run in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    id: String,
    experiment: String,
    status: RunStatus,
    config: BTreeMap<String, ConfigCell>,
    metrics: BTreeMap<String, MetricCell>,
    artifacts: Vec<ArtifactRecord>,
}

impl RunRow {
    /// Run id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Experiment name.
    #[must_use]
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Configuration cells by column name.
    #[must_use]
    pub const fn config(&self) -> &BTreeMap<String, ConfigCell> {
        &self.config
    }

    /// Metric cells by column name.
    #[must_use]
    pub const fn metrics(&self) -> &BTreeMap<String, MetricCell> {
        &self.metrics
    }

    /// Artifact descriptors (empty unless requested).
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactRecord] {
        &self.artifacts
    }

    /// Configuration cell for a column.
    #[must_use]
    pub fn config_cell(&self, column: &str) -> Option<&ConfigCell> {
        self.config.get(column)
    }

    /// Metric cell for a column.
    #[must_use]
    pub fn metric(&self, column: &str) -> Option<&MetricCell> {
        self.metrics.get(column)
    }
}

/// Row-per-run table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunFrame {
    rows: Vec<RunRow>,
}

impl RunFrame {
    /// Rows in store order.
    #[must_use]
    pub fn rows(&self) -> &[RunRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for a run id.
    #[must_use]
    pub fn row(&self, id: &str) -> Option<&RunRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    /// Every configuration column present in any row, sorted.
    #[must_use]
    pub fn config_columns(&self) -> Vec<String> {
        let columns: BTreeSet<&String> = self.rows.iter().flat_map(|row| row.config.keys()).collect();
        columns.into_iter().cloned().collect()
    }

    /// Every metric column present in any row, sorted.
    #[must_use]
    pub fn metric_columns(&self) -> Vec<String> {
        let columns: BTreeSet<&String> = self.rows.iter().flat_map(|row| row.metrics.keys()).collect();
        columns.into_iter().cloned().collect()
    }
}

/// Options for [`get_dataframe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameOptions {
    /// Only these run ids (all runs when `None`)
    pub ids: Option<Vec<String>>,
    /// Only `COMPLETED` runs
    pub completed_only: bool,
    /// Carry artifact descriptors on each row
    pub include_artifacts: bool,
    /// Unwrap single-sample metrics to scalars
    pub open_metrics: bool,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            ids: None,
            completed_only: true,
            include_artifacts: true,
            open_metrics: true,
        }
    }
}

impl FrameOptions {
    /// Create options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to these run ids.
    #[must_use]
    pub fn ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Set whether only completed runs are loaded.
    #[must_use]
    pub const fn completed_only(mut self, completed_only: bool) -> Self {
        self.completed_only = completed_only;
        self
    }

    /// Set whether artifact descriptors are carried.
    #[must_use]
    pub const fn include_artifacts(mut self, include_artifacts: bool) -> Self {
        self.include_artifacts = include_artifacts;
        self
    }

    /// Set whether single-sample metrics are unwrapped.
    #[must_use]
    pub const fn open_metrics(mut self, open_metrics: bool) -> Self {
        self.open_metrics = open_metrics;
        self
    }
}

/// Assemble a frame from the runs in `store`.
///
/// Mappings in the configuration that are not tagged tuples are kept as
/// `ConfigCell::Raw` and logged once per column; rows holding them can still
/// be grouped, but only on exact equality.
///
/// # Errors
///
/// Returns error if the store cannot be read.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use trueno_sweep::config::Config;
/// use trueno_sweep::experiment::{MetricRecord, RunRecord, RunStatus};
/// use trueno_sweep::frame::{get_dataframe, FrameOptions, MetricCell};
/// use trueno_sweep::store::{MemoryRunStore, RunStore};
///
/// # fn main() -> trueno_sweep::Result<()> {
/// let store = MemoryRunStore::new();
/// let config = Config::from_value(json!({"lr": 0.1, "opt": {"betas": [0.9, 0.99]}})).unwrap();
/// store.put_run(&RunRecord::builder("1", "mnist").config(config).status(RunStatus::Completed).build())?;
/// store.add_metric(MetricRecord::new("1", "acc", 0, 0.93))?;
///
/// let frame = get_dataframe(&store, &FrameOptions::default())?;
/// let row = &frame.rows()[0];
/// assert_eq!(row.config_cell("config.opt.betas").unwrap().to_string(), "(0.9, 0.99)");
/// assert_eq!(row.metric("metrics.acc"), Some(&MetricCell::Scalar(0.93)));
/// # Ok(())
/// # }
/// ```
pub fn get_dataframe(store: &dyn RunStore, options: &FrameOptions) -> Result<RunFrame> {
    let wanted: Option<BTreeSet<&str>> = options
        .ids
        .as_ref()
        .map(|ids| ids.iter().map(String::as_str).collect());

    let mut warned = BTreeSet::new();
    let mut rows = Vec::new();
    for run in store.runs()? {
        if wanted.as_ref().is_some_and(|ids| !ids.contains(run.id())) {
            continue;
        }
        if options.completed_only && run.status() != RunStatus::Completed {
            continue;
        }

        let config = config_cells(run.config(), &mut warned);
        let metrics = metric_cells(store, run.id(), options.open_metrics)?;
        let artifacts = if options.include_artifacts {
            run.artifacts().to_vec()
        } else {
            Vec::new()
        };

        rows.push(RunRow {
            id: run.id().to_string(),
            experiment: run.experiment().to_string(),
            status: run.status(),
            config,
            metrics,
            artifacts,
        });
    }

    tracing::debug!(rows = rows.len(), "assembled run frame");
    Ok(RunFrame { rows })
}

fn config_cells(config: &Config, warned: &mut BTreeSet<String>) -> BTreeMap<String, ConfigCell> {
    let mut cells = BTreeMap::new();
    let mut push = |path: String, value: &Value| {
        let column = config_column(&path);
        if cells.contains_key(&column) {
            // "a.b" at the top level flattens onto group "a", key "b"
            tracing::warn!(
                column = %column,
                "two configuration entries flatten to the same column; keeping the first"
            );
            return;
        }
        let cell = ConfigCell::from_value(value);
        if cell.is_raw() && warned.insert(column.clone()) {
            tracing::warn!(
                column = %column,
                "mapping is not a tuple and is left as is; grouping on it compares whole mappings"
            );
        }
        cells.insert(column, cell);
    };

    for (key, value) in config.iter() {
        match value {
            Value::Object(inner) if !is_tagged_tuple(value) => {
                for (inner_key, inner_value) in inner {
                    push(join_path(key, inner_key), inner_value);
                }
            }
            other => push(key.clone(), other),
        }
    }
    cells
}

fn is_tagged_tuple(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.len() == 1 && map.get(TUPLE_TAG).is_some_and(Value::is_array))
}

fn metric_cells(
    store: &dyn RunStore,
    run_id: &str,
    open_metrics: bool,
) -> Result<BTreeMap<String, MetricCell>> {
    let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for metric in store.metrics_for_run(run_id)? {
        series
            .entry(metric_column(metric.key()))
            .or_default()
            .push(metric.value());
    }

    Ok(series
        .into_iter()
        .map(|(column, values)| {
            let cell = match values.as_slice() {
                [value] if open_metrics => MetricCell::Scalar(*value),
                _ => MetricCell::Series(values),
            };
            (column, cell)
        })
        .collect())
}
