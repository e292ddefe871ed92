//! Seed aggregation
//!
//! Rows that share every configuration column except the seed are folded
//! into one [`SeedAveragedRow`]. Each metric gets a mean, a sample standard
//! deviation and a `mean SEP std` string for pasting into LaTeX tables.

use super::{ConfigCell, GroupKey, RunFrame};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options for [`average_metrics_over_seed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateOptions {
    /// Column excluded from grouping
    pub seed_key: String,
    /// Decimal places in `latex_string`
    pub string_rounding: u32,
    /// Factor applied before rounding (100 for percentages)
    pub string_scaling: f64,
    /// Text between mean and std in `latex_string`
    pub separator: String,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            seed_key: "config.seed".to_string(),
            string_rounding: 3,
            string_scaling: 1.0,
            separator: " /pm ".to_string(),
        }
    }
}

impl AggregateOptions {
    /// Create options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the seed column.
    #[must_use]
    pub fn seed_key(mut self, seed_key: impl Into<String>) -> Self {
        self.seed_key = seed_key.into();
        self
    }

    /// Set the number of decimal places.
    #[must_use]
    pub const fn string_rounding(mut self, places: u32) -> Self {
        self.string_rounding = places;
        self
    }

    /// Set the scaling factor.
    #[must_use]
    pub const fn string_scaling(mut self, scale: f64) -> Self {
        self.string_scaling = scale;
        self
    }

    /// Set the mean / std separator.
    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

/// Mean and spread of one metric within a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Arithmetic mean (NaN without samples)
    pub mean: f64,
    /// Sample standard deviation (NaN below two samples)
    pub std: f64,
    /// Rounded `mean SEP std`
    pub latex_string: String,
}

/// One configuration group.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedAveragedRow {
    config: BTreeMap<String, ConfigCell>,
    metrics: BTreeMap<String, MetricSummary>,
    run_ids: Vec<String>,
}

impl SeedAveragedRow {
    /// Shared configuration of the group (seed column excluded).
    #[must_use]
    pub const fn config(&self) -> &BTreeMap<String, ConfigCell> {
        &self.config
    }

    /// Summaries by metric column.
    #[must_use]
    pub const fn metrics(&self) -> &BTreeMap<String, MetricSummary> {
        &self.metrics
    }

    /// Summary for one metric column.
    #[must_use]
    pub fn metric(&self, column: &str) -> Option<&MetricSummary> {
        self.metrics.get(column)
    }

    /// Runs folded into this group, in frame order.
    #[must_use]
    pub fn run_ids(&self) -> &[String] {
        &self.run_ids
    }
}

/// Result of [`average_metrics_over_seed`], one row per group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedAveragedFrame {
    config_columns: Vec<String>,
    metric_columns: Vec<String>,
    rows: Vec<SeedAveragedRow>,
}

impl SeedAveragedFrame {
    /// Grouping columns.
    #[must_use]
    pub fn config_columns(&self) -> &[String] {
        &self.config_columns
    }

    /// Metric columns summarised.
    #[must_use]
    pub fn metric_columns(&self) -> &[String] {
        &self.metric_columns
    }

    /// Groups, sorted by configuration.
    #[must_use]
    pub fn rows(&self) -> &[SeedAveragedRow] {
        &self.rows
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Default)]
struct Group {
    config: BTreeMap<String, ConfigCell>,
    samples: BTreeMap<String, Vec<f64>>,
    run_ids: Vec<String>,
}

/// Average every metric over runs that differ only in their seed.
///
/// Rows missing a configuration column group as if it were null. Only
/// scalar, non-NaN metric cells are averaged; series are skipped.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use trueno_sweep::config::Config;
/// use trueno_sweep::experiment::{MetricRecord, RunRecord, RunStatus};
/// use trueno_sweep::frame::{average_metrics_over_seed, get_dataframe, AggregateOptions, FrameOptions};
/// use trueno_sweep::store::{MemoryRunStore, RunStore};
///
/// # fn main() -> trueno_sweep::Result<()> {
/// let store = MemoryRunStore::new();
/// for (seed, acc) in [(1, 10.0), (2, 20.0), (3, 30.0)] {
///     let id = seed.to_string();
///     let config = Config::from_value(json!({"lr": 0.1, "seed": seed})).unwrap();
///     store.put_run(&RunRecord::builder(&id, "mnist").config(config).status(RunStatus::Completed).build())?;
///     store.add_metric(MetricRecord::new(&id, "acc", 0, acc))?;
/// }
///
/// let frame = get_dataframe(&store, &FrameOptions::default())?;
/// let averaged = average_metrics_over_seed(&frame, &AggregateOptions::default());
/// let acc = averaged.rows()[0].metric("metrics.acc").unwrap();
/// assert_eq!(acc.latex_string, "20.0 /pm 10.0");
/// # Ok(())
/// # }
/// ```
#[must_use]
pub fn average_metrics_over_seed(frame: &RunFrame, options: &AggregateOptions) -> SeedAveragedFrame {
    let config_columns: Vec<String> = frame
        .config_columns()
        .into_iter()
        .filter(|column| *column != options.seed_key)
        .collect();
    let metric_columns = frame.metric_columns();

    let mut groups: FxHashMap<Vec<GroupKey>, Group> = FxHashMap::default();
    for row in frame.rows() {
        let key: Vec<GroupKey> = config_columns
            .iter()
            .map(|column| {
                row.config_cell(column)
                    .map_or(GroupKey::Null, ConfigCell::group_key)
            })
            .collect();

        let group = groups.entry(key).or_insert_with(|| Group {
            config: config_columns
                .iter()
                .filter_map(|column| Some((column.clone(), row.config_cell(column)?.clone())))
                .collect(),
            ..Group::default()
        });
        for column in &metric_columns {
            let samples = group.samples.entry(column.clone()).or_default();
            if let Some(value) = row.metric(column).and_then(super::MetricCell::as_scalar) {
                if !value.is_nan() {
                    samples.push(value);
                }
            }
        }
        group.run_ids.push(row.id().to_string());
    }

    let mut keyed: Vec<(Vec<GroupKey>, Group)> = groups.into_iter().collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let rows = keyed
        .into_iter()
        .map(|(_, group)| SeedAveragedRow {
            config: group.config,
            metrics: group
                .samples
                .into_iter()
                .map(|(column, samples)| (column, summarise(&samples, options)))
                .collect(),
            run_ids: group.run_ids,
        })
        .collect::<Vec<_>>();

    tracing::debug!(groups = rows.len(), runs = frame.len(), "averaged metrics over seed");
    SeedAveragedFrame {
        config_columns,
        metric_columns,
        rows,
    }
}

fn summarise(samples: &[f64], options: &AggregateOptions) -> MetricSummary {
    let (mean, std) = mean_std(samples);
    let latex_string = format!(
        "{}{}{}",
        format_float(round_to(mean * options.string_scaling, options.string_rounding)),
        options.separator,
        format_float(round_to(std * options.string_scaling, options.string_rounding)),
    );
    MetricSummary {
        mean,
        std,
        latex_string,
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_std(samples: &[f64]) -> (f64, f64) {
    let n = samples.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = samples.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, f64::NAN);
    }
    let ss: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum();
    (mean, (ss / (n - 1) as f64).sqrt())
}

#[allow(clippy::cast_possible_wrap)]
fn round_to(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10_f64.powi(places as i32);
    let scaled = value * factor;
    // ties go to the even neighbour: 0.125 -> 0.12
    let whole = if (scaled - scaled.trunc()).abs() == 0.5 {
        2.0 * (scaled / 2.0).round()
    } else {
        scaled.round()
    };
    let rounded = whole / factor;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}

/// Render a float the way the summary strings show it: shortest round-trip
/// digits, integral values keep a trailing `.0`, magnitudes below `1e-4` or
/// from `1e16` use an exponent with at least two digits (`1e-05`, `1.5e+16`),
/// NaN is `nan` and infinities are `inf` / `-inf`.
#[must_use]
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        let sign = if value.is_sign_negative() { "-" } else { "" };
        format!("{sign}inf")
    } else if value != 0.0 && (value.abs() < 1e-4 || value.abs() >= 1e16) {
        scientific(value)
    } else if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn scientific(value: f64) -> String {
    let text = format!("{value:e}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = exponent
                .strip_prefix('-')
                .map_or(("+", exponent), |digits| ("-", digits));
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}
