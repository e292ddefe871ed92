//! Run driver
//!
//! Runs an [`Experiment`] over a sequence of configurations against an
//! optional [`RunStore`]:
//!
//! 1. incomplete runs are purged (optional, on by default)
//! 2. each configuration is routed into top-level and ingredient updates
//! 3. configurations already recorded are skipped
//! 4. everything else is run; failures are logged and counted, never fatal
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use trueno_sweep::driver::{run_over_configurations, DriverOptions, Experiment};
//! use trueno_sweep::grid::nested_parameter_grid;
//! use trueno_sweep::store::MemoryRunStore;
//!
//! # fn main() -> trueno_sweep::Result<()> {
//! let experiment = Experiment::builder("toy")
//!     .main(|ctx| {
//!         let x: f64 = ctx.param("x")?;
//!         ctx.log_scalar("y", x * x)?;
//!         Ok(())
//!     })
//!     .build();
//!
//! let store = MemoryRunStore::new();
//! let configs = nested_parameter_grid(&json!({"x": [1.0, 2.0], "seed": [0, 1]}))?;
//!
//! let first = run_over_configurations(&experiment, configs.clone(), Some(&store), &DriverOptions::default())?;
//! assert_eq!(first.completed, 4);
//!
//! // Every configuration is already recorded the second time round
//! let second = run_over_configurations(&experiment, configs, Some(&store), &DriverOptions::default())?;
//! assert_eq!(second.skipped, 4);
//! # Ok(())
//! # }
//! ```

mod context;
mod experiment;

pub use context::RunContext;
pub use experiment::{Experiment, ExperimentBuilder, IngredientUpdates, MainFn, SEED_KEY};

use crate::config::Config;
use crate::store::{RunQuery, RunStore};
use crate::Result;
use serde::{Deserialize, Serialize};

const SEPARATOR_LINE: &str = "--------------------------------------------------";

/// Options for [`run_over_configurations`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    /// Purge incomplete runs before starting
    pub purge_first: bool,
    /// Install a log subscriber at this level before starting
    pub log_level: Option<String>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            purge_first: true,
            log_level: None,
        }
    }
}

impl DriverOptions {
    /// Create options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether incomplete runs are purged first.
    #[must_use]
    pub const fn purge_first(mut self, purge_first: bool) -> Self {
        self.purge_first = purge_first;
        self
    }

    /// Set the log level.
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }
}

/// Result of one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The experiment ran; carries the new run id
    Completed(String),
    /// A matching run was already recorded
    Skipped,
}

/// Counts from a batch of configurations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Configurations that ran to completion
    pub completed: usize,
    /// Configurations skipped as duplicates
    pub skipped: usize,
    /// Configurations that failed
    pub errors: usize,
}

impl RunSummary {
    /// Number of configurations processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.completed + self.skipped + self.errors
    }
}

/// Items [`run_over_configurations`] accepts: plain configurations, or
/// fallible ones such as those yielded by a
/// [`ConfigFolderQueue`](crate::parallel::ConfigFolderQueue).
pub trait IntoConfig {
    /// Produce the configuration.
    ///
    /// # Errors
    ///
    /// Returns the error carried by a fallible item.
    fn into_config(self) -> Result<Config>;
}

impl IntoConfig for Config {
    fn into_config(self) -> Result<Config> {
        Ok(self)
    }
}

impl IntoConfig for Result<Config> {
    fn into_config(self) -> Result<Config> {
        self
    }
}

/// Check whether a run with this configuration is already recorded.
///
/// Stored runs may carry extra fields; only the fields of `config` are
/// compared. More than one match still counts as "already run" but logs a
/// warning.
///
/// # Errors
///
/// Returns error if the store cannot be queried.
pub fn check_if_run(store: &dyn RunStore, config: &Config) -> Result<bool> {
    let query = RunQuery::from_config(config);
    let matches = store.count_matching(&query)?;
    if matches > 1 {
        tracing::warn!(
            matches,
            query = %query,
            "configuration matches more than one recorded run"
        );
    }
    Ok(matches > 0)
}

/// Run one configuration unless it is already recorded.
///
/// Nested blocks are routed to the ingredient of the same name before the
/// store is consulted.
///
/// # Errors
///
/// Returns `Error::UnknownIngredient` for a nested block without an
/// ingredient, `Error::RunFailed` if the experiment fails, or a store error.
pub fn run_configuration(
    experiment: &Experiment,
    config: &Config,
    store: Option<&dyn RunStore>,
) -> Result<RunOutcome> {
    let (updates, ingredient_updates) = experiment.route_config(config)?;

    if let Some(store) = store {
        if check_if_run(store, config)? {
            tracing::debug!(config = %config, "already run, skipping");
            return Ok(RunOutcome::Skipped);
        }
    }

    experiment
        .run(&updates, &ingredient_updates, store)
        .map(RunOutcome::Completed)
}

/// Run `experiment` over every configuration in turn.
///
/// A failing configuration is logged at `ERROR` with its configuration and
/// trace and counted; the loop carries on.
///
/// # Errors
///
/// Returns error only if the initial purge fails.
pub fn run_over_configurations<I>(
    experiment: &Experiment,
    configs: I,
    store: Option<&dyn RunStore>,
    options: &DriverOptions,
) -> Result<RunSummary>
where
    I: IntoIterator,
    I::Item: IntoConfig,
{
    if let Some(level) = &options.log_level {
        crate::logging::init(level);
    }

    match store {
        None => tracing::warn!(
            experiment = experiment.name(),
            "no run store given, runs are not being recorded"
        ),
        Some(store) if options.purge_first => {
            purge_incomplete_runs(store)?;
        }
        Some(_) => {}
    }

    let mut summary = RunSummary::default();
    for item in configs {
        let config = match item.into_config() {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "could not read configuration");
                summary.errors += 1;
                continue;
            }
        };

        match run_configuration(experiment, &config, store) {
            Ok(RunOutcome::Completed(_)) => summary.completed += 1,
            Ok(RunOutcome::Skipped) => summary.skipped += 1,
            Err(e) => {
                tracing::error!(
                    "{SEPARATOR_LINE}\nerror while running configuration:\n{config}\n{e}\n{SEPARATOR_LINE}"
                );
                summary.errors += 1;
            }
        }
    }

    tracing::info!(
        experiment = experiment.name(),
        completed = summary.completed,
        skipped = summary.skipped,
        "experiment ran with a total of {} errors",
        summary.errors
    );
    Ok(summary)
}

/// Delete every run that is neither `COMPLETED` nor `RUNNING`, together
/// with its metric samples. Returns the number of runs deleted.
///
/// # Errors
///
/// Returns error if the store cannot list or delete runs.
pub fn purge_incomplete_runs(store: &dyn RunStore) -> Result<usize> {
    let mut deleted = 0;
    for run in store.runs()? {
        if !run.status().is_incomplete() {
            continue;
        }
        store.delete_metrics(run.id())?;
        if store.delete_run(run.id())? {
            deleted += 1;
        }
    }
    tracing::info!(deleted, "purged incomplete runs");
    Ok(deleted)
}
