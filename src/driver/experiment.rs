//! Experiment definition: defaults, ingredients and a main function

use super::RunContext;
use crate::config::Config;
use crate::experiment::{RunRecord, RunStatus};
use crate::store::RunStore;
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use uuid::Uuid;

/// Configuration key holding the run's random seed.
pub const SEED_KEY: &str = "seed";

/// Signature of an experiment's main function.
pub type MainFn = Box<dyn Fn(&mut RunContext<'_>) -> anyhow::Result<()>>;

/// Nested configuration blocks, by ingredient name.
pub type IngredientUpdates = BTreeMap<String, Map<String, Value>>;

/// An experiment: a main function plus its default configuration and the
/// named ingredients (sub-components) whose parameters live one level down.
///
/// ```rust
/// use serde_json::json;
/// use trueno_sweep::config::Config;
/// use trueno_sweep::driver::Experiment;
///
/// let experiment = Experiment::builder("mnist")
///     .default("epochs", json!(10))
///     .ingredient("optimizer", Config::from_value(json!({"lr": 0.01})).unwrap())
///     .main(|ctx| {
///         let lr: f64 = ctx.ingredient_param("optimizer", "lr")?;
///         ctx.log_scalar("loss", 1.0 / lr)?;
///         Ok(())
///     })
///     .build();
///
/// assert!(experiment.has_ingredient("optimizer"));
/// ```
pub struct Experiment {
    name: String,
    defaults: Config,
    ingredients: BTreeMap<String, Config>,
    main: MainFn,
}

impl fmt::Debug for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .field("ingredients", &self.ingredients)
            .finish_non_exhaustive()
    }
}

impl Experiment {
    /// Start building an experiment.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder::new(name)
    }

    /// Experiment name, recorded on every run.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default top-level configuration.
    #[must_use]
    pub const fn defaults(&self) -> &Config {
        &self.defaults
    }

    /// Registered ingredient names, sorted.
    #[must_use]
    pub fn ingredient_names(&self) -> Vec<&str> {
        self.ingredients.keys().map(String::as_str).collect()
    }

    /// True if an ingredient with this name is registered.
    #[must_use]
    pub fn has_ingredient(&self, name: &str) -> bool {
        self.ingredients.contains_key(name)
    }

    /// Split a configuration into top-level updates and per-ingredient
    /// updates.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownIngredient` if a nested block does not name a
    /// registered ingredient.
    pub fn route_config(&self, config: &Config) -> Result<(Config, IngredientUpdates)> {
        let (top, groups) = config.clone().split_groups();
        if let Some(key) = groups.keys().find(|key| !self.has_ingredient(key)) {
            return Err(Error::UnknownIngredient {
                key: key.clone(),
                available: self.ingredients.keys().cloned().collect(),
            });
        }
        Ok((top, groups))
    }

    /// Resolve the configuration a run would execute with.
    ///
    /// Defaults are overlaid with `updates`; each ingredient's defaults are
    /// overlaid with its block from `ingredient_updates`. A random seed is
    /// added when none is configured.
    #[must_use]
    pub fn resolve_config(&self, updates: &Config, ingredient_updates: &IngredientUpdates) -> Config {
        let mut resolved = self.defaults.clone();
        resolved.merge(updates);

        for (name, defaults) in &self.ingredients {
            let mut block: Map<String, Value> = defaults.clone().into_iter().collect();
            if let Some(overrides) = ingredient_updates.get(name) {
                for (key, value) in overrides {
                    block.insert(key.clone(), value.clone());
                }
            }
            resolved.insert(name.clone(), Value::Object(block));
        }

        if !resolved.contains_key(SEED_KEY) {
            resolved.insert(SEED_KEY, Value::from(rand::random::<u32>()));
        }
        resolved
    }

    /// Execute one run and record it in `store`.
    ///
    /// The run document is written as `RUNNING` before main is called and
    /// rewritten as `COMPLETED` or `FAILED` afterwards. Returns the run id.
    ///
    /// # Errors
    ///
    /// Returns `Error::RunFailed` (with the error chain, or the panic
    /// message) if main fails or panics, or a store error if the run
    /// document cannot be written.
    pub fn run(
        &self,
        updates: &Config,
        ingredient_updates: &IngredientUpdates,
        store: Option<&dyn RunStore>,
    ) -> Result<String> {
        let config = self.resolve_config(updates, ingredient_updates);
        let run_id = match store {
            Some(store) => store.allocate_run_id()?,
            None => Uuid::new_v4().to_string(),
        };

        let mut record = RunRecord::new(&run_id, &self.name, config);
        record.start();
        if let Some(store) = store {
            store.put_run(&record)?;
        }
        tracing::debug!(run_id = %run_id, experiment = %self.name, "run started");

        let mut ctx = RunContext::new(record, store);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.main)(&mut ctx)));
        let mut record = ctx.into_record();

        let failure = match outcome {
            Ok(Ok(())) => {
                record.complete(RunStatus::Completed);
                None
            }
            Ok(Err(e)) => Some(format!("{e:?}")),
            Err(payload) => Some(format!("main panicked: {}", panic_message(payload.as_ref()))),
        };
        if let Some(trace) = &failure {
            record.fail(trace.clone());
        }
        if let Some(store) = store {
            store.put_run(&record)?;
        }

        match failure {
            None => {
                tracing::debug!(run_id = %run_id, "run completed");
                Ok(run_id)
            }
            Some(trace) => Err(Error::RunFailed { run_id, trace }),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Builder for `Experiment`.
pub struct ExperimentBuilder {
    name: String,
    defaults: Config,
    ingredients: BTreeMap<String, Config>,
    main: MainFn,
}

impl ExperimentBuilder {
    /// Create a builder whose main function does nothing.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defaults: Config::new(),
            ingredients: BTreeMap::new(),
            main: Box::new(|_| Ok(())),
        }
    }

    /// Set the whole default configuration.
    #[must_use]
    pub fn defaults(mut self, defaults: Config) -> Self {
        self.defaults = defaults;
        self
    }

    /// Set one default parameter.
    #[must_use]
    pub fn default(mut self, key: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(key, value);
        self
    }

    /// Register an ingredient with its default configuration.
    #[must_use]
    pub fn ingredient(mut self, name: impl Into<String>, defaults: Config) -> Self {
        self.ingredients.insert(name.into(), defaults);
        self
    }

    /// Set the main function.
    #[must_use]
    pub fn main<F>(mut self, main: F) -> Self
    where
        F: Fn(&mut RunContext<'_>) -> anyhow::Result<()> + 'static,
    {
        self.main = Box::new(main);
        self
    }

    /// Build the `Experiment`.
    #[must_use]
    pub fn build(self) -> Experiment {
        Experiment {
            name: self.name,
            defaults: self.defaults,
            ingredients: self.ingredients,
            main: self.main,
        }
    }
}
