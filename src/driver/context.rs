//! Run context handed to an experiment's main function

use crate::artifact::{self, ArtifactValue, ContentType};
use crate::config::Config;
use crate::experiment::{ArtifactRecord, MetricRecord, RunRecord};
use crate::store::RunStore;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Handle a running experiment uses to read its configuration and record
/// metrics and artifacts.
pub struct RunContext<'a> {
    record: RunRecord,
    store: Option<&'a dyn RunStore>,
    steps: HashMap<String, u64>,
}

impl<'a> RunContext<'a> {
    pub(crate) fn new(record: RunRecord, store: Option<&'a dyn RunStore>) -> Self {
        Self {
            record,
            store,
            steps: HashMap::new(),
        }
    }

    /// Id of the current run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        self.record.id()
    }

    /// Resolved configuration, ingredient groups included.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.record.config()
    }

    /// The run document as recorded so far.
    #[must_use]
    pub const fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Store the run is recorded in, if any.
    #[must_use]
    pub fn store(&self) -> Option<&'a dyn RunStore> {
        self.store
    }

    /// Read a top-level parameter.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingParameter` if absent, or a JSON error if it
    /// does not deserialize as `T`.
    pub fn param<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .config()
            .get(key)
            .ok_or_else(|| Error::MissingParameter(key.to_string()))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Read a parameter of an ingredient.
    ///
    /// # Errors
    ///
    /// As [`RunContext::param`].
    pub fn ingredient_param<T: DeserializeOwned>(&self, ingredient: &str, key: &str) -> Result<T> {
        let value = self
            .config()
            .get_nested(ingredient, key)
            .ok_or_else(|| Error::MissingParameter(crate::config::join_path(ingredient, key)))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Log one sample of a scalar metric. Steps count up from 0 per name.
    ///
    /// # Errors
    ///
    /// Returns error if the store rejects the sample.
    pub fn log_scalar(&mut self, name: &str, value: f64) -> Result<()> {
        let step = self.steps.entry(name.to_string()).or_insert(0);
        let metric = MetricRecord::new(self.record.id(), name, *step, value);
        *step += 1;
        if let Some(store) = self.store {
            store.add_metric(metric)?;
        }
        Ok(())
    }

    /// Save an artifact to this run; see [`artifact::save_artifact`].
    ///
    /// # Errors
    ///
    /// Returns error on a content type mismatch or a failed write.
    pub fn save_artifact(
        &mut self,
        value: impl Into<ArtifactValue>,
        name: &str,
        content_type: ContentType,
    ) -> Result<()> {
        let value = value.into();
        artifact::save_artifact(self, &value, name, content_type)
    }

    pub(crate) fn attach_artifact(&mut self, artifact: ArtifactRecord) -> Result<()> {
        self.record.add_artifact(artifact);
        if let Some(store) = self.store {
            store.put_run(&self.record)?;
        }
        Ok(())
    }

    pub(crate) fn into_record(self) -> RunRecord {
        self.record
    }
}
