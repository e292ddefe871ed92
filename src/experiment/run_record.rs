//! Run Record - one execution attempt of an experiment

use super::ArtifactRecord;
use crate::config::Config;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a run.
///
/// Serialized in upper case (`"COMPLETED"`), the form stored run documents use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run is created but not yet started.
    Pending,
    /// Run is currently executing.
    Running,
    /// Run finished without error.
    Completed,
    /// Run's main function returned an error.
    Failed,
    /// Run was stopped before finishing.
    Interrupted,
}

impl RunStatus {
    /// Upper-case tag as stored in run documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Interrupted => "INTERRUPTED",
        }
    }

    /// True for runs that are neither completed nor still running.
    ///
    /// These are the orphans removed by `purge_incomplete_runs`.
    #[must_use]
    pub const fn is_incomplete(self) -> bool {
        !matches!(self, Self::Completed | Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run Record is the persisted document for a single run.
///
/// It holds the resolved configuration the run executed with, its lifecycle
/// status and the descriptors of any artifacts it saved. Metric samples are
/// stored separately as `MetricRecord`s keyed by the run id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    id: String,
    experiment: String,
    status: RunStatus,
    config: Config,
    #[serde(default)]
    artifacts: Vec<ArtifactRecord>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fail_trace: Option<String>,
}

impl RunRecord {
    /// Create a new run record in Pending status.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identifier for the run
    /// * `experiment` - Name of the experiment being run
    /// * `config` - Resolved configuration
    #[must_use]
    pub fn new(id: impl Into<String>, experiment: impl Into<String>, config: Config) -> Self {
        Self {
            id: id.into(),
            experiment: experiment.into(),
            status: RunStatus::Pending,
            config,
            artifacts: Vec::new(),
            started_at: None,
            ended_at: None,
            fail_trace: None,
        }
    }

    /// Create a builder, mainly for importing or seeding existing runs.
    #[must_use]
    pub fn builder(id: impl Into<String>, experiment: impl Into<String>) -> RunRecordBuilder {
        RunRecordBuilder::new(id, experiment)
    }

    /// Get the run ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Get the artifact descriptors attached to this run.
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactRecord] {
        &self.artifacts
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has finished.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Get the failure trace of a failed run.
    #[must_use]
    pub fn fail_trace(&self) -> Option<&str> {
        self.fail_trace.as_deref()
    }

    /// Start the run, transitioning to Running.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Finish the run with the given final status.
    pub fn complete(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    /// Finish the run as Failed, keeping the error trace.
    pub fn fail(&mut self, trace: impl Into<String>) {
        self.fail_trace = Some(trace.into());
        self.complete(RunStatus::Failed);
    }

    /// Attach an artifact descriptor.
    pub fn add_artifact(&mut self, artifact: ArtifactRecord) {
        self.artifacts.push(artifact);
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
pub struct RunRecordBuilder {
    record: RunRecord,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, experiment: impl Into<String>) -> Self {
        Self {
            record: RunRecord::new(id, experiment, Config::new()),
        }
    }

    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.record.config = config;
        self
    }

    /// Set the status.
    #[must_use]
    pub const fn status(mut self, status: RunStatus) -> Self {
        self.record.status = status;
        self
    }

    /// Attach an artifact descriptor.
    #[must_use]
    pub fn artifact(mut self, artifact: ArtifactRecord) -> Self {
        self.record.artifacts.push(artifact);
        self
    }

    /// Build the `RunRecord`.
    #[must_use]
    pub fn build(self) -> RunRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_default() {
        let run = RunRecord::new("run-1", "exp", Config::new());
        assert_eq!(run.status(), RunStatus::Pending);
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = RunRecord::new("run-1", "exp", Config::new());
        run.start();
        assert_eq!(run.status(), RunStatus::Running);
        run.complete(RunStatus::Completed);
        assert_eq!(run.status(), RunStatus::Completed);
        assert!(run.ended_at().is_some());
    }

    #[test]
    fn test_incomplete_statuses() {
        assert!(!RunStatus::Completed.is_incomplete());
        assert!(!RunStatus::Running.is_incomplete());
        assert!(RunStatus::Failed.is_incomplete());
        assert!(RunStatus::Pending.is_incomplete());
        assert!(RunStatus::Interrupted.is_incomplete());
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&RunStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
        assert_eq!(RunStatus::Failed.to_string(), "FAILED");
    }
}
