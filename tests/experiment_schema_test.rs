//! Run document schema tests
//!
//! Run documents are the on-disk contract of `DirRunStore`, so their serde
//! shape is pinned here.

use serde_json::json;
use trueno_sweep::artifact::ContentType;
use trueno_sweep::config::Config;
use trueno_sweep::experiment::{ArtifactRecord, MetricRecord, RunRecord, RunStatus};

fn config() -> Config {
    Config::from_value(json!({
        "learning_rate": 0.01,
        "batch_size": 32,
        "model": {"name": "resnet50", "depth": 50}
    }))
    .unwrap()
}

// =============================================================================
// RunRecord Tests
// =============================================================================

#[test]
fn test_run_record_creation() {
    let run = RunRecord::new("run-001", "mnist", config());

    assert_eq!(run.id(), "run-001");
    assert_eq!(run.experiment(), "mnist");
    assert_eq!(run.status(), RunStatus::Pending);
    assert!(run.started_at().is_none());
    assert!(run.ended_at().is_none());
    assert!(run.artifacts().is_empty());
    assert_eq!(run.config().get_nested("model", "depth"), Some(&json!(50)));
}

#[test]
fn test_run_lifecycle() {
    let mut run = RunRecord::new("run-002", "mnist", Config::new());

    run.start();
    assert_eq!(run.status(), RunStatus::Running);
    assert!(run.started_at().is_some());

    run.complete(RunStatus::Completed);
    assert_eq!(run.status(), RunStatus::Completed);
    assert!(run.ended_at().unwrap() >= run.started_at().unwrap());
}

#[test]
fn test_run_failure_keeps_trace() {
    let mut run = RunRecord::new("run-003", "mnist", Config::new());
    run.start();
    run.fail("Error: out of memory\n\nCaused by:\n    allocation failed");

    assert_eq!(run.status(), RunStatus::Failed);
    assert!(run.fail_trace().unwrap().contains("out of memory"));
}

#[test]
fn test_run_status_serialization() {
    for (status, tag) in [
        (RunStatus::Pending, "\"PENDING\""),
        (RunStatus::Running, "\"RUNNING\""),
        (RunStatus::Completed, "\"COMPLETED\""),
        (RunStatus::Failed, "\"FAILED\""),
        (RunStatus::Interrupted, "\"INTERRUPTED\""),
    ] {
        assert_eq!(serde_json::to_string(&status).unwrap(), tag);
        assert_eq!(status.to_string(), tag.trim_matches('"'));
    }
}

#[test]
fn test_incomplete_statuses() {
    assert!(!RunStatus::Completed.is_incomplete());
    assert!(!RunStatus::Running.is_incomplete());
    assert!(RunStatus::Pending.is_incomplete());
    assert!(RunStatus::Failed.is_incomplete());
    assert!(RunStatus::Interrupted.is_incomplete());
}

#[test]
fn test_run_document_shape() {
    let artifact = ArtifactRecord::new("curve", ContentType::TableCsv, "sha256:abc", 42);
    let run = RunRecord::builder("run-004", "mnist")
        .config(config())
        .status(RunStatus::Completed)
        .artifact(artifact)
        .build();

    let doc = serde_json::to_value(&run).unwrap();
    assert_eq!(doc["id"], "run-004");
    assert_eq!(doc["status"], "COMPLETED");
    assert_eq!(doc["config"]["model"]["name"], "resnet50");
    assert_eq!(doc["artifacts"][0]["content_type"], "table.csv");
    assert_eq!(doc["artifacts"][0]["size_bytes"], 42);
    assert!(doc.get("fail_trace").is_none());

    let back: RunRecord = serde_json::from_value(doc).unwrap();
    assert_eq!(back, run);
}

// =============================================================================
// MetricRecord Tests
// =============================================================================

#[test]
fn test_metric_record_creation() {
    let metric = MetricRecord::new("run-001", "loss", 3, 0.25);

    assert_eq!(metric.run_id(), "run-001");
    assert_eq!(metric.key(), "loss");
    assert_eq!(metric.step(), 3);
    assert!((metric.value() - 0.25).abs() < f64::EPSILON);
    assert!(metric.timestamp().timestamp() > 0);
}

#[test]
fn test_metric_record_serialization() {
    let metric = MetricRecord::new("run-001", "accuracy", 0, 0.9);
    let json = serde_json::to_string(&metric).expect("serialization failed");
    let back: MetricRecord = serde_json::from_str(&json).expect("deserialization failed");
    assert_eq!(back, metric);
}
