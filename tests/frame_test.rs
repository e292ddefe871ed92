//! Frame assembly and seed aggregation integration tests

mod common;

use common::capture_warnings;
use serde_json::json;
use trueno_sweep::config::Config;
use trueno_sweep::driver::{check_if_run, run_over_configurations, DriverOptions, Experiment};
use trueno_sweep::experiment::{MetricRecord, RunRecord, RunStatus};
use trueno_sweep::frame::{
    average_metrics_over_seed, get_dataframe, AggregateOptions, ConfigCell, FrameOptions,
    MetricCell,
};
use trueno_sweep::grid::nested_parameter_grid;
use trueno_sweep::store::{MemoryRunStore, RunStore};

fn put(store: &MemoryRunStore, id: &str, status: RunStatus, config: serde_json::Value) {
    store
        .put_run(
            &RunRecord::builder(id, "exp")
                .config(Config::from_value(config).unwrap())
                .status(status)
                .build(),
        )
        .unwrap();
}

// =============================================================================
// Assembly
// =============================================================================

#[test]
fn test_frame_from_sweep() {
    let store = MemoryRunStore::new();
    let ex = Experiment::builder("quadratic")
        .ingredient("model", Config::from_value(json!({"a": 1.0})).unwrap())
        .main(|ctx| {
            let a: f64 = ctx.ingredient_param("model", "a")?;
            let seed: f64 = ctx.param("seed")?;
            ctx.log_scalar("score", a * 10.0 + seed)?;
            ctx.log_scalar("curve", a)?;
            ctx.log_scalar("curve", a / 2.0)?;
            Ok(())
        })
        .build();
    let configs = nested_parameter_grid(&json!({
        "seed": [1, 2, 3],
        "model": {"a": [1.0, 2.0]}
    }))
    .unwrap();
    run_over_configurations(&ex, configs, Some(&store), &DriverOptions::default()).unwrap();

    let frame = get_dataframe(&store, &FrameOptions::default()).unwrap();
    assert_eq!(frame.len(), 6);
    assert_eq!(frame.config_columns(), vec!["config.model.a", "config.seed"]);
    assert_eq!(frame.metric_columns(), vec!["metrics.curve", "metrics.score"]);

    for row in frame.rows() {
        assert_eq!(row.status(), RunStatus::Completed);
        assert!(matches!(row.metric("metrics.score"), Some(MetricCell::Scalar(_))));
        assert!(matches!(row.metric("metrics.curve"), Some(MetricCell::Series(v)) if v.len() == 2));
    }

    let averaged = average_metrics_over_seed(&frame, &AggregateOptions::default());
    assert_eq!(averaged.len(), 2);
    assert_eq!(averaged.config_columns(), ["config.model.a".to_string()]);

    let first = &averaged.rows()[0];
    assert_eq!(first.config()["config.model.a"], ConfigCell::Scalar(json!(1.0)));
    let score = first.metric("metrics.score").unwrap();
    assert!((score.mean - 12.0).abs() < 1e-12);
    assert!((score.std - 1.0).abs() < 1e-12);
    assert_eq!(score.latex_string, "12.0 /pm 1.0");
    assert_eq!(first.run_ids().len(), 3);

    // series are not averaged
    assert!(first.metric("metrics.curve").unwrap().mean.is_nan());
}

#[test]
fn test_tuple_columns_group() {
    let store = MemoryRunStore::new();
    put(&store, "1", RunStatus::Completed, json!({"shape": [2, 2], "seed": 1}));
    put(&store, "2", RunStatus::Completed, json!({"shape": {"py/tuple": [2, 2]}, "seed": 2}));
    put(&store, "3", RunStatus::Completed, json!({"shape": [3, 3], "seed": 1}));
    for (id, value) in [("1", 1.0), ("2", 3.0), ("3", 5.0)] {
        store.add_metric(MetricRecord::new(id, "acc", 0, value)).unwrap();
    }

    let frame = get_dataframe(&store, &FrameOptions::default()).unwrap();
    assert_eq!(
        frame.row("2").unwrap().config_cell("config.shape"),
        Some(&ConfigCell::Tuple(vec![json!(2), json!(2)]))
    );

    let averaged = average_metrics_over_seed(&frame, &AggregateOptions::default());
    assert_eq!(averaged.len(), 2);
    let two_by_two = averaged
        .rows()
        .iter()
        .find(|row| row.run_ids().len() == 2)
        .unwrap();
    assert_eq!(two_by_two.run_ids(), ["1", "2"]);
    assert!((two_by_two.metric("metrics.acc").unwrap().mean - 2.0).abs() < 1e-12);
}

#[test]
fn test_raw_mapping_left_as_is() {
    const UNCONVERTED: &str = "mapping is not a tuple";

    let store = MemoryRunStore::new();
    for id in ["1", "2"] {
        put(
            &store,
            id,
            RunStatus::Completed,
            json!({
                "model": {"layers": {"kind": "conv", "n": 2}, "opt": {"name": "adam"}},
                "data": {"split": {"train": 0.8}}
            }),
        );
    }

    let (frame, logs) =
        capture_warnings(|| get_dataframe(&store, &FrameOptions::default()).unwrap());
    let cell = frame.row("1").unwrap().config_cell("config.model.layers").unwrap();
    assert!(cell.is_raw());

    // once per column, not once per row
    assert_eq!(logs.count(UNCONVERTED), 3);
    for column in ["config.model.layers", "config.model.opt", "config.data.split"] {
        assert_eq!(logs.count(column), 1, "{column}");
    }
}

#[test]
fn test_converted_columns_do_not_warn() {
    let store = MemoryRunStore::new();
    put(
        &store,
        "1",
        RunStatus::Completed,
        json!({"lr": 0.1, "shape": [2, 2], "model": {"kernel": {"py/tuple": [3, 3]}}}),
    );
    let (_, logs) = capture_warnings(|| get_dataframe(&store, &FrameOptions::default()).unwrap());
    assert!(logs.contents().is_empty(), "{}", logs.contents());
}

#[test]
fn test_colliding_columns_keep_group_value() {
    let store = MemoryRunStore::new();
    put(&store, "1", RunStatus::Completed, json!({"data": {"n": 4}, "data.n": 8}));

    let (frame, logs) =
        capture_warnings(|| get_dataframe(&store, &FrameOptions::default()).unwrap());
    assert_eq!(frame.config_columns(), vec!["config.data.n"]);
    assert_eq!(
        frame.row("1").unwrap().config_cell("config.data.n"),
        Some(&ConfigCell::Scalar(json!(4)))
    );
    assert_eq!(logs.count("flatten to the same column"), 1);
}

#[test]
fn test_incomplete_runs_filtered_by_default() {
    let store = MemoryRunStore::new();
    put(&store, "1", RunStatus::Completed, json!({"a": 1}));
    put(&store, "2", RunStatus::Running, json!({"a": 2}));
    put(&store, "3", RunStatus::Failed, json!({"a": 3}));

    assert_eq!(get_dataframe(&store, &FrameOptions::default()).unwrap().len(), 1);
    let everything = get_dataframe(&store, &FrameOptions::new().completed_only(false)).unwrap();
    let statuses: Vec<RunStatus> = everything.rows().iter().map(|row| row.status()).collect();
    assert_eq!(
        statuses,
        vec![RunStatus::Completed, RunStatus::Running, RunStatus::Failed]
    );
}

#[test]
fn test_custom_seed_key() {
    let store = MemoryRunStore::new();
    put(&store, "1", RunStatus::Completed, json!({"lr": 0.1, "rep": 1}));
    put(&store, "2", RunStatus::Completed, json!({"lr": 0.1, "rep": 2}));
    store.add_metric(MetricRecord::new("1", "acc", 0, 0.5)).unwrap();
    store.add_metric(MetricRecord::new("2", "acc", 0, 0.7)).unwrap();

    let frame = get_dataframe(&store, &FrameOptions::default()).unwrap();
    let by_default = average_metrics_over_seed(&frame, &AggregateOptions::default());
    assert_eq!(by_default.len(), 2);

    let by_rep = average_metrics_over_seed(&frame, &AggregateOptions::new().seed_key("config.rep"));
    assert_eq!(by_rep.len(), 1);
    assert_eq!(
        by_rep.rows()[0].metric("metrics.acc").unwrap().latex_string,
        "0.6 /pm 0.141"
    );
}

// =============================================================================
// Numeric grouping
// =============================================================================

#[test]
fn test_integer_and_float_share_a_group() {
    let store = MemoryRunStore::new();
    put(&store, "1", RunStatus::Completed, json!({"lr": 1, "seed": 1}));
    put(&store, "2", RunStatus::Completed, json!({"lr": 1.0, "seed": 2}));
    store.add_metric(MetricRecord::new("1", "acc", 0, 0.4)).unwrap();
    store.add_metric(MetricRecord::new("2", "acc", 0, 0.6)).unwrap();

    // the duplicate guard already treats them as one configuration
    let one = Config::from_value(json!({"lr": 1.0})).unwrap();
    assert!(check_if_run(&store, &one).unwrap());

    let frame = get_dataframe(&store, &FrameOptions::default()).unwrap();
    let averaged = average_metrics_over_seed(&frame, &AggregateOptions::default());
    assert_eq!(averaged.len(), 1);
    assert_eq!(averaged.rows()[0].run_ids(), ["1", "2"]);
    assert!((averaged.rows()[0].metric("metrics.acc").unwrap().mean - 0.5).abs() < 1e-12);
}

#[test]
fn test_groups_sorted_numerically() {
    let store = MemoryRunStore::new();
    for (id, epochs) in [("1", 10), ("2", 9), ("3", 100), ("4", -1)] {
        put(&store, id, RunStatus::Completed, json!({"epochs": epochs, "seed": 1}));
    }

    let frame = get_dataframe(&store, &FrameOptions::default()).unwrap();
    let averaged = average_metrics_over_seed(&frame, &AggregateOptions::default());
    let order: Vec<String> = averaged
        .rows()
        .iter()
        .map(|row| row.config()["config.epochs"].to_string())
        .collect();
    assert_eq!(order, vec!["-1", "9", "10", "100"]);
}
