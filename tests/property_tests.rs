//! Property-based tests for trueno-sweep
//!
//! - Grid cardinality and ordering invariants
//! - Config flattening and duplicate-match invariants
//! - Seed aggregation statistics
//! - Run with ProptestConfig::with_cases(100)

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use trueno_sweep::config::Config;
use trueno_sweep::experiment::{MetricRecord, RunRecord, RunStatus};
use trueno_sweep::frame::{average_metrics_over_seed, get_dataframe, AggregateOptions, FrameOptions};
use trueno_sweep::grid::{nested_parameter_grid, ParameterGrid};
use trueno_sweep::store::{MemoryRunStore, RunQuery, RunStore};
use trueno_sweep::Error;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Candidate list of 1..=3 distinct integers
fn arb_candidates() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::btree_set(-50i64..50, 1..=3).prop_map(|set| set.into_iter().collect())
}

/// Flat description: up to 4 keys, each with candidates
fn arb_flat_description() -> impl Strategy<Value = Map<String, Value>> {
    proptest::collection::btree_map("[a-z]{1,4}", arb_candidates(), 1..=4).prop_map(|axes| {
        axes.into_iter()
            .map(|(key, values)| (key, json!(values)))
            .collect()
    })
}

/// Description with one level of groups; group names are upper case so they
/// never collide with the lower-case top-level keys
fn arb_nested_description() -> impl Strategy<Value = Map<String, Value>> {
    (
        arb_flat_description(),
        proptest::collection::btree_map("[A-Z]{1,3}", arb_flat_description(), 0..=2),
    )
        .prop_map(|(mut top, groups)| {
            for (name, inner) in groups {
                top.insert(name, Value::Object(inner));
            }
            top
        })
}

fn expected_len(description: &Map<String, Value>) -> usize {
    description
        .values()
        .map(|value| match value {
            Value::Array(values) => values.len(),
            Value::Object(inner) => expected_len(inner),
            _ => 1,
        })
        .product()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Grid Properties
    // ========================================================================

    /// Property: a flat grid is the plain Cartesian product
    #[test]
    fn prop_flat_grid_cardinality(description in arb_flat_description()) {
        let configs = nested_parameter_grid(&Value::Object(description.clone())).unwrap();
        prop_assert_eq!(configs.len(), expected_len(&description));

        for config in &configs {
            prop_assert_eq!(config.len(), description.len());
            for (key, value) in config.iter() {
                let candidates = description[key].as_array().unwrap();
                prop_assert!(candidates.contains(value));
            }
        }
    }

    /// Property: every combination appears exactly once
    #[test]
    fn prop_nested_grid_is_distinct(description in arb_nested_description()) {
        let configs = nested_parameter_grid(&Value::Object(description.clone())).unwrap();
        prop_assert_eq!(configs.len(), expected_len(&description));

        let distinct: BTreeSet<String> = configs.iter().map(ToString::to_string).collect();
        prop_assert_eq!(distinct.len(), configs.len());
    }

    /// Property: nested sub-mappings keep exactly the input's inner keys
    #[test]
    fn prop_nested_keys_preserved(description in arb_nested_description()) {
        let configs = nested_parameter_grid(&Value::Object(description.clone())).unwrap();
        for config in &configs {
            for (key, value) in &description {
                if let Value::Object(inner) = value {
                    let produced = config.get(key).and_then(Value::as_object).unwrap();
                    let produced_keys: Vec<&String> = produced.keys().collect();
                    let input_keys: Vec<&String> = inner.keys().collect();
                    prop_assert_eq!(produced_keys, input_keys);
                }
            }
        }
    }

    /// Property: random access agrees with full expansion
    #[test]
    fn prop_get_matches_expand(description in arb_nested_description()) {
        let grid = ParameterGrid::from_value(&Value::Object(description)).unwrap();
        let expanded = grid.expand();
        prop_assert_eq!(grid.len(), expanded.len());
        for (i, config) in expanded.iter().enumerate() {
            let got = grid.get(i);
            prop_assert_eq!(got.as_ref(), Some(config));
        }
        prop_assert!(grid.get(expanded.len()).is_none());
    }

    /// Property: two levels of nesting always fail with no output
    #[test]
    fn prop_depth_two_rejected(
        outer in "[a-z]{1,4}",
        inner in "[a-z]{1,4}",
        values in arb_candidates(),
    ) {
        let description = json!({ outer.clone(): { inner: { "x": values } } });
        let result = nested_parameter_grid(&description);
        prop_assert!(
            matches!(result, Err(Error::DepthExceeded { .. })),
            "expected depth error, got {:?}",
            result
        );
    }

    /// Property: a top-level key containing the separator is rejected
    #[test]
    fn prop_separator_rejected(left in "[a-z]{1,3}", right in "[a-z]{1,3}") {
        let key = format!("{left}.{right}");
        let result = nested_parameter_grid(&json!({ key.clone(): [1, 2] }));
        prop_assert!(matches!(result, Err(Error::ReservedSeparator(k)) if k == key));
    }

    // ========================================================================
    // Duplicate-Match Properties
    // ========================================================================

    /// Property: a config always matches a run recorded with a superset of it
    #[test]
    fn prop_query_matches_superset(
        description in arb_nested_description(),
        extra in -100i64..100,
    ) {
        let configs = nested_parameter_grid(&Value::Object(description)).unwrap();
        let config = configs[0].clone();
        let mut stored = config.clone();
        stored.insert("zz_extra", json!(extra));

        let run = RunRecord::builder("1", "exp").config(stored).build();
        prop_assert!(RunQuery::from_config(&config).matches(&run));
    }

    /// Property: changing one scalar breaks the match
    #[test]
    fn prop_query_rejects_changed_value(description in arb_flat_description()) {
        let configs = nested_parameter_grid(&Value::Object(description)).unwrap();
        let config = configs[0].clone();
        let key = config.iter().next().map(|(k, _)| k.clone()).unwrap();
        let mut stored = config.clone();
        stored.insert(key, json!("changed"));

        let run = RunRecord::builder("1", "exp").config(stored).build();
        prop_assert!(!RunQuery::from_config(&config).matches(&run));
    }

    // ========================================================================
    // Aggregation Properties
    // ========================================================================

    /// Property: mean lies within the sample range and std is non-negative
    #[test]
    fn prop_seed_mean_within_range(values in proptest::collection::vec(-1e6f64..1e6, 2..8)) {
        let store = MemoryRunStore::new();
        for (i, value) in values.iter().enumerate() {
            let id = (i + 1).to_string();
            let config = Config::from_value(json!({"lr": 0.1, "seed": i})).unwrap();
            store.put_run(
                &RunRecord::builder(&id, "exp").config(config).status(RunStatus::Completed).build(),
            ).unwrap();
            store.add_metric(MetricRecord::new(&id, "score", 0, *value)).unwrap();
        }

        let frame = get_dataframe(&store, &FrameOptions::default()).unwrap();
        let averaged = average_metrics_over_seed(&frame, &AggregateOptions::default());
        prop_assert_eq!(averaged.len(), 1);

        let row = &averaged.rows()[0];
        prop_assert_eq!(row.run_ids().len(), values.len());
        let summary = row.metric("metrics.score").unwrap();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(summary.mean >= min - 1e-6 && summary.mean <= max + 1e-6);
        prop_assert!(summary.std >= 0.0);
    }
}
