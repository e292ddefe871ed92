//! Seed Sweep Example
//!
//! Sweeps a toy regression over learning rates and seeds, records every run
//! in a directory store, then prints the seed-averaged result table.
//!
//! Run with: cargo run --example seed_sweep

use anyhow::Context;
use serde_json::json;
use trueno_sweep::artifact::{ContentType, NumericArray};
use trueno_sweep::config::Config;
use trueno_sweep::driver::{run_over_configurations, DriverOptions, Experiment};
use trueno_sweep::frame::{average_metrics_over_seed, get_dataframe, AggregateOptions, FrameOptions};
use trueno_sweep::grid::nested_parameter_grid;
use trueno_sweep::store::DirRunStore;

/// Gradient descent on `(w - 3)^2` from a seed-dependent start
fn train(lr: f64, epochs: u64, seed: u64) -> Vec<f64> {
    #[allow(clippy::cast_precision_loss)]
    let mut w = (seed % 7) as f64 - 3.0;
    let mut losses = Vec::new();
    for _ in 0..epochs {
        w -= lr * 2.0 * (w - 3.0);
        losses.push((w - 3.0).powi(2));
    }
    losses
}

fn main() -> anyhow::Result<()> {
    println!("=== Trueno-Sweep Seed Sweep ===\n");

    let experiment = Experiment::builder("toy-regression")
        .ingredient(
            "trainer",
            Config::from_value(json!({"lr": 0.1, "epochs": 20})).context("trainer defaults")?,
        )
        .main(|ctx| {
            let lr: f64 = ctx.ingredient_param("trainer", "lr")?;
            let epochs: u64 = ctx.ingredient_param("trainer", "epochs")?;
            let seed: u64 = ctx.param("seed")?;

            let losses = train(lr, epochs, seed);
            for loss in &losses {
                ctx.log_scalar("loss", *loss)?;
            }
            let last = losses.last().copied().unwrap_or(f64::NAN);
            ctx.log_scalar("final_loss", last)?;
            ctx.save_artifact(NumericArray::column(losses), "losses", ContentType::ArrayCsv)?;
            Ok(())
        })
        .build();

    // -------------------------------------------------------------------------
    // 1. Expand the grid
    // -------------------------------------------------------------------------
    let configs = nested_parameter_grid(&json!({
        "seed": [1, 2, 3, 4, 5],
        "trainer": {"lr": [0.01, 0.05, 0.2]}
    }))?;
    println!("1. Expanded {} configurations", configs.len());

    // -------------------------------------------------------------------------
    // 2. Run them (twice: the second pass skips everything)
    // -------------------------------------------------------------------------
    let dir = tempfile::tempdir()?;
    let store = DirRunStore::open(dir.path())?;
    let options = DriverOptions::new().log_level("info");

    let first = run_over_configurations(&experiment, configs.clone(), Some(&store), &options)?;
    println!("2. First pass:  {first:?}");
    let second = run_over_configurations(&experiment, configs, Some(&store), &options)?;
    println!("   Second pass: {second:?}");

    // -------------------------------------------------------------------------
    // 3. Average over seeds
    // -------------------------------------------------------------------------
    let frame = get_dataframe(&store, &FrameOptions::default())?;
    let averaged = average_metrics_over_seed(&frame, &AggregateOptions::new().string_rounding(4));

    println!("\n3. Final loss by learning rate ({} runs)", frame.len());
    for row in averaged.rows() {
        let lr = row
            .config()
            .get("config.trainer.lr")
            .map(ToString::to_string)
            .unwrap_or_default();
        let loss = row
            .metric("metrics.final_loss")
            .map(|s| s.latex_string.as_str())
            .unwrap_or("-");
        println!("   lr = {lr:<6} final_loss = {loss}  ({} seeds)", row.run_ids().len());
    }

    #[cfg(feature = "parquet")]
    {
        let path = dir.path().join("averaged.parquet");
        trueno_sweep::frame::write_parquet(&path, &averaged.to_record_batch()?)?;
        println!("\n4. Wrote {}", path.display());
    }

    Ok(())
}
