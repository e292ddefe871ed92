//! # trueno-sweep: Parameter Sweeps over Tracked Experiments
//!
//! **Version**: 0.1.0
//!
//! trueno-sweep runs an experiment over a grid of configurations, records
//! every run in a run store, and turns the recorded runs back into tables.
//!
//! ## Pipeline
//!
//! - **Expand**: a nested parameter grid becomes a list of concrete
//!   configurations ([`grid`])
//! - **Run**: each configuration is run once; duplicates are skipped and
//!   failures counted ([`driver`])
//! - **Record**: runs, metric samples and artifacts go to a [`store::RunStore`]
//!   ([`store`], [`artifact`])
//! - **Analyse**: runs become a frame; seeds are averaged out ([`frame`])
//! - **Share**: a folder of configuration files feeds several worker
//!   processes ([`parallel`])
//!
//! ## Example Usage
//!
//! ```rust
//! use serde_json::json;
//! use trueno_sweep::driver::{run_over_configurations, DriverOptions, Experiment};
//! use trueno_sweep::frame::{average_metrics_over_seed, get_dataframe, AggregateOptions, FrameOptions};
//! use trueno_sweep::grid::nested_parameter_grid;
//! use trueno_sweep::store::MemoryRunStore;
//!
//! # fn main() -> trueno_sweep::Result<()> {
//! let experiment = Experiment::builder("quadratic")
//!     .main(|ctx| {
//!         let a: f64 = ctx.param("a")?;
//!         let seed: f64 = ctx.param("seed")?;
//!         ctx.log_scalar("score", a + seed)?;
//!         Ok(())
//!     })
//!     .build();
//!
//! let configs = nested_parameter_grid(&json!({"a": [1.0, 2.0], "seed": [0, 1, 2]}))?;
//! let store = MemoryRunStore::new();
//! run_over_configurations(&experiment, configs, Some(&store), &DriverOptions::default())?;
//!
//! let frame = get_dataframe(&store, &FrameOptions::default())?;
//! let averaged = average_metrics_over_seed(&frame, &AggregateOptions::default());
//! assert_eq!(averaged.len(), 2);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifact;
pub mod config;
pub mod driver;
pub mod error;
pub mod experiment;
pub mod frame;
pub mod grid;
pub mod io;
pub mod logging;
pub mod parallel;
pub mod store;

pub use error::{Error, Result};
