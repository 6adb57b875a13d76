//! WASM bridge for the `ecoloss_core` crate.
//!
//! A `WasmModel` holds the run configuration and the most recent run; the
//! browser front-end sends raw form values and reads back trajectories,
//! radar snapshots and diagnostics.

mod inspect;
mod model;

pub use model::{ModelOptions, WasmModel};
