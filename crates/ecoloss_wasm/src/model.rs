//! The model wrapper and its run/read-back methods.

use anyhow::{bail, Context, Result};
use ecoloss_core::driver::{run, RunResult, RunSettings};
use ecoloss_core::integrate::SolverSettings;
use ecoloss_core::scenario::{RawScenario, Scenario};
use ecoloss_core::state::{LossState, EQUAL_WEIGHTS, STATE_DIM};
use js_sys::Float64Array;
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Options accepted by the constructor; both sections are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(default)]
    pub model: RunSettings,
    #[serde(default)]
    pub solver: SolverSettings,
}

#[wasm_bindgen]
pub struct WasmModel {
    pub(crate) options: ModelOptions,
    pub(crate) last: Option<RunResult>,
    pub(crate) last_scenario: Option<Scenario>,
}

pub(crate) fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", err))
}

impl WasmModel {
    pub(crate) fn from_options(options: ModelOptions) -> Result<Self> {
        options.model.validate().context("Invalid model settings")?;
        options.solver.validate().context("Invalid solver settings")?;
        Ok(Self {
            options,
            last: None,
            last_scenario: None,
        })
    }

    pub(crate) fn run_scenario(&mut self, raw: &RawScenario) -> Result<&RunResult> {
        let scenario = raw.coerce().context("Failed to read scenario")?;
        let mut solver = self.options.solver.build()?;
        let result = run(&scenario, &self.options.model, &mut solver).context("Run failed")?;
        self.last_scenario = Some(scenario);
        Ok(&*self.last.insert(result))
    }

    /// Last trajectory, row-major `grid_points × 5`; empty before the first run.
    pub(crate) fn flat_trajectory(&self) -> Vec<f64> {
        self.last
            .as_ref()
            .map(|r| r.trajectory.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn weighted_total(&self, weights: Option<&[f64]>) -> Result<Vec<f64>> {
        let Some(result) = self.last.as_ref() else {
            bail!("No run available; call run() first.");
        };
        let weights: LossState = match weights {
            Some(w) if w.len() == STATE_DIM => {
                let mut out = [0.0; STATE_DIM];
                out.copy_from_slice(w);
                out
            }
            Some(w) => bail!("Expected {} weights, got {}.", STATE_DIM, w.len()),
            None => EQUAL_WEIGHTS,
        };
        Ok(result.total_loss(Some(&weights)))
    }
}

#[wasm_bindgen]
impl WasmModel {
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<WasmModel, JsValue> {
        console_error_panic_hook::set_once();

        let options = if options.is_undefined() || options.is_null() {
            ModelOptions::default()
        } else {
            from_value(options)
                .map_err(|e| JsValue::from_str(&format!("Invalid options: {}", e)))?
        };
        WasmModel::from_options(options).map_err(to_js_error)
    }

    /// Runs a raw scenario (numbers or numeric strings) and returns the result.
    pub fn run(&mut self, raw: JsValue) -> Result<JsValue, JsValue> {
        let raw: RawScenario = if raw.is_undefined() || raw.is_null() {
            RawScenario::default()
        } else {
            from_value(raw).map_err(|e| JsValue::from_str(&format!("Invalid scenario: {}", e)))?
        };
        let result = self.run_scenario(&raw).map_err(to_js_error)?;
        to_value(result).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Nested `[[Cf1..Cf5], ...]`, or `null` before the first run.
    pub fn last_trajectory(&self) -> Result<JsValue, JsValue> {
        to_value(&self.last.as_ref().map(|r| &r.trajectory))
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn last_trajectory_flat(&self) -> Float64Array {
        Float64Array::from(self.flat_trajectory().as_slice())
    }

    pub fn concentration(&self) -> Float64Array {
        let grid = self
            .last
            .as_ref()
            .map(|r| r.concentration.clone())
            .unwrap_or_default();
        Float64Array::from(grid.as_slice())
    }

    /// Radar snapshots of the last run; empty before the first run.
    pub fn snapshots(&self) -> Result<JsValue, JsValue> {
        let snapshots = self
            .last
            .as_ref()
            .map(RunResult::snapshots)
            .unwrap_or_default();
        to_value(&snapshots).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn total_loss(&self, weights: Option<Vec<f64>>) -> Result<Float64Array, JsValue> {
        let totals = self
            .weighted_total(weights.as_deref())
            .map_err(to_js_error)?;
        Ok(Float64Array::from(totals.as_slice()))
    }
}
