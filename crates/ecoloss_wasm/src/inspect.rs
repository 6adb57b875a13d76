//! Diagnostics on the most recent run.

use crate::model::{to_js_error, WasmModel};
use anyhow::{anyhow, Context, Result};
use ecoloss_core::analysis::{stiffness_report, StiffnessReport};
use ecoloss_core::engine::LossSystem;
use ecoloss_core::report::{perturbation_profile, range_warnings, PerturbationProfile, RangeWarning};
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

impl WasmModel {
    /// Local stiffness at the grid point nearest to `concentration`.
    pub(crate) fn stiffness_near(&self, concentration: f64) -> Result<StiffnessReport> {
        let (Some(scenario), Some(result)) = (self.last_scenario.as_ref(), self.last.as_ref())
        else {
            return Err(anyhow!("No run available; call run() first."));
        };
        let index = result
            .concentration
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - concentration).abs().total_cmp(&(b.1 - concentration).abs()))
            .map(|(i, _)| i)
            .ok_or_else(|| anyhow!("Last run has an empty grid."))?;

        let system = LossSystem::new(&scenario.perturbations, &scenario.couplings)
            .with_time(scenario.time)
            .with_power(self.options.model.power)
            .with_scale(self.options.model.scale);
        stiffness_report(&system, result.concentration[index], &result.trajectory[index])
            .context("Stiffness analysis failed")
    }

    pub(crate) fn profile(&self) -> Result<(PerturbationProfile, Vec<RangeWarning>)> {
        let (Some(scenario), Some(result)) = (self.last_scenario.as_ref(), self.last.as_ref())
        else {
            return Err(anyhow!("No run available; call run() first."));
        };
        let profile =
            perturbation_profile(&scenario.perturbations, scenario.time, &result.concentration);
        Ok((profile, range_warnings(&scenario.perturbations)))
    }
}

#[wasm_bindgen]
impl WasmModel {
    pub fn stiffness(&self, concentration: f64) -> Result<JsValue, JsValue> {
        let report = self.stiffness_near(concentration).map_err(to_js_error)?;
        to_value(&report).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Perturbation curves of the last run together with range warnings.
    pub fn perturbations(&self) -> Result<JsValue, JsValue> {
        let payload = self.profile().map_err(to_js_error)?;
        to_value(&payload).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
