//! One concentration sweep: scenario in, clipped trajectory out.

use crate::engine::{clamp_power, LossSystem, DEFAULT_POWER};
use crate::error::{LossError, LossResult};
use crate::perturbation::TIME_DRIVEN;
use crate::scenario::{RawScenario, Scenario};
use crate::state::{clip_state, LossState, STATE_DIM};
use crate::traits::IvpSolver;
use serde::{Deserialize, Serialize};

/// Model-level run parameters (the `[model]` config section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default = "RunSettings::default_grid_points")]
    pub grid_points: usize,
    #[serde(default = "RunSettings::default_power")]
    pub power: f64,
    /// Per-equation divisor of the net rate (`xm`).
    #[serde(default = "RunSettings::default_scale")]
    pub scale: LossState,
}

impl RunSettings {
    fn default_grid_points() -> usize {
        100
    }
    fn default_power() -> f64 {
        DEFAULT_POWER
    }
    fn default_scale() -> LossState {
        [1.0; STATE_DIM]
    }

    /// Power is not checked here; the engine clamps it.
    pub fn validate(&self) -> LossResult<()> {
        if self.grid_points < 2 {
            return Err(LossError::Validation(format!(
                "grid_points must be at least 2, got {}",
                self.grid_points
            )));
        }
        for (i, s) in self.scale.iter().enumerate() {
            if !s.is_finite() || *s <= 0.0 {
                return Err(LossError::Validation(format!(
                    "scale[{i}] must be finite and positive, got {s}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            grid_points: Self::default_grid_points(),
            power: Self::default_power(),
            scale: Self::default_scale(),
        }
    }
}

/// `n` uniformly spaced concentrations from 0 to 1 inclusive.
pub fn concentration_grid(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let last = (n - 1) as f64;
            (0..n).map(|i| i as f64 / last).collect()
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub concentration: Vec<f64>,
    /// One clipped state per grid point.
    pub trajectory: Vec<LossState>,
    pub initial_state: LossState,
    pub restrictions: LossState,
    pub time: f64,
    /// Effective power after clamping.
    pub power: f64,
    /// `x1..x6` at `time`.
    pub time_perturbations: [f64; TIME_DRIVEN],
}

impl RunResult {
    pub fn final_state(&self) -> Option<&LossState> {
        self.trajectory.last()
    }
}

/// Integrates the loss model over the concentration grid.
pub fn run(
    scenario: &Scenario,
    settings: &RunSettings,
    solver: &mut impl IvpSolver,
) -> LossResult<RunResult> {
    scenario.validate()?;
    settings.validate()?;

    let grid = concentration_grid(settings.grid_points);
    let system = LossSystem::new(&scenario.perturbations, &scenario.couplings)
        .with_time(scenario.time)
        .with_power(settings.power)
        .with_scale(settings.scale);

    let samples = solver.solve(&system, &scenario.initial_state, &grid)?;
    if samples.len() != grid.len() {
        return Err(LossError::Solver(format!(
            "solver returned {} samples for {} grid points",
            samples.len(),
            grid.len()
        )));
    }

    let mut trajectory = Vec::with_capacity(samples.len());
    for (i, sample) in samples.iter().enumerate() {
        if sample.len() != STATE_DIM {
            return Err(LossError::Shape(format!(
                "sample {i} has {} components, expected {STATE_DIM}",
                sample.len()
            )));
        }
        if sample.iter().any(|v| !v.is_finite()) {
            return Err(LossError::Numerical(format!(
                "non-finite state at C={:.4}",
                grid[i]
            )));
        }
        let mut state = [0.0; STATE_DIM];
        state.copy_from_slice(sample);
        trajectory.push(clip_state(&state));
    }

    let time_perturbations = scenario.perturbations.time_driven(scenario.time);
    let final_state = trajectory.last().copied().unwrap_or(scenario.initial_state);

    tracing::info!(
        points = grid.len(),
        time = scenario.time,
        power = system.power,
        "concentration sweep finished"
    );
    tracing::info!(initial = ?scenario.initial_state, "initial state");
    tracing::info!(final_state = ?final_state, "state at C=1");
    for (i, value) in time_perturbations.iter().enumerate() {
        tracing::info!(
            "x{}(t={:.2}) = {:.4}",
            i + 1,
            scenario.time,
            value
        );
    }

    Ok(RunResult {
        concentration: grid,
        trajectory,
        initial_state: scenario.initial_state,
        restrictions: scenario.restrictions,
        time: scenario.time,
        power: clamp_power(settings.power),
        time_perturbations,
    })
}

/// Coerces raw input, then runs it.
pub fn run_raw(
    raw: &RawScenario,
    settings: &RunSettings,
    solver: &mut impl IvpSolver,
) -> LossResult<RunResult> {
    let scenario = raw.coerce()?;
    run(&scenario, settings, solver)
}
