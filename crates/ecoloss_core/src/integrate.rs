//! Grid-sampled integration drivers behind the [`IvpSolver`] interface.

use crate::error::{LossError, LossResult};
use crate::solvers::{DormandPrince, RK4};
use crate::traits::{DynamicalSystem, IvpSolver, Steppable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    /// Dormand-Prince 5(4) with error control.
    #[default]
    Adaptive,
    /// Fixed-step RK4 with `substeps` steps per grid interval.
    Rk4,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    #[serde(default)]
    pub method: SolverMethod,
    #[serde(default = "SolverSettings::default_rtol")]
    pub rtol: f64,
    #[serde(default = "SolverSettings::default_atol")]
    pub atol: f64,
    /// First trial step; `0` picks one from the grid span.
    #[serde(default)]
    pub initial_step: f64,
    #[serde(default = "SolverSettings::default_min_step")]
    pub min_step: f64,
    #[serde(default = "SolverSettings::default_max_step")]
    pub max_step: f64,
    #[serde(default = "SolverSettings::default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "SolverSettings::default_substeps")]
    pub substeps: usize,
}

impl SolverSettings {
    fn default_rtol() -> f64 {
        1e-6
    }
    fn default_atol() -> f64 {
        1e-9
    }
    fn default_min_step() -> f64 {
        1e-10
    }
    fn default_max_step() -> f64 {
        0.05
    }
    fn default_max_steps() -> usize {
        100_000
    }
    fn default_substeps() -> usize {
        20
    }

    pub fn validate(&self) -> LossResult<()> {
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(LossError::Solver("rtol must be finite and positive".into()));
        }
        if !self.atol.is_finite() || self.atol <= 0.0 {
            return Err(LossError::Solver("atol must be finite and positive".into()));
        }
        if !self.initial_step.is_finite() || self.initial_step < 0.0 {
            return Err(LossError::Solver("initial_step must be finite and non-negative".into()));
        }
        if !self.min_step.is_finite() || self.min_step <= 0.0 {
            return Err(LossError::Solver("min_step must be finite and positive".into()));
        }
        if !(self.max_step > self.min_step) {
            return Err(LossError::Solver(format!(
                "max_step ({}) must exceed min_step ({})",
                self.max_step, self.min_step
            )));
        }
        if self.max_steps == 0 {
            return Err(LossError::Solver("max_steps must be greater than zero".into()));
        }
        if self.substeps == 0 {
            return Err(LossError::Solver("substeps must be greater than zero".into()));
        }
        Ok(())
    }

    /// Builds the solver selected by `method`.
    pub fn build(&self) -> LossResult<ConfiguredSolver> {
        self.validate()?;
        Ok(match self.method {
            SolverMethod::Adaptive => ConfiguredSolver::Adaptive(AdaptiveSolver::new(*self)),
            SolverMethod::Rk4 => ConfiguredSolver::FixedStep(FixedStepSolver::new(self.substeps)),
        })
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            method: SolverMethod::default(),
            rtol: Self::default_rtol(),
            atol: Self::default_atol(),
            initial_step: 0.0,
            min_step: Self::default_min_step(),
            max_step: Self::default_max_step(),
            max_steps: Self::default_max_steps(),
            substeps: Self::default_substeps(),
        }
    }
}

/// Checks that the output grid is finite and strictly increasing.
pub fn check_grid(grid: &[f64]) -> LossResult<()> {
    if grid.is_empty() {
        return Err(LossError::Solver("output grid is empty".into()));
    }
    if grid.iter().any(|v| !v.is_finite()) {
        return Err(LossError::Solver("output grid contains non-finite values".into()));
    }
    if let Some(i) = grid.windows(2).position(|w| w[1] <= w[0]) {
        return Err(LossError::Solver(format!(
            "output grid must be strictly increasing (index {})",
            i + 1
        )));
    }
    Ok(())
}

fn check_initial(system: &impl DynamicalSystem<f64>, y0: &[f64]) -> LossResult<()> {
    let dim = system.dimension();
    if y0.len() != dim {
        return Err(LossError::Solver(format!(
            "initial state dimension mismatch. Expected {}, got {}.",
            dim,
            y0.len()
        )));
    }
    Ok(())
}

/// Counters from the last adaptive solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepStats {
    pub accepted: usize,
    pub rejected: usize,
    /// Steps accepted at `min_step` despite failing the error test.
    pub forced: usize,
}

/// Adaptive Dormand-Prince integration that lands exactly on every grid point.
pub struct AdaptiveSolver {
    settings: SolverSettings,
    stats: StepStats,
}

impl AdaptiveSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            settings,
            stats: StepStats::default(),
        }
    }

    pub fn stats(&self) -> StepStats {
        self.stats
    }

    fn first_step(&self, span: f64) -> f64 {
        let s = &self.settings;
        let h = if s.initial_step > 0.0 {
            s.initial_step
        } else {
            span * 1e-3
        };
        h.max(s.min_step).min(s.max_step)
    }
}

impl IvpSolver for AdaptiveSolver {
    fn solve(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        y0: &[f64],
        grid: &[f64],
    ) -> LossResult<Vec<Vec<f64>>> {
        self.settings.validate()?;
        check_grid(grid)?;
        check_initial(system, y0)?;

        let settings = self.settings;
        let mut stats = StepStats::default();
        let mut stepper = DormandPrince::new(y0.len(), settings.rtol, settings.atol);
        let mut out = Vec::with_capacity(grid.len());
        let mut y = y0.to_vec();
        let mut s = grid[0];
        let mut h = self.first_step(grid[grid.len() - 1] - grid[0]);
        out.push(y.clone());

        for &target in &grid[1..] {
            while s < target {
                if stats.accepted + stats.rejected >= settings.max_steps {
                    self.stats = stats;
                    return Err(LossError::Solver(format!(
                        "exceeded max_steps={} at s={s:.6e} before reaching {target:.6e}",
                        settings.max_steps
                    )));
                }

                let remaining = target - s;
                let lands = h >= remaining;
                let trial = if lands { remaining } else { h };
                let err = stepper.attempt(system, s, &y, trial);

                if !err.is_finite() {
                    self.stats = stats;
                    return Err(LossError::Numerical(format!(
                        "non-finite error estimate at s={s:.6e}"
                    )));
                }

                if err <= 1.0 || trial <= settings.min_step {
                    if err > 1.0 {
                        stats.forced += 1;
                    }
                    stepper.accept(&mut y);
                    s = if lands { target } else { s + trial };
                    stats.accepted += 1;
                } else {
                    stats.rejected += 1;
                }

                let factor = if err == 0.0 {
                    5.0
                } else {
                    (0.9 * err.powf(-0.2)).clamp(0.2, 5.0)
                };
                // A short landing step should not throttle the next interval.
                let base = if lands && err <= 1.0 { h } else { trial };
                h = (base * factor).max(settings.min_step).min(settings.max_step);
            }
            out.push(y.clone());
        }

        tracing::debug!(
            accepted = stats.accepted,
            rejected = stats.rejected,
            forced = stats.forced,
            "adaptive integration finished"
        );
        if stats.forced > 0 {
            tracing::warn!(
                forced = stats.forced,
                "accepted steps at min_step without meeting tolerance"
            );
        }
        self.stats = stats;
        Ok(out)
    }
}

/// Fixed-step RK4 with a constant number of substeps per grid interval.
pub struct FixedStepSolver {
    substeps: usize,
}

impl FixedStepSolver {
    pub fn new(substeps: usize) -> Self {
        Self {
            substeps: substeps.max(1),
        }
    }
}

impl IvpSolver for FixedStepSolver {
    fn solve(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        y0: &[f64],
        grid: &[f64],
    ) -> LossResult<Vec<Vec<f64>>> {
        check_grid(grid)?;
        check_initial(system, y0)?;

        let mut stepper = RK4::new(y0.len());
        let mut out = Vec::with_capacity(grid.len());
        let mut y = y0.to_vec();
        out.push(y.clone());

        for w in grid.windows(2) {
            let ds = (w[1] - w[0]) / self.substeps as f64;
            let mut s = w[0];
            for _ in 0..self.substeps {
                stepper.step(system, &mut s, &mut y, ds);
            }
            out.push(y.clone());
        }
        Ok(out)
    }
}

/// Solver picked from [`SolverSettings`].
pub enum ConfiguredSolver {
    Adaptive(AdaptiveSolver),
    FixedStep(FixedStepSolver),
}

impl IvpSolver for ConfiguredSolver {
    fn solve(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        y0: &[f64],
        grid: &[f64],
    ) -> LossResult<Vec<Vec<f64>>> {
        match self {
            ConfiguredSolver::Adaptive(s) => s.solve(system, y0, grid),
            ConfiguredSolver::FixedStep(s) => s.solve(system, y0, grid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _s: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[0];
        }
    }

    fn unit_grid(points: usize) -> Vec<f64> {
        (0..points).map(|i| i as f64 / (points - 1) as f64).collect()
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: LossResult<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn adaptive_solver_reproduces_decay_on_grid() {
        let grid = unit_grid(11);
        let mut solver = AdaptiveSolver::new(SolverSettings::default());
        let samples = solver.solve(&Decay, &[1.0], &grid).expect("solve");
        assert_eq!(samples.len(), grid.len());
        for (s, y) in grid.iter().zip(&samples) {
            assert!((y[0] - (-s).exp()).abs() < 1e-6, "at {s}: {}", y[0]);
        }
        assert!(solver.stats().accepted >= grid.len() - 1);
        assert_eq!(solver.stats().forced, 0);
    }

    #[test]
    fn fixed_step_solver_reproduces_decay_on_grid() {
        let grid = unit_grid(5);
        let mut solver = FixedStepSolver::new(10);
        let samples = solver.solve(&Decay, &[2.0], &grid).expect("solve");
        assert_eq!(samples[0], vec![2.0]);
        let last = samples.last().expect("samples");
        assert!((last[0] - 2.0 * (-1.0_f64).exp()).abs() < 1e-8);
    }

    #[test]
    fn solvers_reject_bad_grids_and_dimensions() {
        let mut solver = AdaptiveSolver::new(SolverSettings::default());
        assert_err_contains(solver.solve(&Decay, &[1.0], &[]), "empty");
        assert_err_contains(
            solver.solve(&Decay, &[1.0], &[0.0, 0.5, 0.5]),
            "strictly increasing",
        );
        assert_err_contains(
            solver.solve(&Decay, &[1.0], &[0.0, f64::NAN]),
            "non-finite",
        );
        assert_err_contains(solver.solve(&Decay, &[1.0, 2.0], &[0.0, 1.0]), "dimension");
    }

    #[test]
    fn step_budget_is_enforced() {
        let settings = SolverSettings {
            max_steps: 3,
            max_step: 0.01,
            ..SolverSettings::default()
        };
        let mut solver = AdaptiveSolver::new(settings);
        assert_err_contains(solver.solve(&Decay, &[1.0], &[0.0, 1.0]), "max_steps");
    }

    #[test]
    fn settings_validation_and_build() {
        let bad = SolverSettings {
            rtol: 0.0,
            ..SolverSettings::default()
        };
        assert_err_contains(bad.build().map(|_| ()), "rtol");

        let bad = SolverSettings {
            max_step: 1e-12,
            ..SolverSettings::default()
        };
        assert_err_contains(bad.validate(), "max_step");

        let rk4 = SolverSettings {
            method: SolverMethod::Rk4,
            ..SolverSettings::default()
        };
        let mut solver = rk4.build().expect("build");
        assert!(matches!(solver, ConfiguredSolver::FixedStep(_)));
        let samples = solver.solve(&Decay, &[1.0], &[0.0, 1.0]).expect("solve");
        // 20 RK4 substeps over [0, 1]: global error about e^-1 * h^4 / 120, a few 1e-8.
        assert!((samples[1][0] - (-1.0_f64).exp()).abs() < 1e-6);
    }

    #[test]
    fn single_point_grid_returns_initial_state() {
        let mut solver = AdaptiveSolver::new(SolverSettings::default());
        let samples = solver.solve(&Decay, &[0.3], &[0.0]).expect("solve");
        assert_eq!(samples, vec![vec![0.3]]);
    }
}
