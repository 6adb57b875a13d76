//! Data prepared for the chart and radar renderers.

use crate::driver::RunResult;
use crate::perturbation::{
    polynomial, PerturbationTable, SignalInput, PERTURBATION_COUNT, PERTURBATION_SCALE,
    TIME_DRIVEN,
};
use crate::state::{clip_state, total_loss, LossState, EQUAL_WEIGHTS};
use serde::Serialize;

/// Concentration-driven signals `x7..x14`.
pub const CONCENTRATION_DRIVEN: usize = PERTURBATION_COUNT - TIME_DRIVEN;

/// Radar view of the state at one grid point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub index: usize,
    pub concentration: f64,
    pub initial: LossState,
    pub current: LossState,
    pub restrictions: LossState,
}

/// Grid indices near C = 0, 0.25, 0.5, 0.75 and 1.
pub fn snapshot_indices(len: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    vec![0, len / 4, len / 2, 3 * len / 4, len - 1]
}

impl RunResult {
    pub fn snapshots(&self) -> Vec<Snapshot> {
        let initial = clip_state(&self.initial_state);
        let restrictions = clip_state(&self.restrictions);
        snapshot_indices(self.trajectory.len())
            .into_iter()
            .map(|index| Snapshot {
                index,
                concentration: self.concentration.get(index).copied().unwrap_or(f64::NAN),
                initial,
                current: clip_state(&self.trajectory[index]),
                restrictions,
            })
            .collect()
    }

    /// `Σ μ_i·Cf_i` per grid point; equal weights when `weights` is `None`.
    pub fn total_loss(&self, weights: Option<&LossState>) -> Vec<f64> {
        let weights = weights.unwrap_or(&EQUAL_WEIGHTS);
        self.trajectory
            .iter()
            .map(|state| total_loss(state, weights))
            .collect()
    }
}

/// Perturbation curves for the disturbance chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerturbationProfile {
    pub time: f64,
    /// `x1..x6` at `time`.
    pub time_driven: [f64; TIME_DRIVEN],
    pub concentration: Vec<f64>,
    /// `x7..x14` over the concentration grid.
    pub concentration_driven: [Vec<f64>; CONCENTRATION_DRIVEN],
}

pub fn perturbation_profile(
    table: &PerturbationTable,
    t: f64,
    grid: &[f64],
) -> PerturbationProfile {
    PerturbationProfile {
        time: t,
        time_driven: table.time_driven(t),
        concentration: grid.to_vec(),
        concentration_driven: std::array::from_fn(|k| {
            let signal = TIME_DRIVEN + k + 1;
            grid.iter().map(|&c| table.evaluate(signal, c)).collect()
        }),
    }
}

/// A signal whose unclamped value leaves `[0, 1]` at an end of its input range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeWarning {
    /// 1-based signal index.
    pub signal: usize,
    pub input: SignalInput,
    pub at_zero: f64,
    pub at_one: f64,
}

/// Signals whose clamp is active at input 0 or 1. Each one is logged.
pub fn range_warnings(table: &PerturbationTable) -> Vec<RangeWarning> {
    let outside = |v: f64| !(0.0..=1.0).contains(&v);
    let mut warnings = Vec::new();
    for (i, row) in table.rows.iter().enumerate() {
        let (Some(low), Some(high)) = (polynomial(row, 0.0), polynomial(row, 1.0)) else {
            continue;
        };
        let (at_zero, at_one) = (low / PERTURBATION_SCALE, high / PERTURBATION_SCALE);
        if outside(at_zero) || outside(at_one) {
            let signal = i + 1;
            tracing::warn!(
                "perturbation x{signal} leaves [0,1]: {at_zero:.3} at 0, {at_one:.3} at 1"
            );
            warnings.push(RangeWarning {
                signal,
                input: SignalInput::of(signal).unwrap_or(SignalInput::Concentration),
                at_zero,
                at_one,
            });
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::concentration_grid;

    fn flat_result(len: usize) -> RunResult {
        let concentration = concentration_grid(len);
        let trajectory = concentration.iter().map(|&c| [c; 5]).collect();
        RunResult {
            concentration,
            trajectory,
            initial_state: [0.2, 0.4, 0.6, 0.8, 1.2],
            restrictions: [1.0, 0.9, 0.8, 0.7, -0.5],
            time: 0.0,
            power: 0.6,
            time_perturbations: [0.0; TIME_DRIVEN],
        }
    }

    #[test]
    fn snapshots_pick_quarter_points() {
        assert_eq!(snapshot_indices(100), vec![0, 25, 50, 75, 99]);
        assert!(snapshot_indices(0).is_empty());

        let result = flat_result(100);
        let snapshots = result.snapshots();
        assert_eq!(snapshots.len(), 5);
        assert_eq!(snapshots[4].concentration, 1.0);
        assert_eq!(snapshots[2].current, [50.0 / 99.0; 5]);
        // Initial state and restrictions are clipped for display.
        assert_eq!(snapshots[0].initial[4], 1.0);
        assert_eq!(snapshots[0].restrictions[4], 0.0);
    }

    #[test]
    fn total_loss_uses_equal_weights_by_default() {
        let result = flat_result(3);
        let totals = result.total_loss(None);
        assert_eq!(totals.len(), 3);
        assert!((totals[1] - 0.5).abs() < 1e-12);

        let weights = [1.0, 0.0, 0.0, 0.0, 0.0];
        let weighted = result.total_loss(Some(&weights));
        assert_eq!(weighted, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn profile_splits_time_and_concentration_signals() {
        let table = PerturbationTable::reference();
        let grid = concentration_grid(5);
        let profile = perturbation_profile(&table, 0.5, &grid);
        assert_eq!(profile.time_driven, table.time_driven(0.5));
        assert_eq!(profile.concentration_driven[0].len(), 5);
        // x7 = (7C + 5) / 10, clamped.
        assert_eq!(profile.concentration_driven[0][0], 0.5);
        assert_eq!(profile.concentration_driven[0][4], 1.0);
        for curve in &profile.concentration_driven {
            assert!(curve.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn range_warnings_flag_active_clamps() {
        let warnings = range_warnings(&PerturbationTable::reference());
        // x7 reaches 1.2 at C = 1; x12 reaches 0.62, x11 0.8.
        let flagged: Vec<usize> = warnings.iter().map(|w| w.signal).collect();
        assert_eq!(flagged, vec![7]);
        assert_eq!(warnings[0].input, SignalInput::Concentration);
        assert!((warnings[0].at_one - 1.2).abs() < 1e-12);

        assert!(range_warnings(&PerturbationTable::zeroed()).is_empty());
    }
}
