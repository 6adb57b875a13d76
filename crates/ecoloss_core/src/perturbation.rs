//! Exogenous perturbation signals `x1..x14`.
//!
//! Signals `x1..x6` are driven by time `t`, `x7..x14` by concentration `C`.
//! Each row of the table is a polynomial (highest degree first) whose value is
//! divided by [`PERTURBATION_SCALE`] and clamped to `[0, 1]`.

use crate::state::clip_unit;
use serde::{Deserialize, Serialize};

pub const PERTURBATION_COUNT: usize = 14;

/// Signals `x1..x6` are evaluated at time; the rest at concentration.
pub const TIME_DRIVEN: usize = 6;

/// Raw polynomial values are divided by this before clamping.
pub const PERTURBATION_SCALE: f64 = 10.0;

/// Highest supported degree is cubic.
pub const MAX_COEFFICIENTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalInput {
    Time,
    Concentration,
}

impl SignalInput {
    /// Input driving the signal at 1-based `signal_index`.
    pub fn of(signal_index: usize) -> Option<SignalInput> {
        match signal_index {
            1..=TIME_DRIVEN => Some(SignalInput::Time),
            i if i <= PERTURBATION_COUNT && i > TIME_DRIVEN => Some(SignalInput::Concentration),
            _ => None,
        }
    }
}

/// Evaluates the polynomial given by `coefficients` at `v` (Horner form).
///
/// The degree follows the coefficient count: one coefficient is a constant,
/// two an affine map, up to four for a cubic. Coefficients past the fourth are
/// ignored. Returns `None` for an empty list.
pub fn polynomial(coefficients: &[f64], v: f64) -> Option<f64> {
    if coefficients.is_empty() {
        return None;
    }
    let used = &coefficients[..coefficients.len().min(MAX_COEFFICIENTS)];
    Some(used.iter().fold(0.0, |acc, &c| acc * v + c))
}

/// Normalized signal value in `[0, 1]`; an empty row contributes nothing.
pub fn normalized(coefficients: &[f64], v: f64) -> f64 {
    match polynomial(coefficients, v) {
        Some(raw) => clip_unit(raw / PERTURBATION_SCALE),
        None => 0.0,
    }
}

/// Coefficient rows for `x1..x14`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerturbationTable {
    pub rows: [Vec<f64>; PERTURBATION_COUNT],
}

impl PerturbationTable {
    pub fn new(rows: [Vec<f64>; PERTURBATION_COUNT]) -> Self {
        Self { rows }
    }

    /// Every signal is the affine map `0·v + 0`.
    pub fn zeroed() -> Self {
        Self {
            rows: std::array::from_fn(|_| vec![0.0, 0.0]),
        }
    }

    /// Demonstration table: affine signals whose normalized values sit
    /// comfortably inside `[0, 1]` over the unit interval.
    pub fn reference() -> Self {
        const ROWS: [[f64; 2]; PERTURBATION_COUNT] = [
            [0.5, 2.0],
            [-0.2, 2.2],
            [0.0, 0.0],
            [1.0, 4.0],
            [-0.3, 3.0],
            [0.1, 2.0],
            [7.0, 5.0],
            [0.0, 0.0],
            [0.6, 3.0],
            [0.7, 4.0],
            [3.0, 5.0],
            [3.2, 3.0],
            [3.3, 4.0],
            [2.0, 5.0],
        ];
        Self {
            rows: ROWS.map(|row| row.to_vec()),
        }
    }

    /// Value of signal `x{signal_index}` (1-based) for the given input.
    /// Out-of-range indices contribute nothing.
    pub fn evaluate(&self, signal_index: usize, input: f64) -> f64 {
        if signal_index == 0 || signal_index > PERTURBATION_COUNT {
            return 0.0;
        }
        normalized(&self.rows[signal_index - 1], input)
    }

    /// All fourteen signals, time-driven ones at `t`, the rest at `c`.
    pub fn evaluate_all(&self, t: f64, c: f64) -> [f64; PERTURBATION_COUNT] {
        std::array::from_fn(|i| {
            let input = if i < TIME_DRIVEN { t } else { c };
            normalized(&self.rows[i], input)
        })
    }

    /// `x1..x6` at time `t`.
    pub fn time_driven(&self, t: f64) -> [f64; TIME_DRIVEN] {
        std::array::from_fn(|i| normalized(&self.rows[i], t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polynomial_degree_follows_coefficient_count() {
        assert_eq!(polynomial(&[], 2.0), None);
        assert_eq!(polynomial(&[3.0], 2.0), Some(3.0));
        assert_eq!(polynomial(&[3.0, 1.0], 2.0), Some(7.0));
        assert_eq!(polynomial(&[1.0, 0.0, 1.0], 2.0), Some(5.0));
        assert_eq!(polynomial(&[1.0, 0.0, 0.0, 1.0], 2.0), Some(9.0));
        // A fifth coefficient is ignored.
        assert_eq!(polynomial(&[1.0, 0.0, 0.0, 1.0, 100.0], 2.0), Some(9.0));
    }

    #[test]
    fn normalized_divides_by_scale_and_clamps() {
        assert!((normalized(&[0.5, 2.0], 0.5) - 0.225).abs() < 1e-15);
        assert_eq!(normalized(&[50.0, 0.0], 1.0), 1.0);
        assert_eq!(normalized(&[-5.0, 0.0], 1.0), 0.0);
        assert_eq!(normalized(&[], 1.0), 0.0);
    }

    #[test]
    fn evaluate_all_routes_time_and_concentration() {
        let mut rows: [Vec<f64>; PERTURBATION_COUNT] = Default::default();
        rows[0] = vec![10.0, 0.0];
        rows[6] = vec![10.0, 0.0];
        let table = PerturbationTable::new(rows);
        let values = table.evaluate_all(0.3, 0.8);
        assert!((values[0] - 0.3).abs() < 1e-15);
        assert!((values[6] - 0.8).abs() < 1e-15);
        assert_eq!(values[1], 0.0);
        assert_eq!(table.evaluate(1, 0.3), values[0]);
        assert_eq!(table.evaluate(15, 0.3), 0.0);
    }

    #[test]
    fn signal_inputs_split_at_six() {
        assert_eq!(SignalInput::of(1), Some(SignalInput::Time));
        assert_eq!(SignalInput::of(6), Some(SignalInput::Time));
        assert_eq!(SignalInput::of(7), Some(SignalInput::Concentration));
        assert_eq!(SignalInput::of(14), Some(SignalInput::Concentration));
        assert_eq!(SignalInput::of(0), None);
        assert_eq!(SignalInput::of(15), None);
    }
}
