//! Coupling functions `f1..f12` between loss fractions.
//!
//! Each function reads exactly one component of the (safety-clamped) state and
//! returns a weight in `[0, 1]`. The formula family is fixed by position; only
//! the coefficients are configurable. [`WIRING`] and [`DEFAULT_COUPLINGS`] are
//! the single source of truth for which component and family each position uses.

use crate::state::{clip_unit, LossComponent, LossState};
use serde::{Deserialize, Serialize};

pub const COUPLING_COUNT: usize = 12;

/// Lower bound for the denominators of the rational family.
pub const RATIONAL_FLOOR: f64 = 0.01;

/// One coupling function with its coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Coupling {
    /// `a·eˣ / (1 + b·(eˣ − 1))`, clamped.
    LogisticGrowth { a: f64, b: f64 },
    /// `a·x + b`, divided by `|a| + |b|`.
    Affine { a: f64, b: f64 },
    /// `low` below `threshold`, `high` from it on.
    Step { low: f64, threshold: f64, high: f64 },
    /// `a / max(x + b, 0.01)`, divided by `a / b`.
    Rational { a: f64, b: f64 },
    /// `a / max(x + b, 0.01) + c`, divided by `a / b + c`.
    RationalOffset { a: f64, b: f64, c: f64 },
    /// `1 / (1 + e^−(x·scale − shift))`.
    Sigmoid { scale: f64, shift: f64 },
}

/// State component read by `f1..f12`.
pub const WIRING: [LossComponent; COUPLING_COUNT] = [
    LossComponent::Environment,
    LossComponent::QualityOfLife,
    LossComponent::Enterprise,
    LossComponent::Environment,
    LossComponent::QualityOfLife,
    LossComponent::Enterprise,
    LossComponent::Enterprise,
    LossComponent::Disease,
    LossComponent::Agriculture,
    LossComponent::Environment,
    LossComponent::Enterprise,
    LossComponent::Disease,
];

/// Family and fallback coefficients of `f1..f12`.
pub const DEFAULT_COUPLINGS: [Coupling; COUPLING_COUNT] = [
    Coupling::LogisticGrowth { a: 0.5, b: 0.5 },
    Coupling::Affine { a: 0.3, b: 15.0 },
    Coupling::Step {
        low: 0.3,
        threshold: 0.4,
        high: 0.5,
    },
    Coupling::Affine { a: 0.7, b: 11.0 },
    Coupling::Affine { a: 0.8, b: 9.0 },
    Coupling::Rational { a: 0.8, b: 12.0 },
    Coupling::Rational { a: 0.8, b: 11.0 },
    Coupling::Affine { a: 0.7, b: 13.0 },
    Coupling::Sigmoid {
        scale: 1.0,
        shift: 0.0,
    },
    Coupling::Affine { a: 0.55, b: 13.0 },
    Coupling::RationalOffset {
        a: 0.55,
        b: 12.0,
        c: 2.0,
    },
    Coupling::Affine { a: 0.5, b: 3.0 },
];

/// Divides by `norm` unless it is zero or non-finite.
fn scaled(raw: f64, norm: f64) -> f64 {
    if norm.is_finite() && norm != 0.0 {
        raw / norm
    } else {
        raw
    }
}

impl Coupling {
    /// Number of coefficients the family consumes.
    pub const fn arity(&self) -> usize {
        match self {
            Coupling::Step { .. } | Coupling::RationalOffset { .. } => 3,
            _ => 2,
        }
    }

    pub fn coefficients(&self) -> Vec<f64> {
        match *self {
            Coupling::LogisticGrowth { a, b }
            | Coupling::Affine { a, b }
            | Coupling::Rational { a, b } => vec![a, b],
            Coupling::Step {
                low,
                threshold,
                high,
            } => vec![low, threshold, high],
            Coupling::RationalOffset { a, b, c } => vec![a, b, c],
            Coupling::Sigmoid { scale, shift } => vec![scale, shift],
        }
    }

    /// Same family with coefficients taken from `row`.
    ///
    /// Rows shorter than the arity, or with non-finite leading entries, keep
    /// the current coefficients. Extra entries are ignored.
    pub fn with_row(&self, row: &[f64]) -> Coupling {
        let arity = self.arity();
        if row.len() < arity || !row[..arity].iter().all(|v| v.is_finite()) {
            return *self;
        }
        match self {
            Coupling::LogisticGrowth { .. } => Coupling::LogisticGrowth {
                a: row[0],
                b: row[1],
            },
            Coupling::Affine { .. } => Coupling::Affine {
                a: row[0],
                b: row[1],
            },
            Coupling::Step { .. } => Coupling::Step {
                low: row[0],
                threshold: row[1],
                high: row[2],
            },
            Coupling::Rational { .. } => Coupling::Rational {
                a: row[0],
                b: row[1],
            },
            Coupling::RationalOffset { .. } => Coupling::RationalOffset {
                a: row[0],
                b: row[1],
                c: row[2],
            },
            Coupling::Sigmoid { .. } => Coupling::Sigmoid {
                scale: row[0],
                shift: row[1],
            },
        }
    }

    /// Weight in `[0, 1]` for the component value `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        let value = match *self {
            Coupling::LogisticGrowth { a, b } => {
                let e = x.exp();
                a * e / (1.0 + b * (e - 1.0))
            }
            Coupling::Affine { a, b } => scaled(a * x + b, a.abs() + b.abs()),
            Coupling::Step {
                low,
                threshold,
                high,
            } => {
                if x < threshold {
                    low
                } else {
                    high
                }
            }
            Coupling::Rational { a, b } => scaled(a / (x + b).max(RATIONAL_FLOOR), a / b),
            Coupling::RationalOffset { a, b, c } => {
                scaled(a / (x + b).max(RATIONAL_FLOOR) + c, a / b + c)
            }
            Coupling::Sigmoid { scale, shift } => 1.0 / (1.0 + (-(x * scale - shift)).exp()),
        };
        clip_unit(value)
    }
}

/// The twelve coupling functions of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct CouplingTable {
    pub functions: [Coupling; COUPLING_COUNT],
}

impl Default for CouplingTable {
    fn default() -> Self {
        Self {
            functions: DEFAULT_COUPLINGS,
        }
    }
}

impl CouplingTable {
    /// Builds the table from coefficient rows, position `i` feeding `f{i+1}`.
    /// Absent or malformed rows keep the documented defaults.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let functions = std::array::from_fn(|i| {
            let default = DEFAULT_COUPLINGS[i];
            match rows.get(i) {
                Some(row) => {
                    if !row.is_empty() && row.len() < default.arity() {
                        tracing::debug!(
                            function = i + 1,
                            width = row.len(),
                            "coupling row under-sized; using defaults"
                        );
                    }
                    default.with_row(row)
                }
                None => default,
            }
        });
        Self { functions }
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.functions.iter().map(Coupling::coefficients).collect()
    }

    /// Weights `f1..f12` for an already safety-clamped state.
    pub fn evaluate(&self, safe_state: &LossState) -> [f64; COUPLING_COUNT] {
        std::array::from_fn(|i| self.functions[i].evaluate(safe_state[WIRING[i].index()]))
    }
}

impl From<Vec<Vec<f64>>> for CouplingTable {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        Self::from_rows(&rows)
    }
}

impl From<CouplingTable> for Vec<Vec<f64>> {
    fn from(table: CouplingTable) -> Self {
        table.rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn default_couplings_match_hand_computed_values() {
        let table = CouplingTable::default();
        let values = table.evaluate(&[0.5, 0.7, 0.9, 0.4, 0.5]);
        let expected = [
            0.710949502625004,
            0.988235294117647,
            0.5,
            0.9940170940170941,
            0.9510204081632653,
            0.9600000000000001,
            0.9565217391304347,
            0.9744525547445255,
            0.6681877721681662,
            0.995940959409594,
            0.9991038696537679,
            0.9285714285714286,
        ];
        for (actual, expected) in values.iter().zip(expected) {
            assert_close(*actual, expected);
        }
    }

    #[test]
    fn step_switches_at_threshold() {
        let step = DEFAULT_COUPLINGS[2];
        assert_eq!(step.evaluate(0.39), 0.3);
        assert_eq!(step.evaluate(0.4), 0.5);
    }

    #[test]
    fn rational_denominator_is_floored() {
        let rational = Coupling::Rational { a: 1.0, b: -1.0 };
        // x + b = -0.5 is floored to 0.01; a/b = -1 flips the sign.
        // 1/0.01 / -1 = -100, clamped to 0.
        assert_eq!(rational.evaluate(0.5), 0.0);
        // -1/0.01 / (a/b = 1) = -100, also clamped to 0.
        let rational = Coupling::Rational { a: -1.0, b: -1.0 };
        assert_eq!(rational.evaluate(0.5), 0.0);
        // x + b = 0.005 is floored to 0.01: 1/0.01 / (a/b = 200) = 0.5, not 1.
        let rational = Coupling::Rational { a: 1.0, b: 0.005 };
        assert!((rational.evaluate(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn outputs_stay_in_unit_interval_for_adversarial_coefficients() {
        let extremes = [-1e300, -1e6, -1.0, -1e-300, 0.0, 1e-300, 1.0, 1e6, 1e300];
        let inputs = [1e-4, 0.25, 0.5, 0.9999];
        for &a in &extremes {
            for &b in &extremes {
                for &c in &extremes {
                    for default in DEFAULT_COUPLINGS {
                        let coupling = default.with_row(&[a, b, c]);
                        for &x in &inputs {
                            let value = coupling.evaluate(x);
                            assert!(
                                (0.0..=1.0).contains(&value),
                                "{coupling:?} at {x} gave {value}"
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn malformed_rows_fall_back_to_defaults() {
        let rows = vec![
            vec![],
            vec![1.0],
            vec![0.1, 0.2],
            vec![f64::NAN, 1.0],
        ];
        let table = CouplingTable::from_rows(&rows);
        assert_eq!(table.functions[0], DEFAULT_COUPLINGS[0]);
        assert_eq!(table.functions[1], DEFAULT_COUPLINGS[1]);
        // The step needs three coefficients.
        assert_eq!(table.functions[2], DEFAULT_COUPLINGS[2]);
        assert_eq!(table.functions[3], DEFAULT_COUPLINGS[3]);
        for i in 4..COUPLING_COUNT {
            assert_eq!(table.functions[i], DEFAULT_COUPLINGS[i]);
        }
    }

    #[test]
    fn rows_round_trip_through_the_table() {
        let mut rows = CouplingTable::default().rows();
        rows[4] = vec![2.0, 3.0, 99.0];
        let table = CouplingTable::from_rows(&rows);
        assert_eq!(table.functions[4], Coupling::Affine { a: 2.0, b: 3.0 });
        assert_eq!(table.rows()[4], vec![2.0, 3.0]);
    }
}
