//! Scenario input: raw (possibly textual) parameters, their coercion to
//! numbers, and validation before a run.

use crate::coupling::{CouplingTable, COUPLING_COUNT, DEFAULT_COUPLINGS};
use crate::error::{LossError, LossResult};
use crate::perturbation::{PerturbationTable, MAX_COEFFICIENTS, PERTURBATION_COUNT};
use crate::state::{LossState, STATE_DIM};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Widest coupling row accepted at the input boundary.
pub const MAX_COUPLING_WIDTH: usize = 5;

/// Fallbacks for absent inputs.
pub const DEFAULT_INITIAL: f64 = 0.5;
pub const DEFAULT_RESTRICTION: f64 = 1.0;

/// A number as it arrives from a form or file: either numeric or text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    pub fn to_f64(&self, field: &str) -> LossResult<f64> {
        match self {
            RawNumber::Number(v) => Ok(*v),
            RawNumber::Text(text) => {
                text.trim()
                    .parse::<f64>()
                    .map_err(|_| LossError::NotNumeric {
                        field: field.to_string(),
                        value: text.clone(),
                    })
            }
        }
    }
}

impl From<f64> for RawNumber {
    fn from(value: f64) -> Self {
        RawNumber::Number(value)
    }
}

/// Parameters before coercion. Absent sections take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawScenario {
    #[serde(default, alias = "initial_equations", skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<Vec<RawNumber>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Vec<RawNumber>>,
    #[serde(default, alias = "faks", skip_serializing_if = "Option::is_none")]
    pub perturbations: Option<Vec<Vec<RawNumber>>>,
    #[serde(default, alias = "equations", skip_serializing_if = "Option::is_none")]
    pub couplings: Option<Vec<Vec<RawNumber>>>,
    #[serde(default, alias = "time_value", skip_serializing_if = "Option::is_none")]
    pub time: Option<RawNumber>,
}

fn coerce_vector(values: &[RawNumber], name: &str) -> LossResult<LossState> {
    if values.len() != STATE_DIM {
        return Err(LossError::Shape(format!(
            "{name} must have {STATE_DIM} values, got {}",
            values.len()
        )));
    }
    let mut out = [0.0; STATE_DIM];
    for (i, value) in values.iter().enumerate() {
        out[i] = value.to_f64(&format!("{name}[{i}]"))?;
    }
    Ok(out)
}

fn coerce_rows(
    rows: &[Vec<RawNumber>],
    name: &str,
    expected: usize,
    max_width: usize,
) -> LossResult<Vec<Vec<f64>>> {
    if rows.len() != expected {
        return Err(LossError::Shape(format!(
            "{name} must have {expected} rows, got {}",
            rows.len()
        )));
    }
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() > max_width {
                return Err(LossError::Shape(format!(
                    "{name}[{i}] has {} coefficients, at most {max_width} allowed",
                    row.len()
                )));
            }
            row.iter()
                .enumerate()
                .map(|(j, v)| v.to_f64(&format!("{name}[{i}][{j}]")))
                .collect()
        })
        .collect()
}

impl RawScenario {
    /// Casts every entry to `f64` and checks table shapes.
    ///
    /// Coupling rows are checked here because the coupling table replaces
    /// unusable rows with defaults and would hide bad input.
    pub fn coerce(&self) -> LossResult<Scenario> {
        let initial_state = match &self.initial_state {
            Some(values) => coerce_vector(values, "initial_state")?,
            None => [DEFAULT_INITIAL; STATE_DIM],
        };
        let restrictions = match &self.restrictions {
            Some(values) => coerce_vector(values, "restrictions")?,
            None => [DEFAULT_RESTRICTION; STATE_DIM],
        };

        let perturbations = match &self.perturbations {
            Some(rows) => {
                let rows =
                    coerce_rows(rows, "perturbations", PERTURBATION_COUNT, MAX_COEFFICIENTS)?;
                let mut table = PerturbationTable::default();
                for (slot, row) in table.rows.iter_mut().zip(rows) {
                    *slot = row;
                }
                table
            }
            None => PerturbationTable::zeroed(),
        };

        let couplings = match &self.couplings {
            Some(rows) => {
                let rows = coerce_rows(rows, "couplings", COUPLING_COUNT, MAX_COUPLING_WIDTH)?;
                for (i, row) in rows.iter().enumerate() {
                    if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                        return Err(LossError::Validation(format!(
                            "couplings[{i}][{j}] must be finite"
                        )));
                    }
                    tracing::debug!(function = i + 1, coefficients = ?row, "coupling row received");
                }
                CouplingTable::from_rows(&rows)
            }
            None => CouplingTable::default(),
        };

        let time = match &self.time {
            Some(value) => value.to_f64("time")?,
            None => 0.0,
        };

        Ok(Scenario {
            initial_state,
            restrictions,
            perturbations,
            couplings,
            time,
        })
    }
}

/// Coerced parameters of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub initial_state: LossState,
    pub restrictions: LossState,
    pub perturbations: PerturbationTable,
    pub couplings: CouplingTable,
    #[serde(default)]
    pub time: f64,
}

fn check_unit_vector(values: &LossState, name: &str) -> LossResult<()> {
    for (i, v) in values.iter().enumerate() {
        if !v.is_finite() || !(0.0..=1.0).contains(v) {
            return Err(LossError::Validation(format!(
                "{name}[{i}] (Cf{}) must be in [0, 1], got {v}",
                i + 1
            )));
        }
    }
    Ok(())
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

impl Scenario {
    pub fn validate(&self) -> LossResult<()> {
        check_unit_vector(&self.initial_state, "initial_state")?;
        check_unit_vector(&self.restrictions, "restrictions")?;

        for (i, row) in self.perturbations.rows.iter().enumerate() {
            if row.len() > MAX_COEFFICIENTS {
                return Err(LossError::Shape(format!(
                    "perturbations[{i}] has {} coefficients, at most {MAX_COEFFICIENTS} allowed",
                    row.len()
                )));
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(LossError::Validation(format!(
                    "perturbations[{i}][{j}] (x{}) must be finite",
                    i + 1
                )));
            }
        }

        for (i, function) in self.couplings.functions.iter().enumerate() {
            if function.coefficients().iter().any(|v| !v.is_finite()) {
                return Err(LossError::Validation(format!(
                    "coupling f{} has non-finite coefficients",
                    i + 1
                )));
            }
        }

        if !self.time.is_finite() {
            return Err(LossError::Validation(format!(
                "time must be finite, got {}",
                self.time
            )));
        }
        Ok(())
    }

    /// Demonstration scenario used by tests and the CLI.
    pub fn reference() -> Self {
        Self {
            initial_state: [0.5, 0.7, 0.9, 0.4, 0.5],
            restrictions: [1.0; STATE_DIM],
            perturbations: PerturbationTable::reference(),
            couplings: CouplingTable::default(),
            time: 0.5,
        }
    }

    /// Random scenario for exploration.
    ///
    /// Initial values lie in `[0.1, 0.9]`, restrictions in `[0.5, 1]`.
    /// Perturbations are affine with a small slope and an intercept in
    /// `[1, 6]`; couplings keep their families with default coefficients
    /// perturbed by up to 10%. Values are rounded the way they would be typed
    /// into a form, so a scenario survives a trip through text unchanged.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let initial_state = std::array::from_fn(|_| round_to(rng.gen_range(0.1..=0.9), 2));
        let restrictions = std::array::from_fn(|_| round_to(rng.gen_range(0.5..=1.0), 2));
        let perturbations = PerturbationTable::new(std::array::from_fn(|_| {
            vec![
                round_to(rng.gen_range(-0.25..=0.25), 2),
                round_to(rng.gen_range(1.0..=6.0), 2),
            ]
        }));
        let rows: Vec<Vec<f64>> = DEFAULT_COUPLINGS
            .iter()
            .map(|coupling| {
                coupling
                    .coefficients()
                    .into_iter()
                    .map(|v| round_to(v * (1.0 + rng.gen_range(-0.1..=0.1)), 4))
                    .collect()
            })
            .collect();

        Self {
            initial_state,
            restrictions,
            perturbations,
            couplings: CouplingTable::from_rows(&rows),
            time: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling::Coupling;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_err_contains<T: std::fmt::Debug>(result: LossResult<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn parse(json: &str) -> RawScenario {
        serde_json::from_str(json).expect("raw scenario")
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let raw = parse(
            r#"{
                "initial_equations": ["0.1", 0.2, " 0.3 ", "4e-1", 0.5],
                "time_value": "0.25"
            }"#,
        );
        let scenario = raw.coerce().expect("coerce");
        assert_eq!(scenario.initial_state, [0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(scenario.time, 0.25);
        scenario.validate().expect("valid");
    }

    #[test]
    fn non_numeric_text_names_the_field() {
        let mut rows = vec![vec![RawNumber::from(0.0), RawNumber::from(1.0)]; PERTURBATION_COUNT];
        rows[3][1] = RawNumber::Text("abc".into());
        let raw = RawScenario {
            perturbations: Some(rows),
            ..RawScenario::default()
        };
        let err = raw.coerce().expect_err("should fail");
        assert_eq!(
            err,
            LossError::NotNumeric {
                field: "perturbations[3][1]".into(),
                value: "abc".into(),
            }
        );
    }

    #[test]
    fn absent_sections_take_defaults() {
        let scenario = RawScenario::default().coerce().expect("coerce");
        assert_eq!(scenario.initial_state, [DEFAULT_INITIAL; STATE_DIM]);
        assert_eq!(scenario.restrictions, [DEFAULT_RESTRICTION; STATE_DIM]);
        assert_eq!(scenario.perturbations, PerturbationTable::zeroed());
        assert_eq!(scenario.couplings, CouplingTable::default());
        assert_eq!(scenario.time, 0.0);
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        let raw = parse(r#"{"initial_state": [0.1, 0.2, 0.3, 0.4]}"#);
        assert_err_contains(raw.coerce(), "initial_state must have 5 values");

        let raw = parse(r#"{"restrictions": [1, 1, 1, 1, 1, 1]}"#);
        assert_err_contains(raw.coerce(), "restrictions must have 5 values");

        let raw = parse(r#"{"faks": [[1, 2]]}"#);
        assert_err_contains(raw.coerce(), "perturbations must have 14 rows");

        let raw = RawScenario {
            couplings: Some(vec![vec![RawNumber::from(1.0); 6]; COUPLING_COUNT]),
            ..RawScenario::default()
        };
        assert_err_contains(raw.coerce(), "at most 5 allowed");
    }

    #[test]
    fn narrow_coupling_rows_fall_back_without_error() {
        let mut rows = vec![vec![RawNumber::from(0.4), RawNumber::from(2.0)]; COUPLING_COUNT];
        rows[2] = vec![RawNumber::from(0.9)];
        let raw = RawScenario {
            couplings: Some(rows),
            ..RawScenario::default()
        };
        let scenario = raw.coerce().expect("coerce");
        assert_eq!(scenario.couplings.functions[2], DEFAULT_COUPLINGS[2]);
        assert_eq!(
            scenario.couplings.functions[1],
            Coupling::Affine { a: 0.4, b: 2.0 }
        );
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let raw = parse(r#"{"initial_state": [0.1, 1.2, 0.3, 0.4, 0.5]}"#);
        let scenario = raw.coerce().expect("coerce");
        assert_err_contains(scenario.validate(), "initial_state[1] (Cf2)");

        let mut scenario = Scenario::reference();
        scenario.restrictions[4] = -0.1;
        assert_err_contains(scenario.validate(), "restrictions[4]");

        let mut scenario = Scenario::reference();
        scenario.time = f64::INFINITY;
        assert_err_contains(scenario.validate(), "time must be finite");

        let mut scenario = Scenario::reference();
        scenario.perturbations.rows[0] = vec![f64::NAN, 1.0];
        assert_err_contains(scenario.validate(), "perturbations[0][0]");

        let raw = parse(r#"{"time": "nan"}"#);
        assert_err_contains(raw.coerce().and_then(|s| s.validate()), "time");
    }

    #[test]
    fn random_scenarios_validate_and_are_seeded() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let scenario = Scenario::random(&mut rng);
            scenario.validate().expect("random scenario is valid");
            assert!(scenario.initial_state.iter().all(|v| (0.1..=0.9).contains(v)));
            assert!(scenario.restrictions.iter().all(|v| (0.5..=1.0).contains(v)));
        }
        let a = Scenario::random(&mut StdRng::seed_from_u64(42));
        let b = Scenario::random(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn serialized_scenario_reads_back_as_raw_input() {
        let scenario = Scenario::reference();
        let json = serde_json::to_string(&scenario).expect("serialize");
        let raw: RawScenario = serde_json::from_str(&json).expect("raw");
        assert_eq!(raw.coerce().expect("coerce"), scenario);
    }
}
