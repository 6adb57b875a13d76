//! The right-hand side `dCf/dC` of the loss model.
//!
//! Each of the five governing equations balances a positive and a negative
//! driver sum over a fixed subset of the perturbations. The sums are compressed
//! with `min(1, (sum / normalizer)^power)` and weighted by products of coupling
//! functions. A reflecting boundary keeps every component inside `[0, 1]`.

use crate::coupling::{CouplingTable, COUPLING_COUNT};
use crate::perturbation::{PerturbationTable, PERTURBATION_COUNT};
use crate::state::{safety_clamp, LossState, SAFETY_EPS, STATE_DIM};
use crate::traits::DynamicalSystem;
use serde::Serialize;

pub const DEFAULT_POWER: f64 = 0.6;
pub const MIN_POWER: f64 = 0.3;
pub const MAX_POWER: f64 = 2.0;

/// Drivers and weights of one governing equation.
/// Indices are 0-based: `0` is `x1` (or `f1`).
struct Governing {
    positive: &'static [usize],
    positive_norm: f64,
    negative: &'static [usize],
    negative_norm: f64,
    /// Coupling functions multiplied into the positive term; empty means 1.
    positive_weight: &'static [usize],
    negative_weight: &'static [usize],
}

const GOVERNING: [Governing; STATE_DIM] = [
    // dCf1: disease burden
    Governing {
        positive: &[0, 3, 4, 6, 7, 8, 9, 10, 11, 12],
        positive_norm: 10.0,
        negative: &[1, 2, 5, 13],
        negative_norm: 4.0,
        positive_weight: &[0, 1],
        negative_weight: &[2],
    },
    // dCf2: agriculture
    Governing {
        positive: &[0, 3, 8, 9, 11],
        positive_norm: 5.0,
        negative: &[1, 2, 4, 5],
        negative_norm: 4.0,
        positive_weight: &[3, 4],
        negative_weight: &[5],
    },
    // dCf3: environment
    Governing {
        positive: &[0, 3, 4, 6, 7, 8, 9, 10, 11],
        positive_norm: 9.0,
        negative: &[1, 2, 5, 13],
        negative_norm: 4.0,
        positive_weight: &[],
        negative_weight: &[6],
    },
    // dCf4: quality of life
    Governing {
        positive: &[0, 3, 4, 6, 7, 8, 9, 10, 11, 12],
        positive_norm: 10.0,
        negative: &[1, 2, 5, 13],
        negative_norm: 4.0,
        positive_weight: &[7, 8, 9],
        negative_weight: &[10],
    },
    // dCf5: enterprise
    Governing {
        positive: &[0, 4],
        positive_norm: 2.0,
        negative: &[1, 2, 3, 5, 6, 7, 8, 9, 12, 13],
        negative_norm: 10.0,
        positive_weight: &[11],
        negative_weight: &[],
    },
];

/// Power-law compression `min(1, (sum / normalizer)^power)`.
pub fn compress(sum: f64, normalizer: f64, power: f64) -> f64 {
    (sum / normalizer).powf(power).min(1.0)
}

pub fn clamp_power(power: f64) -> f64 {
    if power.is_nan() {
        DEFAULT_POWER
    } else {
        power.clamp(MIN_POWER, MAX_POWER)
    }
}

/// Intermediate values of one derivative evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivativeTerms {
    pub perturbations: [f64; PERTURBATION_COUNT],
    pub couplings: [f64; COUPLING_COUNT],
    /// Compressed positive driver per equation.
    pub positive: LossState,
    /// Compressed negative driver per equation.
    pub negative: LossState,
    /// Final rates after boundary enforcement.
    pub rates: LossState,
}

/// Evaluates the model and keeps every intermediate term.
pub fn derivative_terms(
    state: &LossState,
    c: f64,
    perturbations: &PerturbationTable,
    couplings: &CouplingTable,
    scale: &LossState,
    t: f64,
    power: f64,
) -> DerivativeTerms {
    let power = clamp_power(power);
    let safe = safety_clamp(state);
    let x = perturbations.evaluate_all(t, c);
    let f = couplings.evaluate(&safe);

    let mut positive = [0.0; STATE_DIM];
    let mut negative = [0.0; STATE_DIM];
    let mut rates = [0.0; STATE_DIM];

    for (i, eq) in GOVERNING.iter().enumerate() {
        let pos_sum: f64 = eq.positive.iter().map(|&k| x[k]).sum();
        let neg_sum: f64 = eq.negative.iter().map(|&k| x[k]).sum();
        positive[i] = compress(pos_sum, eq.positive_norm, power);
        negative[i] = compress(neg_sum, eq.negative_norm, power);

        let w_pos: f64 = eq.positive_weight.iter().map(|&k| f[k]).product();
        let w_neg: f64 = eq.negative_weight.iter().map(|&k| f[k]).product();

        let mut rate = (w_pos * positive[i] - w_neg * negative[i]) / scale[i];

        // Reflecting boundary: never push a component out of [0, 1].
        if state[i] <= SAFETY_EPS && rate < 0.0 {
            rate = 0.0;
        }
        if state[i] >= 1.0 - SAFETY_EPS && rate > 0.0 {
            rate = 0.0;
        }
        rates[i] = rate;
    }

    DerivativeTerms {
        perturbations: x,
        couplings: f,
        positive,
        negative,
        rates,
    }
}

/// `dCf/dC` at concentration `c` and time `t`.
///
/// Pure: the same inputs always give the same rates, so solvers may call it
/// any number of times per step, from any thread.
pub fn derivative(
    state: &LossState,
    c: f64,
    perturbations: &PerturbationTable,
    couplings: &CouplingTable,
    scale: &LossState,
    t: f64,
    power: f64,
) -> LossState {
    derivative_terms(state, c, perturbations, couplings, scale, t, power).rates
}

/// The loss model bound to one run's tables.
/// Concentration is the independent variable; time is held fixed.
#[derive(Debug, Clone)]
pub struct LossSystem<'a> {
    pub perturbations: &'a PerturbationTable,
    pub couplings: &'a CouplingTable,
    pub scale: LossState,
    pub time: f64,
    pub power: f64,
}

impl<'a> LossSystem<'a> {
    pub fn new(perturbations: &'a PerturbationTable, couplings: &'a CouplingTable) -> Self {
        Self {
            perturbations,
            couplings,
            scale: [1.0; STATE_DIM],
            time: 0.0,
            power: DEFAULT_POWER,
        }
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    pub fn with_scale(mut self, scale: LossState) -> Self {
        self.scale = scale;
        self
    }

    pub fn rates(&self, c: f64, state: &LossState) -> LossState {
        derivative(
            state,
            c,
            self.perturbations,
            self.couplings,
            &self.scale,
            self.time,
            self.power,
        )
    }

    pub fn terms(&self, c: f64, state: &LossState) -> DerivativeTerms {
        derivative_terms(
            state,
            c,
            self.perturbations,
            self.couplings,
            &self.scale,
            self.time,
            self.power,
        )
    }
}

impl DynamicalSystem<f64> for LossSystem<'_> {
    fn dimension(&self) -> usize {
        STATE_DIM
    }

    fn apply(&self, s: f64, x: &[f64], out: &mut [f64]) {
        let mut state = [0.0; STATE_DIM];
        state.copy_from_slice(&x[..STATE_DIM]);
        out[..STATE_DIM].copy_from_slice(&self.rates(s, &state));
    }
}
