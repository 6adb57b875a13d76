//! The loss-fraction state vector and its bounds.

use serde::{Deserialize, Serialize};

/// Number of loss fractions `Cf1..Cf5`.
pub const STATE_DIM: usize = 5;

/// Margin keeping coupling inputs away from exact 0 and 1.
pub const SAFETY_EPS: f64 = 1e-4;

/// Loss fractions `[Cf1, Cf2, Cf3, Cf4, Cf5]`, each a severity in `[0, 1]`.
pub type LossState = [f64; STATE_DIM];

/// Equal weights used for the total loss when none are given.
pub const EQUAL_WEIGHTS: LossState = [0.2; STATE_DIM];

/// The five loss categories, in state-vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossComponent {
    /// Cf1: losses from increased disease burden.
    Disease,
    /// Cf2: agricultural losses.
    Agriculture,
    /// Cf3: losses from environmental degradation.
    Environment,
    /// Cf4: losses from reduced quality of life.
    QualityOfLife,
    /// Cf5: enterprise costs (emission regulation, fines).
    Enterprise,
}

impl LossComponent {
    pub const ALL: [LossComponent; STATE_DIM] = [
        LossComponent::Disease,
        LossComponent::Agriculture,
        LossComponent::Environment,
        LossComponent::QualityOfLife,
        LossComponent::Enterprise,
    ];

    pub const fn index(self) -> usize {
        match self {
            LossComponent::Disease => 0,
            LossComponent::Agriculture => 1,
            LossComponent::Environment => 2,
            LossComponent::QualityOfLife => 3,
            LossComponent::Enterprise => 4,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            LossComponent::Disease => "Cf1",
            LossComponent::Agriculture => "Cf2",
            LossComponent::Environment => "Cf3",
            LossComponent::QualityOfLife => "Cf4",
            LossComponent::Enterprise => "Cf5",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            LossComponent::Disease => "losses from population disease burden",
            LossComponent::Agriculture => "agricultural losses from atmospheric pollutants",
            LossComponent::Environment => "losses from environmental degradation",
            LossComponent::QualityOfLife => "losses from reduced quality of life",
            LossComponent::Enterprise => "enterprise losses from emission regulation and fines",
        }
    }
}

/// Clamps a value into `[0, 1]`, mapping NaN to 0.
pub fn clip_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

pub fn clip_state(state: &LossState) -> LossState {
    state.map(clip_unit)
}

/// Copy of the state clamped into `[SAFETY_EPS, 1 - SAFETY_EPS]`.
pub fn safety_clamp(state: &LossState) -> LossState {
    state.map(|v| {
        if v.is_nan() {
            SAFETY_EPS
        } else {
            v.clamp(SAFETY_EPS, 1.0 - SAFETY_EPS)
        }
    })
}

/// Weighted total loss `Σ μ_i · Cf_i`.
pub fn total_loss(state: &LossState, weights: &LossState) -> f64 {
    state.iter().zip(weights).map(|(cf, mu)| cf * mu).sum()
}
