//! Local linearisation of a right-hand side, used to judge stiffness before
//! choosing an integrator.

use crate::error::{LossError, LossResult};
use crate::traits::DynamicalSystem;
use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::Serialize;

/// Eigenvalues with `|Re λ|` below this are ignored by the stiffness ratio.
pub const REAL_PART_FLOOR: f64 = 1e-10;

/// Central-difference Jacobian `∂f_i/∂x_j` at `(s, state)`, row-major.
pub fn jacobian(
    system: &impl DynamicalSystem<f64>,
    s: f64,
    state: &[f64],
) -> LossResult<Vec<f64>> {
    let dim = system.dimension();
    if state.len() != dim {
        return Err(LossError::Shape(format!(
            "state has {} components, system expects {dim}",
            state.len()
        )));
    }

    let mut jac = vec![0.0; dim * dim];
    let mut shifted = state.to_vec();
    let mut forward = vec![0.0; dim];
    let mut backward = vec![0.0; dim];

    for j in 0..dim {
        let h = 1e-6 * state[j].abs().max(1.0);
        shifted[j] = state[j] + h;
        system.apply(s, &shifted, &mut forward);
        shifted[j] = state[j] - h;
        system.apply(s, &shifted, &mut backward);
        shifted[j] = state[j];

        for i in 0..dim {
            jac[i * dim + j] = (forward[i] - backward[i]) / (2.0 * h);
        }
    }
    Ok(jac)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StiffnessReport {
    pub dimension: usize,
    pub jacobian: Vec<f64>,
    /// Sorted by descending real part.
    pub eigenvalues: Vec<Complex64>,
    /// Largest real part; positive means locally expanding.
    pub spectral_abscissa: f64,
    /// `max|Re λ| / min|Re λ|`, `None` when no eigenvalue has a usable real part.
    pub stiffness_ratio: Option<f64>,
}

impl StiffnessReport {
    pub fn is_stiff(&self, threshold: f64) -> bool {
        self.stiffness_ratio.is_some_and(|r| r > threshold)
    }
}

pub fn stiffness_report(
    system: &impl DynamicalSystem<f64>,
    s: f64,
    state: &[f64],
) -> LossResult<StiffnessReport> {
    let dim = system.dimension();
    if dim == 0 {
        return Err(LossError::Shape("system has no state components".into()));
    }
    let jac = jacobian(system, s, state)?;
    if jac.iter().any(|v| !v.is_finite()) {
        return Err(LossError::Numerical(format!(
            "non-finite Jacobian entry at s={s}"
        )));
    }

    let matrix = DMatrix::from_row_slice(dim, dim, &jac);
    let mut eigenvalues: Vec<Complex64> = matrix.complex_eigenvalues().iter().copied().collect();
    if eigenvalues.iter().any(|l| !l.re.is_finite() || !l.im.is_finite()) {
        return Err(LossError::Numerical("eigenvalue computation diverged".into()));
    }
    eigenvalues.sort_by(|a, b| b.re.total_cmp(&a.re).then(b.im.total_cmp(&a.im)));

    let spectral_abscissa = eigenvalues
        .iter()
        .map(|l| l.re)
        .fold(f64::NEG_INFINITY, f64::max);

    let magnitudes: Vec<f64> = eigenvalues
        .iter()
        .map(|l| l.re.abs())
        .filter(|m| *m > REAL_PART_FLOOR)
        .collect();
    let stiffness_ratio = if magnitudes.is_empty() {
        None
    } else {
        let max = magnitudes.iter().copied().fold(0.0, f64::max);
        let min = magnitudes.iter().copied().fold(f64::INFINITY, f64::min);
        Some(max / min)
    };

    tracing::debug!(
        spectral_abscissa,
        stiffness_ratio = ?stiffness_ratio,
        "local stiffness at s={s}"
    );

    Ok(StiffnessReport {
        dimension: dim,
        jacobian: jac,
        eigenvalues,
        spectral_abscissa,
        stiffness_ratio,
    })
}
