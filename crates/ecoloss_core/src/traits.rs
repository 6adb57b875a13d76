use crate::error::LossResult;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars by the integrators.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {
    /// Converts an `f64` literal, yielding NaN if the type cannot represent it.
    fn lit(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }
}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Right-hand side of an ODE `dy/ds = f(s, y)`.
///
/// For the loss model the independent variable `s` is the concentration `C`.
/// Implementations must be pure: solvers may evaluate the same point twice or
/// evaluate trial points that are later rejected.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// s: independent variable
    /// x: current state
    /// out: buffer receiving dx/ds
    fn apply(&self, s: T, x: &[T], out: &mut [T]);
}

/// A trait for fixed-step solvers that advance a system by one step.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size ds.
    /// s: independent variable (updated after step)
    /// state: current state (updated after step)
    fn step(&mut self, system: &impl DynamicalSystem<T>, s: &mut T, state: &mut [T], ds: T);
}

/// An initial value problem solver sampled on a fixed output grid.
///
/// Returns one state per grid point, the first being `y0` itself.
pub trait IvpSolver {
    fn solve(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        y0: &[f64],
        grid: &[f64],
    ) -> LossResult<Vec<Vec<f64>>>;
}
