use thiserror::Error;

/// Root error type for the loss model.
///
/// The dynamics themselves never fail: malformed coefficients degrade to
/// defaults and out-of-range settings are clamped. Errors come from the
/// validation boundary and from the integrators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LossError {
    /// Raw input that could not be cast to a number.
    #[error("field `{field}` is not numeric: {value:?}")]
    NotNumeric { field: String, value: String },

    /// A table or vector with the wrong number of entries.
    #[error("shape error: {0}")]
    Shape(String),

    /// A value outside its admissible range.
    #[error("validation error: {0}")]
    Validation(String),

    /// Integrator misconfiguration or failure to reach the end of the grid.
    #[error("solver error: {0}")]
    Solver(String),

    /// NaN/Inf where a finite value is required.
    #[error("numerical error: {0}")]
    Numerical(String),
}

pub type LossResult<T> = Result<T, LossError>;
