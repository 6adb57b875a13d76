pub mod analysis;
pub mod coupling;
pub mod driver;
pub mod engine;
pub mod error;
pub mod integrate;
pub mod perturbation;
pub mod report;
pub mod scenario;
pub mod solvers;
pub mod state;
/// The `ecoloss_core` crate models how five coupled socio-economic loss fractions
/// evolve as pollutant concentration `C` is swept from 0 to 1.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (right-hand sides),
///   `Steppable` and `IvpSolver` (integrators).
/// - **Perturbations / Couplings**: the 14 exogenous signals and the 12 coupling functions.
/// - **Engine**: the boundary-preserving derivative `dCf/dC` and the `LossSystem` wrapper.
/// - **Solvers / Integrate**: RK4, adaptive Dormand-Prince, and grid-sampling drivers.
/// - **Driver**: a full concentration sweep from raw parameters to a clipped trajectory.
/// - **Scenario / Report / Analysis**: input coercion and validation, radar and chart data,
///   and local stiffness diagnostics.
pub mod traits;

pub use driver::{run, RunResult, RunSettings};
pub use error::{LossError, LossResult};
pub use scenario::{RawScenario, Scenario};
pub use state::LossState;
