//! Non-linear least-squares refinement for hand-eye calibration.
//!
//! The solver backend is abstracted behind [`NllsSolverBackend`]; problems
//! implement [`NllsProblem`] and provide residuals and Jacobians over a dense
//! parameter vector.

pub mod backend_lm;
pub mod problems;
pub mod robust;
mod traits;

pub use crate::backend_lm::LmBackend;
pub use crate::problems::axxb::{refine_handeye, AxxbProblem, RefineOptions};
pub use crate::robust::RobustKernel;
pub use crate::traits::{
    NllsProblem, NllsSolverBackend, SolveOptions, SolveReport, TerminationStatus,
};
