//! Core types for AX = XB hand-eye calibration.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec3`, `Iso3`, ...) and SO(3) helpers,
//! - the [`PosePairStore`] holding captured absolute pose pairs,
//! - the relative-motion deriver ([`derive_all`]) feeding the solvers,
//! - the [`PoseSource`] collaborator trait used by capture sessions,
//! - deterministic synthetic data generators.

mod error;
/// Linear algebra type aliases and SO(3) helpers.
pub mod math;
/// Relative motions and data-quality diagnostics.
pub mod motion;
/// Pose pairs and their undoable store.
pub mod pose;
/// Pose acquisition collaborator.
pub mod source;
/// Deterministic synthetic data for tests and examples.
pub mod synthetic;

pub use error::PoseError;
pub use math::*;
pub use motion::*;
pub use pose::*;
pub use source::*;
