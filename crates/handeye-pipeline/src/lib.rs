//! Hand-eye calibration pipeline: estimator, reporting, persistence and the
//! interactive capture session.

pub mod config;
mod error;
pub mod estimator;
pub mod io;
pub mod report;
pub mod session;

pub use config::{EstimatorOptions, FrameConfig, HandEyeConfig};
pub use error::{EstimationError, IoError, SessionError};
pub use estimator::{solve, CalibrationEstimate};
pub use handeye_optim::{RobustKernel, SolveOptions, TerminationStatus};
pub use report::{CalibrationRecord, CalibrationReport, SolverMetrics, TransformSummary};
pub use session::{
    calibrate_from_file, CaptureOutcome, CaptureSession, FinalizeOutcome, SessionCommand,
    SessionEvent,
};
