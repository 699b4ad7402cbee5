use handeye_core::{AcquisitionError, PoseError};
use handeye_linear::LinearHandEyeError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of [`crate::solve`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EstimationError {
    #[error("insufficient data: need at least {required} relative motions, got {got}")]
    InsufficientData { got: usize, required: usize },
    #[error("closed-form initialization failed: {0}")]
    Initialization(#[from] LinearHandEyeError),
}

/// Failures reading or writing pose-pair and result files.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed pose-pair file: {0}")]
    Malformed(String),
}

impl IoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn bad_pose(key: &str, err: PoseError) -> Self {
        Self::Malformed(format!("{key}: {err}"))
    }
}

/// Failures surfaced by [`crate::CaptureSession`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error("captured pose rejected: {0}")]
    InvalidPose(#[from] PoseError),
    #[error(transparent)]
    Estimation(#[from] EstimationError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("session already finalized")]
    AlreadyFinalized,
}
