use thiserror::Error;

/// A pose rejected because it is not a valid rigid transform.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum PoseError {
    /// At least one entry is NaN or infinite.
    #[error("pose contains non-finite values")]
    NonFinite,
    /// The rotation block is not orthonormal with positive determinant.
    #[error("rotation is not orthonormal (deviation {deviation:.3e})")]
    NotOrthonormal { deviation: f64 },
    /// The last row of the homogeneous matrix is not `[0 0 0 1]`.
    #[error("last row of homogeneous transform is not [0 0 0 1]")]
    NotHomogeneous,
}
