//! Human-readable and persisted views of a [`CalibrationEstimate`].

use crate::estimator::CalibrationEstimate;
use handeye_core::{Iso3, Real};
use handeye_optim::TerminationStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Homogeneous matrix of a pose as row-major nested arrays.
pub(crate) fn matrix_rows(pose: &Iso3) -> [[Real; 4]; 4] {
    let h = pose.to_homogeneous();
    let mut rows = [[0.0; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = h[(r, c)];
        }
    }
    rows
}

/// Components of a rigid transform in the forms users paste into tools.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformSummary {
    /// Homogeneous matrix, row-major.
    pub matrix: [[Real; 4]; 4],
    pub translation: [Real; 3],
    /// Unit quaternion as `(x, y, z, w)`.
    pub quaternion: [Real; 4],
    /// Roll, pitch, yaw (ZYX convention), radians.
    pub rpy: [Real; 3],
}

impl TransformSummary {
    pub fn from_isometry(pose: &Iso3) -> Self {
        let t = pose.translation.vector;
        let q = pose.rotation;
        let (roll, pitch, yaw) = q.euler_angles();
        Self {
            matrix: matrix_rows(pose),
            translation: [t.x, t.y, t.z],
            quaternion: [q.i, q.j, q.k, q.w],
            rpy: [roll, pitch, yaw],
        }
    }

    /// `[tx, ty, tz, qx, qy, qz, qw]`.
    pub fn tf_vector(&self) -> [Real; 7] {
        let [tx, ty, tz] = self.translation;
        let [qx, qy, qz, qw] = self.quaternion;
        [tx, ty, tz, qx, qy, qz, qw]
    }
}

/// Solver statistics carried into the report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverMetrics {
    pub initial_cost: Real,
    pub final_cost: Real,
    pub successful_iterations: usize,
    pub unsuccessful_iterations: usize,
    pub termination: TerminationStatus,
    pub num_motions: usize,
}

impl SolverMetrics {
    pub fn change_cost(&self) -> Real {
        self.initial_cost - self.final_cost
    }

    pub fn total_iterations(&self) -> usize {
        self.successful_iterations + self.unsuccessful_iterations
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub from_frame: String,
    pub to_frame: String,
    pub forward: TransformSummary,
    pub inverse: TransformSummary,
    pub metrics: SolverMetrics,
}

impl CalibrationReport {
    pub fn new(
        estimate: &CalibrationEstimate,
        from_frame: impl Into<String>,
        to_frame: impl Into<String>,
    ) -> Self {
        Self {
            from_frame: from_frame.into(),
            to_frame: to_frame.into(),
            forward: TransformSummary::from_isometry(&estimate.transform),
            inverse: TransformSummary::from_isometry(&estimate.transform.inverse()),
            metrics: SolverMetrics {
                initial_cost: estimate.initial_cost,
                final_cost: estimate.final_cost,
                successful_iterations: estimate.successful_iterations,
                unsuccessful_iterations: estimate.unsuccessful_iterations,
                termination: estimate.termination,
                num_motions: estimate.num_motions,
            },
        }
    }
}

fn join(values: &[Real]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_matrix(f: &mut fmt::Formatter<'_>, matrix: &[[Real; 4]; 4]) -> fmt::Result {
    for row in matrix {
        writeln!(
            f,
            "{:>12.6} {:>12.6} {:>12.6} {:>12.6}",
            row[0], row[1], row[2], row[3]
        )?;
    }
    Ok(())
}

impl fmt::Display for CalibrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Result from {} to {}:", self.from_frame, self.to_frame)?;
        write_matrix(f, &self.forward.matrix)?;
        writeln!(f)?;
        writeln!(f, "Translation (x,y,z) : {}", join(&self.forward.translation))?;
        writeln!(f, "Rotation q(x,y,z,w): {}", join(&self.forward.quaternion))?;
        writeln!(f, "Rotation (roll,pitch,yaw): {}", join(&self.forward.rpy))?;
        writeln!(
            f,
            "Now you can publish tf in: [ Translation, Rotation] {} {}",
            self.from_frame, self.to_frame
        )?;
        writeln!(f)?;
        writeln!(f, "Inverted result from {} to {}:", self.to_frame, self.from_frame)?;
        write_matrix(f, &self.inverse.matrix)?;
        writeln!(f)?;
        writeln!(
            f,
            "Inverted translation (x,y,z) : {}",
            join(&self.inverse.translation)
        )?;
        writeln!(
            f,
            "Inverted rotation (x,y,z,w): {}",
            join(&self.inverse.quaternion)
        )?;
        writeln!(
            f,
            "Inverted rotation (roll,pitch,yaw): {}",
            join(&self.inverse.rpy)
        )?;
        writeln!(f)?;
        let m = &self.metrics;
        write!(
            f,
            "Solver: {} motions, cost {:.6e} -> {:.6e} (change {:.6e}), {} iterations ({} successful, {} unsuccessful), termination {}",
            m.num_motions,
            m.initial_cost,
            m.final_cost,
            m.change_cost(),
            m.total_iterations(),
            m.successful_iterations,
            m.unsuccessful_iterations,
            m.termination
        )
    }
}

/// Persisted calibration result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// `[tx, ty, tz, qx, qy, qz, qw]`.
    #[serde(rename = "handToEyeTF")]
    pub hand_to_eye_tf: [Real; 7],
    /// Homogeneous matrix, row-major.
    #[serde(rename = "handToEyeTransform")]
    pub hand_to_eye_transform: [[Real; 4]; 4],
    pub initial_cost: Real,
    pub final_cost: Real,
    pub change_cost: Real,
    pub termination_type: TerminationStatus,
    pub num_successful_iteration: usize,
    pub num_unsuccessful_iteration: usize,
    pub num_iteration: usize,
}

impl From<&CalibrationEstimate> for CalibrationRecord {
    fn from(estimate: &CalibrationEstimate) -> Self {
        let summary = TransformSummary::from_isometry(&estimate.transform);
        Self {
            hand_to_eye_tf: summary.tf_vector(),
            hand_to_eye_transform: summary.matrix,
            initial_cost: estimate.initial_cost,
            final_cost: estimate.final_cost,
            change_cost: estimate.change_cost(),
            termination_type: estimate.termination,
            num_successful_iteration: estimate.successful_iterations,
            num_unsuccessful_iteration: estimate.unsuccessful_iterations,
            num_iteration: estimate.total_iterations(),
        }
    }
}
