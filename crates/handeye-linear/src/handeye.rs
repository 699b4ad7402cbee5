//! Closed-form hand-eye initialization (AX = XB).
//!
//! Rotation and translation are solved separately:
//!
//! 1. Rotation: for every motion the rotation vectors satisfy
//!    `α_i = R_X β_i` (the screw angle is shared, the axis is rotated by
//!    `R_X`). Stacking all pairs gives an orthogonal Procrustes problem solved
//!    by SVD of `H = Σ α_i β_iᵀ`.
//! 2. Translation: with `R_X` fixed, `(R_Ai − I) t_X = R_X t_Bi − t_Ai` is a
//!    linear least-squares system in `t_X`.

use handeye_core::{exp_so3, iso3_from_parts, Iso3, Mat3, Real, RelativeMotion, Vec3};
use log::debug;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Minimum number of relative motions for a closed-form estimate.
pub const MIN_MOTIONS: usize = 2;

/// Ratio `σ₂ / σ₁` of the rotation correlation below which the rotation axes
/// are considered parallel.
const AXIS_DEGENERACY_RATIO: Real = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinearHandEyeError {
    #[error("need at least {required} relative motions, got {got}")]
    NotEnoughMotions { got: usize, required: usize },
    /// All rotation axes are (nearly) parallel, or all rotations vanish.
    #[error("rotation axes do not span two independent directions (singular values {0:?})")]
    DegenerateRotationAxes([Real; 3]),
    #[error("svd failed during hand-eye estimation")]
    SvdFailed,
    #[error("linear solve failed during hand-eye estimation")]
    LinearSolveFailed,
}

/// Solve the rotation part `R_X` from the axis-angle correspondences.
pub fn estimate_rotation(motions: &[RelativeMotion]) -> Result<Mat3, LinearHandEyeError> {
    ensure_enough(motions)?;

    let h = motions
        .iter()
        .fold(Mat3::zeros(), |acc, m| acc + m.rotation_a * m.rotation_b.transpose());

    let svd = h.svd(true, true);
    let s = svd.singular_values;
    let mut sorted = [s[0], s[1], s[2]];
    sorted.sort_by(|a, b| b.total_cmp(a));
    if !(sorted[0] > 0.0) || sorted[1] < AXIS_DEGENERACY_RATIO * sorted[0] {
        return Err(LinearHandEyeError::DegenerateRotationAxes(sorted));
    }

    let u = svd.u.ok_or(LinearHandEyeError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(LinearHandEyeError::SvdFailed)?;

    // Reflection guard: flip the direction of the smallest singular value.
    let mut d = Mat3::identity();
    if (u * v_t).determinant() < 0.0 {
        let smallest = (0..3).min_by(|&a, &b| s[a].total_cmp(&s[b])).unwrap_or(2);
        d[(smallest, smallest)] = -1.0;
    }
    let rot_x = u * d * v_t;

    debug!("rotation init singular values: {:?}", sorted);
    Ok(rot_x)
}

/// Solve the translation part `t_X` given the rotation `R_X`.
pub fn estimate_translation(
    motions: &[RelativeMotion],
    rot_x: &Mat3,
) -> Result<Vec3, LinearHandEyeError> {
    ensure_enough(motions)?;

    let num = motions.len();
    let mut mat_c = DMatrix::<Real>::zeros(3 * num, 3);
    let mut vec_w = DVector::<Real>::zeros(3 * num);

    for (idx, m) in motions.iter().enumerate() {
        let rot_a = exp_so3(&m.rotation_a).to_rotation_matrix().into_inner();
        mat_c
            .view_mut((3 * idx, 0), (3, 3))
            .copy_from(&(rot_a - Mat3::identity()));
        vec_w
            .rows_mut(3 * idx, 3)
            .copy_from(&(rot_x * m.translation_b - m.translation_a));
    }

    let ridge = 1e-12;
    ridge_llsq(&mat_c, &vec_w, ridge)
}

/// Closed-form estimate of `X` from all relative motions.
pub fn closed_form(motions: &[RelativeMotion]) -> Result<Iso3, LinearHandEyeError> {
    let rot_x = estimate_rotation(motions)?;
    let t_x = estimate_translation(motions, &rot_x)?;
    Ok(iso3_from_parts(&rot_x, &t_x))
}

fn ensure_enough(motions: &[RelativeMotion]) -> Result<(), LinearHandEyeError> {
    if motions.len() < MIN_MOTIONS {
        return Err(LinearHandEyeError::NotEnoughMotions {
            got: motions.len(),
            required: MIN_MOTIONS,
        });
    }
    Ok(())
}

/// Ridge-regularized least squares:
/// min ||A x - b||^2 + λ ||x||^2
fn ridge_llsq(a: &DMatrix<Real>, b: &DVector<Real>, lambda: Real) -> Result<Vec3, LinearHandEyeError> {
    let m = a.nrows();
    let n = a.ncols();
    if n != 3 {
        return Err(LinearHandEyeError::LinearSolveFailed);
    }

    // Build augmented system [A; sqrt(λ) I] x ≈ [b; 0]
    let mut a_aug = DMatrix::<Real>::zeros(m + n, n);
    a_aug.view_mut((0, 0), (m, n)).copy_from(a);
    let sqrt_lambda = lambda.sqrt();
    for i in 0..n {
        a_aug[(m + i, i)] = sqrt_lambda;
    }

    let mut b_aug = DVector::<Real>::zeros(m + n);
    b_aug.rows_mut(0, m).copy_from(b);

    let svd = a_aug.svd(true, true);
    let x = svd
        .solve(&b_aug, 1e-12)
        .map_err(|_| LinearHandEyeError::LinearSolveFailed)?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(LinearHandEyeError::LinearSolveFailed);
    }

    Ok(Vec3::new(x[0], x[1], x[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use handeye_core::synthetic::SyntheticHandEye;
    use handeye_core::{pose_error, rotation_angle};
    use nalgebra::{Rotation3, Translation3, UnitQuaternion};

    fn make_iso(angles: (Real, Real, Real), t: (Real, Real, Real)) -> Iso3 {
        let rot = Rotation3::from_euler_angles(angles.0, angles.1, angles.2);
        let tr = Translation3::new(t.0, t.1, t.2);
        Iso3::from_parts(tr, rot.into())
    }

    #[test]
    fn closed_form_recovers_ground_truth() {
        let x_gt = make_iso((0.2, -0.1, 0.05), (0.1, -0.05, 0.2));
        let motions = SyntheticHandEye::new(x_gt, 11).relative_motions(6);

        let x_est = closed_form(&motions).unwrap();
        let (dt, ang) = pose_error(&x_est, &x_gt);
        assert!(dt < 1e-9, "translation error too large: {}", dt);
        assert!(ang < 1e-9, "rotation error too large: {}", ang);
    }

    #[test]
    fn rotation_is_a_proper_rotation() {
        let x_gt = make_iso((2.0, 0.4, -1.3), (0.0, 0.3, -0.2));
        let motions = SyntheticHandEye::new(x_gt, 5).relative_motions(3);
        let r = estimate_rotation(&motions).unwrap();
        assert!((r.transpose() * r - Mat3::identity()).norm() < 1e-12);
        assert!((r.determinant() - 1.0).abs() < 1e-12);

        let q = UnitQuaternion::from_matrix(&r);
        assert!(rotation_angle(&(q.inverse() * x_gt.rotation)) < 1e-9);
    }

    #[test]
    fn two_motions_are_enough() {
        let x_gt = make_iso((0.1, 0.2, 0.3), (0.3, 0.2, 0.1));
        let motions = SyntheticHandEye::new(x_gt, 2).relative_motions(2);
        let (dt, ang) = pose_error(&closed_form(&motions).unwrap(), &x_gt);
        assert!(dt < 1e-8 && ang < 1e-9, "dt={dt}, ang={ang}");
    }

    #[test]
    fn rejects_too_few_motions() {
        let motions = SyntheticHandEye::new(Iso3::identity(), 0).relative_motions(1);
        assert_eq!(
            closed_form(&motions),
            Err(LinearHandEyeError::NotEnoughMotions {
                got: 1,
                required: 2
            })
        );
        assert!(matches!(
            closed_form(&[]),
            Err(LinearHandEyeError::NotEnoughMotions { got: 0, .. })
        ));
    }

    #[test]
    fn rejects_parallel_rotation_axes() {
        let x = make_iso((0.1, 0.0, 0.0), (0.0, 0.0, 0.1));
        let motions: Vec<RelativeMotion> = [0.3, 0.7, 1.1]
            .iter()
            .map(|&angle| {
                let b = make_iso((0.0, 0.0, angle), (0.1 * angle, 0.0, 0.0));
                RelativeMotion::from_isometries(&(x * b * x.inverse()), &b)
            })
            .collect();

        assert!(matches!(
            estimate_rotation(&motions),
            Err(LinearHandEyeError::DegenerateRotationAxes(_))
        ));
    }
}
