use crate::PoseError;
use nalgebra::{
    Isometry3, Matrix3, Matrix4, Quaternion, Rotation3, Translation3, UnitQuaternion, Vector3,
};

pub type Real = f64;

pub type Vec3 = Vector3<Real>;
pub type Mat3 = Matrix3<Real>;
pub type Mat4 = Matrix4<Real>;
pub type Iso3 = Isometry3<Real>;
pub type Quat = UnitQuaternion<Real>;

/// Tolerance on the quaternion norm of an incoming pose.
pub const ORTHONORMAL_TOL: Real = 1e-6;

/// Tolerance on `‖RᵀR − I‖` for a rotation block read from a 4x4 matrix.
///
/// Loose enough for matrices written with a few decimals; the block is
/// projected onto SO(3) afterwards.
pub const MATRIX_ORTHONORMAL_TOL: Real = 1e-3;

/// Tolerance on the homogeneous row `[0 0 0 1]` of a 4x4 transform.
pub const HOMOGENEOUS_TOL: Real = 1e-9;

/// log: SO(3) -> so(3) as a 3-vector (axis * angle).
///
/// Uses `2·atan2(‖v‖, w)` on the quaternion, which stays accurate for tiny
/// angles where `acos` of the trace loses precision. The identity maps to the
/// zero vector.
pub fn log_so3(q: &Quat) -> Vec3 {
    let mut w = q.w;
    let mut v = q.imag();
    if w < 0.0 {
        w = -w;
        v = -v;
    }

    let n = v.norm();
    if n < 1e-10 {
        // atan2(n, w)/n -> 1/w as n -> 0
        return v * (2.0 / w);
    }
    v * (2.0 * n.atan2(w) / n)
}

/// exp: so(3) -> SO(3).
pub fn exp_so3(omega: &Vec3) -> Quat {
    UnitQuaternion::from_scaled_axis(*omega)
}

/// Rotation angle (radians, in `[0, π]`) of a unit quaternion.
pub fn rotation_angle(q: &Quat) -> Real {
    log_so3(q).norm()
}

/// Project a general 3x3 matrix to the closest rotation matrix (SO(3))
/// using SVD. Returns `None` if the decomposition is unavailable.
pub fn project_to_so3(m: &Mat3) -> Option<Mat3> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;

    // Ensure det(R) > 0
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r = u_flipped * v_t;
    }
    Some(r)
}

/// Build an isometry from a rotation matrix that is already (numerically)
/// orthonormal.
pub fn iso3_from_parts(rotation: &Mat3, translation: &Vec3) -> Iso3 {
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*rotation));
    Isometry3::from_parts(Translation3::from(*translation), rot)
}

/// Check that a pose is a proper rigid transform: finite entries and a
/// normalized rotation.
pub fn validate_isometry(pose: &Iso3) -> Result<(), PoseError> {
    let q: &Quaternion<Real> = pose.rotation.quaternion();
    let finite = q.coords.iter().all(|c| c.is_finite())
        && pose.translation.vector.iter().all(|c| c.is_finite());
    if !finite {
        return Err(PoseError::NonFinite);
    }

    let deviation = (q.norm() - 1.0).abs();
    if deviation > ORTHONORMAL_TOL {
        return Err(PoseError::NotOrthonormal { deviation });
    }
    Ok(())
}

/// Convert a homogeneous 4x4 transform into an isometry.
///
/// The upper-left block must be orthonormal with positive determinant and the
/// last row must be `[0 0 0 1]`. Small orthonormality drift (within
/// [`MATRIX_ORTHONORMAL_TOL`], e.g. from rounded decimals) is removed by
/// projecting onto SO(3).
pub fn iso3_from_matrix(m: &Mat4) -> Result<Iso3, PoseError> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(PoseError::NonFinite);
    }

    let last_row = m.fixed_view::<1, 4>(3, 0);
    let expected = [0.0, 0.0, 0.0, 1.0];
    if last_row
        .iter()
        .zip(expected.iter())
        .any(|(a, b)| (a - b).abs() > HOMOGENEOUS_TOL)
    {
        return Err(PoseError::NotHomogeneous);
    }

    let r: Mat3 = m.fixed_view::<3, 3>(0, 0).into_owned();
    let deviation = (r.transpose() * r - Mat3::identity()).norm();
    if deviation > MATRIX_ORTHONORMAL_TOL || r.determinant() <= 0.0 {
        return Err(PoseError::NotOrthonormal { deviation });
    }

    let r = project_to_so3(&r).ok_or(PoseError::NotOrthonormal { deviation })?;
    let t: Vec3 = m.fixed_view::<3, 1>(0, 3).into_owned();
    Ok(iso3_from_parts(&r, &t))
}

/// Compare two SE(3) poses via translation norm + rotation angle.
pub fn pose_error(a: &Iso3, b: &Iso3) -> (Real, Real) {
    let dt = (a.translation.vector - b.translation.vector).norm();
    let angle = rotation_angle(&(a.rotation.inverse() * b.rotation));
    (dt, angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_of_identity_is_zero() {
        let w = log_so3(&Quat::identity());
        assert_eq!(w, Vec3::zeros());
    }

    #[test]
    fn log_inverts_exp_for_small_and_large_angles() {
        for omega in [
            Vec3::new(1e-12, -2e-12, 5e-13),
            Vec3::new(1e-7, 0.0, -3e-7),
            Vec3::new(0.3, -0.2, 0.1),
            Vec3::new(0.0, 2.5, -1.2),
        ] {
            let back = log_so3(&exp_so3(&omega));
            assert!(
                (back - omega).norm() < 1e-12 * omega.norm().max(1.0),
                "log(exp({omega:?})) = {back:?}"
            );
        }
    }

    #[test]
    fn matrix_roundtrip_through_isometry() {
        let iso = Iso3::from_parts(
            Translation3::new(0.1, -0.4, 2.0),
            UnitQuaternion::from_euler_angles(0.2, -0.3, 1.1),
        );
        let back = iso3_from_matrix(&iso.to_homogeneous()).unwrap();
        let (dt, dr) = pose_error(&iso, &back);
        assert!(dt < 1e-12 && dr < 1e-12);
    }

    #[test]
    fn slightly_non_orthonormal_block_is_projected() {
        let iso = Iso3::from_parts(
            Translation3::new(0.25, -0.5, 1.0),
            UnitQuaternion::from_euler_angles(0.7, -0.4, 2.1),
        );
        let mut m = iso.to_homogeneous();
        m.fixed_view_mut::<3, 3>(0, 0).scale_mut(1.0 + 1e-5);
        let r: Mat3 = m.fixed_view::<3, 3>(0, 0).into_owned();
        let deviation = (r.transpose() * r - Mat3::identity()).norm();
        assert!(deviation > ORTHONORMAL_TOL && deviation < MATRIX_ORTHONORMAL_TOL);

        let back = iso3_from_matrix(&m).unwrap();
        assert!(validate_isometry(&back).is_ok());
        let (dt, dr) = pose_error(&iso, &back);
        assert!(dt < 1e-15 && dr < 1e-9, "dt={dt}, dr={dr}");
    }

    #[test]
    fn rejects_non_rigid_matrices() {
        let mut scaled = Mat4::identity();
        scaled[(0, 0)] = 2.0;
        assert!(matches!(
            iso3_from_matrix(&scaled),
            Err(PoseError::NotOrthonormal { .. })
        ));

        let mut reflected = Mat4::identity();
        reflected[(2, 2)] = -1.0;
        assert!(matches!(
            iso3_from_matrix(&reflected),
            Err(PoseError::NotOrthonormal { .. })
        ));

        let mut projective = Mat4::identity();
        projective[(3, 0)] = 0.5;
        assert!(matches!(
            iso3_from_matrix(&projective),
            Err(PoseError::NotHomogeneous)
        ));

        let mut nan = Mat4::identity();
        nan[(1, 3)] = Real::NAN;
        assert!(matches!(iso3_from_matrix(&nan), Err(PoseError::NonFinite)));
    }
}
