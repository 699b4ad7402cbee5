//! Relative motions derived from the pose-pair sequence.
//!
//! For pairs `(A_0, B_0), (A_1, B_1), ...` the first pair is the reference and
//! every later pair `i` yields
//!
//! ```text
//! A'_i = A_0^-1 * A_i
//! B'_i = B_0^-1 * B_i
//! ```
//!
//! stored as axis-angle rotation + translation, the form consumed by the
//! AX = XB solvers.

use crate::{exp_so3, log_so3, Iso3, PosePair, Real, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};

/// One relative motion of both chains with respect to the reference pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeMotion {
    /// Axis-angle rotation of chain A (`angle * unit_axis`).
    pub rotation_a: Vec3,
    pub translation_a: Vec3,
    /// Axis-angle rotation of chain B (`angle * unit_axis`).
    pub rotation_b: Vec3,
    pub translation_b: Vec3,
}

impl RelativeMotion {
    /// Build a motion from the two relative rigid transforms `A'` and `B'`.
    pub fn from_isometries(motion_a: &Iso3, motion_b: &Iso3) -> Self {
        Self {
            rotation_a: log_so3(&motion_a.rotation),
            translation_a: motion_a.translation.vector,
            rotation_b: log_so3(&motion_b.rotation),
            translation_b: motion_b.translation.vector,
        }
    }

    /// Relative transform of chain A.
    pub fn motion_a(&self) -> Iso3 {
        Iso3::from_parts(self.translation_a.into(), exp_so3(&self.rotation_a))
    }

    /// Relative transform of chain B.
    pub fn motion_b(&self) -> Iso3 {
        Iso3::from_parts(self.translation_b.into(), exp_so3(&self.rotation_b))
    }

    pub fn angle_a(&self) -> Real {
        self.rotation_a.norm()
    }

    pub fn angle_b(&self) -> Real {
        self.rotation_b.norm()
    }
}

/// Convert the pose-pair sequence into relative motions against `pairs[0]`.
///
/// Returns `pairs.len() - 1` motions (none for an empty or single-pair
/// input). Pure: the same input always yields the same output.
pub fn derive_all(pairs: &[PosePair]) -> Vec<RelativeMotion> {
    let Some((reference, rest)) = pairs.split_first() else {
        return Vec::new();
    };

    let a0_inv = reference.pose_a.inverse();
    let b0_inv = reference.pose_b.inverse();

    rest.iter()
        .enumerate()
        .map(|(idx, pair)| {
            let motion_a = a0_inv * pair.pose_a;
            let motion_b = b0_inv * pair.pose_b;
            let motion = RelativeMotion::from_isometries(&motion_a, &motion_b);
            debug!(
                "motion #{}: |t_a| = {:.6} vs |t_b| = {:.6}, angle_a = {:.6} rad, angle_b = {:.6} rad",
                idx + 1,
                motion.translation_a.norm(),
                motion.translation_b.norm(),
                motion.angle_a(),
                motion.angle_b()
            );
            motion
        })
        .collect()
}

/// Thresholds for the advisory motion-quality check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionQualityOptions {
    /// Motions rotating less than this (degrees, either chain) are flagged.
    pub min_angle_deg: Real,
    /// Two axes count as distinct when `sin` of the angle between them is at
    /// least this value.
    pub axis_parallel_eps: Real,
}

impl Default for MotionQualityOptions {
    fn default() -> Self {
        Self {
            min_angle_deg: 1.0,
            axis_parallel_eps: 1e-3,
        }
    }
}

/// Advisory data-quality summary of a motion set. Nothing is discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionQuality {
    pub num_motions: usize,
    /// Motions whose rotation (in either chain) is below the minimum angle.
    pub small_rotations: usize,
    /// Size of a greedy set of mutually non-parallel chain-A rotation axes.
    pub distinct_axes: usize,
    /// `(‖t_a‖, ‖t_b‖)` for each motion.
    pub translation_norms: Vec<(Real, Real)>,
}

impl MotionQuality {
    /// A rotation estimate needs at least two non-parallel axes.
    pub fn is_rotation_observable(&self) -> bool {
        self.distinct_axes >= 2
    }
}

/// Summarize how well a motion set constrains the AX = XB problem.
pub fn assess_motions(motions: &[RelativeMotion], opts: &MotionQualityOptions) -> MotionQuality {
    let min_angle = opts.min_angle_deg.to_radians();
    let mut small_rotations = 0;
    let mut axes: Vec<Vec3> = Vec::new();

    for m in motions {
        let angle = m.angle_a().min(m.angle_b());
        if angle < min_angle {
            small_rotations += 1;
            continue;
        }

        let axis = m.rotation_a / m.angle_a();
        let is_new = axes
            .iter()
            .all(|known| known.cross(&axis).norm() >= opts.axis_parallel_eps);
        if is_new {
            axes.push(axis);
        }
    }

    MotionQuality {
        num_motions: motions.len(),
        small_rotations,
        distinct_axes: axes.len(),
        translation_norms: motions
            .iter()
            .map(|m| (m.translation_a.norm(), m.translation_b.norm()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion};

    fn pose(angles: (Real, Real, Real), t: (Real, Real, Real)) -> Iso3 {
        Iso3::from_parts(
            Translation3::new(t.0, t.1, t.2),
            UnitQuaternion::from_euler_angles(angles.0, angles.1, angles.2),
        )
    }

    fn pairs(n: usize) -> Vec<PosePair> {
        (0..n)
            .map(|k| {
                let kf = k as Real;
                PosePair::new(
                    pose((0.1 * kf, -0.05 * kf, 0.2), (0.1 * kf, 0.0, 0.8)),
                    pose((0.3, 0.02 * kf, -0.1 * kf), (0.0, -0.1 * kf, 1.2)),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn empty_and_single_pair_produce_no_motions() {
        assert!(derive_all(&[]).is_empty());
        assert!(derive_all(&pairs(1)).is_empty());
    }

    #[test]
    fn yields_one_motion_per_non_reference_pair() {
        let input = pairs(6);
        let motions = derive_all(&input);
        assert_eq!(motions.len(), 5);

        let expected_a = input[0].pose_a.inverse() * input[1].pose_a;
        let expected_b = input[0].pose_b.inverse() * input[1].pose_b;
        let (dt_a, dr_a) = crate::pose_error(&motions[0].motion_a(), &expected_a);
        let (dt_b, dr_b) = crate::pose_error(&motions[0].motion_b(), &expected_b);
        assert!(dt_a < 1e-12 && dr_a < 1e-12);
        assert!(dt_b < 1e-12 && dr_b < 1e-12);
    }

    #[test]
    fn derivation_is_deterministic() {
        let input = pairs(4);
        assert_eq!(derive_all(&input), derive_all(&input));
    }

    #[test]
    fn pure_translation_gives_zero_rotation_without_nan() {
        let a0 = pose((0.2, 0.1, -0.3), (0.0, 0.0, 0.0));
        let mut a1 = a0;
        a1.translation.vector += nalgebra::Vector3::new(0.1, 0.2, 0.3);
        let b0 = pose((0.0, 0.0, 0.0), (1.0, 0.0, 0.0));
        let b1 = pose((0.0, 0.0, 0.0), (1.0, 0.5, 0.0));

        let motions = derive_all(&[
            PosePair::new(a0, b0).unwrap(),
            PosePair::new(a1, b1).unwrap(),
        ]);
        let m = &motions[0];
        assert!(m.rotation_a.iter().all(|v| v.is_finite()));
        assert!(m.rotation_a.norm() < 1e-12);
        assert_eq!(m.rotation_b, Vec3::zeros());
        assert!((m.translation_b - Vec3::new(0.0, 0.5, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn quality_flags_parallel_axes_and_small_rotations() {
        let about_z = |angle: Real| {
            RelativeMotion::from_isometries(
                &pose((0.0, 0.0, angle), (0.1, 0.0, 0.0)),
                &pose((0.0, 0.0, angle), (0.2, 0.0, 0.0)),
            )
        };
        let motions = vec![about_z(0.3), about_z(0.6), about_z(1e-4)];
        let quality = assess_motions(&motions, &MotionQualityOptions::default());
        assert_eq!(quality.num_motions, 3);
        assert_eq!(quality.small_rotations, 1);
        assert_eq!(quality.distinct_axes, 1);
        assert!(!quality.is_rotation_observable());
        assert!((quality.translation_norms[0].1 - 0.2).abs() < 1e-12);
    }
}
