//! Non-linear refinement of the hand-eye transform `X` in `A X = X B`.
//!
//! Parameter vector: `[ω_x, ω_y, ω_z, t_x, t_y, t_z]`, where `ω` is the
//! axis-angle of the rotation of `X`.
//!
//! Each relative motion contributes a 6-vector residual comparing both sides
//! of the equation as rigid transforms:
//!
//! ```text
//! r_rot = log( (R_A R_X)^T (R_X R_B) )
//! r_tra = (R_A t_X + t_A) - (R_X t_B + t_X)
//! ```

use crate::backend_lm::LmBackend;
use crate::robust::RobustKernel;
use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use handeye_core::{exp_so3, log_so3, Iso3, Mat3, Quat, Real, RelativeMotion, Vec3};
use log::{debug, info};
use nalgebra::{DMatrix, DVector, SVector, Translation3};
use serde::{Deserialize, Serialize};

pub const PARAM_DIM: usize = 6;
pub const RESIDUAL_DIM: usize = 6;

/// Step used for the central differences of the rotation columns.
const ROTATION_FD_STEP: Real = 1e-6;

#[derive(Debug, Clone, Copy)]
struct MotionBlock {
    rot_a: Quat,
    rot_a_mat: Mat3,
    tra_a: Vec3,
    rot_b: Quat,
    tra_b: Vec3,
}

impl MotionBlock {
    fn new(m: &RelativeMotion) -> Self {
        let rot_a = exp_so3(&m.rotation_a);
        Self {
            rot_a,
            rot_a_mat: rot_a.to_rotation_matrix().into_inner(),
            tra_a: m.translation_a,
            rot_b: exp_so3(&m.rotation_b),
            tra_b: m.translation_b,
        }
    }

    fn residual(&self, rot_x: &Quat, tra_x: &Vec3) -> SVector<Real, RESIDUAL_DIM> {
        let lhs_rot = self.rot_a * rot_x;
        let rhs_rot = rot_x * self.rot_b;
        let r_rot = log_so3(&(lhs_rot.inverse() * rhs_rot));

        let lhs_tra = self.rot_a_mat * tra_x + self.tra_a;
        let rhs_tra = rot_x * self.tra_b + tra_x;
        let r_tra = lhs_tra - rhs_tra;

        let mut r = SVector::<Real, RESIDUAL_DIM>::zeros();
        r.fixed_rows_mut::<3>(0).copy_from(&r_rot);
        r.fixed_rows_mut::<3>(3).copy_from(&r_tra);
        r
    }
}

/// Least-squares problem over all relative motions.
#[derive(Debug, Clone)]
pub struct AxxbProblem {
    blocks: Vec<MotionBlock>,
    robust: RobustKernel,
}

impl AxxbProblem {
    pub fn new(motions: &[RelativeMotion], robust: RobustKernel) -> Self {
        Self {
            blocks: motions.iter().map(MotionBlock::new).collect(),
            robust,
        }
    }

    pub fn num_motions(&self) -> usize {
        self.blocks.len()
    }

    /// Robust loss `½ Σ ρ(‖r_i‖²)` over motion blocks.
    ///
    /// Equals the solver cost when no kernel is set.
    pub fn robust_loss(&self, x: &DVector<Real>) -> Real {
        let r = self.residuals_unweighted(x);
        let total: Real = (0..self.blocks.len())
            .map(|idx| {
                let r2 = r.rows(RESIDUAL_DIM * idx, RESIDUAL_DIM).norm_squared();
                self.robust.rho_and_weight(r2).0
            })
            .sum();
        0.5 * total
    }
}

/// Pack a transform into the parameter vector.
pub fn pack_params(x: &Iso3) -> DVector<Real> {
    let omega = log_so3(&x.rotation);
    let t = x.translation.vector;
    DVector::from_vec(vec![omega.x, omega.y, omega.z, t.x, t.y, t.z])
}

/// Decode the parameter vector into a transform.
pub fn unpack_params(x: &DVector<Real>) -> Iso3 {
    debug_assert_eq!(x.len(), PARAM_DIM);
    let (rot, tra) = split_params(x);
    Iso3::from_parts(Translation3::from(tra), rot)
}

fn split_params(x: &DVector<Real>) -> (Quat, Vec3) {
    let omega = Vec3::new(x[0], x[1], x[2]);
    (exp_so3(&omega), Vec3::new(x[3], x[4], x[5]))
}

impl NllsProblem for AxxbProblem {
    fn num_params(&self) -> usize {
        PARAM_DIM
    }

    fn num_residuals(&self) -> usize {
        RESIDUAL_DIM * self.blocks.len()
    }

    fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real> {
        let (rot_x, tra_x) = split_params(x);
        let mut r = DVector::zeros(self.num_residuals());
        for (idx, block) in self.blocks.iter().enumerate() {
            r.fixed_rows_mut::<RESIDUAL_DIM>(RESIDUAL_DIM * idx)
                .copy_from(&block.residual(&rot_x, &tra_x));
        }
        r
    }

    fn jacobian_unweighted(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let omega = Vec3::new(x[0], x[1], x[2]);
        let tra_x = Vec3::new(x[3], x[4], x[5]);
        let mut j = DMatrix::zeros(self.num_residuals(), PARAM_DIM);

        for (idx, block) in self.blocks.iter().enumerate() {
            let row = RESIDUAL_DIM * idx;

            // rotation columns: central differences in ω
            for k in 0..3 {
                let mut step = Vec3::zeros();
                step[k] = ROTATION_FD_STEP;
                let r_plus = block.residual(&exp_so3(&(omega + step)), &tra_x);
                let r_minus = block.residual(&exp_so3(&(omega - step)), &tra_x);
                let col = (r_plus - r_minus) / (2.0 * ROTATION_FD_STEP);
                j.view_mut((row, k), (RESIDUAL_DIM, 1)).copy_from(&col);
            }

            // translation columns: r_tra is affine in t_X, r_rot does not depend on it
            j.view_mut((row + 3, 3), (3, 3))
                .copy_from(&(block.rot_a_mat - Mat3::identity()));
        }

        j
    }

    fn robust_row_scales(&self, r_unweighted: &DVector<Real>) -> DVector<Real> {
        let mut scales = DVector::from_element(r_unweighted.len(), 1.0);
        if self.robust == RobustKernel::None {
            return scales;
        }
        for idx in 0..self.blocks.len() {
            let r2 = r_unweighted
                .rows(RESIDUAL_DIM * idx, RESIDUAL_DIM)
                .norm_squared();
            scales
                .rows_mut(RESIDUAL_DIM * idx, RESIDUAL_DIM)
                .fill(self.robust.row_scale(r2));
        }
        scales
    }
}

/// Options for [`refine_handeye`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineOptions {
    pub solve: SolveOptions,
    pub robust: RobustKernel,
}

/// Refine an initial hand-eye estimate over all relative motions.
///
/// Returns the optimizer's parameters as a transform together with the
/// solver report. The caller decides whether to accept the result.
pub fn refine_handeye(
    motions: &[RelativeMotion],
    init: &Iso3,
    opts: &RefineOptions,
) -> (Iso3, SolveReport) {
    let problem = AxxbProblem::new(motions, opts.robust);
    let x0 = pack_params(init);
    let (x_opt, report) = LmBackend.solve(&problem, x0, &opts.solve);
    if opts.robust != RobustKernel::None {
        debug!(
            "robust loss after refinement: {:.6e}",
            problem.robust_loss(&x_opt)
        );
    }
    info!(
        "hand-eye refinement: cost {:.6e} -> {:.6e}, {} successful / {} unsuccessful steps, {}",
        report.initial_cost,
        report.final_cost,
        report.successful_steps,
        report.unsuccessful_steps,
        report.termination
    );
    (unpack_params(&x_opt), report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use handeye_core::synthetic::SyntheticHandEye;
    use handeye_core::pose_error;
    use nalgebra::UnitQuaternion;

    fn ground_truth() -> Iso3 {
        Iso3::from_parts(
            Translation3::new(0.05, 0.03, 0.15),
            UnitQuaternion::from_euler_angles(0.1, -0.05, 0.15),
        )
    }

    #[test]
    fn residual_vanishes_at_ground_truth() {
        let x = ground_truth();
        let motions = SyntheticHandEye::new(x, 4).relative_motions(5);
        let problem = AxxbProblem::new(&motions, RobustKernel::None);
        let r = problem.residuals(&pack_params(&x));
        assert_eq!(r.len(), 30);
        assert!(r.amax() < 1e-12, "max residual {}", r.amax());
    }

    #[test]
    fn pack_unpack_roundtrip() {
        let x = ground_truth();
        let (dt, dr) = pose_error(&x, &unpack_params(&pack_params(&x)));
        assert!(dt < 1e-15 && dr < 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_differences_in_translation() {
        let motions = SyntheticHandEye::new(ground_truth(), 8).relative_motions(3);
        let problem = AxxbProblem::new(&motions, RobustKernel::None);
        let x = pack_params(&Iso3::from_parts(
            Translation3::new(0.1, 0.0, 0.2),
            UnitQuaternion::from_euler_angles(0.2, 0.0, 0.1),
        ));
        let j = problem.jacobian(&x);

        let h = 1e-6;
        for k in 3..6 {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[k] += h;
            xm[k] -= h;
            let col = (problem.residuals(&xp) - problem.residuals(&xm)) / (2.0 * h);
            assert!((col - j.column(k)).amax() < 1e-7);
        }
    }

    #[test]
    fn refinement_recovers_from_perturbed_start() {
        let x_gt = ground_truth();
        let motions = SyntheticHandEye::new(x_gt, 21).relative_motions(6);
        let start = Iso3::from_parts(
            Translation3::new(0.0, 0.1, 0.1),
            UnitQuaternion::from_euler_angles(0.2, 0.05, 0.0),
        );

        let (x_est, report) = refine_handeye(&motions, &start, &RefineOptions::default());
        let (dt, dr) = pose_error(&x_est, &x_gt);
        assert!(dt < 1e-6 && dr < 1e-6, "dt={dt}, dr={dr}");
        assert!(report.final_cost < report.initial_cost);
        assert!(report.successful_steps > 0);
        assert!(report.termination.is_usable(), "{:?}", report);
    }

    #[test]
    fn robust_loss_matches_cost_without_kernel() {
        let motions = SyntheticHandEye::new(ground_truth(), 6).relative_motions(4);
        let far = pack_params(&Iso3::translation(0.5, -0.2, 0.3));

        let plain = AxxbProblem::new(&motions, RobustKernel::None);
        assert_eq!(plain.num_params(), PARAM_DIM);
        let cost = plain.cost(&far);
        assert!((plain.robust_loss(&far) - cost).abs() <= 1e-12 * cost);

        let huber = AxxbProblem::new(&motions, RobustKernel::Huber { delta: 1e-2 });
        assert!(huber.robust_loss(&far) < cost);
        assert!(huber.robust_loss(&far) > 0.0);
    }

    #[test]
    fn huber_downweights_large_blocks() {
        let motions = SyntheticHandEye::new(ground_truth(), 2).relative_motions(2);
        let problem = AxxbProblem::new(&motions, RobustKernel::Huber { delta: 1e-3 });
        let far = pack_params(&Iso3::translation(1.0, 1.0, 1.0));
        let r = problem.residuals_unweighted(&far);
        let scales = problem.robust_row_scales(&r);
        assert!(scales.iter().all(|s| *s < 1.0));
        assert_eq!(scales[0], scales[5]);
    }
}
