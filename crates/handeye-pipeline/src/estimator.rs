//! AX = XB estimator: closed-form initialization followed by non-linear
//! refinement.

use crate::config::EstimatorOptions;
use crate::error::EstimationError;
use handeye_core::{validate_isometry, Iso3, Real, RelativeMotion};
use handeye_linear::{closed_form, MIN_MOTIONS};
use handeye_optim::{refine_handeye, TerminationStatus};
use log::{info, warn};

/// Outcome of a hand-eye estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationEstimate {
    /// Estimated `X` (end effector to camera).
    pub transform: Iso3,
    /// Closed-form estimate the refinement started from.
    pub initial_transform: Iso3,
    pub initial_cost: Real,
    pub final_cost: Real,
    pub successful_iterations: usize,
    pub unsuccessful_iterations: usize,
    pub termination: TerminationStatus,
    pub num_motions: usize,
}

impl CalibrationEstimate {
    pub fn change_cost(&self) -> Real {
        self.initial_cost - self.final_cost
    }

    pub fn total_iterations(&self) -> usize {
        self.successful_iterations + self.unsuccessful_iterations
    }
}

/// Estimate `X` from relative motions.
///
/// Requires at least two motions with non-parallel rotation axes. If the
/// refinement diverges or produces an invalid transform, the closed-form
/// estimate is returned with [`TerminationStatus::Failure`].
pub fn solve(
    motions: &[RelativeMotion],
    opts: &EstimatorOptions,
) -> Result<CalibrationEstimate, EstimationError> {
    if motions.len() < MIN_MOTIONS {
        return Err(EstimationError::InsufficientData {
            got: motions.len(),
            required: MIN_MOTIONS,
        });
    }

    let init = closed_form(motions)?;
    info!("closed-form initialization from {} motions done", motions.len());

    let (refined, report) = refine_handeye(motions, &init, &opts.refine_options());

    let refined_ok = report.final_cost.is_finite()
        && report.final_cost <= report.initial_cost
        && validate_isometry(&refined).is_ok();

    let estimate = if refined_ok {
        CalibrationEstimate {
            transform: refined,
            initial_transform: init,
            initial_cost: report.initial_cost,
            final_cost: report.final_cost,
            successful_iterations: report.successful_steps,
            unsuccessful_iterations: report.unsuccessful_steps,
            termination: report.termination,
            num_motions: motions.len(),
        }
    } else {
        warn!(
            "refinement rejected (cost {} -> {}, {}), keeping closed-form estimate",
            report.initial_cost, report.final_cost, report.termination
        );
        CalibrationEstimate {
            transform: init,
            initial_transform: init,
            initial_cost: report.initial_cost,
            final_cost: report.initial_cost,
            successful_iterations: report.successful_steps,
            unsuccessful_iterations: report.unsuccessful_steps,
            termination: TerminationStatus::Failure,
            num_motions: motions.len(),
        }
    };

    Ok(estimate)
}
