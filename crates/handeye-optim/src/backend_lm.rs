use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport, TerminationStatus};
use handeye_core::Real;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::debug;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use std::cell::RefCell;

/// Cost history observed through residual evaluations.
///
/// The first evaluation is the initial cost; every later evaluation is a
/// trial step, counted as successful when it lowers the best cost so far.
#[derive(Debug, Default)]
struct StepTrace {
    initial_cost: Option<Real>,
    best_cost: Real,
    successful: usize,
    unsuccessful: usize,
    evaluations: usize,
}

impl StepTrace {
    fn record(&mut self, cost: Real) {
        self.evaluations += 1;
        match self.initial_cost {
            None => {
                self.initial_cost = Some(cost);
                self.best_cost = cost;
            }
            Some(_) if cost < self.best_cost => {
                self.successful += 1;
                self.best_cost = cost;
            }
            Some(_) => self.unsuccessful += 1,
        }
    }
}

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<Real>,
    trace: RefCell<StepTrace>,
}

impl<'a, P: NllsProblem> LeastSquaresProblem<Real, Dyn, Dyn> for LmWrapper<'a, P> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        let r = self.problem.residuals(&self.params);
        if r.iter().any(|v| !v.is_finite()) {
            return None;
        }
        self.trace.borrow_mut().record(0.5 * r.norm_squared());
        Some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        let j = self.problem.jacobian(&self.params);
        if j.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(j)
    }
}

fn termination_status(reason: &TerminationReason) -> TerminationStatus {
    match reason {
        TerminationReason::ResidualsZero
        | TerminationReason::Orthogonal
        | TerminationReason::Converged { .. } => TerminationStatus::Convergence,
        TerminationReason::NoImprovementPossible(_) => TerminationStatus::NoImprovement,
        TerminationReason::LostPatience => TerminationStatus::NoConvergence,
        _ => TerminationStatus::Failure,
    }
}

/// Levenberg–Marquardt backend (MINPACK port) with step accounting.
#[derive(Debug, Default, Clone)]
pub struct LmBackend;

impl NllsSolverBackend for LmBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        debug_assert_eq!(x0.len(), problem.num_params());
        let lm = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_patience(opts.max_iters.max(1));

        let wrapper = LmWrapper {
            problem,
            params: x0,
            trace: RefCell::new(StepTrace::default()),
        };

        let (wrapper, report) = lm.minimize(wrapper);
        let x_opt = wrapper.params();
        let trace = wrapper.trace.into_inner();
        let termination = termination_status(&report.termination);
        debug!(
            "LM finished: {:?} after {} evaluations (cost {:.3e})",
            report.termination, report.number_of_evaluations, report.objective_function
        );

        let initial_cost = trace.initial_cost.unwrap_or(Real::NAN);
        // same evaluation as the trace so an unchanged x reports an unchanged cost
        let final_cost = match problem.cost(&x_opt) {
            c if c.is_finite() => c,
            _ => trace.best_cost,
        };

        (
            x_opt,
            SolveReport {
                initial_cost,
                final_cost,
                successful_steps: trace.successful,
                unsuccessful_steps: trace.unsuccessful,
                evaluations: trace.evaluations,
                termination,
            },
        )
    }
}
