// HiGHS backend adapter.
//
// Translates the integer program to the HiGHS row-problem API and honors
// the wall-clock and thread budgets.

use highs::{HighsModelStatus, RowProblem, Sense};

use super::model::{ConstraintSense, IntegerProgram};
use super::{BackendOutcome, BackendStatus, MipBackend, SolveLimits};
use crate::domain::SolverError;

pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MipBackend for HighsSolver {
    fn solve(
        &self,
        model: &IntegerProgram,
        limits: &SolveLimits,
    ) -> Result<BackendOutcome, SolverError> {
        let mut pb = RowProblem::default();
        let mut cols = Vec::with_capacity(model.variables.len());

        for (i, var_def) in model.variables.iter().enumerate() {
            let obj_coeff = model.objective.get(i).copied().unwrap_or(0.0);
            cols.push(pb.add_integer_column(obj_coeff, var_def.lower..=var_def.upper));
        }

        for constraint in &model.constraints {
            let terms: Vec<_> = constraint
                .terms
                .iter()
                .filter(|(_, coeff)| *coeff != 0)
                .map(|&(i, coeff)| (cols[i], coeff as f64))
                .collect();
            let bound = constraint.bound as f64;
            match constraint.sense {
                ConstraintSense::LessOrEqual => {
                    pb.add_row(..=bound, &terms);
                }
                ConstraintSense::Equal => {
                    pb.add_row(bound..=bound, &terms);
                }
                ConstraintSense::GreaterOrEqual => {
                    pb.add_row(bound.., &terms);
                }
            }
        }

        let mut highs_model = pb.optimise(Sense::Maximise);
        if let Some(secs) = limits.time_limit_secs {
            highs_model.set_option("time_limit", secs);
        }
        if let Some(threads) = limits.threads {
            highs_model.set_option("threads", threads as i32);
        }

        let solved = highs_model.solve();
        match solved.status() {
            HighsModelStatus::Optimal => {
                let values = solved.get_solution().columns().to_vec();
                Ok(BackendOutcome {
                    status: BackendStatus::Optimal,
                    values,
                })
            }
            HighsModelStatus::Infeasible => {
                Ok(BackendOutcome::unsolved(BackendStatus::Infeasible))
            }
            HighsModelStatus::ReachedTimeLimit => {
                // Keep the incumbent if the search found one before expiry.
                let values = solved.get_solution().columns().to_vec();
                if values.is_empty() {
                    Ok(BackendOutcome::unsolved(BackendStatus::Unknown))
                } else {
                    Ok(BackendOutcome {
                        status: BackendStatus::Feasible,
                        values,
                    })
                }
            }
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                Ok(BackendOutcome::unsolved(BackendStatus::Unknown))
            }
            status => Err(SolverError::ExecutionFailed(format!(
                "HiGHS returned status {status:?}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "HiGHS"
    }
}
