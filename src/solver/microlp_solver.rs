// microlp backend adapter via good_lp.
//
// Pure Rust, always available; branch-and-bound without a time limit, so
// the wall-clock budget is noted and ignored.

use good_lp::{
    solvers::microlp, variable, variables, Expression, ResolutionError,
    Solution as GoodLpSolutionTrait, SolverModel, Variable as GoodLpVariable,
};
use tracing::debug;

use super::model::{ConstraintSense, IntegerProgram};
use super::{BackendOutcome, BackendStatus, MipBackend, SolveLimits};
use crate::domain::SolverError;

pub struct MicrolpSolver;

impl MicrolpSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MicrolpSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MipBackend for MicrolpSolver {
    fn solve(
        &self,
        model: &IntegerProgram,
        limits: &SolveLimits,
    ) -> Result<BackendOutcome, SolverError> {
        if limits.time_limit_secs.is_some() {
            debug!("microlp does not support a wall-clock limit; solving to completion");
        }

        let mut vars = variables!();
        let mut lp_variables: Vec<GoodLpVariable> = Vec::new();
        for var_def in &model.variables {
            let var = vars.add(
                variable()
                    .integer()
                    .min(var_def.lower)
                    .max(var_def.upper),
            );
            lp_variables.push(var);
        }

        let mut obj_expr: Expression = 0.into();
        for (i, &coeff) in model.objective.iter().enumerate() {
            if coeff != 0.0 {
                obj_expr += coeff * lp_variables[i];
            }
        }

        let mut lp_model = vars.maximise(obj_expr).using(microlp::microlp);
        for constraint in &model.constraints {
            let mut lhs: Expression = 0.into();
            for &(i, coeff) in &constraint.terms {
                if coeff != 0 {
                    lhs += coeff as f64 * lp_variables[i];
                }
            }
            let bound = constraint.bound as f64;
            lp_model = match constraint.sense {
                ConstraintSense::LessOrEqual => lp_model.with(lhs.leq(bound)),
                ConstraintSense::Equal => lp_model.with(lhs.eq(bound)),
                ConstraintSense::GreaterOrEqual => lp_model.with(lhs.geq(bound)),
            };
        }

        match lp_model.solve() {
            Ok(sol) => {
                let values = lp_variables.iter().map(|&v| sol.value(v)).collect();
                Ok(BackendOutcome {
                    status: BackendStatus::Optimal,
                    values,
                })
            }
            Err(ResolutionError::Infeasible) => {
                Ok(BackendOutcome::unsolved(BackendStatus::Infeasible))
            }
            // A bounded binary program cannot be unbounded; treat it as a
            // backend anomaly rather than a model verdict.
            Err(ResolutionError::Unbounded) => Ok(BackendOutcome::unsolved(BackendStatus::Unknown)),
            Err(e) => Err(SolverError::ExecutionFailed(format!("{e:?}"))),
        }
    }

    fn name(&self) -> &'static str {
        "microlp"
    }

    fn supports_time_limit(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::model::{BinaryVariable, LinearConstraint};

    fn binary(key: &str) -> BinaryVariable {
        BinaryVariable {
            initiative_key: key.to_string(),
            lower: 0.0,
            upper: 1.0,
        }
    }

    #[test]
    fn solves_a_tiny_knapsack_to_optimality() {
        // max 3a + 2b subject to 2a + 2b <= 2: pick a only.
        let model = IntegerProgram {
            variables: vec![binary("a"), binary("b")],
            constraints: vec![LinearConstraint {
                name: "cap".to_string(),
                sense: ConstraintSense::LessOrEqual,
                terms: vec![(0, 2), (1, 2)],
                bound: 2,
            }],
            objective: vec![3.0, 2.0],
        };
        let outcome = MicrolpSolver::new()
            .solve(&model, &SolveLimits::default())
            .unwrap();
        assert_eq!(outcome.status, BackendStatus::Optimal);
        assert!(outcome.values[0] > 0.5);
        assert!(outcome.values[1] < 0.5);
    }

    #[test]
    fn reports_infeasible_when_fixations_conflict_with_a_cap() {
        // a fixed to 1 but cap forbids it.
        let mut forced = binary("a");
        forced.lower = 1.0;
        let model = IntegerProgram {
            variables: vec![forced],
            constraints: vec![LinearConstraint {
                name: "cap".to_string(),
                sense: ConstraintSense::LessOrEqual,
                terms: vec![(0, 10)],
                bound: 5,
            }],
            objective: vec![1.0],
        };
        let outcome = MicrolpSolver::new()
            .solve(&model, &SolveLimits::default())
            .unwrap();
        assert_eq!(outcome.status, BackendStatus::Infeasible);
        assert!(outcome.values.is_empty());
    }
}
