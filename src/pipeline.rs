// One optimization run, start to finish: a single-threaded synchronous
// pipeline over a frozen problem snapshot.
//
// The pipeline stops early on hard infeasibility (no solve) and on
// non-solved statuses (no projection); both outcomes are recorded, not
// raised.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{OptimizationProblem, OptimizationSolution, SolverError};
use crate::feasibility::{self, FeasibilityReport};
use crate::projector::{self, ProjectionReport};
use crate::solver::SolverAdapter;

/// Every snapshot produced by one run, under stable keys, ready for the
/// external persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifacts {
    pub problem: OptimizationProblem,
    pub feasibility: FeasibilityReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<OptimizationSolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<ProjectionReport>,
}

/// Run the check -> solve -> project pipeline over one problem snapshot.
pub fn execute_run(
    problem: OptimizationProblem,
    adapter: &SolverAdapter,
) -> Result<RunArtifacts, SolverError> {
    let feasibility = feasibility::check(&problem);
    if !feasibility.is_feasible {
        warn!(
            scenario = %problem.scenario,
            errors = feasibility.errors().count(),
            "skipping solve: problem is infeasible before solving"
        );
        return Ok(RunArtifacts {
            problem,
            feasibility,
            solution: None,
            projection: None,
        });
    }

    let solution = adapter.solve(&problem)?;
    let projection = solution
        .is_solved()
        .then(|| projector::project(&problem, &solution));

    Ok(RunArtifacts {
        problem,
        feasibility,
        solution: Some(solution),
        projection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Candidate, ConstraintSetPayload, ProblemMetadata, ResolvedObjective, RunScope,
        SolveStatus, SolverBackend,
    };
    use crate::solver::SolverConfig;
    use std::collections::BTreeMap;

    fn candidate(key: &str, cost: f64, revenue: f64) -> Candidate {
        let mut kpi_contributions = BTreeMap::new();
        kpi_contributions.insert("revenue".to_string(), revenue);
        Candidate {
            initiative_key: key.to_string(),
            capacity_cost: cost,
            country: None,
            department: None,
            category: None,
            program: None,
            product: None,
            segment: None,
            kpi_contributions,
        }
    }

    fn problem(candidates: Vec<Candidate>, constraints: ConstraintSetPayload) -> OptimizationProblem {
        OptimizationProblem {
            scenario: "base".to_string(),
            constraint_set: "default".to_string(),
            capacity_total: Some(25.0),
            objective: ResolvedObjective::NorthStar {
                kpi_key: "revenue".to_string(),
            },
            candidates,
            constraints,
            scope: RunScope::all_candidates(),
            metadata: ProblemMetadata::default(),
        }
    }

    fn adapter() -> SolverAdapter {
        SolverAdapter::new(SolverConfig {
            backend: SolverBackend::Microlp,
            ..SolverConfig::default()
        })
    }

    #[test]
    fn infeasible_problems_are_never_solved() {
        let mut constraints = ConstraintSetPayload::default();
        constraints.mandatory.push("a".to_string());
        constraints.exclusions_single.push("a".to_string());
        let artifacts =
            execute_run(problem(vec![candidate("a", 1.0, 1.0)], constraints), &adapter()).unwrap();
        assert!(!artifacts.feasibility.is_feasible);
        assert!(artifacts.solution.is_none());
        assert!(artifacts.projection.is_none());
    }

    #[test]
    fn feasible_problems_produce_all_artifacts() {
        let artifacts = execute_run(
            problem(
                vec![candidate("a", 10.0, 5.0), candidate("b", 20.0, 9.0)],
                ConstraintSetPayload::default(),
            ),
            &adapter(),
        )
        .unwrap();
        assert!(artifacts.feasibility.is_feasible);
        let solution = artifacts.solution.as_ref().unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        let projection = artifacts.projection.as_ref().unwrap();
        assert_eq!(Some(projection.objective_value), solution.objective_value);
    }

    #[test]
    fn run_artifacts_round_trip_through_json() {
        let artifacts = execute_run(
            problem(vec![candidate("a", 10.0, 5.0)], ConstraintSetPayload::default()),
            &adapter(),
        )
        .unwrap();
        let json = serde_json::to_value(&artifacts).unwrap();
        // The feasibility report is always reachable under a stable key.
        assert!(json.get("feasibility").is_some());
        let back: RunArtifacts = serde_json::from_value(json).unwrap();
        assert_eq!(artifacts, back);
    }
}
