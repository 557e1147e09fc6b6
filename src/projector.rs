// ResultProjector: audit-facing recomputation over a frozen problem and
// its solution. Never re-solves and never re-derives objective inputs; it
// replays the arithmetic recorded in the solution diagnostics.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::{OptimizationProblem, OptimizationSolution, TargetKind};
use crate::solver::model::objective_coefficient;

/// Severity of a target gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSeverity {
    Met,
    NearMiss,
    Critical,
}

/// What one candidate adds to the objective if selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateContribution {
    pub initiative_key: String,
    pub selected: bool,
    pub contribution: f64,
}

/// Achieved-vs-target diagnostics for one (slice, KPI) target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetGap {
    pub dimension: String,
    pub dimension_key: String,
    pub kpi_key: String,
    pub kind: TargetKind,
    pub target_value: f64,
    pub achieved: f64,
    /// target - achieved; positive means shortfall.
    pub gap: f64,
    pub severity: GapSeverity,
}

/// Consumer-facing projection of one run's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionReport {
    pub contributions: Vec<CandidateContribution>,
    pub target_gaps: Vec<TargetGap>,
    /// Sum of selected contributions; matches the solver's reported
    /// objective value exactly.
    pub objective_value: f64,
}

/// Recompute contributions and target gaps from frozen snapshots.
pub fn project(problem: &OptimizationProblem, solution: &OptimizationSolution) -> ProjectionReport {
    let diagnostics = &solution.diagnostics;
    let selected: HashSet<&str> = solution.selected_keys().collect();

    let mut objective_value = 0.0;
    let contributions: Vec<CandidateContribution> = problem
        .candidates
        .iter()
        .map(|candidate| {
            let contribution = objective_coefficient(candidate, diagnostics);
            let is_selected = selected.contains(candidate.initiative_key.as_str());
            if is_selected {
                objective_value += contribution;
            }
            CandidateContribution {
                initiative_key: candidate.initiative_key.clone(),
                selected: is_selected,
                contribution,
            }
        })
        .collect();

    let target_gaps = problem
        .constraints
        .target_entries()
        .map(|(dimension, dimension_key, kpi_key, target)| {
            let achieved: f64 = problem
                .slice_members(dimension, dimension_key)
                .filter(|c| selected.contains(c.initiative_key.as_str()))
                .map(|c| c.kpi_contribution(kpi_key))
                .sum();
            let gap = target.value - achieved;
            TargetGap {
                dimension: dimension.to_string(),
                dimension_key: dimension_key.to_string(),
                kpi_key: kpi_key.to_string(),
                kind: target.kind,
                target_value: target.value,
                achieved,
                gap,
                severity: classify_gap(gap, target.value),
            }
        })
        .collect();

    ProjectionReport {
        contributions,
        target_gaps,
        objective_value,
    }
}

/// met: gap <= 0; near-miss: shortfall within 5% of the target; otherwise
/// critical. A zero target with any shortfall is always critical.
fn classify_gap(gap: f64, target: f64) -> GapSeverity {
    if gap <= 0.0 {
        GapSeverity::Met
    } else if target > 0.0 && gap / target <= 0.05 {
        GapSeverity::NearMiss
    } else {
        GapSeverity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Candidate, ConstraintSetPayload, ProblemMetadata, ResolvedObjective, RunScope,
        SolverBackend, TargetSpec,
    };
    use crate::solver::{SolverAdapter, SolverConfig};
    use std::collections::BTreeMap;

    #[test]
    fn gap_classification_boundaries() {
        assert_eq!(classify_gap(0.0, 100.0), GapSeverity::Met);
        assert_eq!(classify_gap(-3.0, 100.0), GapSeverity::Met);
        assert_eq!(classify_gap(5.0, 100.0), GapSeverity::NearMiss);
        assert_eq!(classify_gap(5.1, 100.0), GapSeverity::Critical);
        // Zero target with a positive gap never divides by zero.
        assert_eq!(classify_gap(0.5, 0.0), GapSeverity::Critical);
    }

    fn candidate(key: &str, cost: f64, revenue: f64, country: Option<&str>) -> Candidate {
        let mut kpi_contributions = BTreeMap::new();
        kpi_contributions.insert("revenue".to_string(), revenue);
        Candidate {
            initiative_key: key.to_string(),
            capacity_cost: cost,
            country: country.map(str::to_string),
            department: None,
            category: None,
            program: None,
            product: None,
            segment: None,
            kpi_contributions,
        }
    }

    fn solved_fixture() -> (OptimizationProblem, OptimizationSolution) {
        let mut constraints = ConstraintSetPayload::default();
        constraints
            .targets
            .entry("country".to_string())
            .or_default()
            .entry("uk".to_string())
            .or_default()
            .insert(
                "revenue".to_string(),
                TargetSpec {
                    kind: TargetKind::Goal,
                    value: 30.0,
                },
            );
        let problem = OptimizationProblem {
            scenario: "base".to_string(),
            constraint_set: "default".to_string(),
            capacity_total: Some(25.0),
            objective: ResolvedObjective::NorthStar {
                kpi_key: "revenue".to_string(),
            },
            candidates: vec![
                candidate("a", 10.0, 12.0, Some("UK")),
                candidate("b", 10.0, 8.0, Some("UK")),
                candidate("c", 10.0, 20.0, Some("DE")),
            ],
            constraints,
            scope: RunScope::all_candidates(),
            metadata: ProblemMetadata::default(),
        };
        let adapter = SolverAdapter::new(SolverConfig {
            backend: SolverBackend::Microlp,
            ..SolverConfig::default()
        });
        let solution = adapter.solve(&problem).unwrap();
        (problem, solution)
    }

    #[test]
    fn projected_objective_matches_the_solver_exactly() {
        let (problem, solution) = solved_fixture();
        assert!(solution.is_solved());
        let report = project(&problem, &solution);
        assert_eq!(Some(report.objective_value), solution.objective_value);
    }

    #[test]
    fn target_gap_is_computed_over_selected_slice_members_only() {
        let (problem, solution) = solved_fixture();
        // Capacity 25 fits two: the optimum is a (12) + c (20).
        let report = project(&problem, &solution);
        let gap = &report.target_gaps[0];
        assert_eq!(gap.dimension, "country");
        assert_eq!(gap.dimension_key, "uk");
        assert_eq!(gap.kind, TargetKind::Goal);
        assert_eq!(gap.achieved, 12.0);
        assert_eq!(gap.gap, 18.0);
        assert_eq!(gap.severity, GapSeverity::Critical);
    }

    #[test]
    fn contributions_flag_unselected_candidates() {
        let (problem, solution) = solved_fixture();
        let report = project(&problem, &solution);
        let by_key: BTreeMap<&str, &CandidateContribution> = report
            .contributions
            .iter()
            .map(|c| (c.initiative_key.as_str(), c))
            .collect();
        assert!(by_key["a"].selected);
        assert!(!by_key["b"].selected);
        assert!(by_key["c"].selected);
        assert_eq!(by_key["b"].contribution, 8.0);
    }
}
