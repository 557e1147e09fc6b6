// The frozen, solver-ready problem snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::candidate::{Candidate, RunScope};
use super::constraints::ConstraintSetPayload;

/// Objective configuration after resolution against the KPI registry.
///
/// Unlike [`ObjectiveSpec`](super::candidate::ObjectiveSpec) this form is
/// fully validated: the north-star key exists and is active, weights are
/// checked and non-degenerate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResolvedObjective {
    NorthStar { kpi_key: String },
    WeightedKpis { weights: BTreeMap<String, f64> },
    /// Documented fallback: maximize capacity utilization.
    Lexicographic,
}

/// A governance entry dropped while sandboxing a selected_only run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDrop {
    /// Which governance list the entry came from.
    pub constraint: String,
    /// Keys that were absent from the sandboxed pool.
    pub missing_keys: Vec<String>,
    pub message: String,
}

/// Build diagnostics carried inside the problem snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemMetadata {
    /// Period end used by the deadline pre-filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
    /// Candidates excluded because their deadline falls before the period end.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_by_deadline: Vec<String>,
    pub candidates_before_deadline_filter: usize,
    pub candidates_after_deadline_filter: usize,
    /// True when the run is a selected_only sandbox and governance lists
    /// were filtered down to the pool rather than strictly validated.
    #[serde(default)]
    pub sandboxed_subset: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_drops: Vec<FilterDrop>,
    /// Per-governance-type drop counts for sandboxed runs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filter_drop_counts: BTreeMap<String, usize>,
    /// KPI contributions dropped during projection because the raw value
    /// could not be coerced to a number.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_contributions: Vec<String>,
}

/// Immutable aggregate handed to the solver adapter.
///
/// Built once per run and never mutated; each solver run operates on a
/// fresh snapshot. Serializes losslessly for audit storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationProblem {
    pub scenario: String,
    pub constraint_set: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_total: Option<f64>,
    pub objective: ResolvedObjective,
    /// Already deadline-filtered.
    pub candidates: Vec<Candidate>,
    pub constraints: ConstraintSetPayload,
    pub scope: RunScope,
    #[serde(default)]
    pub metadata: ProblemMetadata,
}

impl OptimizationProblem {
    pub fn candidate(&self, key: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.initiative_key == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.candidate(key).is_some()
    }

    /// Candidates in a (dimension, dimension-key) slice, in pool order.
    pub fn slice_members<'a>(
        &'a self,
        dimension: &'a str,
        dimension_key: &'a str,
    ) -> impl Iterator<Item = &'a Candidate> {
        self.candidates
            .iter()
            .filter(move |c| c.in_slice(dimension, dimension_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candidate::RunScope;

    fn problem_with(candidates: Vec<Candidate>) -> OptimizationProblem {
        OptimizationProblem {
            scenario: "base".to_string(),
            constraint_set: "default".to_string(),
            capacity_total: None,
            objective: ResolvedObjective::NorthStar {
                kpi_key: "revenue".to_string(),
            },
            candidates,
            constraints: ConstraintSetPayload::default(),
            scope: RunScope::all_candidates(),
            metadata: ProblemMetadata::default(),
        }
    }

    fn candidate(key: &str, country: &str) -> Candidate {
        Candidate {
            initiative_key: key.to_string(),
            capacity_cost: 1.0,
            country: Some(country.to_string()),
            department: None,
            category: None,
            program: None,
            product: None,
            segment: None,
            kpi_contributions: Default::default(),
        }
    }

    #[test]
    fn slice_members_follow_pool_order() {
        let p = problem_with(vec![
            candidate("a", "UK"),
            candidate("b", "DE"),
            candidate("c", "uk"),
        ]);
        let uk: Vec<_> = p
            .slice_members("country", "uk")
            .map(|c| c.initiative_key.as_str())
            .collect();
        assert_eq!(uk, vec!["a", "c"]);
    }

    #[test]
    fn problem_snapshot_round_trips_through_json() {
        let p = problem_with(vec![candidate("a", "UK")]);
        let json = serde_json::to_string(&p).unwrap();
        let back: OptimizationProblem = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
