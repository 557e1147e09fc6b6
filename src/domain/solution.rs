// Structured solver output, with diagnostics sufficient for downstream
// recomputation without re-solving.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::value_objects::{SolveStatus, SolverBackend};

/// Per-candidate selection outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub initiative_key: String,
    pub selected: bool,
    /// The candidate's capacity cost if selected, otherwise 0.
    pub allocated_capacity: f64,
}

/// Statistics about the solve process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverStatistics {
    pub solve_time_ms: f64,
    pub num_variables: u32,
    pub num_constraints: u32,
}

/// Everything the result projector needs to reproduce the objective
/// arithmetic bit-for-bit: resolved objective inputs and scale factors are
/// recorded verbatim at solve time, never re-derived downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveDiagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub north_star_kpi_key: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub weights: BTreeMap<String, f64>,
    pub capacity_scale: f64,
    /// KPI key -> scale factor used for that KPI's coefficients.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kpi_scales: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<SolverBackend>,
    /// Set when a positive floor's slice had no pool candidates and the
    /// solve short-circuited without invoking the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_slice: Option<EmptySliceDiagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Names the offending slice when a floor cannot be met by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmptySliceDiagnostic {
    pub dimension: String,
    pub dimension_key: String,
    /// The KPI key for target floors, `None` for capacity floors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpi_key: Option<String>,
    pub bound: f64,
}

/// Solution to one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSolution {
    pub status: SolveStatus,
    /// One entry per pool candidate on solved statuses, empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected: Vec<SelectionEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_value: Option<f64>,
    pub capacity_used: f64,
    #[serde(default)]
    pub statistics: SolverStatistics,
    #[serde(default)]
    pub diagnostics: SolveDiagnostics,
}

impl OptimizationSolution {
    pub fn unsolved(status: SolveStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            selected: Vec::new(),
            objective_value: None,
            capacity_used: 0.0,
            statistics: SolverStatistics::default(),
            diagnostics: SolveDiagnostics {
                message: Some(message.into()),
                ..SolveDiagnostics::default()
            },
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: SolveDiagnostics) -> Self {
        let message = self.diagnostics.message.take();
        self.diagnostics = diagnostics;
        if self.diagnostics.message.is_none() {
            self.diagnostics.message = message;
        }
        self
    }

    pub fn is_solved(&self) -> bool {
        self.status.is_solved()
    }

    pub fn selected_keys(&self) -> impl Iterator<Item = &str> {
        self.selected
            .iter()
            .filter(|e| e.selected)
            .map(|e| e.initiative_key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsolved_solutions_carry_no_selection() {
        let s = OptimizationSolution::unsolved(SolveStatus::Infeasible, "no fit");
        assert!(!s.is_solved());
        assert!(s.selected.is_empty());
        assert_eq!(s.objective_value, None);
        assert_eq!(s.diagnostics.message.as_deref(), Some("no fit"));
    }

    #[test]
    fn with_diagnostics_keeps_the_unsolved_message() {
        let s = OptimizationSolution::unsolved(SolveStatus::ModelInvalid, "bad model")
            .with_diagnostics(SolveDiagnostics {
                capacity_scale: 1000.0,
                ..SolveDiagnostics::default()
            });
        assert_eq!(s.diagnostics.capacity_scale, 1000.0);
        assert_eq!(s.diagnostics.message.as_deref(), Some("bad model"));
    }
}
