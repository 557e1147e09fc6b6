// Candidate pool: raw records consumed from external state and the frozen
// projection the solver sees.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::value_objects::{KpiLevel, ObjectiveMode, ScopeKind};

/// An initiative eligible for selection in one optimization run.
///
/// Immutable once placed in a problem snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub initiative_key: String,
    /// Capacity cost in tokens, always non-negative.
    pub capacity_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    /// KPI key -> numeric contribution.
    #[serde(default)]
    pub kpi_contributions: BTreeMap<String, f64>,
}

impl Candidate {
    /// Value of a named dimension attribute, if the candidate carries it.
    ///
    /// The single seam used for slice membership everywhere (checker,
    /// builder, adapter, projector); "all" matches every candidate and is
    /// handled by the caller via [`in_slice`].
    pub fn dimension_value(&self, dimension: &str) -> Option<&str> {
        match dimension {
            "country" => self.country.as_deref(),
            "department" => self.department.as_deref(),
            "category" => self.category.as_deref(),
            "program" => self.program.as_deref(),
            "product" => self.product.as_deref(),
            "segment" => self.segment.as_deref(),
            _ => None,
        }
    }

    /// Slice membership for a (dimension, dimension-key) pair.
    ///
    /// Dimension keys are compiled to lowercase; candidate attributes are
    /// compared case-insensitively.
    pub fn in_slice(&self, dimension: &str, dimension_key: &str) -> bool {
        if dimension == "all" {
            return true;
        }
        match self.dimension_value(dimension) {
            Some(value) => value.eq_ignore_ascii_case(dimension_key),
            None => false,
        }
    }

    pub fn kpi_contribution(&self, kpi_key: &str) -> f64 {
        self.kpi_contributions.get(kpi_key).copied().unwrap_or(0.0)
    }
}

/// Whether a dimension name is one the candidate pool can be sliced by.
pub fn is_known_dimension(dimension: &str) -> bool {
    matches!(
        dimension,
        "all" | "country" | "department" | "category" | "program" | "product" | "segment"
    )
}

/// A raw candidate record as handed over by the external data layer.
///
/// Loosely typed: KPI contributions arrive as arbitrary JSON values and are
/// coerced during problem building; a missing capacity cost is a fatal
/// data-quality error there, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub initiative_key: String,
    #[serde(default)]
    pub capacity_cost: Option<f64>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub segment: Option<String>,
    #[serde(default)]
    pub kpi_contributions: BTreeMap<String, serde_json::Value>,
    /// Flagged for optimization in the resolved period.
    #[serde(default)]
    pub is_optimization_candidate: bool,
    /// Latest date by which the initiative must land; `None` means always
    /// time-feasible.
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
}

/// KPI registry entry: hierarchy level plus active flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiInfo {
    pub level: KpiLevel,
    pub active: bool,
}

/// KPI key -> registry entry, consumed for objective resolution.
pub type KpiRegistry = BTreeMap<String, KpiInfo>;

/// Objective declaration attached to a scenario, resolved against the KPI
/// registry during problem building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSpec {
    pub mode: ObjectiveMode,
    /// Required when mode is `north_star`; must resolve to exactly one
    /// active north-star KPI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub north_star_kpi_key: Option<String>,
    /// Required non-empty when mode is `weighted_kpis`; non-negative, not
    /// all zero.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub weights: BTreeMap<String, f64>,
}

/// Which candidates a run considers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunScope {
    pub kind: ScopeKind,
    /// Required non-empty iff kind is `selected_only`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initiative_keys: Vec<String>,
}

impl RunScope {
    pub fn all_candidates() -> Self {
        Self {
            kind: ScopeKind::AllCandidates,
            initiative_keys: Vec::new(),
        }
    }

    pub fn selected_only(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            kind: ScopeKind::SelectedOnly,
            initiative_keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

/// A funding scenario: capacity envelope plus objective configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Overall capacity budget in tokens; enforced alongside any per-slice
    /// caps when both are present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_total: Option<f64>,
    pub objective: ObjectiveSpec,
    /// Default period key, e.g. "2026-Q3", "2026-08" or "2026-W35".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(key: &str, country: Option<&str>) -> Candidate {
        Candidate {
            initiative_key: key.to_string(),
            capacity_cost: 10.0,
            country: country.map(str::to_string),
            department: None,
            category: None,
            program: None,
            product: None,
            segment: None,
            kpi_contributions: BTreeMap::new(),
        }
    }

    #[test]
    fn slice_all_matches_every_candidate() {
        assert!(candidate("a", None).in_slice("all", "anything"));
        assert!(candidate("b", Some("UK")).in_slice("all", "uk"));
    }

    #[test]
    fn slice_matching_is_case_insensitive_on_the_attribute() {
        let c = candidate("a", Some("UK"));
        assert!(c.in_slice("country", "uk"));
        assert!(!c.in_slice("country", "de"));
        assert!(!candidate("b", None).in_slice("country", "uk"));
    }

    #[test]
    fn unknown_dimension_matches_nothing() {
        let c = candidate("a", Some("UK"));
        assert!(!c.in_slice("region", "uk"));
        assert!(!is_known_dimension("region"));
        assert!(is_known_dimension("segment"));
    }
}
