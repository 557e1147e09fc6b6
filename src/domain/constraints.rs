// Compiled governance constraint set: the normalized output of the
// constraint compiler and the authoritative governance input to a problem.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::value_objects::TargetKind;

/// A KPI target over one (dimension, dimension-key) slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub kind: TargetKind,
    pub value: f64,
}

/// An all-or-nothing bundle of candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub bundle_key: String,
    /// Ordered, deduplicated, at least two members.
    pub members: Vec<String>,
}

/// dimension -> dimension-key -> numeric bound.
pub type SliceBounds = BTreeMap<String, BTreeMap<String, f64>>;

/// dimension -> dimension-key -> KPI key -> target.
pub type SliceTargets = BTreeMap<String, BTreeMap<String, BTreeMap<String, TargetSpec>>>;

/// The normalized constraint set for one (scenario, constraint-set) key.
///
/// Every list is deduplicated before leaving the compiler; pair lists use an
/// order-independent canonical form (sorted within the pair).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSetPayload {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub floors: SliceBounds,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub caps: SliceBounds,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: SliceTargets,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mandatory: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bundles: Vec<Bundle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions_single: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions_pairs: Vec<(String, String)>,
    /// Dependent key -> required keys. Acyclicity is enforced by the
    /// feasibility checker, not by this type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prerequisites: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synergy_pairs: Vec<(String, String)>,
}

impl ConstraintSetPayload {
    pub fn is_empty(&self) -> bool {
        self.floors.is_empty()
            && self.caps.is_empty()
            && self.targets.is_empty()
            && self.mandatory.is_empty()
            && self.bundles.is_empty()
            && self.exclusions_single.is_empty()
            && self.exclusions_pairs.is_empty()
            && self.prerequisites.is_empty()
            && self.synergy_pairs.is_empty()
    }

    /// Iterate all (dimension, dimension-key, bound) floor entries.
    pub fn floor_entries(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        flatten_bounds(&self.floors)
    }

    /// Iterate all (dimension, dimension-key, bound) cap entries.
    pub fn cap_entries(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        flatten_bounds(&self.caps)
    }

    /// Iterate all (dimension, dimension-key, kpi-key, target) entries.
    pub fn target_entries(&self) -> impl Iterator<Item = (&str, &str, &str, TargetSpec)> {
        self.targets.iter().flat_map(|(dim, keys)| {
            keys.iter().flat_map(move |(key, kpis)| {
                kpis.iter()
                    .map(move |(kpi, spec)| (dim.as_str(), key.as_str(), kpi.as_str(), *spec))
            })
        })
    }
}

fn flatten_bounds(bounds: &SliceBounds) -> impl Iterator<Item = (&str, &str, f64)> {
    bounds.iter().flat_map(|(dim, keys)| {
        keys.iter()
            .map(move |(key, bound)| (dim.as_str(), key.as_str(), *bound))
    })
}

/// Canonical order-independent form of an unordered key pair.
pub fn canonical_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Identifies one compiled constraint set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintSetKey {
    pub scenario: String,
    pub constraint_set: String,
}

impl ConstraintSetKey {
    pub fn new(scenario: impl Into<String>, constraint_set: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            constraint_set: constraint_set.into(),
        }
    }
}
