// Raw constraint/target declaration rows as they arrive from external
// sheets or tables: loosely typed, tolerant of unknown extra fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One raw governance constraint declaration.
///
/// `dimension_key` doubles as the generic key field: the slice key for
/// capacity rows, the bundle identifier for bundle rows and the dependent
/// key for prerequisite rows. `keys` is a pipe- or semicolon-delimited
/// candidate key list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConstraintRow {
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub constraint_set: String,
    #[serde(default)]
    pub constraint_type: String,
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default)]
    pub dimension_key: Option<String>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub keys: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One raw KPI target declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTargetRow {
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub constraint_set: String,
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default)]
    pub dimension_key: Option<String>,
    #[serde(default)]
    pub kpi_key: Option<String>,
    #[serde(default)]
    pub floor_or_goal: Option<String>,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Dimension-keys that always mean "the whole portfolio".
const GLOBAL_KEYS: [&str; 4] = ["all", "global", "total", "company"];

/// Normalize a (dimension, dimension-key) pair for slice matching.
///
/// Both sides are trimmed and lowercased; empty fields default to "all";
/// a global dimension-key forces the dimension to "all".
pub fn normalize_slice(dimension: Option<&str>, dimension_key: Option<&str>) -> (String, String) {
    let mut dim = dimension.unwrap_or("").trim().to_ascii_lowercase();
    let mut key = dimension_key.unwrap_or("").trim().to_ascii_lowercase();
    if dim.is_empty() {
        dim = "all".to_string();
    }
    if key.is_empty() {
        key = "all".to_string();
    }
    if GLOBAL_KEYS.contains(&key.as_str()) {
        dim = "all".to_string();
        key = "all".to_string();
    }
    (dim, key)
}

/// A free-text key field (bundle id, dependent key): trimmed, case kept.
pub fn normalize_free_key(raw: Option<&str>) -> String {
    raw.unwrap_or("").trim().to_string()
}

/// Split a pipe- or semicolon-delimited key list, trimming entries and
/// dropping empties, preserving order and case.
pub fn split_keys(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(['|', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Deduplicate preserving first-seen order.
pub fn dedup_preserving_order(keys: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handles_both_delimiters_and_blanks() {
        assert_eq!(split_keys(Some("a | b;c||")), vec!["a", "b", "c"]);
        assert!(split_keys(None).is_empty());
        assert!(split_keys(Some("  ")).is_empty());
    }

    #[test]
    fn global_key_forces_dimension_to_all() {
        assert_eq!(
            normalize_slice(Some("Country"), Some("Company")),
            ("all".to_string(), "all".to_string())
        );
        assert_eq!(
            normalize_slice(Some(" Country "), Some(" UK ")),
            ("country".to_string(), "uk".to_string())
        );
        assert_eq!(
            normalize_slice(None, None),
            ("all".to_string(), "all".to_string())
        );
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let deduped = dedup_preserving_order(vec![
            "b".to_string(),
            "a".to_string(),
            "b".to_string(),
        ]);
        assert_eq!(deduped, vec!["b", "a"]);
    }
}
