// ConstraintCompiler: validates and normalizes raw constraint/target
// declarations into grouped, typed constraint sets.
//
// A malformed row never aborts the batch; it contributes a validation
// message and is dropped from the compiled output.

pub mod rows;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::domain::{
    canonical_pair, Bundle, ConstraintKind, ConstraintSetKey, ConstraintSetPayload, Severity,
    TargetKind, TargetSpec,
};
pub use rows::{RawConstraintRow, RawTargetRow};
use rows::{dedup_preserving_order, normalize_free_key, normalize_slice, split_keys};

/// One validation finding, keyed back to the originating declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub scenario: String,
    pub constraint_set: String,
    pub constraint_type: String,
    pub dimension: String,
    pub dimension_key: String,
    pub severity: Severity,
    pub message: String,
}

/// Output of one compile pass over a raw declaration batch.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    pub sets: BTreeMap<ConstraintSetKey, ConstraintSetPayload>,
    pub messages: Vec<ValidationMessage>,
}

impl CompileOutput {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationMessage> {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Error)
    }
}

/// Compile raw constraint and target rows into normalized constraint sets,
/// grouped by (scenario, constraint-set) key.
pub fn compile(constraint_rows: &[RawConstraintRow], target_rows: &[RawTargetRow]) -> CompileOutput {
    let mut out = CompileOutput::default();

    for row in constraint_rows {
        compile_constraint_row(row, &mut out);
    }
    for row in target_rows {
        compile_target_row(row, &mut out);
    }

    for (key, payload) in out.sets.iter_mut() {
        finalize_payload(key, payload, &mut out.messages);
    }
    out.sets.retain(|_, payload| !payload.is_empty());
    out
}

fn row_key(scenario: &str, constraint_set: &str) -> Option<ConstraintSetKey> {
    let scenario = scenario.trim();
    let constraint_set = constraint_set.trim();
    if scenario.is_empty() || constraint_set.is_empty() {
        return None;
    }
    Some(ConstraintSetKey::new(scenario, constraint_set))
}

#[allow(clippy::too_many_arguments)]
fn push_message(
    messages: &mut Vec<ValidationMessage>,
    key: &ConstraintSetKey,
    constraint_type: &str,
    dimension: &str,
    dimension_key: &str,
    severity: Severity,
    message: impl Into<String>,
) {
    messages.push(ValidationMessage {
        scenario: key.scenario.clone(),
        constraint_set: key.constraint_set.clone(),
        constraint_type: constraint_type.to_string(),
        dimension: dimension.to_string(),
        dimension_key: dimension_key.to_string(),
        severity,
        message: message.into(),
    });
}

fn compile_constraint_row(row: &RawConstraintRow, out: &mut CompileOutput) {
    let Some(key) = row_key(&row.scenario, &row.constraint_set) else {
        out.messages.push(ValidationMessage {
            scenario: row.scenario.trim().to_string(),
            constraint_set: row.constraint_set.trim().to_string(),
            constraint_type: row.constraint_type.trim().to_ascii_lowercase(),
            dimension: String::new(),
            dimension_key: String::new(),
            severity: Severity::Error,
            message: "row is missing its scenario or constraint-set name".to_string(),
        });
        return;
    };

    let raw_type = row.constraint_type.trim().to_ascii_lowercase();
    let Some(kind) = ConstraintKind::parse(&raw_type) else {
        push_message(
            &mut out.messages,
            &key,
            &raw_type,
            "",
            "",
            Severity::Error,
            format!("unknown constraint type '{raw_type}'"),
        );
        debug!(constraint_type = %raw_type, "dropping row with unknown constraint type");
        return;
    };

    let payload = out.sets.entry(key.clone()).or_default();
    let mut errors: Vec<(String, String, String)> = Vec::new();

    match kind {
        ConstraintKind::CapacityFloor | ConstraintKind::CapacityCap => {
            let (dim, dim_key) = normalize_slice(row.dimension.as_deref(), row.dimension_key.as_deref());
            let (bound, field) = match kind {
                ConstraintKind::CapacityFloor => (row.min_value, "min_value"),
                _ => (row.max_value, "max_value"),
            };
            // In-row sanity when a single row carries both bounds; a
            // crossed row is dropped before either bound reaches the
            // compiled set.
            let crossed = match (row.min_value, row.max_value) {
                (Some(min), Some(max)) if min > max => {
                    errors.push((
                        dim.clone(),
                        dim_key.clone(),
                        format!("min_value {min} exceeds max_value {max}"),
                    ));
                    true
                }
                _ => false,
            };
            match bound {
                _ if crossed => {}
                None => errors.push((
                    dim.clone(),
                    dim_key.clone(),
                    format!("{kind} requires {field}"),
                )),
                Some(b) if b < 0.0 => errors.push((
                    dim.clone(),
                    dim_key.clone(),
                    format!("{kind} bound must be non-negative, got {b}"),
                )),
                Some(b) => {
                    let bounds = match kind {
                        ConstraintKind::CapacityFloor => &mut payload.floors,
                        _ => &mut payload.caps,
                    };
                    bounds
                        .entry(dim.clone())
                        .or_default()
                        .insert(dim_key.clone(), b);
                    if b == 0.0 {
                        push_message(
                            &mut out.messages,
                            &key,
                            kind.as_str(),
                            &dim,
                            &dim_key,
                            Severity::Warning,
                            format!("{kind} bound is exactly 0"),
                        );
                    }
                }
            }
        }
        ConstraintKind::Mandatory => {
            let keys = split_keys(row.keys.as_deref());
            if keys.is_empty() {
                errors.push(("".into(), "".into(), "mandatory requires at least one key".into()));
            } else {
                payload.mandatory.extend(keys);
            }
        }
        ConstraintKind::BundleAllOrNothing => {
            let bundle_key = normalize_free_key(row.dimension_key.as_deref());
            let members = dedup_preserving_order(split_keys(row.keys.as_deref()));
            if members.is_empty() {
                errors.push((
                    "".into(),
                    bundle_key.clone(),
                    "bundle requires at least one member".into(),
                ));
            } else {
                payload.bundles.push(Bundle { bundle_key, members });
            }
        }
        ConstraintKind::ExcludePair => {
            let keys = dedup_preserving_order(split_keys(row.keys.as_deref()));
            if keys.len() != 2 {
                errors.push((
                    "".into(),
                    "".into(),
                    format!("exclude_pair requires exactly two distinct keys, got {}", keys.len()),
                ));
            } else {
                payload.exclusions_pairs.push(canonical_pair(&keys[0], &keys[1]));
            }
        }
        ConstraintKind::ExcludeInitiative => {
            let keys = split_keys(row.keys.as_deref());
            if keys.is_empty() {
                errors.push((
                    "".into(),
                    "".into(),
                    "exclude_initiative requires at least one key".into(),
                ));
            } else {
                payload.exclusions_single.extend(keys);
            }
        }
        ConstraintKind::RequirePrereq => {
            let dependent = normalize_free_key(row.dimension_key.as_deref());
            let requirements: Vec<String> = split_keys(row.keys.as_deref())
                .into_iter()
                .filter(|k| *k != dependent)
                .collect();
            if dependent.is_empty() {
                errors.push(("".into(), "".into(), "require_prereq requires a dependent key".into()));
            } else if requirements.is_empty() {
                errors.push((
                    "".into(),
                    dependent.clone(),
                    "require_prereq requires at least one prerequisite distinct from the dependent".into(),
                ));
            } else {
                payload
                    .prerequisites
                    .entry(dependent)
                    .or_default()
                    .extend(requirements);
            }
        }
        ConstraintKind::SynergyBonus => {
            let keys = dedup_preserving_order(split_keys(row.keys.as_deref()));
            if keys.len() != 2 {
                errors.push((
                    "".into(),
                    "".into(),
                    format!("synergy_bonus requires exactly two distinct keys, got {}", keys.len()),
                ));
            } else {
                payload.synergy_pairs.push(canonical_pair(&keys[0], &keys[1]));
            }
        }
    }

    for (dim, dim_key, message) in errors {
        push_message(
            &mut out.messages,
            &key,
            kind.as_str(),
            &dim,
            &dim_key,
            Severity::Error,
            message,
        );
    }
}

fn compile_target_row(row: &RawTargetRow, out: &mut CompileOutput) {
    let Some(key) = row_key(&row.scenario, &row.constraint_set) else {
        out.messages.push(ValidationMessage {
            scenario: row.scenario.trim().to_string(),
            constraint_set: row.constraint_set.trim().to_string(),
            constraint_type: "target".to_string(),
            dimension: String::new(),
            dimension_key: String::new(),
            severity: Severity::Error,
            message: "target row is missing its scenario or constraint-set name".to_string(),
        });
        return;
    };

    let (dim, dim_key) = normalize_slice(row.dimension.as_deref(), row.dimension_key.as_deref());
    let kpi_key = row.kpi_key.as_deref().unwrap_or("").trim().to_string();
    if kpi_key.is_empty() {
        push_message(
            &mut out.messages,
            &key,
            "target",
            &dim,
            &dim_key,
            Severity::Error,
            "target row requires a KPI key",
        );
        return;
    }

    let kind = match row.floor_or_goal.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
        Some(s) if s == "floor" => TargetKind::Floor,
        Some(s) if s == "goal" => TargetKind::Goal,
        other => {
            push_message(
                &mut out.messages,
                &key,
                "target",
                &dim,
                &dim_key,
                Severity::Error,
                format!(
                    "floor_or_goal must be exactly 'floor' or 'goal', got '{}'",
                    other.unwrap_or_default()
                ),
            );
            return;
        }
    };

    let Some(value) = row.target_value else {
        push_message(
            &mut out.messages,
            &key,
            "target",
            &dim,
            &dim_key,
            Severity::Error,
            "target row requires target_value",
        );
        return;
    };

    out.sets
        .entry(key)
        .or_default()
        .targets
        .entry(dim)
        .or_default()
        .entry(dim_key)
        .or_default()
        .insert(kpi_key, TargetSpec { kind, value });
}

/// Post-pass over one compiled payload: deduplicate every list-valued
/// field and cross-check floor/cap bounds per slice.
fn finalize_payload(
    key: &ConstraintSetKey,
    payload: &mut ConstraintSetPayload,
    messages: &mut Vec<ValidationMessage>,
) {
    payload.mandatory = dedup_preserving_order(std::mem::take(&mut payload.mandatory));
    payload.exclusions_single = dedup_preserving_order(std::mem::take(&mut payload.exclusions_single));

    let mut seen_pairs = HashSet::new();
    payload
        .exclusions_pairs
        .retain(|pair| seen_pairs.insert(pair.clone()));
    let mut seen_synergy = HashSet::new();
    payload
        .synergy_pairs
        .retain(|pair| seen_synergy.insert(pair.clone()));

    let mut seen_bundles = HashSet::new();
    payload
        .bundles
        .retain(|b| seen_bundles.insert((b.bundle_key.clone(), b.members.clone())));

    for requirements in payload.prerequisites.values_mut() {
        *requirements = dedup_preserving_order(std::mem::take(requirements));
    }

    // A slice carrying both a floor and a cap must keep floor <= cap;
    // neither bound can be trusted when they cross.
    let mut conflicting: Vec<(String, String, f64, f64)> = Vec::new();
    for (dim, floor_keys) in &payload.floors {
        if let Some(cap_keys) = payload.caps.get(dim) {
            for (dim_key, &floor) in floor_keys {
                if let Some(&cap) = cap_keys.get(dim_key) {
                    if floor > cap {
                        conflicting.push((dim.clone(), dim_key.clone(), floor, cap));
                    }
                }
            }
        }
    }
    for (dim, dim_key, floor, cap) in conflicting {
        push_message(
            messages,
            key,
            "capacity_floor",
            &dim,
            &dim_key,
            Severity::Error,
            format!("floor {floor} exceeds cap {cap} for the same slice; both bounds dropped"),
        );
        if let Some(keys) = payload.floors.get_mut(&dim) {
            keys.remove(&dim_key);
        }
        if let Some(keys) = payload.caps.get_mut(&dim) {
            keys.remove(&dim_key);
        }
    }
    payload.floors.retain(|_, keys| !keys.is_empty());
    payload.caps.retain(|_, keys| !keys.is_empty());
}
