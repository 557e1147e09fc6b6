// ProblemBuilder: projects domain records into a frozen, solver-ready
// problem snapshot.
//
// Reference policy depends on scope: all_candidates runs validate
// governance references strictly (build_strict, fatal on violation);
// selected_only sandboxes filter them down to the pool (build_filtered,
// never fails, every drop recorded).

pub mod period;

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use crate::domain::{
    BuildError, Candidate, CandidateRecord, ConstraintSetKey, ConstraintSetPayload, FilterDrop,
    KpiLevel, KpiRegistry, ObjectiveMode, OptimizationProblem, ProblemMetadata, ResolvedObjective,
    RunScope, Scenario, ScopeKind,
};
use period::resolve_period_end;

/// External state a problem is built from. All maps are caller-owned; the
/// builder never touches durable storage.
#[derive(Debug, Clone, Copy)]
pub struct BuilderInputs<'a> {
    pub scenarios: &'a BTreeMap<String, Scenario>,
    pub constraint_sets: &'a BTreeMap<ConstraintSetKey, ConstraintSetPayload>,
    pub records: &'a [CandidateRecord],
    pub kpi_registry: &'a KpiRegistry,
}

/// Build exactly one frozen problem snapshot.
pub fn build(
    inputs: BuilderInputs<'_>,
    scenario_name: &str,
    constraint_set_name: &str,
    scope: RunScope,
    period_override: Option<NaiveDate>,
) -> Result<OptimizationProblem, BuildError> {
    let scenario_name = scenario_name.trim();
    let constraint_set_name = constraint_set_name.trim();

    let scenario = inputs.scenarios.get(scenario_name).ok_or_else(|| {
        BuildError::Configuration(format!("unknown scenario '{scenario_name}'"))
    })?;
    let compiled = inputs
        .constraint_sets
        .get(&ConstraintSetKey::new(scenario_name, constraint_set_name))
        .ok_or_else(|| {
            BuildError::Configuration(format!(
                "no compiled constraint set '{constraint_set_name}' for scenario '{scenario_name}'"
            ))
        })?;

    let period_end = match (period_override, scenario.period_key.as_deref()) {
        (Some(date), _) => Some(date),
        (None, Some(key)) => Some(resolve_period_end(key)?),
        (None, None) => None,
    };

    let mut metadata = ProblemMetadata {
        period_end,
        ..ProblemMetadata::default()
    };

    let pool_records = select_pool(inputs.records, &scope)?;
    metadata.candidates_before_deadline_filter = pool_records.len();

    // Deadline feasibility is enforced strictly before candidates enter the
    // problem; the solver must never see a deadline-infeasible candidate.
    let mut surviving = Vec::with_capacity(pool_records.len());
    for record in pool_records {
        match (record.deadline, period_end) {
            (Some(deadline), Some(end)) if deadline < end => {
                warn!(
                    initiative_key = %record.initiative_key,
                    %deadline,
                    period_end = %end,
                    "excluding candidate: deadline falls before the period end"
                );
                metadata
                    .excluded_by_deadline
                    .push(record.initiative_key.clone());
            }
            _ => surviving.push(record),
        }
    }
    metadata.candidates_after_deadline_filter = surviving.len();
    if surviving.is_empty() {
        // Not fatal here; the feasibility checker reports the empty pool.
        warn!(scenario = scenario_name, "candidate pool is empty after filtering");
    }

    let candidates = surviving
        .into_iter()
        .map(|record| project_candidate(record, &mut metadata))
        .collect::<Result<Vec<_>, _>>()?;

    let objective = resolve_objective(&scenario.objective, inputs.kpi_registry)?;

    let pool_keys: HashSet<&str> = candidates
        .iter()
        .map(|c| c.initiative_key.as_str())
        .collect();

    let constraints = match scope.kind {
        ScopeKind::AllCandidates => build_strict(compiled.clone(), &pool_keys)?,
        ScopeKind::SelectedOnly => {
            metadata.sandboxed_subset = true;
            let (filtered, drops, counts) = build_filtered(compiled.clone(), &pool_keys);
            for drop in &drops {
                warn!(
                    constraint = %drop.constraint,
                    missing = ?drop.missing_keys,
                    "dropping governance entry while sandboxing"
                );
            }
            metadata.filter_drops = drops;
            metadata.filter_drop_counts = counts;
            filtered
        }
    };

    info!(
        scenario = scenario_name,
        constraint_set = constraint_set_name,
        candidates = candidates.len(),
        "built optimization problem"
    );

    Ok(OptimizationProblem {
        scenario: scenario_name.to_string(),
        constraint_set: constraint_set_name.to_string(),
        capacity_total: scenario.capacity_total,
        objective,
        candidates,
        constraints,
        scope,
        metadata,
    })
}

fn select_pool<'a>(
    records: &'a [CandidateRecord],
    scope: &RunScope,
) -> Result<Vec<&'a CandidateRecord>, BuildError> {
    match scope.kind {
        ScopeKind::SelectedOnly => {
            if scope.initiative_keys.is_empty() {
                return Err(BuildError::Configuration(
                    "selected_only scope requires a non-empty initiative key list".to_string(),
                ));
            }
            let by_key: BTreeMap<&str, &CandidateRecord> = records
                .iter()
                .map(|r| (r.initiative_key.as_str(), r))
                .collect();
            let mut pool = Vec::with_capacity(scope.initiative_keys.len());
            for key in &scope.initiative_keys {
                match by_key.get(key.as_str()) {
                    Some(record) => pool.push(*record),
                    None => {
                        warn!(initiative_key = %key, "selected key has no candidate record");
                    }
                }
            }
            Ok(pool)
        }
        ScopeKind::AllCandidates => Ok(records
            .iter()
            .filter(|r| r.is_optimization_candidate)
            .collect()),
    }
}

/// Project one raw record into a frozen candidate.
///
/// A missing or negative capacity cost is a data-quality bug that must be
/// fixed upstream, never silently defaulted. Non-numeric KPI contributions
/// are dropped with a warning.
fn project_candidate(
    record: &CandidateRecord,
    metadata: &mut ProblemMetadata,
) -> Result<Candidate, BuildError> {
    let capacity_cost = match record.capacity_cost {
        Some(cost) if cost >= 0.0 => cost,
        Some(cost) => {
            return Err(BuildError::DataQuality {
                initiative_key: record.initiative_key.clone(),
                message: format!("capacity cost {cost} is negative"),
            })
        }
        None => {
            return Err(BuildError::DataQuality {
                initiative_key: record.initiative_key.clone(),
                message: "capacity cost is missing".to_string(),
            })
        }
    };

    let mut kpi_contributions = BTreeMap::new();
    for (kpi_key, raw) in &record.kpi_contributions {
        match coerce_number(raw) {
            Some(value) => {
                kpi_contributions.insert(kpi_key.clone(), value);
            }
            None => {
                warn!(
                    initiative_key = %record.initiative_key,
                    kpi_key = %kpi_key,
                    raw = %raw,
                    "dropping non-numeric KPI contribution"
                );
                metadata
                    .dropped_contributions
                    .push(format!("{}/{}", record.initiative_key, kpi_key));
            }
        }
    }

    Ok(Candidate {
        initiative_key: record.initiative_key.clone(),
        capacity_cost,
        country: record.country.clone(),
        department: record.department.clone(),
        category: record.category.clone(),
        program: record.program.clone(),
        product: record.product.clone(),
        segment: record.segment.clone(),
        kpi_contributions,
    })
}

fn coerce_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Resolve the scenario objective against the KPI registry.
fn resolve_objective(
    spec: &crate::domain::ObjectiveSpec,
    registry: &KpiRegistry,
) -> Result<ResolvedObjective, BuildError> {
    match spec.mode {
        ObjectiveMode::NorthStar => {
            let active: Vec<&String> = registry
                .iter()
                .filter(|(_, info)| info.active && info.level == KpiLevel::NorthStar)
                .map(|(key, _)| key)
                .collect();
            let kpi_key = match active.as_slice() {
                [only] => (*only).clone(),
                [] => {
                    return Err(BuildError::Configuration(
                        "north_star objective requires exactly one active north-star KPI; found none"
                            .to_string(),
                    ))
                }
                many => {
                    return Err(BuildError::Configuration(format!(
                        "north_star objective requires exactly one active north-star KPI; found {}",
                        many.len()
                    )))
                }
            };
            if let Some(declared) = &spec.north_star_kpi_key {
                if declared != &kpi_key {
                    return Err(BuildError::Configuration(format!(
                        "declared north-star KPI '{declared}' does not match the registry's active \
                         north-star '{kpi_key}'"
                    )));
                }
            }
            Ok(ResolvedObjective::NorthStar { kpi_key })
        }
        ObjectiveMode::WeightedKpis => {
            if spec.weights.is_empty() {
                return Err(BuildError::Configuration(
                    "weighted_kpis objective requires a non-empty weight map".to_string(),
                ));
            }
            let mut sum = 0.0;
            for (kpi_key, &weight) in &spec.weights {
                if weight < 0.0 {
                    return Err(BuildError::Configuration(format!(
                        "weight for KPI '{kpi_key}' is negative"
                    )));
                }
                sum += weight;
                let info = registry.get(kpi_key).ok_or_else(|| {
                    BuildError::Configuration(format!("weighted KPI '{kpi_key}' is not registered"))
                })?;
                if !info.active {
                    return Err(BuildError::Configuration(format!(
                        "weighted KPI '{kpi_key}' is inactive"
                    )));
                }
                if !matches!(info.level, KpiLevel::NorthStar | KpiLevel::Strategic) {
                    return Err(BuildError::Configuration(format!(
                        "weighted KPI '{kpi_key}' must be north_star or strategic level"
                    )));
                }
            }
            if sum == 0.0 {
                return Err(BuildError::Configuration(
                    "weighted_kpis objective weights sum to zero".to_string(),
                ));
            }
            Ok(ResolvedObjective::WeightedKpis {
                weights: spec.weights.clone(),
            })
        }
        ObjectiveMode::Lexicographic => Ok(ResolvedObjective::Lexicographic),
    }
}

/// Strict reference policy for all_candidates scope: the constraint set is
/// authoritative for the whole pool, so any governance reference to a key
/// outside it is fatal.
pub fn build_strict(
    payload: ConstraintSetPayload,
    pool: &HashSet<&str>,
) -> Result<ConstraintSetPayload, BuildError> {
    let check = |constraint: &str, keys: Vec<&String>| -> Result<(), BuildError> {
        let missing: Vec<String> = keys
            .into_iter()
            .filter(|k| !pool.contains(k.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BuildError::UnknownReference {
                constraint: constraint.to_string(),
                missing_keys: missing,
            })
        }
    };

    check("mandatory", payload.mandatory.iter().collect())?;
    check("exclude_initiative", payload.exclusions_single.iter().collect())?;
    check(
        "exclude_pair",
        payload
            .exclusions_pairs
            .iter()
            .flat_map(|(a, b)| [a, b])
            .collect(),
    )?;
    for bundle in &payload.bundles {
        check("bundle_all_or_nothing", bundle.members.iter().collect())?;
    }
    for (dependent, requirements) in &payload.prerequisites {
        let mut keys = vec![dependent];
        keys.extend(requirements);
        check("require_prereq", keys)?;
    }
    check(
        "synergy_bonus",
        payload
            .synergy_pairs
            .iter()
            .flat_map(|(a, b)| [a, b])
            .collect(),
    )?;
    Ok(payload)
}

/// Filtering reference policy for selected_only sandboxes: every governance
/// list is trimmed down to pool members; partially-satisfiable entries are
/// dropped entirely and recorded. Never fails.
pub fn build_filtered(
    mut payload: ConstraintSetPayload,
    pool: &HashSet<&str>,
) -> (ConstraintSetPayload, Vec<FilterDrop>, BTreeMap<String, usize>) {
    let mut drops = Vec::new();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut record = |constraint: &str, missing: Vec<String>, message: String| {
        *counts.entry(constraint.to_string()).or_default() += 1;
        drops.push(FilterDrop {
            constraint: constraint.to_string(),
            missing_keys: missing,
            message,
        });
    };

    payload.mandatory.retain(|key| {
        let keep = pool.contains(key.as_str());
        if !keep {
            record(
                "mandatory",
                vec![key.clone()],
                format!("mandatory '{key}' is outside the sandboxed subset"),
            );
        }
        keep
    });

    payload.exclusions_single.retain(|key| {
        let keep = pool.contains(key.as_str());
        if !keep {
            record(
                "exclude_initiative",
                vec![key.clone()],
                format!("exclusion of '{key}' is vacuous in the sandboxed subset"),
            );
        }
        keep
    });

    payload.exclusions_pairs.retain(|(a, b)| {
        let missing: Vec<String> = [a, b]
            .into_iter()
            .filter(|k| !pool.contains(k.as_str()))
            .cloned()
            .collect();
        let keep = missing.is_empty();
        if !keep {
            record(
                "exclude_pair",
                missing,
                format!("exclusion pair ('{a}', '{b}') dropped: member(s) outside the subset"),
            );
        }
        keep
    });

    payload.bundles.retain(|bundle| {
        let missing: Vec<String> = bundle
            .members
            .iter()
            .filter(|m| !pool.contains(m.as_str()))
            .cloned()
            .collect();
        let keep = missing.is_empty();
        if !keep {
            // A bundle with one absent member is dropped entirely; partial
            // all-or-nothing semantics would be meaningless.
            record(
                "bundle_all_or_nothing",
                missing,
                format!("bundle '{}' dropped: member(s) outside the subset", bundle.bundle_key),
            );
        }
        keep
    });

    let mut trimmed_prereqs = BTreeMap::new();
    for (dependent, requirements) in std::mem::take(&mut payload.prerequisites) {
        if !pool.contains(dependent.as_str()) {
            record(
                "require_prereq",
                vec![dependent.clone()],
                format!("prerequisites of '{dependent}' dropped: dependent outside the subset"),
            );
            continue;
        }
        let (present, missing): (Vec<String>, Vec<String>) = requirements
            .into_iter()
            .partition(|r| pool.contains(r.as_str()));
        if !missing.is_empty() {
            record(
                "require_prereq",
                missing,
                format!("prerequisite list of '{dependent}' trimmed to subset members"),
            );
        }
        if !present.is_empty() {
            trimmed_prereqs.insert(dependent, present);
        }
    }
    payload.prerequisites = trimmed_prereqs;

    payload.synergy_pairs.retain(|(a, b)| {
        let missing: Vec<String> = [a, b]
            .into_iter()
            .filter(|k| !pool.contains(k.as_str()))
            .cloned()
            .collect();
        let keep = missing.is_empty();
        if !keep {
            record(
                "synergy_bonus",
                missing,
                format!("synergy pair ('{a}', '{b}') dropped: member(s) outside the subset"),
            );
        }
        keep
    });

    debug!(drops = drops.len(), "sandboxed governance filtering complete");
    (payload, drops, counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bundle, KpiInfo, ObjectiveSpec};
    use serde_json::json;

    fn record(key: &str, cost: Option<f64>) -> CandidateRecord {
        CandidateRecord {
            initiative_key: key.to_string(),
            capacity_cost: cost,
            is_optimization_candidate: true,
            ..CandidateRecord::default()
        }
    }

    fn registry() -> KpiRegistry {
        let mut registry = KpiRegistry::new();
        registry.insert(
            "revenue".to_string(),
            KpiInfo {
                level: KpiLevel::NorthStar,
                active: true,
            },
        );
        registry.insert(
            "margin".to_string(),
            KpiInfo {
                level: KpiLevel::Strategic,
                active: true,
            },
        );
        registry.insert(
            "tickets".to_string(),
            KpiInfo {
                level: KpiLevel::Other,
                active: true,
            },
        );
        registry
    }

    fn scenario() -> Scenario {
        Scenario {
            name: "base".to_string(),
            capacity_total: Some(100.0),
            objective: ObjectiveSpec {
                mode: ObjectiveMode::NorthStar,
                north_star_kpi_key: None,
                weights: BTreeMap::new(),
            },
            period_key: Some("2026-Q3".to_string()),
        }
    }

    struct Fixture {
        scenarios: BTreeMap<String, Scenario>,
        constraint_sets: BTreeMap<ConstraintSetKey, ConstraintSetPayload>,
        records: Vec<CandidateRecord>,
        kpis: KpiRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let mut scenarios = BTreeMap::new();
            scenarios.insert("base".to_string(), scenario());
            let mut constraint_sets = BTreeMap::new();
            constraint_sets.insert(
                ConstraintSetKey::new("base", "default"),
                ConstraintSetPayload::default(),
            );
            Self {
                scenarios,
                constraint_sets,
                records: vec![record("a", Some(10.0)), record("b", Some(20.0))],
                kpis: registry(),
            }
        }

        fn inputs(&self) -> BuilderInputs<'_> {
            BuilderInputs {
                scenarios: &self.scenarios,
                constraint_sets: &self.constraint_sets,
                records: &self.records,
                kpi_registry: &self.kpis,
            }
        }

        fn payload_mut(&mut self) -> &mut ConstraintSetPayload {
            self.constraint_sets
                .get_mut(&ConstraintSetKey::new("base", "default"))
                .unwrap()
        }
    }

    #[test]
    fn unknown_scenario_is_fatal() {
        let fixture = Fixture::new();
        let err = build(
            fixture.inputs(),
            "nope",
            "default",
            RunScope::all_candidates(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn missing_capacity_cost_is_a_fatal_data_quality_error() {
        let mut fixture = Fixture::new();
        fixture.records.push(record("broken", None));
        let err = build(
            fixture.inputs(),
            "base",
            "default",
            RunScope::all_candidates(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::DataQuality { .. }));
    }

    #[test]
    fn deadline_before_period_end_excludes_the_candidate() {
        let mut fixture = Fixture::new();
        fixture.records[0].deadline = NaiveDate::from_ymd_opt(2026, 7, 1);
        fixture.records[1].deadline = NaiveDate::from_ymd_opt(2026, 12, 31);
        let problem = build(
            fixture.inputs(),
            "base",
            "default",
            RunScope::all_candidates(),
            None,
        )
        .unwrap();
        // Period end 2026-09-30: "a" (due July) is out, "b" (due December) stays.
        assert_eq!(problem.metadata.excluded_by_deadline, vec!["a"]);
        assert_eq!(problem.candidates.len(), 1);
        assert_eq!(problem.candidates[0].initiative_key, "b");
        assert_eq!(problem.metadata.candidates_before_deadline_filter, 2);
        assert_eq!(problem.metadata.candidates_after_deadline_filter, 1);
    }

    #[test]
    fn non_numeric_contributions_are_dropped_not_fatal() {
        let mut fixture = Fixture::new();
        fixture.records[0]
            .kpi_contributions
            .insert("revenue".to_string(), json!("12.5"));
        fixture.records[0]
            .kpi_contributions
            .insert("margin".to_string(), json!({"oops": true}));
        let problem = build(
            fixture.inputs(),
            "base",
            "default",
            RunScope::all_candidates(),
            None,
        )
        .unwrap();
        let a = problem.candidate("a").unwrap();
        assert_eq!(a.kpi_contribution("revenue"), 12.5);
        assert!(!a.kpi_contributions.contains_key("margin"));
        assert_eq!(problem.metadata.dropped_contributions, vec!["a/margin"]);
    }

    #[test]
    fn north_star_resolution_requires_exactly_one_active() {
        let mut fixture = Fixture::new();
        fixture.kpis.insert(
            "second_star".to_string(),
            KpiInfo {
                level: KpiLevel::NorthStar,
                active: true,
            },
        );
        let err = build(
            fixture.inputs(),
            "base",
            "default",
            RunScope::all_candidates(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn weighted_objective_rejects_immediate_level_kpis() {
        let mut fixture = Fixture::new();
        let scenario = fixture.scenarios.get_mut("base").unwrap();
        scenario.objective.mode = ObjectiveMode::WeightedKpis;
        scenario
            .objective
            .weights
            .insert("tickets".to_string(), 1.0);
        let err = build(
            fixture.inputs(),
            "base",
            "default",
            RunScope::all_candidates(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn weighted_objective_rejects_all_zero_weights() {
        let mut fixture = Fixture::new();
        let scenario = fixture.scenarios.get_mut("base").unwrap();
        scenario.objective.mode = ObjectiveMode::WeightedKpis;
        scenario.objective.weights.insert("revenue".to_string(), 0.0);
        scenario.objective.weights.insert("margin".to_string(), 0.0);
        let err = build(
            fixture.inputs(),
            "base",
            "default",
            RunScope::all_candidates(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn strict_scope_rejects_governance_references_outside_the_pool() {
        let mut fixture = Fixture::new();
        fixture.payload_mut().mandatory.push("ghost".to_string());
        let err = build(
            fixture.inputs(),
            "base",
            "default",
            RunScope::all_candidates(),
            None,
        )
        .unwrap_err();
        match err {
            BuildError::UnknownReference {
                constraint,
                missing_keys,
            } => {
                assert_eq!(constraint, "mandatory");
                assert_eq!(missing_keys, vec!["ghost"]);
            }
            other => panic!("expected UnknownReference, got {other:?}"),
        }
    }

    #[test]
    fn sandboxed_scope_filters_instead_of_failing() {
        let mut fixture = Fixture::new();
        {
            let payload = fixture.payload_mut();
            payload.mandatory.push("ghost".to_string());
            payload.mandatory.push("a".to_string());
            payload.bundles.push(Bundle {
                bundle_key: "wave1".to_string(),
                members: vec!["a".to_string(), "ghost".to_string()],
            });
            payload
                .prerequisites
                .insert("a".to_string(), vec!["b".to_string(), "ghost".to_string()]);
        }
        let problem = build(
            fixture.inputs(),
            "base",
            "default",
            RunScope::selected_only(["a", "b"]),
            None,
        )
        .unwrap();
        assert!(problem.metadata.sandboxed_subset);
        assert_eq!(problem.constraints.mandatory, vec!["a"]);
        assert!(problem.constraints.bundles.is_empty());
        assert_eq!(problem.constraints.prerequisites["a"], vec!["b"]);
        assert_eq!(problem.metadata.filter_drop_counts["mandatory"], 1);
        assert_eq!(problem.metadata.filter_drop_counts["bundle_all_or_nothing"], 1);
        assert_eq!(problem.metadata.filter_drop_counts["require_prereq"], 1);
    }

    #[test]
    fn selected_only_requires_a_non_empty_key_list() {
        let fixture = Fixture::new();
        let err = build(
            fixture.inputs(),
            "base",
            "default",
            RunScope {
                kind: ScopeKind::SelectedOnly,
                initiative_keys: vec![],
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn period_override_wins_over_the_scenario_period_key() {
        let mut fixture = Fixture::new();
        fixture.records[0].deadline = NaiveDate::from_ymd_opt(2026, 7, 1);
        let problem = build(
            fixture.inputs(),
            "base",
            "default",
            RunScope::all_candidates(),
            NaiveDate::from_ymd_opt(2026, 6, 30),
        )
        .unwrap();
        // Override end 2026-06-30: the July deadline is now in range.
        assert!(problem.metadata.excluded_by_deadline.is_empty());
        assert_eq!(problem.candidates.len(), 2);
    }
}
