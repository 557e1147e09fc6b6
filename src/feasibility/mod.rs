// FeasibilityChecker: a pure function over a compiled problem that proves
// hard infeasibility cheaply, before any solver call.
//
// Checks are independent and their issues concatenated; ordering only
// affects message order. Warnings never block solving.

pub mod cycles;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::{
    is_known_dimension, Candidate, OptimizationProblem, Severity, TargetKind,
};
use cycles::find_cycles;

/// Stable machine-readable issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    EmptyCandidatePool,
    NegativeCapacityCost,
    MandatoryExcluded,
    ExclusionPairMandatory,
    MandatoryMissing,
    ExclusionMissing,
    BundleInvalid,
    BundleMemberMissing,
    BundleMandatoryMember,
    PrereqRequirementMissing,
    PrereqDependentMissing,
    PrereqCycle,
    MandatoryPrereqUnsatisfiable,
    SynergyInvalid,
    FloorsExceedTotalCapacity,
    FloorExceedsSliceCapacity,
    UnknownDimension,
    TargetFloorUnachievable,
}

/// One feasibility finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_key: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl FeasibilityIssue {
    fn new(severity: Severity, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            keys: Vec::new(),
            dimension: None,
            dimension_key: None,
            details: serde_json::Value::Null,
        }
    }

    fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    fn with_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    fn with_slice(mut self, dimension: &str, dimension_key: &str) -> Self {
        self.dimension = Some(dimension.to_string());
        self.dimension_key = Some(dimension_key.to_string());
        self
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Outcome of the pre-solve feasibility check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityReport {
    pub is_feasible: bool,
    pub issues: Vec<FeasibilityIssue>,
}

impl FeasibilityReport {
    pub fn new(issues: Vec<FeasibilityIssue>) -> Self {
        let is_feasible = !issues.iter().any(|i| i.severity == Severity::Error);
        Self { is_feasible, issues }
    }

    pub fn errors(&self) -> impl Iterator<Item = &FeasibilityIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }
}

/// Run every pre-solve check against a frozen problem snapshot.
pub fn check(problem: &OptimizationProblem) -> FeasibilityReport {
    let mut issues = Vec::new();
    let pool: HashSet<&str> = problem
        .candidates
        .iter()
        .map(|c| c.initiative_key.as_str())
        .collect();

    check_candidates(problem, &mut issues);
    check_mandatory_exclusions(problem, &pool, &mut issues);
    check_bundles(problem, &pool, &mut issues);
    check_prerequisites(problem, &pool, &mut issues);
    check_synergies(problem, &pool, &mut issues);
    check_capacity_floors(problem, &mut issues);
    check_target_floors(problem, &mut issues);

    FeasibilityReport::new(issues)
}

fn check_candidates(problem: &OptimizationProblem, issues: &mut Vec<FeasibilityIssue>) {
    if problem.candidates.is_empty() {
        issues.push(FeasibilityIssue::error(
            IssueCode::EmptyCandidatePool,
            "the candidate pool is empty; nothing can be selected",
        ));
    }
    for candidate in &problem.candidates {
        if candidate.capacity_cost < 0.0 {
            issues.push(
                FeasibilityIssue::error(
                    IssueCode::NegativeCapacityCost,
                    format!(
                        "candidate '{}' has negative capacity cost {}",
                        candidate.initiative_key, candidate.capacity_cost
                    ),
                )
                .with_keys([candidate.initiative_key.clone()]),
            );
        }
    }
}

fn check_mandatory_exclusions(
    problem: &OptimizationProblem,
    pool: &HashSet<&str>,
    issues: &mut Vec<FeasibilityIssue>,
) {
    let constraints = &problem.constraints;
    let mandatory: HashSet<&str> = constraints.mandatory.iter().map(String::as_str).collect();
    let excluded: HashSet<&str> = constraints
        .exclusions_single
        .iter()
        .map(String::as_str)
        .collect();

    for key in &constraints.mandatory {
        if excluded.contains(key.as_str()) {
            issues.push(
                FeasibilityIssue::error(
                    IssueCode::MandatoryExcluded,
                    format!("'{key}' is both mandatory and excluded"),
                )
                .with_keys([key.clone()]),
            );
        }
        if !pool.contains(key.as_str()) {
            issues.push(
                FeasibilityIssue::error(
                    IssueCode::MandatoryMissing,
                    format!("mandatory initiative '{key}' is not in the candidate pool"),
                )
                .with_keys([key.clone()]),
            );
        }
    }

    for (a, b) in &constraints.exclusions_pairs {
        if mandatory.contains(a.as_str()) && mandatory.contains(b.as_str()) {
            issues.push(
                FeasibilityIssue::error(
                    IssueCode::ExclusionPairMandatory,
                    format!("exclusion pair ('{a}', '{b}') has both members mandatory"),
                )
                .with_keys([a.clone(), b.clone()]),
            );
        }
        for key in [a, b] {
            if !pool.contains(key.as_str()) {
                issues.push(
                    FeasibilityIssue::warning(
                        IssueCode::ExclusionMissing,
                        format!("exclusion pair references '{key}' which is not in the pool"),
                    )
                    .with_keys([key.clone()]),
                );
            }
        }
    }
    for key in &constraints.exclusions_single {
        if !pool.contains(key.as_str()) {
            issues.push(
                FeasibilityIssue::warning(
                    IssueCode::ExclusionMissing,
                    format!("excluded initiative '{key}' is not in the pool (harmless)"),
                )
                .with_keys([key.clone()]),
            );
        }
    }
}

fn check_bundles(
    problem: &OptimizationProblem,
    pool: &HashSet<&str>,
    issues: &mut Vec<FeasibilityIssue>,
) {
    let mandatory: HashSet<&str> = problem
        .constraints
        .mandatory
        .iter()
        .map(String::as_str)
        .collect();

    for bundle in &problem.constraints.bundles {
        if bundle.bundle_key.is_empty() || bundle.members.is_empty() {
            issues.push(FeasibilityIssue::warning(
                IssueCode::BundleInvalid,
                format!(
                    "bundle '{}' is degenerate ({} members)",
                    bundle.bundle_key,
                    bundle.members.len()
                ),
            ));
            continue;
        }
        let missing: Vec<String> = bundle
            .members
            .iter()
            .filter(|m| !pool.contains(m.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            issues.push(
                FeasibilityIssue::error(
                    IssueCode::BundleMemberMissing,
                    format!(
                        "bundle '{}' references members outside the pool: {}",
                        bundle.bundle_key,
                        missing.join(", ")
                    ),
                )
                .with_keys(missing),
            );
        }
        let forced: Vec<String> = bundle
            .members
            .iter()
            .filter(|m| mandatory.contains(m.as_str()))
            .cloned()
            .collect();
        if !forced.is_empty() {
            issues.push(
                FeasibilityIssue::warning(
                    IssueCode::BundleMandatoryMember,
                    format!(
                        "bundle '{}' contains mandatory member(s) {}; the whole bundle is forced",
                        bundle.bundle_key,
                        forced.join(", ")
                    ),
                )
                .with_keys(forced),
            );
        }
    }
}

fn check_prerequisites(
    problem: &OptimizationProblem,
    pool: &HashSet<&str>,
    issues: &mut Vec<FeasibilityIssue>,
) {
    let constraints = &problem.constraints;
    let mandatory: HashSet<&str> = constraints.mandatory.iter().map(String::as_str).collect();

    for (dependent, requirements) in &constraints.prerequisites {
        if !pool.contains(dependent.as_str()) {
            issues.push(
                FeasibilityIssue::warning(
                    IssueCode::PrereqDependentMissing,
                    format!("prerequisite dependent '{dependent}' is not in the pool"),
                )
                .with_keys([dependent.clone()]),
            );
        }
        let missing: Vec<String> = requirements
            .iter()
            .filter(|r| !pool.contains(r.as_str()))
            .cloned()
            .collect();
        for requirement in &missing {
            issues.push(
                FeasibilityIssue::error(
                    IssueCode::PrereqRequirementMissing,
                    format!(
                        "'{dependent}' requires '{requirement}' which is not in the pool"
                    ),
                )
                .with_keys([dependent.clone(), requirement.clone()]),
            );
        }
        if mandatory.contains(dependent.as_str()) && !missing.is_empty() {
            issues.push(
                FeasibilityIssue::error(
                    IssueCode::MandatoryPrereqUnsatisfiable,
                    format!(
                        "mandatory '{dependent}' can never be satisfied: prerequisites {} are absent",
                        missing.join(", ")
                    ),
                )
                .with_keys([dependent.clone()]),
            );
        }
    }

    for cycle in find_cycles(&constraints.prerequisites) {
        issues.push(
            FeasibilityIssue::error(
                IssueCode::PrereqCycle,
                format!("prerequisite cycle: {}", cycle.join(" -> ")),
            )
            .with_keys(cycle),
        );
    }
}

fn check_synergies(
    problem: &OptimizationProblem,
    pool: &HashSet<&str>,
    issues: &mut Vec<FeasibilityIssue>,
) {
    for (a, b) in &problem.constraints.synergy_pairs {
        if a == b {
            issues.push(
                FeasibilityIssue::warning(
                    IssueCode::SynergyInvalid,
                    format!("synergy pair ('{a}', '{b}') is degenerate"),
                )
                .with_keys([a.clone()]),
            );
            continue;
        }
        let absent: Vec<String> = [a, b]
            .into_iter()
            .filter(|k| !pool.contains(k.as_str()))
            .cloned()
            .collect();
        if !absent.is_empty() {
            issues.push(
                FeasibilityIssue::warning(
                    IssueCode::SynergyInvalid,
                    format!(
                        "synergy pair ('{a}', '{b}') references absent keys: {}",
                        absent.join(", ")
                    ),
                )
                .with_keys(absent),
            );
        }
    }
}

fn slice_capacity(candidates: &[Candidate], dimension: &str, dimension_key: &str) -> f64 {
    candidates
        .iter()
        .filter(|c| c.in_slice(dimension, dimension_key))
        .map(|c| c.capacity_cost)
        .sum()
}

/// Cheap optimistic necessary conditions; can prove infeasibility, never
/// feasibility.
fn check_capacity_floors(problem: &OptimizationProblem, issues: &mut Vec<FeasibilityIssue>) {
    let mut floor_sum = 0.0;
    for (dimension, dimension_key, bound) in problem.constraints.floor_entries() {
        floor_sum += bound;

        if !is_known_dimension(dimension) {
            issues.push(
                FeasibilityIssue::warning(
                    IssueCode::UnknownDimension,
                    format!("capacity floor on unrecognized dimension '{dimension}' cannot be checked"),
                )
                .with_slice(dimension, dimension_key),
            );
            continue;
        }

        let available = slice_capacity(&problem.candidates, dimension, dimension_key);
        if bound > available {
            issues.push(
                FeasibilityIssue::error(
                    IssueCode::FloorExceedsSliceCapacity,
                    format!(
                        "capacity floor {bound} on slice ({dimension}, {dimension_key}) exceeds \
                         the slice's total candidate capacity {available}"
                    ),
                )
                .with_slice(dimension, dimension_key)
                .with_details(serde_json::json!({
                    "floor": bound,
                    "slice_capacity": available,
                })),
            );
        }
    }

    if let Some(total) = problem.capacity_total {
        if floor_sum > total {
            issues.push(
                FeasibilityIssue::error(
                    IssueCode::FloorsExceedTotalCapacity,
                    format!(
                        "sum of capacity floors {floor_sum} exceeds total capacity {total}"
                    ),
                )
                .with_details(serde_json::json!({
                    "floor_sum": floor_sum,
                    "capacity_total": total,
                })),
            );
        }
    }
}

/// A target floor is unachievable when even selecting every slice member
/// cannot reach it.
fn check_target_floors(problem: &OptimizationProblem, issues: &mut Vec<FeasibilityIssue>) {
    for (dimension, dimension_key, kpi_key, target) in problem.constraints.target_entries() {
        if target.kind != TargetKind::Floor {
            continue;
        }
        if !is_known_dimension(dimension) {
            issues.push(
                FeasibilityIssue::warning(
                    IssueCode::UnknownDimension,
                    format!("target floor on unrecognized dimension '{dimension}' cannot be checked"),
                )
                .with_slice(dimension, dimension_key),
            );
            continue;
        }
        let upper_bound: f64 = problem
            .slice_members(dimension, dimension_key)
            .map(|c| c.kpi_contribution(kpi_key))
            .sum();
        if upper_bound < target.value {
            issues.push(
                FeasibilityIssue::error(
                    IssueCode::TargetFloorUnachievable,
                    format!(
                        "target floor {} for KPI '{kpi_key}' on slice ({dimension}, {dimension_key}) \
                         exceeds the optimistic upper bound {upper_bound}",
                        target.value
                    ),
                )
                .with_slice(dimension, dimension_key)
                .with_details(serde_json::json!({
                    "kpi_key": kpi_key,
                    "floor": target.value,
                    "optimistic_upper_bound": upper_bound,
                })),
            );
        }
    }
}
