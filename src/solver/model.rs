// Integer program construction: one binary variable per candidate, linear
// constraints per the governance payload, deterministic integer scaling.
//
// Every stage either represents its constraint or short-circuits to a
// terminal status; nothing is silently dropped.

use std::collections::HashMap;

use crate::domain::{
    Candidate, EmptySliceDiagnostic, OptimizationProblem, ResolvedObjective, SolveDiagnostics,
    TargetKind,
};
use super::scaling::scale_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    LessOrEqual,
    GreaterOrEqual,
    Equal,
}

/// One scaled linear constraint over candidate variables.
#[derive(Debug, Clone)]
pub struct LinearConstraint {
    pub name: String,
    pub sense: ConstraintSense,
    /// (variable index, scaled integer coefficient)
    pub terms: Vec<(usize, i64)>,
    pub bound: i64,
}

/// A binary selection variable, possibly fixed via its bounds.
#[derive(Debug, Clone)]
pub struct BinaryVariable {
    pub initiative_key: String,
    pub lower: f64,
    pub upper: f64,
}

/// The solver-ready model.
#[derive(Debug, Clone, Default)]
pub struct IntegerProgram {
    pub variables: Vec<BinaryVariable>,
    pub constraints: Vec<LinearConstraint>,
    /// Maximization objective coefficient per variable, already combined
    /// and divided back out of scale (see [`objective_coefficient`]).
    pub objective: Vec<f64>,
}

/// Construction stopped before the solver was ever invoked.
#[derive(Debug, Clone)]
pub enum ModelHalt {
    Infeasible {
        diagnostic: EmptySliceDiagnostic,
        message: String,
    },
    ModelInvalid {
        message: String,
    },
}

/// Per-candidate objective coefficient, the single arithmetic seam shared
/// by the solver adapter and the result projector.
///
/// north_star: the KPI's deterministically-scaled contribution divided back
/// out of its scale. weighted_kpis: sum over KPIs of weight x scaled
/// contribution / that KPI's scale. Neither recorded: the lexicographic
/// fallback, maximizing capacity utilization.
pub fn objective_coefficient(candidate: &Candidate, diagnostics: &SolveDiagnostics) -> f64 {
    if let Some(kpi_key) = &diagnostics.north_star_kpi_key {
        let scale = kpi_scale_for(diagnostics, kpi_key);
        return scale_value(candidate.kpi_contribution(kpi_key), scale) as f64 / scale;
    }
    if !diagnostics.weights.is_empty() {
        return diagnostics
            .weights
            .iter()
            .map(|(kpi_key, weight)| {
                let scale = kpi_scale_for(diagnostics, kpi_key);
                weight * scale_value(candidate.kpi_contribution(kpi_key), scale) as f64 / scale
            })
            .sum();
    }
    let scale = diagnostics.capacity_scale;
    scale_value(candidate.capacity_cost, scale) as f64 / scale
}

fn kpi_scale_for(diagnostics: &SolveDiagnostics, kpi_key: &str) -> f64 {
    diagnostics
        .kpi_scales
        .get(kpi_key)
        .copied()
        .unwrap_or(1.0)
}

/// Diagnostics recorded verbatim at model-build time so downstream
/// recomputation reproduces the objective bit-for-bit.
pub fn build_diagnostics(
    problem: &OptimizationProblem,
    capacity_scale: f64,
    kpi_scale: f64,
) -> SolveDiagnostics {
    let mut diagnostics = SolveDiagnostics {
        capacity_scale,
        ..SolveDiagnostics::default()
    };
    match &problem.objective {
        ResolvedObjective::NorthStar { kpi_key } => {
            diagnostics.north_star_kpi_key = Some(kpi_key.clone());
            diagnostics.kpi_scales.insert(kpi_key.clone(), kpi_scale);
        }
        ResolvedObjective::WeightedKpis { weights } => {
            diagnostics.weights = weights.clone();
            for kpi_key in weights.keys() {
                diagnostics.kpi_scales.insert(kpi_key.clone(), kpi_scale);
            }
        }
        ResolvedObjective::Lexicographic => {}
    }
    // Target constraints scale their KPI contributions too; a KPI named
    // only by a target must not fall back to scale 1.0, or fractional
    // contributions would round away.
    for (_, _, kpi_key, _) in problem.constraints.target_entries() {
        diagnostics
            .kpi_scales
            .entry(kpi_key.to_string())
            .or_insert(kpi_scale);
    }
    diagnostics
}

/// Translate a frozen problem into an integer program.
pub fn build_model(
    problem: &OptimizationProblem,
    diagnostics: &SolveDiagnostics,
) -> Result<IntegerProgram, ModelHalt> {
    if problem.candidates.is_empty() {
        return Err(ModelHalt::ModelInvalid {
            message: "cannot build a model over an empty candidate pool".to_string(),
        });
    }

    let capacity_scale = diagnostics.capacity_scale;
    let mut model = IntegerProgram::default();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for candidate in &problem.candidates {
        index.insert(candidate.initiative_key.as_str(), model.variables.len());
        model.variables.push(BinaryVariable {
            initiative_key: candidate.initiative_key.clone(),
            lower: 0.0,
            upper: 1.0,
        });
    }
    let constraints = &problem.constraints;

    // Mandatory: fix to 1. Absence here means upstream validation was
    // bypassed; refuse to solve a model that misrepresents governance.
    for key in &constraints.mandatory {
        let Some(&i) = index.get(key.as_str()) else {
            return Err(ModelHalt::ModelInvalid {
                message: format!("mandatory initiative '{key}' has no decision variable"),
            });
        };
        model.variables[i].lower = 1.0;
    }

    // Single exclusions: fix to 0; an exclusion against an absent key is
    // vacuous for this run's pool.
    for key in &constraints.exclusions_single {
        if let Some(&i) = index.get(key.as_str()) {
            if model.variables[i].lower == 1.0 {
                return Err(ModelHalt::ModelInvalid {
                    message: format!("'{key}' is fixed both selected and excluded"),
                });
            }
            model.variables[i].upper = 0.0;
        }
    }

    // Pairwise exclusions: x_a + x_b <= 1.
    for (a, b) in &constraints.exclusions_pairs {
        if let (Some(&ia), Some(&ib)) = (index.get(a.as_str()), index.get(b.as_str())) {
            model.constraints.push(LinearConstraint {
                name: format!("exclude_pair[{a},{b}]"),
                sense: ConstraintSense::LessOrEqual,
                terms: vec![(ia, 1), (ib, 1)],
                bound: 1,
            });
        }
    }

    // Prerequisites: x_dependent <= x_requirement per edge; edges touching
    // absent keys were already handled by scope filtering or feasibility.
    for (dependent, requirements) in &constraints.prerequisites {
        let Some(&id) = index.get(dependent.as_str()) else {
            continue;
        };
        for requirement in requirements {
            if let Some(&ir) = index.get(requirement.as_str()) {
                model.constraints.push(LinearConstraint {
                    name: format!("require_prereq[{dependent}->{requirement}]"),
                    sense: ConstraintSense::LessOrEqual,
                    terms: vec![(id, 1), (ir, -1)],
                    bound: 0,
                });
            }
        }
    }

    // Bundles: every member equals a base member. Bundles with absent
    // members were dropped or flagged upstream depending on scope.
    for bundle in &constraints.bundles {
        if bundle.members.len() < 2 {
            continue;
        }
        let vars: Option<Vec<usize>> = bundle
            .members
            .iter()
            .map(|m| index.get(m.as_str()).copied())
            .collect();
        let Some(vars) = vars else { continue };
        let base = vars[0];
        for &member in &vars[1..] {
            model.constraints.push(LinearConstraint {
                name: format!("bundle[{}]", bundle.bundle_key),
                sense: ConstraintSense::Equal,
                terms: vec![(member, 1), (base, -1)],
                bound: 0,
            });
        }
    }

    // Capacity caps: one inequality per slice, plus the scenario total when
    // present. Both are enforced simultaneously when both exist.
    for (dimension, dimension_key, cap) in constraints.cap_entries() {
        let terms = slice_terms(problem, &index, dimension, dimension_key, capacity_scale);
        if terms.is_empty() {
            continue;
        }
        model.constraints.push(LinearConstraint {
            name: format!("capacity_cap[{dimension},{dimension_key}]"),
            sense: ConstraintSense::LessOrEqual,
            terms,
            bound: scale_value(cap, capacity_scale),
        });
    }
    if let Some(total) = problem.capacity_total {
        let terms: Vec<(usize, i64)> = problem
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (i, scale_value(c.capacity_cost, capacity_scale)))
            .collect();
        model.constraints.push(LinearConstraint {
            name: "capacity_total".to_string(),
            sense: ConstraintSense::LessOrEqual,
            terms,
            bound: scale_value(total, capacity_scale),
        });
    }

    // Capacity floors: a strictly positive floor over an empty slice can
    // never be met; short-circuit without invoking the solver.
    for (dimension, dimension_key, floor) in constraints.floor_entries() {
        let terms = slice_terms(problem, &index, dimension, dimension_key, capacity_scale);
        if terms.is_empty() {
            if floor > 0.0 {
                return Err(ModelHalt::Infeasible {
                    diagnostic: EmptySliceDiagnostic {
                        dimension: dimension.to_string(),
                        dimension_key: dimension_key.to_string(),
                        kpi_key: None,
                        bound: floor,
                    },
                    message: format!(
                        "capacity floor {floor} on slice ({dimension}, {dimension_key}) has no \
                         matching candidates"
                    ),
                });
            }
            continue;
        }
        model.constraints.push(LinearConstraint {
            name: format!("capacity_floor[{dimension},{dimension_key}]"),
            sense: ConstraintSense::GreaterOrEqual,
            terms,
            bound: scale_value(floor, capacity_scale),
        });
    }

    // Target floors: symmetric to capacity floors over KPI contributions.
    for (dimension, dimension_key, kpi_key, target) in constraints.target_entries() {
        if target.kind != TargetKind::Floor {
            continue;
        }
        let kpi_scale = kpi_scale_for(diagnostics, kpi_key).max(1.0);
        let terms: Vec<(usize, i64)> = problem
            .slice_members(dimension, dimension_key)
            .map(|c| {
                (
                    index[c.initiative_key.as_str()],
                    scale_value(c.kpi_contribution(kpi_key), kpi_scale),
                )
            })
            .collect();
        if terms.is_empty() {
            if target.value > 0.0 {
                return Err(ModelHalt::Infeasible {
                    diagnostic: EmptySliceDiagnostic {
                        dimension: dimension.to_string(),
                        dimension_key: dimension_key.to_string(),
                        kpi_key: Some(kpi_key.to_string()),
                        bound: target.value,
                    },
                    message: format!(
                        "target floor {} for KPI '{kpi_key}' on slice ({dimension}, \
                         {dimension_key}) has no matching candidates",
                        target.value
                    ),
                });
            }
            continue;
        }
        model.constraints.push(LinearConstraint {
            name: format!("target_floor[{dimension},{dimension_key},{kpi_key}]"),
            sense: ConstraintSense::GreaterOrEqual,
            terms,
            bound: scale_value(target.value, kpi_scale),
        });
    }

    model.objective = problem
        .candidates
        .iter()
        .map(|c| objective_coefficient(c, diagnostics))
        .collect();

    Ok(model)
}

fn slice_terms(
    problem: &OptimizationProblem,
    index: &HashMap<&str, usize>,
    dimension: &str,
    dimension_key: &str,
    capacity_scale: f64,
) -> Vec<(usize, i64)> {
    problem
        .slice_members(dimension, dimension_key)
        .map(|c| {
            (
                index[c.initiative_key.as_str()],
                scale_value(c.capacity_cost, capacity_scale),
            )
        })
        .collect()
}

/// The recorded weights/scales applied to a selection, used to compute the
/// reported objective value and replayed verbatim by the projector.
pub fn objective_value(
    candidates: &[Candidate],
    selected: impl Fn(usize) -> bool,
    diagnostics: &SolveDiagnostics,
) -> f64 {
    candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| selected(*i))
        .map(|(_, c)| objective_coefficient(c, diagnostics))
        .sum()
}
