// Domain value objects representing core business concepts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Objective mode for an optimization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveMode {
    /// Maximize the single top-level north-star KPI
    NorthStar,
    /// Maximize a weighted sum of KPI contributions
    WeightedKpis,
    /// Declared but only implemented as a capacity-utilization fallback
    Lexicographic,
}

/// Whether a run considers an explicit subset or the full eligible pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    SelectedOnly,
    AllCandidates,
}

/// Kind of a KPI target over a slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Hard minimum, enforced by the solver
    Floor,
    /// Aspirational, reported on but never enforced
    Goal,
}

/// KPI hierarchy level in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiLevel {
    NorthStar,
    Strategic,
    Other,
}

/// Severity of a validation or feasibility issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Terminal status of an optimization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Proven optimal solution
    Optimal,
    /// A solution was found but optimality was not proven (e.g. time limit)
    Feasible,
    /// No selection satisfies all constraints
    Infeasible,
    /// The model could not be represented (defensive; usually caught upstream)
    ModelInvalid,
    /// The solver terminated without a solution or a proof
    Unknown,
}

impl SolveStatus {
    pub fn is_solved(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Feasible => write!(f, "feasible"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::ModelInvalid => write!(f, "model_invalid"),
            SolveStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Solver backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverBackend {
    /// Automatically select the best available backend
    Auto,
    /// Pure-Rust microlp backend via good_lp
    Microlp,
    /// HiGHS (requires the `highs` cargo feature)
    Highs,
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverBackend::Auto => write!(f, "Auto"),
            SolverBackend::Microlp => write!(f, "microlp"),
            SolverBackend::Highs => write!(f, "HiGHS"),
        }
    }
}

/// The eight governance constraint kinds accepted by the compiler.
///
/// Dispatch on this enum is exhaustive: adding a variant without handling it
/// everywhere is a compile-time error, not a silent skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    CapacityFloor,
    CapacityCap,
    Mandatory,
    BundleAllOrNothing,
    ExcludePair,
    ExcludeInitiative,
    RequirePrereq,
    SynergyBonus,
}

impl ConstraintKind {
    /// Parse a (trimmed, lowercased) discriminant field.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "capacity_floor" => Some(Self::CapacityFloor),
            "capacity_cap" => Some(Self::CapacityCap),
            "mandatory" => Some(Self::Mandatory),
            "bundle_all_or_nothing" => Some(Self::BundleAllOrNothing),
            "exclude_pair" => Some(Self::ExcludePair),
            "exclude_initiative" => Some(Self::ExcludeInitiative),
            "require_prereq" => Some(Self::RequirePrereq),
            "synergy_bonus" => Some(Self::SynergyBonus),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CapacityFloor => "capacity_floor",
            Self::CapacityCap => "capacity_cap",
            Self::Mandatory => "mandatory",
            Self::BundleAllOrNothing => "bundle_all_or_nothing",
            Self::ExcludePair => "exclude_pair",
            Self::ExcludeInitiative => "exclude_initiative",
            Self::RequirePrereq => "require_prereq",
            Self::SynergyBonus => "synergy_bonus",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
