// Domain layer: candidates, constraint payloads, problem and solution models
pub mod domain;

// Constraint compilation: raw governance rows -> validated payloads
pub mod compiler;

// Pre-solve feasibility checks over a frozen problem snapshot
pub mod feasibility;

// Problem assembly: scenario + constraint set + records -> OptimizationProblem
pub mod builder;

// MIP construction and solver backends
pub mod solver;

// Post-solve projection: contributions and target gaps
pub mod projector;

// Single-run orchestration: check -> solve -> project
pub mod pipeline;

// Re-export commonly used types
pub use domain::{
    BuildError, Candidate, CandidateRecord, ConstraintKind, ConstraintSetKey,
    ConstraintSetPayload, ObjectiveMode, ObjectiveSpec, OptimizationProblem,
    OptimizationSolution, ResolvedObjective, RunScope, Scenario, ScopeKind, Severity,
    SolveStatus, SolverBackend, SolverError, TargetKind,
};

pub use compiler::{compile, CompileOutput, ValidationMessage};
pub use feasibility::{check, FeasibilityIssue, FeasibilityReport, IssueCode};
pub use builder::{build, BuilderInputs};
pub use solver::{BackendFactory, MicrolpSolver, MipBackend, SolverAdapter, SolverConfig};
pub use projector::{project, ProjectionReport, TargetGap};
pub use pipeline::{execute_run, RunArtifacts};

#[cfg(feature = "highs")]
pub use solver::HighsSolver;
