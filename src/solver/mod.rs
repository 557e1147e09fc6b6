// Solver adapter module: the only part of the core allowed to touch an
// external integer solver. Backends are swappable behind one trait.

pub mod adapter;
pub mod factory;
#[cfg(feature = "highs")]
pub mod highs_solver;
pub mod microlp_solver;
pub mod model;
pub mod scaling;

use crate::domain::SolverError;
use model::IntegerProgram;

pub use adapter::SolverAdapter;
pub use factory::BackendFactory;
pub use microlp_solver::MicrolpSolver;

#[cfg(feature = "highs")]
pub use highs_solver::HighsSolver;

/// Solver configuration: backend choice, resource budget, scale factors.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub backend: crate::domain::SolverBackend,
    /// Wall-clock budget in seconds. Expiry before optimality yields
    /// `feasible` (if a solution was found) or `unknown`, never an error.
    pub time_limit_secs: Option<f64>,
    /// Worker-thread cap for backends that search in parallel.
    pub threads: Option<u32>,
    pub capacity_scale: f64,
    pub kpi_scale: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: crate::domain::SolverBackend::Auto,
            time_limit_secs: Some(60.0),
            threads: Some(4),
            capacity_scale: scaling::CAPACITY_SCALE,
            kpi_scale: scaling::KPI_SCALE,
        }
    }
}

/// Resource limits handed to a backend for one solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveLimits {
    pub time_limit_secs: Option<f64>,
    pub threads: Option<u32>,
}

/// Terminal status as reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    Optimal,
    /// A solution exists but optimality was not proven.
    Feasible,
    Infeasible,
    Unknown,
}

/// Raw backend output before mapping into domain terms.
#[derive(Debug, Clone)]
pub struct BackendOutcome {
    pub status: BackendStatus,
    /// One assignment per variable, empty unless a solution was found.
    pub values: Vec<f64>,
}

impl BackendOutcome {
    pub fn unsolved(status: BackendStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
        }
    }
}

/// Contract every MIP backend implements.
///
/// Swapping backends never changes the model or the result mapping.
pub trait MipBackend: Send + Sync {
    fn solve(
        &self,
        model: &IntegerProgram,
        limits: &SolveLimits,
    ) -> Result<BackendOutcome, SolverError>;

    fn name(&self) -> &'static str;

    /// Whether the backend can enforce a wall-clock limit. Backends that
    /// cannot ignore it; the adapter notes the ignored limit in the
    /// solution diagnostics.
    fn supports_time_limit(&self) -> bool {
        true
    }
}
