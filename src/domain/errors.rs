// Error taxonomy for the optimization core.
//
// Row validation problems and feasibility findings are data, not errors:
// the compiler collects messages and the checker returns a report. Only
// configuration and data-quality problems abort a run.

/// Fatal problems encountered while building an optimization problem.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Missing scenario/constraint-set, invalid objective configuration or
    /// invalid period key. Aborts before any candidate work.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A candidate record is missing a required numeric field. Silently
    /// defaulting capacity cost would be worse than failing loudly.
    #[error("data quality error for '{initiative_key}': {message}")]
    DataQuality {
        initiative_key: String,
        message: String,
    },

    /// In all_candidates scope the constraint set is authoritative for the
    /// whole pool; a governance reference outside it is fatal.
    #[error("{constraint} references keys outside the candidate pool: {}", missing_keys.join(", "))]
    UnknownReference {
        constraint: String,
        missing_keys: Vec<String>,
    },
}

/// Error types for the solver adapter
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("invalid problem: {0}")]
    InvalidProblem(String),

    #[error("solver backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("solver execution failed: {0}")]
    ExecutionFailed(String),
}
