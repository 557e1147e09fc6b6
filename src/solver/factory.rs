// Factory for creating backend instances from configuration.

use std::sync::Arc;

use super::{MicrolpSolver, MipBackend};
use crate::domain::{SolverBackend, SolverError};

pub struct BackendFactory;

impl BackendFactory {
    /// Create a backend for a configured choice.
    pub fn create(backend: SolverBackend) -> Result<Arc<dyn MipBackend>, SolverError> {
        match backend {
            SolverBackend::Auto => Ok(Self::default_backend()),
            SolverBackend::Microlp => Ok(Arc::new(MicrolpSolver::new())),
            #[cfg(feature = "highs")]
            SolverBackend::Highs => Ok(Arc::new(super::HighsSolver::new())),
            #[cfg(not(feature = "highs"))]
            SolverBackend::Highs => Err(SolverError::BackendNotAvailable(
                "HiGHS support requires the 'highs' cargo feature".to_string(),
            )),
        }
    }

    /// The best backend available in this build.
    pub fn default_backend() -> Arc<dyn MipBackend> {
        #[cfg(feature = "highs")]
        {
            Arc::new(super::HighsSolver::new())
        }
        #[cfg(not(feature = "highs"))]
        {
            Arc::new(MicrolpSolver::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_always_resolves_to_some_backend() {
        let backend = BackendFactory::create(SolverBackend::Auto).unwrap();
        assert!(!backend.name().is_empty());
    }

    #[cfg(not(feature = "highs"))]
    #[test]
    fn highs_is_unavailable_without_the_feature() {
        assert!(matches!(
            BackendFactory::create(SolverBackend::Highs),
            Err(SolverError::BackendNotAvailable(_))
        ));
    }
}
