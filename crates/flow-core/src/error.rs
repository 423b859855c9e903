//! Error taxonomy for the flow engine and its collaborators.
//!
//! One enum rather than the four marker error structs the original service
//! used (`NotFoundError`/`InputError`/`InternalError`/`ForbiddenError`) — the
//! HTTP layer still maps each variant to the same status code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("input error: {0}")]
    Input(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("workload not found: {0}")]
    WorkloadNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn internal(context: impl Into<String>, source: impl std::fmt::Display) -> Self {
        EngineError::Internal(format!("{}: {}", context.into(), source))
    }

    /// Treat a driver/bridge "already gone" condition as a no-op success
    /// during teardown, per the idempotent-teardown invariant.
    pub fn is_benign_during_teardown(&self) -> bool {
        matches!(self, EngineError::WorkloadNotFound(_) | EngineError::NotFound(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_not_found_is_benign_during_teardown() {
        let err = EngineError::WorkloadNotFound("deployment pipeline-x".into());
        assert!(err.is_benign_during_teardown());
    }

    #[test]
    fn internal_is_not_benign_during_teardown() {
        let err = EngineError::Internal("driver exploded".into());
        assert!(!err.is_benign_during_teardown());
    }
}
