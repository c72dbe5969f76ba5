use thiserror::Error;
use uuid::Uuid;

use crate::refill::RefillStatus;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: RefillStatus, to: RefillStatus },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("refill request {request_id} was modified concurrently (expected version {expected_version})")]
    ConcurrentModification {
        request_id: Uuid,
        expected_version: i64,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    /// Failures a caller may retry after re-reading current state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::StoreUnavailable(_) | LedgerError::ConcurrentModification { .. }
        )
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::StoreUnavailable(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for LedgerError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        LedgerError::StoreUnavailable("store call timed out".to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
