//! Reconciliation error types.

use crmsync_storage::StoreError;
use crmsync_types::{ObjectType, RemoteId, TypesError};
use thiserror::Error;

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors surfaced to the event-processing caller.
///
/// A stale update is not an error; it is reported as
/// `UpdateOutcome::Stale`.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The remote record is already mapped. Treat as already synced.
    #[error("{object_type} {remote_id} is already synced")]
    Conflict {
        object_type: ObjectType,
        remote_id: RemoteId,
    },

    #[error("{object_type} {remote_id} not found: {reason}")]
    NotFound {
        object_type: ObjectType,
        remote_id: RemoteId,
        reason: &'static str,
    },

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] TypesError),

    #[error("storage error: {0}")]
    Store(StoreError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unsupported remote event: {0}")]
    UnsupportedEvent(String),
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateMapping {
                object_type,
                remote_id,
            } => ReconcileError::Conflict {
                object_type,
                remote_id,
            },
            other => ReconcileError::Store(other),
        }
    }
}

impl ReconcileError {
    pub(crate) fn not_found(
        object_type: ObjectType,
        remote_id: &RemoteId,
        reason: &'static str,
    ) -> Self {
        ReconcileError::NotFound {
            object_type,
            remote_id: remote_id.clone(),
            reason,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::NotFound { .. })
    }

    /// Only storage failures are worth redelivering.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcileError::Store(_))
    }

    /// HTTP status a webhook endpoint should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ReconcileError::Conflict { .. } => 409,
            ReconcileError::NotFound { .. } => 404,
            ReconcileError::InvalidPayload(_) | ReconcileError::UnsupportedEvent(_) => 422,
            ReconcileError::Store(_) | ReconcileError::Config(_) => 500,
        }
    }
}
