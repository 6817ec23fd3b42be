//! Storage error types.

use crmsync_types::{ObjectType, RemoteId};
use thiserror::Error;

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{object_type} {remote_id} already has a mapping")]
    DuplicateMapping {
        object_type: ObjectType,
        remote_id: RemoteId,
    },

    #[error("{0} must be saved before it can be linked")]
    Unsaved(&'static str),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
