//! Error types for shared record parsing.

use thiserror::Error;

/// Errors raised while building shared records from raw input.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid timestamp '{0}': expected YYYY-MM-DD HH:MM:SS")]
    InvalidTimestamp(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("payload is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("unknown object type: {0}")]
    UnknownObjectType(String),
}

pub type TypesResult<T> = Result<T, TypesError>;
