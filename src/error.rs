//! The error type shared by every fallible operation in the crate.

use crate::models::RequestStatus;
use diesel::result::{
    ConnectionError, DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError,
};

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    /// A referenced course, session, student or request does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The acting user does not own the course, session or request.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Input was rejected before anything was written.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Responses are only accepted while a request is pending.
    #[error("absence request {id} has already been {status}")]
    AlreadyResponded { id: i32, status: RequestStatus },

    /// A concurrent write hit a uniqueness constraint. Safe to retry.
    #[error("conflicting write, please retry: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[source] DieselError),

    #[error("could not connect to `{url}`: {source}")]
    Connection {
        url: String,
        #[source]
        source: ConnectionError,
    },

    #[error("could not read attendance batch: {0}")]
    Csv(#[from] csv::Error),
}

impl AttendanceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AttendanceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the caller may simply run the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AttendanceError::Conflict(_))
    }
}

impl From<DieselError> for AttendanceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                AttendanceError::Conflict(info.message().to_string())
            }
            DieselError::NotFound => AttendanceError::not_found("record", "requested"),
            other => AttendanceError::Database(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
