use kunai_core::error::CoreError;
use kunai_db::error::{DbError, TransientError};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the calendar engine.
///
/// Only [`ServiceError::StorageTransient`] is retried, and only by the unit of
/// work. Every other kind aborts the transaction and reaches the caller unchanged.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error(
        "Concurrent modification of {field} on event {event_id}: client timestamp \
         {client_timestamp} is older than {actual_timestamp}"
    )]
    ConcurrentModification {
        event_id: Uuid,
        field: &'static str,
        client_timestamp: i64,
        actual_timestamp: i64,
    },

    #[error("Invalid recurrence id: {0}")]
    InvalidRecurrenceId(String),

    #[error("Temporary storage failure, please retry: {0}")]
    StorageTransient(String),

    #[error("Storage failure: {0}")]
    StorageFatal(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid calendar user: {0}")]
    InvalidCalendarUser(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Transient(message) => Self::StorageTransient(message),
            DbError::Fatal(message) => Self::StorageFatal(message),
            DbError::PoolError(err) => Self::StorageFatal(err.to_string()),
        }
    }
}

impl TransientError for ServiceError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::StorageTransient(_))
    }
}

impl ServiceError {
    /// Whether the caller may resubmit the request, possibly with fresh data.
    #[must_use]
    pub const fn is_resubmittable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification { .. } | Self::StorageTransient(_)
        )
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
