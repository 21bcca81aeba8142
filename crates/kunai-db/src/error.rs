use thiserror::Error;

/// Storage layer errors.
///
/// Every storage failure is classified at the boundary: [`DbError::Transient`]
/// failures may succeed when the whole unit of work is re-executed, everything else
/// is final.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Transient storage error: {0}")]
    Transient(String),

    #[error("Storage error: {0}")]
    Fatal(String),

    #[error("Pool error: {0}")]
    PoolError(#[from] diesel_async::pooled_connection::bb8::RunError),
}

impl From<diesel::result::Error> for DbError {
    fn from(err: diesel::result::Error) -> Self {
        crate::db::classify::classify(&err)
    }
}

/// Errors that can tell whether retrying the unit of work may help.
pub trait TransientError {
    fn is_transient(&self) -> bool;
}

impl TransientError for DbError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
