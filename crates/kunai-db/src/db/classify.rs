//! Classification of Diesel errors into transient and fatal storage errors.

use diesel::result::{DatabaseErrorKind, Error};

use crate::error::DbError;

/// Messages of rollback-class SQL states that Diesel reports as `Unknown`.
const TRANSIENT_MESSAGES: &[&str] = &[
    "deadlock detected",
    "could not serialize access",
    "serialization failure",
];

/// ## Summary
/// Returns whether re-executing the whole transaction may succeed.
///
/// Serialization failures and detected deadlocks are transient. Constraint
/// violations, closed connections and every other failure are not.
#[must_use]
pub fn is_transient(err: &Error) -> bool {
    match err {
        Error::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => true,
        Error::DatabaseError(DatabaseErrorKind::Unknown, info) => {
            let message = info.message().to_ascii_lowercase();
            TRANSIENT_MESSAGES
                .iter()
                .any(|pattern| message.contains(pattern))
        }
        _ => false,
    }
}

/// Converts a Diesel error into the typed storage error.
#[must_use]
pub fn classify(err: &Error) -> DbError {
    if is_transient(err) {
        tracing::debug!(error = %err, "Classified storage error as transient");
        DbError::Transient(err.to_string())
    } else {
        DbError::Fatal(err.to_string())
    }
}
