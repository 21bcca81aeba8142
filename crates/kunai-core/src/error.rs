use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::RecurrenceId;

/// Violations of the calendar data model invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Start and end date must both be all-day or both have a time")]
    MixedAllDay,

    #[error("Start and end date must both be floating or both be fixed")]
    MixedFloating,

    #[error("End date {end} is before start date {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// A recurrence id may be a change or a delete exception, never both.
    #[error("Recurrence id {0} is both a change and a delete exception")]
    ConflictingExceptionDate(RecurrenceId),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
