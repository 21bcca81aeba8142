//! Invariant checks and stamping shared by all mutations.

use chrono::{DateTime, Utc};
use kunai_core::model::{
    Attendee, CalendarDateTime, Classification, Event, EventUpdate, check_range,
};
use kunai_core::types::FolderType;

use crate::collaborator::CalendarFolder;
use crate::error::{ServiceError, ServiceResult};

/// ## Summary
/// Checks that `start <= end` and that both agree on all-day and floating form.
///
/// ## Errors
/// Returns [`ServiceError::ValidationFailed`] naming the violated rule.
pub fn check_dates(start: &CalendarDateTime, end: &CalendarDateTime) -> ServiceResult<()> {
    check_range(start, end).map_err(|err| ServiceError::ValidationFailed(err.to_string()))
}

/// Collapses date-times in a UTC zone into plain UTC values.
pub fn normalize(event: &mut Event) {
    event.start_date = event.start_date.normalized();
    event.end_date = event.end_date.normalized();
}

/// ## Summary
/// Checks that `requested` is an allowed classification in `folder`.
///
/// Public folders only hold public events. In shared folders the classification
/// may not be raised to private or confidential by someone acting for the owner.
///
/// ## Errors
/// Returns [`ServiceError::ValidationFailed`] if the classification is not allowed.
pub fn check_classification(
    folder: &CalendarFolder,
    original: Option<Classification>,
    requested: Classification,
) -> ServiceResult<()> {
    if requested == Classification::Public || original == Some(requested) {
        return Ok(());
    }
    match folder.folder_type {
        FolderType::Public => Err(ServiceError::ValidationFailed(format!(
            "classification {requested:?} is not allowed in public folder {}",
            folder.id
        ))),
        FolderType::Shared => Err(ServiceError::ValidationFailed(format!(
            "classification {requested:?} cannot be set in shared folder {}",
            folder.id
        ))),
        FolderType::Private => Ok(()),
    }
}

/// ## Summary
/// Hides non-public events in shared folders from users not taking part in them.
///
/// ## Errors
/// Returns [`ServiceError::NotFound`] so hidden events are indistinguishable from
/// missing ones.
pub fn check_visibility(folder: &CalendarFolder, event: &Event, user: i32) -> ServiceResult<()> {
    let participates = event.created_by == user
        || event.is_organizer(user)
        || event.find_attendee(user).is_some();
    if folder.folder_type == FolderType::Shared
        && event.classification != Classification::Public
        && !participates
    {
        return Err(ServiceError::NotFound(format!("event {}", event.id)));
    }
    Ok(())
}

/// Checks that no recurrence id is both a change and a delete exception.
///
/// ## Errors
/// Returns [`ServiceError::Core`] with the conflicting recurrence id.
pub fn check_exception_dates(event: &Event) -> ServiceResult<()> {
    event.check_exception_dates().map_err(ServiceError::from)
}

/// The partial update marking an event as modified.
#[must_use]
pub fn touch(timestamp: i64, now: DateTime<Utc>, user: i32) -> EventUpdate {
    EventUpdate::touch(timestamp, now, user)
}

/// ## Summary
/// Rejects writes based on an older state of `event` than the stored one.
///
/// ## Errors
/// Returns [`ServiceError::ConcurrentModification`] if `client_timestamp` is
/// older than the event's timestamp.
pub fn check_timestamp(event: &Event, client_timestamp: i64) -> ServiceResult<()> {
    if client_timestamp < event.timestamp {
        tracing::debug!(
            event_id = %event.id,
            client_timestamp,
            actual_timestamp = event.timestamp,
            "Rejecting stale write"
        );
        return Err(ServiceError::ConcurrentModification {
            event_id: event.id,
            field: "timestamp",
            client_timestamp,
            actual_timestamp: event.timestamp,
        });
    }
    Ok(())
}

/// ## Summary
/// Rejects attendee changes based on an older state of the stored attendee.
///
/// Attendees without a stored timestamp fall back to the event timestamp.
///
/// ## Errors
/// Returns [`ServiceError::ConcurrentModification`] on a stale timestamp.
pub fn check_attendee_timestamp(
    event: &Event,
    stored: &Attendee,
    client_timestamp: i64,
) -> ServiceResult<()> {
    let Some(actual_timestamp) = stored.timestamp else {
        return check_timestamp(event, client_timestamp);
    };
    if client_timestamp < actual_timestamp {
        return Err(ServiceError::ConcurrentModification {
            event_id: event.id,
            field: "attendee",
            client_timestamp,
            actual_timestamp,
        });
    }
    Ok(())
}
