//! Deletion tombstones retained for change propagation and sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attendee::Attendee;
use super::datetime::RecurrenceId;
use super::event::Event;

/// Reduced snapshot of a deleted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTombstone {
    pub id: Uuid,
    pub folder_id: Uuid,
    pub uid: String,
    pub series_id: Option<Uuid>,
    pub recurrence_id: Option<RecurrenceId>,
    pub created_by: i32,
    pub timestamp: i64,
    pub last_modified: DateTime<Utc>,
    pub modified_by: i32,
}

impl EventTombstone {
    /// Builds the tombstone of `event` deleted by `user` at `timestamp`.
    #[must_use]
    pub fn new(event: &Event, timestamp: i64, now: DateTime<Utc>, user: i32) -> Self {
        Self {
            id: event.id,
            folder_id: event.folder_id,
            uid: event.uid.clone(),
            series_id: event.series_id,
            recurrence_id: event.recurrence_id,
            created_by: event.created_by,
            timestamp,
            last_modified: now,
            modified_by: user,
        }
    }
}

/// Reduced snapshot of an attendee removed from an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeTombstone {
    pub entity: i32,
    pub uri: Option<String>,
    pub folder_id: Option<Uuid>,
    pub timestamp: i64,
}

impl AttendeeTombstone {
    #[must_use]
    pub fn new(attendee: &Attendee, timestamp: i64) -> Self {
        Self {
            entity: attendee.entity,
            uri: attendee.uri.clone(),
            folder_id: attendee.folder_id,
            timestamp,
        }
    }
}
