//! Calendar event entity and its partial update value.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attendee::{Attendee, CalendarUser};
use super::datetime::{CalendarDateTime, RecurrenceId};
use crate::error::{CoreError, CoreResult};

/// Event classification (CLASS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    #[default]
    Public,
    Private,
    Confidential,
}

/// A stored calendar event.
///
/// Series masters have `series_id == Some(id)`; change exceptions carry the
/// master's id in `series_id` plus their own `recurrence_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Storage-local identifier.
    pub id: Uuid,
    /// Folder the event is stored in.
    pub folder_id: Uuid,
    /// Globally unique, client supplied identifier.
    pub uid: String,
    pub series_id: Option<Uuid>,
    pub recurrence_id: Option<RecurrenceId>,
    /// RFC 5545 RRULE value of a series master.
    pub recurrence_rule: Option<String>,
    pub sequence: i32,
    pub created: DateTime<Utc>,
    pub created_by: i32,
    /// Milliseconds since the epoch of the last mutation.
    pub timestamp: i64,
    pub last_modified: DateTime<Utc>,
    pub modified_by: i32,
    pub classification: Classification,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start_date: CalendarDateTime,
    pub end_date: CalendarDateTime,
    pub organizer: Option<CalendarUser>,
    pub attendees: Vec<Attendee>,
    pub change_exception_dates: BTreeSet<RecurrenceId>,
    pub delete_exception_dates: BTreeSet<RecurrenceId>,
}

impl Event {
    /// ## Summary
    /// Creates a single event with the given start and end.
    ///
    /// Storage ids, folder and bookkeeping fields get placeholder values that the
    /// engine replaces when the event is created.
    #[must_use]
    pub fn new(
        uid: impl Into<String>,
        start_date: CalendarDateTime,
        end_date: CalendarDateTime,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::nil(),
            folder_id: Uuid::nil(),
            uid: uid.into(),
            series_id: None,
            recurrence_id: None,
            recurrence_rule: None,
            sequence: 0,
            created: now,
            created_by: 0,
            timestamp: now.timestamp_millis(),
            last_modified: now,
            modified_by: 0,
            classification: Classification::Public,
            summary: None,
            location: None,
            description: None,
            start_date,
            end_date,
            organizer: None,
            attendees: Vec::new(),
            change_exception_dates: BTreeSet::new(),
            delete_exception_dates: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn is_series_master(&self) -> bool {
        self.series_id == Some(self.id) && self.recurrence_id.is_none()
    }

    #[must_use]
    pub fn is_series_exception(&self) -> bool {
        self.series_id.is_some_and(|series| series != self.id) && self.recurrence_id.is_some()
    }

    /// An event is group scheduled as soon as it has attendees.
    #[must_use]
    pub fn is_group_scheduled(&self) -> bool {
        !self.attendees.is_empty()
    }

    #[must_use]
    pub fn is_organizer(&self, entity: i32) -> bool {
        self.organizer
            .as_ref()
            .is_some_and(|organizer| organizer.entity > 0 && organizer.entity == entity)
    }

    #[must_use]
    pub fn find_attendee(&self, entity: i32) -> Option<&Attendee> {
        self.attendees.iter().find(|attendee| attendee.is_user(entity))
    }

    /// Returns whether `entity` is the only internal user among the attendees.
    #[must_use]
    pub fn is_last_user_attendee(&self, entity: i32) -> bool {
        let mut internal = self.attendees.iter().filter(|a| a.is_internal());
        internal.next().is_some_and(|a| a.is_user(entity)) && internal.next().is_none()
    }

    /// Identifier shared by every event of the same series, or the own id.
    #[must_use]
    pub fn series_or_id(&self) -> Uuid {
        self.series_id.unwrap_or(self.id)
    }

    /// ## Summary
    /// Checks that no recurrence id is both a change and a delete exception.
    ///
    /// ## Errors
    /// Returns [`CoreError::ConflictingExceptionDate`] for the first offending id.
    pub fn check_exception_dates(&self) -> CoreResult<()> {
        match self
            .change_exception_dates
            .intersection(&self.delete_exception_dates)
            .next()
        {
            Some(recurrence_id) => Err(CoreError::ConflictingExceptionDate(*recurrence_id)),
            None => Ok(()),
        }
    }
}

/// ## Summary
/// Partial update of an [`Event`].
///
/// Only populated fields are written. Nullable properties use a nested `Option`
/// so that `Some(None)` clears the value while `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventUpdate {
    pub folder_id: Option<Uuid>,
    pub series_id: Option<Option<Uuid>>,
    pub recurrence_rule: Option<Option<String>>,
    pub sequence: Option<i32>,
    pub timestamp: Option<i64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub modified_by: Option<i32>,
    pub classification: Option<Classification>,
    pub summary: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub start_date: Option<CalendarDateTime>,
    pub end_date: Option<CalendarDateTime>,
    pub organizer: Option<Option<CalendarUser>>,
    pub attendees: Option<Vec<Attendee>>,
    pub change_exception_dates: Option<BTreeSet<RecurrenceId>>,
    pub delete_exception_dates: Option<BTreeSet<RecurrenceId>>,
}

impl EventUpdate {
    /// ## Summary
    /// Creates the update that marks an event as modified by `user` at `timestamp`.
    #[must_use]
    pub fn touch(timestamp: i64, now: DateTime<Utc>, user: i32) -> Self {
        Self {
            timestamp: Some(timestamp),
            last_modified: Some(now),
            modified_by: Some(user),
            ..Self::default()
        }
    }

    /// Returns whether any property beyond the modification stamp is populated.
    #[must_use]
    pub fn changes_properties(&self) -> bool {
        let stamp_only = Self {
            timestamp: self.timestamp,
            last_modified: self.last_modified,
            modified_by: self.modified_by,
            ..Self::default()
        };
        *self != stamp_only
    }

    /// ## Summary
    /// Writes every populated field onto `event`.
    pub fn apply_to(&self, event: &mut Event) {
        fn set<T: Clone>(target: &mut T, value: Option<&T>) {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }

        set(&mut event.folder_id, self.folder_id.as_ref());
        set(&mut event.series_id, self.series_id.as_ref());
        set(&mut event.recurrence_rule, self.recurrence_rule.as_ref());
        set(&mut event.sequence, self.sequence.as_ref());
        set(&mut event.timestamp, self.timestamp.as_ref());
        set(&mut event.last_modified, self.last_modified.as_ref());
        set(&mut event.modified_by, self.modified_by.as_ref());
        set(&mut event.classification, self.classification.as_ref());
        set(&mut event.summary, self.summary.as_ref());
        set(&mut event.location, self.location.as_ref());
        set(&mut event.description, self.description.as_ref());
        set(&mut event.start_date, self.start_date.as_ref());
        set(&mut event.end_date, self.end_date.as_ref());
        set(&mut event.organizer, self.organizer.as_ref());
        set(&mut event.attendees, self.attendees.as_ref());
        set(
            &mut event.change_exception_dates,
            self.change_exception_dates.as_ref(),
        );
        set(
            &mut event.delete_exception_dates,
            self.delete_exception_dates.as_ref(),
        );
    }

    /// Returns a copy of `event` with this update applied.
    #[must_use]
    pub fn applied(&self, event: &Event) -> Event {
        let mut updated = event.clone();
        self.apply_to(&mut updated);
        updated
    }
}
