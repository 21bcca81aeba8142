//! Field table of [`Event`].
//!
//! A stored event is a complete entity, so every field counts as set. Sparse
//! changes arrive as [`crate::model::EventUpdate`] and are applied before diffing.

use std::collections::BTreeSet;

use crate::model::{Event, EventUpdate};

use super::{FieldMapping, Mapped};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventField {
    FolderId,
    SeriesId,
    RecurrenceRule,
    Sequence,
    Timestamp,
    LastModified,
    ModifiedBy,
    Classification,
    Summary,
    Location,
    Description,
    StartDate,
    EndDate,
    Organizer,
    Attendees,
    ChangeExceptionDates,
    DeleteExceptionDates,
}

impl EventField {
    /// Changes that move the event in time.
    pub const RESCHEDULING: &'static [Self] =
        &[Self::StartDate, Self::EndDate, Self::RecurrenceRule];
}

macro_rules! event_field {
    ($field:expr, $name:ident) => {
        FieldMapping {
            field: $field,
            is_set: |_: &Event| true,
            equals: |a: &Event, b: &Event| a.$name == b.$name,
            copy: |from: &Event, to: &mut Event| to.$name.clone_from(&from.$name),
        }
    };
}

static EVENT_MAPPINGS: [FieldMapping<Event, EventField>; 17] = [
    event_field!(EventField::FolderId, folder_id),
    event_field!(EventField::SeriesId, series_id),
    event_field!(EventField::RecurrenceRule, recurrence_rule),
    event_field!(EventField::Sequence, sequence),
    event_field!(EventField::Timestamp, timestamp),
    event_field!(EventField::LastModified, last_modified),
    event_field!(EventField::ModifiedBy, modified_by),
    event_field!(EventField::Classification, classification),
    event_field!(EventField::Summary, summary),
    event_field!(EventField::Location, location),
    event_field!(EventField::Description, description),
    event_field!(EventField::StartDate, start_date),
    event_field!(EventField::EndDate, end_date),
    event_field!(EventField::Organizer, organizer),
    event_field!(EventField::Attendees, attendees),
    event_field!(EventField::ChangeExceptionDates, change_exception_dates),
    event_field!(EventField::DeleteExceptionDates, delete_exception_dates),
];

impl Mapped for Event {
    type Field = EventField;

    fn mappings() -> &'static [FieldMapping<Self, Self::Field>] {
        &EVENT_MAPPINGS
    }
}

impl EventUpdate {
    /// ## Summary
    /// Builds the partial update that writes the given fields of `event`.
    #[must_use]
    pub fn from_fields(event: &Event, fields: &BTreeSet<EventField>) -> Self {
        let mut update = Self::default();
        for field in fields {
            match field {
                EventField::FolderId => update.folder_id = Some(event.folder_id),
                EventField::SeriesId => update.series_id = Some(event.series_id),
                EventField::RecurrenceRule => {
                    update.recurrence_rule = Some(event.recurrence_rule.clone());
                }
                EventField::Sequence => update.sequence = Some(event.sequence),
                EventField::Timestamp => update.timestamp = Some(event.timestamp),
                EventField::LastModified => update.last_modified = Some(event.last_modified),
                EventField::ModifiedBy => update.modified_by = Some(event.modified_by),
                EventField::Classification => update.classification = Some(event.classification),
                EventField::Summary => update.summary = Some(event.summary.clone()),
                EventField::Location => update.location = Some(event.location.clone()),
                EventField::Description => update.description = Some(event.description.clone()),
                EventField::StartDate => update.start_date = Some(event.start_date),
                EventField::EndDate => update.end_date = Some(event.end_date),
                EventField::Organizer => update.organizer = Some(event.organizer.clone()),
                EventField::Attendees => update.attendees = Some(event.attendees.clone()),
                EventField::ChangeExceptionDates => {
                    update.change_exception_dates = Some(event.change_exception_dates.clone());
                }
                EventField::DeleteExceptionDates => {
                    update.delete_exception_dates = Some(event.delete_exception_dates.clone());
                }
            }
        }
        update
    }
}
