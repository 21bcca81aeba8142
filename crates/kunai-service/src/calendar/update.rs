//! Updates of event properties, attendee lists and alarms.
//!
//! One request may move the event, change its properties and replace the calendar
//! user's alarms. The steps run in that order inside the same unit of work, and
//! their results are merged per event.

use kunai_core::diff::{EventField, collection_diff, diff, merge_set_fields};
use kunai_core::model::{
    Alarm, Attendee, AttendeeTombstone, Event, EventUpdate, ParticipationStatus, RecurrenceId,
};
use kunai_db::db::CalendarStorage;
use uuid::Uuid;

use crate::calendar::consistency::{
    check_classification, check_dates, check_exception_dates, check_timestamp, normalize,
};
use crate::calendar::performer::{Performer, Target};
use crate::calendar::permission::{Operation, require_permission};
use crate::calendar::recurrence::validate_rule;
use crate::collaborator::CalendarSession;
use crate::error::{ServiceError, ServiceResult};
use crate::result::Tracked;

/// Changes an event, a series, or one occurrence of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub folder_id: Uuid,
    pub event_id: Uuid,
    /// Occurrence to change when `event_id` names a series master.
    pub recurrence_id: Option<RecurrenceId>,
    pub client_timestamp: i64,
    /// Folder to move the event to before the changes are applied.
    pub target_folder: Option<Uuid>,
    /// Requested property changes. An `attendees` list replaces the stored one;
    /// properties left unset on a listed attendee keep their stored value.
    pub changes: EventUpdate,
    /// Replacement alarm set of the calendar user.
    pub alarms: Option<Vec<Alarm>>,
}

impl UpdateRequest {
    /// A request that only changes properties of the addressed event.
    #[must_use]
    pub fn new(
        folder_id: Uuid,
        event_id: Uuid,
        client_timestamp: i64,
        changes: EventUpdate,
    ) -> Self {
        Self {
            folder_id,
            event_id,
            recurrence_id: None,
            client_timestamp,
            target_folder: None,
            changes,
            alarms: None,
        }
    }
}

/// Drops the parts of a client update the engine maintains itself.
fn client_changes(changes: &EventUpdate) -> EventUpdate {
    EventUpdate {
        folder_id: None,
        series_id: None,
        sequence: None,
        timestamp: None,
        last_modified: None,
        modified_by: None,
        change_exception_dates: None,
        delete_exception_dates: None,
        ..changes.clone()
    }
}

impl<S: CalendarStorage> Performer<'_, S> {
    /// ## Summary
    /// Performs an update request: move, then property changes, then alarms.
    ///
    /// Changing properties of a group-scheduled event requires acting as its
    /// organizer. Changing an occurrence materializes a change exception first.
    ///
    /// ## Errors
    /// Returns the guard errors, [`ServiceError::PermissionDenied`] when acting as
    /// a mere attendee, [`ServiceError::ValidationFailed`] for invalid dates,
    /// classifications or rules, and storage errors.
    #[tracing::instrument(skip(self, request), fields(event_id = %request.event_id))]
    pub(crate) async fn update(&mut self, request: &UpdateRequest) -> ServiceResult<()> {
        let event = self.load_in_folder(request.event_id).await?;
        require_permission(&self.folder, Operation::Write, Some(&event), self.acting_user)?;
        check_timestamp(&event, request.client_timestamp)?;

        let changes = client_changes(&request.changes);
        let changes_properties = changes.changes_properties();
        if changes_properties && !self.acts_as_organizer(&event) {
            return Err(ServiceError::PermissionDenied(format!(
                "only the organizer may change event {}",
                event.id
            )));
        }
        let target = self.resolve_target(&event, request.recurrence_id).await?;

        let mut event = event;
        if let Some(target_folder) = request.target_folder
            && target_folder != self.folder.id
        {
            if !matches!(target, Target::Event) {
                return Err(ServiceError::ValidationFailed(
                    "single occurrences cannot be moved to another folder".to_string(),
                ));
            }
            require_permission(&self.folder, Operation::Delete, Some(&event), self.acting_user)?;
            let session = CalendarSession::new(self.acting_user);
            let folder = self.collaborators.folders.resolve(target_folder, &session)?;
            (event, _) = self.relocate(&event, folder).await?;
        }

        let (current, parent) = match target {
            Target::Event if changes_properties => {
                self.update_single(&event, &changes, Tracked::TOP).await?
            }
            Target::Event => (event, Tracked::TOP),
            Target::Exception { master, exception } if changes_properties => {
                let (updated, tracked) = self
                    .update_single(&exception, &changes, Tracked::TOP)
                    .await?;
                self.touch(&master, tracked).await?;
                (updated, tracked)
            }
            Target::Exception { exception, .. } => (exception, Tracked::TOP),
            Target::Occurrence(recurrence_id) => {
                let (exception, tracked) =
                    self.materialize(&event, recurrence_id, Tracked::TOP).await?;
                if changes_properties {
                    // Merges into the exception's creation.
                    self.update_single(&exception, &changes, tracked).await?
                } else {
                    (exception, tracked)
                }
            }
        };

        if let Some(alarms) = &request.alarms {
            self.apply_alarms(&current, alarms, parent).await?;
        }
        Ok(())
    }

    /// ## Summary
    /// Applies property changes to one stored event and records the update.
    ///
    /// Rescheduling bumps the sequence and asks every other attendee to respond
    /// again. Moving the start or changing the rule of a series master deletes its
    /// change exceptions, nested below the master's update.
    pub(crate) async fn update_single(
        &mut self,
        original: &Event,
        changes: &EventUpdate,
        parent: Tracked,
    ) -> ServiceResult<(Event, Tracked)> {
        let properties = EventUpdate {
            attendees: None,
            ..changes.clone()
        };
        let mut updated = properties.applied(original);
        normalize(&mut updated);
        check_dates(&updated.start_date, &updated.end_date)?;
        check_classification(
            &self.folder,
            Some(original.classification),
            updated.classification,
        )?;
        check_rule_change(original, &mut updated)?;
        if let Some(requested) = &changes.attendees {
            updated.attendees = self.requested_attendees(original, requested)?;
        }
        self.enforce_default_attendee(&mut updated)?;

        let fields = diff(Some(original), Some(&updated));
        if EventField::RESCHEDULING.iter().any(|field| fields.contains(field)) {
            updated.sequence = original.sequence + 1;
            self.reset_partstats(&mut updated);
        }
        let drop_exceptions = original.is_series_master()
            && (fields.contains(&EventField::StartDate)
                || fields.contains(&EventField::RecurrenceRule));
        if drop_exceptions {
            updated.change_exception_dates.clear();
            updated.delete_exception_dates.clear();
        }
        updated.timestamp = self.timestamp;
        updated.last_modified = self.now;
        updated.modified_by = self.acting_user;
        check_exception_dates(&updated)?;

        self.write_attendees(original, &updated).await?;
        let update = EventUpdate::from_fields(&updated, &diff(Some(original), Some(&updated)));
        let (updated, tracked) = self.write_update(original, &update, parent).await?;
        if drop_exceptions {
            tracing::debug!(series_id = %original.id, "Series rescheduled, dropping exceptions");
            for exception in self.load_exceptions(original.id).await? {
                self.delete_single(&exception, tracked).await?;
            }
        }
        Ok((updated, tracked))
    }

    /// Builds the attendee list requested for `original`.
    fn requested_attendees(
        &self,
        original: &Event,
        requested: &[Attendee],
    ) -> ServiceResult<Vec<Attendee>> {
        let changes = collection_diff(&original.attendees, requested, Attendee::matches);
        let mut attendees: Vec<Attendee> = original
            .attendees
            .iter()
            .filter(|stored| !changes.removed().iter().any(|removed| removed.matches(stored)))
            .cloned()
            .collect();
        for item in changes.updated() {
            if let Some(stored) = attendees
                .iter_mut()
                .find(|stored| stored.matches(item.original()))
            {
                merge_set_fields(item.updated(), stored);
                stored.timestamp = Some(self.timestamp);
            }
        }
        for added in changes.added() {
            attendees.push(self.resolve_attendee(added)?);
        }
        Ok(attendees)
    }

    /// Asks every attendee but the calendar user and the organizer to respond again.
    fn reset_partstats(&self, event: &mut Event) {
        let organizer = event.organizer.clone();
        for attendee in &mut event.attendees {
            let is_organizer = organizer.as_ref().is_some_and(|organizer| {
                organizer.matches(attendee.entity, attendee.uri.as_deref())
            });
            if attendee.is_user(self.calendar_user)
                || is_organizer
                || attendee.partstat == Some(ParticipationStatus::NeedsAction)
            {
                continue;
            }
            attendee.partstat = Some(ParticipationStatus::NeedsAction);
            attendee.timestamp = Some(self.timestamp);
        }
    }

    /// Writes the difference between the attendee lists of `original` and `updated`.
    async fn write_attendees(&mut self, original: &Event, updated: &Event) -> ServiceResult<()> {
        let changes = collection_diff(&original.attendees, &updated.attendees, Attendee::matches);
        if changes.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            event_id = %original.id,
            added = changes.added().len(),
            updated = changes.updated().len(),
            removed = changes.removed().len(),
            "Updating attendees"
        );

        if !changes.added().is_empty() {
            self.storage
                .insert_attendees(original.id, changes.added())
                .await?;
        }
        if !changes.updated().is_empty() {
            let attendees: Vec<Attendee> = changes
                .updated()
                .iter()
                .map(|item| item.updated().clone())
                .collect();
            self.storage
                .update_attendees(original.id, &attendees)
                .await?;
        }
        if !changes.removed().is_empty() {
            let tombstones: Vec<AttendeeTombstone> = changes
                .removed()
                .iter()
                .map(|attendee| AttendeeTombstone::new(attendee, self.timestamp))
                .collect();
            self.storage
                .insert_tombstone_attendees(original.id, &tombstones)
                .await?;
            self.storage
                .delete_attendees(original.id, changes.removed())
                .await?;
            for attendee in changes.removed().iter().filter(|a| a.is_internal()) {
                let alarms = self.storage.load_alarms(original.id, attendee.entity).await?;
                if !alarms.is_empty() {
                    self.storage
                        .delete_alarms(original.id, attendee.entity, &alarms)
                        .await?;
                }
            }
        }
        Ok(())
    }
}

/// ## Summary
/// Validates a changed recurrence rule and keeps the series id in line with it.
///
/// ## Errors
/// Returns [`ServiceError::ValidationFailed`] for rules on change exceptions and
/// for invalid rules.
fn check_rule_change(original: &Event, updated: &mut Event) -> ServiceResult<()> {
    if updated.recurrence_rule == original.recurrence_rule {
        return Ok(());
    }
    if original.is_series_exception() {
        return Err(ServiceError::ValidationFailed(format!(
            "change exception {} cannot carry a recurrence rule",
            original.id
        )));
    }
    match &updated.recurrence_rule {
        Some(rule) => {
            validate_rule(rule, &updated.start_date)?;
            updated.series_id = Some(original.id);
        }
        None => updated.series_id = None,
    }
    Ok(())
}
