//! Creation of new events and series.

use kunai_core::model::{Alarm, Event};
use kunai_db::db::CalendarStorage;
use uuid::Uuid;

use crate::calendar::consistency::{check_classification, check_dates, normalize};
use crate::calendar::performer::Performer;
use crate::calendar::permission::{Operation, require_permission};
use crate::calendar::recurrence::validate_rule;
use crate::error::{ServiceError, ServiceResult};
use crate::result::Tracked;

/// Creates an event, or a series when the event carries a recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub folder_id: Uuid,
    /// The event as sent by the client. Storage ids and bookkeeping fields are
    /// assigned by the engine.
    pub event: Event,
    /// Alarms of the calendar user.
    pub alarms: Vec<Alarm>,
}

impl<S: CalendarStorage> Performer<'_, S> {
    /// ## Summary
    /// Performs a create request and returns the stored event.
    ///
    /// ## Errors
    /// Returns [`ServiceError::PermissionDenied`] without create permission,
    /// [`ServiceError::InvalidRecurrenceId`] for events that claim to be change
    /// exceptions, [`ServiceError::ValidationFailed`] for duplicate uids, invalid
    /// dates, classifications or rules, [`ServiceError::InvalidCalendarUser`] for
    /// unresolvable attendees, and storage errors.
    #[tracing::instrument(skip(self, request), fields(folder_id = %request.folder_id))]
    pub(crate) async fn create(&mut self, request: &CreateRequest) -> ServiceResult<Event> {
        require_permission(&self.folder, Operation::Create, None, self.acting_user)?;

        let mut event = request.event.clone();
        if let Some(recurrence_id) = event.recurrence_id {
            return Err(ServiceError::InvalidRecurrenceId(format!(
                "new event cannot be an exception for occurrence {recurrence_id}"
            )));
        }
        if event.uid.trim().is_empty() {
            event.uid = Uuid::new_v4().to_string();
        } else if self.storage.find_event_by_uid(&event.uid).await?.is_some() {
            return Err(ServiceError::ValidationFailed(format!(
                "an event with uid {} already exists",
                event.uid
            )));
        }

        event.id = Uuid::now_v7();
        event.folder_id = self.folder.id;
        event.series_id = event.recurrence_rule.is_some().then_some(event.id);
        event.sequence = 0;
        event.created = self.now;
        event.created_by = self.acting_user;
        event.timestamp = self.timestamp;
        event.last_modified = self.now;
        event.modified_by = self.acting_user;
        event.change_exception_dates.clear();
        event.delete_exception_dates.clear();

        normalize(&mut event);
        check_dates(&event.start_date, &event.end_date)?;
        check_classification(&self.folder, None, event.classification)?;
        if let Some(rule) = &event.recurrence_rule {
            validate_rule(rule, &event.start_date)?;
        }

        let requested = std::mem::take(&mut event.attendees);
        for attendee in &requested {
            let resolved = self.resolve_attendee(attendee)?;
            if event.attendees.iter().any(|other| other.matches(&resolved)) {
                return Err(ServiceError::ValidationFailed(format!(
                    "attendee {:?} listed twice",
                    resolved.uri
                )));
            }
            event.attendees.push(resolved);
        }
        self.enforce_default_attendee(&mut event)?;

        tracing::debug!(
            event_id = %event.id,
            uid = %event.uid,
            series = event.is_series_master(),
            attendees = event.attendees.len(),
            "Creating event"
        );
        self.storage.insert_event(&event).await?;
        if !event.attendees.is_empty() {
            self.storage
                .insert_attendees(event.id, &event.attendees)
                .await?;
        }
        if !request.alarms.is_empty() {
            let alarms: Vec<Alarm> = request.alarms.iter().map(Alarm::copied).collect();
            self.storage
                .insert_alarms(event.id, self.calendar_user, &alarms)
                .await?;
        }
        self.tracker.creation(&event, Tracked::TOP);
        Ok(event)
    }
}
