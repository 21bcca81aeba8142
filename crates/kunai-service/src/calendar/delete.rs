//! Deletion of events, series, change exceptions and single occurrences.
//!
//! Whether a delete removes the event itself or only the calendar user's
//! participation depends on their role, see [`Performer::deletes_whole_event`].
//!
//! | Role | Target | Effect |
//! |---|---|---|
//! | organizer | single event | event, attendees and alarms removed, tombstoned |
//! | organizer | series | exceptions removed first, then the master |
//! | organizer | occurrence | occurrence added to the master's delete exceptions |
//! | organizer | change exception | exception removed, its occurrence deleted on the master |
//! | attendee | single event or series | attendee removed from the event and all exceptions |
//! | attendee | occurrence | change exception without the attendee created |
//! | attendee | change exception | attendee removed from the exception, master touched |

use kunai_core::model::{Event, RecurrenceId};
use kunai_db::db::CalendarStorage;
use uuid::Uuid;

use crate::calendar::consistency::check_timestamp;
use crate::calendar::performer::{Performer, Target};
use crate::calendar::permission::{Operation, require_permission};
use crate::error::{ServiceError, ServiceResult};
use crate::result::Tracked;

/// Deletes an event, a series, or one occurrence of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub folder_id: Uuid,
    pub event_id: Uuid,
    /// Occurrence to delete when `event_id` names a series master.
    pub recurrence_id: Option<RecurrenceId>,
    /// Timestamp of the client's last known state of the event.
    pub client_timestamp: i64,
}

impl<S: CalendarStorage> Performer<'_, S> {
    /// ## Summary
    /// Performs a delete request.
    ///
    /// Existence, permission and the client timestamp are checked before anything
    /// is written.
    ///
    /// ## Errors
    /// Returns [`ServiceError::NotFound`], [`ServiceError::PermissionDenied`],
    /// [`ServiceError::ConcurrentModification`] or
    /// [`ServiceError::InvalidRecurrenceId`] from the guards, and storage errors
    /// from the writes.
    #[tracing::instrument(skip(self), fields(folder_id = %self.folder.id))]
    pub(crate) async fn delete(&mut self, request: &DeleteRequest) -> ServiceResult<()> {
        let event = self.load_in_folder(request.event_id).await?;
        require_permission(&self.folder, Operation::Delete, Some(&event), self.acting_user)?;
        check_timestamp(&event, request.client_timestamp)?;

        match self.resolve_target(&event, request.recurrence_id).await? {
            Target::Event => self.delete_whole_target(&event).await,
            Target::Exception { master, exception } => {
                self.delete_exception(&master, &exception).await
            }
            Target::Occurrence(recurrence_id) => {
                self.delete_occurrence(&event, recurrence_id).await
            }
        }
    }

    async fn delete_whole_target(&mut self, event: &Event) -> ServiceResult<()> {
        if self.deletes_whole_event(event) {
            tracing::debug!(
                event_id = %event.id,
                series = event.is_series_master(),
                "Deleting event"
            );
            self.delete_event(event, Tracked::TOP).await?;
            return Ok(());
        }

        let attendee = self.own_attendee(event)?;
        tracing::debug!(
            event_id = %event.id,
            entity = attendee.entity,
            "Removing attendee from event"
        );
        let (_, tracked) = self.remove_attendee(event, &attendee, Tracked::TOP).await?;
        if event.is_series_master() {
            for exception in self.load_exceptions(event.id).await? {
                if let Some(attendee) = exception.find_attendee(self.calendar_user).cloned() {
                    self.remove_attendee(&exception, &attendee, tracked).await?;
                }
            }
        }
        Ok(())
    }

    async fn delete_exception(&mut self, master: &Event, exception: &Event) -> ServiceResult<()> {
        if self.deletes_whole_event(exception) {
            let recurrence_id = exception.recurrence_id.ok_or_else(|| {
                ServiceError::InvalidRecurrenceId(format!(
                    "exception {} has no recurrence id",
                    exception.id
                ))
            })?;
            tracing::debug!(
                exception_id = %exception.id,
                %recurrence_id,
                "Deleting change exception"
            );
            let tracked = self.delete_single(exception, Tracked::TOP).await?;
            self.add_delete_exception_date(master, recurrence_id, tracked)
                .await?;
            return Ok(());
        }

        let attendee = self.own_attendee(exception)?;
        let (_, tracked) = self
            .remove_attendee(exception, &attendee, Tracked::TOP)
            .await?;
        self.touch(master, tracked).await?;
        Ok(())
    }

    async fn delete_occurrence(
        &mut self,
        master: &Event,
        recurrence_id: RecurrenceId,
    ) -> ServiceResult<()> {
        if self.deletes_whole_event(master) {
            tracing::debug!(series_id = %master.id, %recurrence_id, "Deleting occurrence");
            self.add_delete_exception_date(master, recurrence_id, Tracked::TOP)
                .await?;
            return Ok(());
        }

        let attendee = self.own_attendee(master)?;
        let mut exception = self.prepare_exception(master, recurrence_id);
        exception
            .attendees
            .retain(|other| !other.matches(&attendee));
        let tracked = self
            .insert_exception(master, &exception, Some(attendee.entity), Tracked::TOP)
            .await?;
        self.add_change_exception_date(master, recurrence_id, tracked)
            .await?;
        Ok(())
    }
}
