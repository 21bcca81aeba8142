//! Moving events between folders.

use kunai_core::model::{Classification, Event};
use kunai_db::db::CalendarStorage;
use uuid::Uuid;

use crate::calendar::consistency::check_timestamp;
use crate::calendar::performer::Performer;
use crate::calendar::permission::{Operation, require_permission};
use crate::collaborator::{CalendarFolder, CalendarSession};
use crate::error::{ServiceError, ServiceResult};
use crate::result::Tracked;

/// Moves an event, with all its change exceptions, to another folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub folder_id: Uuid,
    pub event_id: Uuid,
    pub client_timestamp: i64,
    pub target_folder_id: Uuid,
}

/// ## Summary
/// Checks that `event` may leave `source` for `target`.
///
/// ## Errors
/// Returns [`ServiceError::ValidationFailed`] for change exceptions, non-public
/// events entering a public folder, group-scheduled events crossing a public
/// folder boundary, and moves between calendars of different users.
fn check_move(
    source: &CalendarFolder,
    target: &CalendarFolder,
    event: &Event,
    acting_user: i32,
) -> ServiceResult<()> {
    if event.is_series_exception() {
        return Err(ServiceError::ValidationFailed(format!(
            "change exception {} cannot be moved without its series",
            event.id
        )));
    }
    if target.is_public() && event.classification != Classification::Public {
        return Err(ServiceError::ValidationFailed(format!(
            "{:?} events cannot be moved into public folder {}",
            event.classification, target.id
        )));
    }
    if event.is_group_scheduled() && (source.is_public() || target.is_public()) {
        return Err(ServiceError::ValidationFailed(
            "group scheduled events cannot be moved into or out of public folders".to_string(),
        ));
    }
    if !source.is_public()
        && !target.is_public()
        && source.calendar_user(acting_user) != target.calendar_user(acting_user)
    {
        return Err(ServiceError::ValidationFailed(format!(
            "folders {} and {} belong to different calendar users",
            source.id, target.id
        )));
    }
    Ok(())
}

impl<S: CalendarStorage> Performer<'_, S> {
    /// ## Summary
    /// Performs a move request.
    ///
    /// ## Errors
    /// Returns the guard errors, [`ServiceError::PermissionDenied`] if the event
    /// may not be deleted from the source or created in the target folder, the
    /// errors of [`check_move`], and storage errors.
    #[tracing::instrument(skip(self), fields(folder_id = %self.folder.id))]
    pub(crate) async fn move_event(&mut self, request: &MoveRequest) -> ServiceResult<()> {
        let event = self.load_in_folder(request.event_id).await?;
        require_permission(&self.folder, Operation::Delete, Some(&event), self.acting_user)?;
        check_timestamp(&event, request.client_timestamp)?;
        let target = self
            .collaborators
            .folders
            .resolve(request.target_folder_id, &CalendarSession::new(self.acting_user))?;
        self.relocate(&event, target).await?;
        Ok(())
    }

    /// ## Summary
    /// Moves `event` and its change exceptions from the performer's folder to
    /// `target`, which becomes the performer's folder.
    ///
    /// The event's storage folder changes if it is stored in the source folder;
    /// the calendar user's attendee folder changes if it points there.
    pub(crate) async fn relocate(
        &mut self,
        event: &Event,
        target: CalendarFolder,
    ) -> ServiceResult<(Event, Tracked)> {
        if target.id == self.folder.id {
            return Ok((event.clone(), Tracked::TOP));
        }
        require_permission(&target, Operation::Create, None, self.acting_user)?;
        check_move(&self.folder, &target, event, self.acting_user)?;
        tracing::debug!(
            event_id = %event.id,
            source = %self.folder.id,
            target = %target.id,
            "Moving event"
        );

        let (moved, tracked) = self.relocate_one(event, &target, Tracked::TOP).await?;
        if event.is_series_master() {
            for exception in self.load_exceptions(event.id).await? {
                self.relocate_one(&exception, &target, tracked).await?;
            }
        }
        self.calendar_user = target.calendar_user(self.acting_user);
        self.folder = target;
        Ok((moved, tracked))
    }

    async fn relocate_one(
        &mut self,
        event: &Event,
        target: &CalendarFolder,
        parent: Tracked,
    ) -> ServiceResult<(Event, Tracked)> {
        let source = self.folder.id;
        let mut update = self.touch_update();
        if event.folder_id == source {
            update.folder_id = Some(target.id);
        }

        let mut attendees = event.attendees.clone();
        let mut moved = Vec::new();
        for attendee in &mut attendees {
            if attendee.is_user(self.calendar_user) && attendee.folder_id == Some(source) {
                attendee.folder_id = (!target.is_public()).then_some(target.id);
                attendee.timestamp = Some(self.timestamp);
                moved.push(attendee.clone());
            }
        }
        if !moved.is_empty() {
            self.storage.update_attendees(event.id, &moved).await?;
            update.attendees = Some(attendees);
        }
        self.write_update(event, &update, parent).await
    }
}
