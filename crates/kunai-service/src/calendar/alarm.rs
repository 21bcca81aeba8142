//! Per-user alarm changes.

use kunai_core::diff::{collection_diff, merge_set_fields};
use kunai_core::model::{Alarm, Event, RecurrenceId};
use kunai_db::db::CalendarStorage;
use uuid::Uuid;

use crate::calendar::consistency::check_timestamp;
use crate::calendar::performer::{Performer, Target};
use crate::calendar::permission::{Operation, require_permission};
use crate::error::ServiceResult;
use crate::result::Tracked;

/// Replaces the calendar user's alarms on an event or one occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmUpdateRequest {
    pub folder_id: Uuid,
    pub event_id: Uuid,
    pub recurrence_id: Option<RecurrenceId>,
    pub client_timestamp: i64,
    /// The complete requested alarm set. Alarms are matched by uid; properties left
    /// unset keep their stored value.
    pub alarms: Vec<Alarm>,
}

impl<S: CalendarStorage> Performer<'_, S> {
    /// ## Summary
    /// Performs an alarm update request.
    ///
    /// Alarms are personal, so reading the event is enough. Occurrences without a
    /// change exception get one first.
    ///
    /// ## Errors
    /// Returns the guard errors of [`Performer::resolve_target`], permission and
    /// timestamp checks, and storage errors.
    #[tracing::instrument(skip(self, request), fields(event_id = %request.event_id))]
    pub(crate) async fn update_alarms(
        &mut self,
        request: &AlarmUpdateRequest,
    ) -> ServiceResult<()> {
        let event = self.load_in_folder(request.event_id).await?;
        require_permission(&self.folder, Operation::Read, Some(&event), self.acting_user)?;
        check_timestamp(&event, request.client_timestamp)?;
        if !self.acts_as_organizer(&event) {
            self.own_attendee(&event)?;
        }

        let (target, parent) = match self.resolve_target(&event, request.recurrence_id).await? {
            Target::Event => (event, Tracked::TOP),
            Target::Exception { exception, .. } => (exception, Tracked::TOP),
            Target::Occurrence(recurrence_id) => {
                self.materialize(&event, recurrence_id, Tracked::TOP).await?
            }
        };
        self.apply_alarms(&target, &request.alarms, parent).await?;
        Ok(())
    }

    /// ## Summary
    /// Brings the calendar user's stored alarms on `event` in line with
    /// `requested` and touches the event.
    ///
    /// Nothing is written when the alarms already match.
    pub(crate) async fn apply_alarms(
        &mut self,
        event: &Event,
        requested: &[Alarm],
        parent: Tracked,
    ) -> ServiceResult<Tracked> {
        let user = self.calendar_user;
        let stored = self.storage.load_alarms(event.id, user).await?;
        let changes = collection_diff(&stored, requested, Alarm::matches);
        if changes.is_empty() {
            tracing::trace!(event_id = %event.id, "Alarms unchanged");
            return Ok(parent);
        }
        tracing::debug!(
            event_id = %event.id,
            added = changes.added().len(),
            updated = changes.updated().len(),
            removed = changes.removed().len(),
            "Updating alarms"
        );

        if !changes.added().is_empty() {
            let added: Vec<Alarm> = changes.added().iter().map(Alarm::copied).collect();
            self.storage.insert_alarms(event.id, user, &added).await?;
        }
        if !changes.updated().is_empty() {
            let updated: Vec<Alarm> = changes
                .updated()
                .iter()
                .map(|item| {
                    let mut merged = item.original().clone();
                    merge_set_fields(item.updated(), &mut merged);
                    merged
                })
                .collect();
            self.storage.update_alarms(event.id, user, &updated).await?;
        }
        if !changes.removed().is_empty() {
            self.storage
                .delete_alarms(event.id, user, changes.removed())
                .await?;
        }

        let (_, tracked) = self.touch(event, parent).await?;
        Ok(tracked)
    }
}
