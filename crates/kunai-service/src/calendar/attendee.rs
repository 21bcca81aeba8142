//! Participation changes of a single attendee.

use kunai_core::diff::{AttendeeField, diff, merge_set_fields};
use kunai_core::model::{Attendee, Event, RecurrenceId};
use kunai_db::db::CalendarStorage;
use uuid::Uuid;

use crate::calendar::consistency::check_attendee_timestamp;
use crate::calendar::performer::{Performer, Target};
use crate::calendar::permission::{Operation, require_permission};
use crate::error::{ServiceError, ServiceResult};
use crate::result::Tracked;

/// Changes one attendee of an event or of one occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendeeUpdateRequest {
    pub folder_id: Uuid,
    pub event_id: Uuid,
    pub recurrence_id: Option<RecurrenceId>,
    /// Timestamp of the client's last known state of the attendee.
    pub client_timestamp: i64,
    /// Identifies the attendee and carries the properties to change.
    pub attendee: Attendee,
}

fn find_attendee<'e>(event: &'e Event, attendee: &Attendee) -> ServiceResult<&'e Attendee> {
    event
        .attendees
        .iter()
        .find(|stored| stored.matches(attendee))
        .ok_or_else(|| ServiceError::NotFound(format!("attendee of event {}", event.id)))
}

impl<S: CalendarStorage> Performer<'_, S> {
    /// ## Summary
    /// Performs an attendee update request.
    ///
    /// The calendar user may change the self-service properties of their own
    /// participation with read access; changing anyone else needs write access
    /// and the organizer role. A new participation status set on a series master
    /// is carried over to every exception that still had the previous one.
    ///
    /// ## Errors
    /// Returns [`ServiceError::NotFound`] for unknown attendees,
    /// [`ServiceError::PermissionDenied`], [`ServiceError::ConcurrentModification`]
    /// when the attendee changed since the client read it, and storage errors.
    #[tracing::instrument(skip(self, request), fields(event_id = %request.event_id))]
    pub(crate) async fn update_attendee(
        &mut self,
        request: &AttendeeUpdateRequest,
    ) -> ServiceResult<()> {
        let event = self.load_in_folder(request.event_id).await?;
        let own = request.attendee.is_user(self.calendar_user);
        let operation = if own { Operation::Read } else { Operation::Write };
        require_permission(&self.folder, operation, Some(&event), self.acting_user)?;

        let target = self.resolve_target(&event, request.recurrence_id).await?;
        let concrete = match &target {
            Target::Exception { exception, .. } => exception,
            Target::Event | Target::Occurrence(_) => &event,
        };
        let stored = find_attendee(concrete, &request.attendee)?.clone();
        check_attendee_timestamp(concrete, &stored, request.client_timestamp)?;

        let fields = diff(Some(&stored), Some(&request.attendee));
        if !self.acts_as_organizer(concrete) {
            let self_service = fields
                .iter()
                .all(|field| AttendeeField::SELF_SERVICE.contains(field));
            if !own || !self_service {
                return Err(ServiceError::PermissionDenied(format!(
                    "only the organizer may change {fields:?} of attendees of event {}",
                    concrete.id
                )));
            }
        }
        if fields.is_empty() {
            tracing::trace!("Attendee unchanged");
            return Ok(());
        }

        match target {
            Target::Event => {
                let tracked = self
                    .apply_attendee(&event, &request.attendee, Tracked::TOP)
                    .await?;
                if event.is_series_master() && fields.contains(&AttendeeField::Partstat) {
                    self.propagate_partstat(&event, &stored, &request.attendee, tracked)
                        .await?;
                }
            }
            Target::Exception { master, exception } => {
                let tracked = self
                    .apply_attendee(&exception, &request.attendee, Tracked::TOP)
                    .await?;
                self.touch(&master, tracked).await?;
            }
            Target::Occurrence(recurrence_id) => {
                let (exception, tracked) =
                    self.materialize(&event, recurrence_id, Tracked::TOP).await?;
                self.apply_attendee(&exception, &request.attendee, tracked)
                    .await?;
            }
        }
        Ok(())
    }

    /// Carries a participation change of the master over to exceptions that still
    /// show the previous status.
    async fn propagate_partstat(
        &mut self,
        master: &Event,
        previous: &Attendee,
        requested: &Attendee,
        parent: Tracked,
    ) -> ServiceResult<()> {
        for exception in self.load_exceptions(master.id).await? {
            let Ok(stored) = find_attendee(&exception, requested) else {
                continue;
            };
            if stored.partstat != previous.partstat {
                continue;
            }
            tracing::trace!(exception_id = %exception.id, "Propagating participation status");
            let propagated = Attendee {
                entity: requested.entity,
                uri: requested.uri.clone(),
                partstat: requested.partstat,
                ..Attendee::default()
            };
            self.apply_attendee(&exception, &propagated, parent).await?;
        }
        Ok(())
    }

    /// Merges `requested` into the matching attendee of `event` and touches it.
    async fn apply_attendee(
        &mut self,
        event: &Event,
        requested: &Attendee,
        parent: Tracked,
    ) -> ServiceResult<Tracked> {
        let mut merged = find_attendee(event, requested)?.clone();
        merge_set_fields(requested, &mut merged);
        merged.timestamp = Some(self.timestamp);
        self.storage
            .update_attendees(event.id, std::slice::from_ref(&merged))
            .await?;

        let mut update = self.touch_update();
        update.attendees = Some(
            event
                .attendees
                .iter()
                .map(|attendee| {
                    if attendee.matches(requested) {
                        merged.clone()
                    } else {
                        attendee.clone()
                    }
                })
                .collect(),
        );
        let (_, tracked) = self.write_update(event, &update, parent).await?;
        Ok(tracked)
    }
}
