//! Storage steps shared by the calendar mutations.
//!
//! A [`Performer`] is created per unit-of-work attempt. It owns the session for
//! the attempt, stamps every write with one timestamp and records every side
//! effect in a [`ResultTracker`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use kunai_core::model::{
    Alarm, Attendee, AttendeeTombstone, CalendarUser, CalendarUserType, Event, EventTombstone,
    EventUpdate, ParticipationStatus, RecurrenceId,
};
use kunai_db::db::CalendarStorage;
use uuid::Uuid;

use crate::calendar::consistency::{check_exception_dates, check_visibility, touch};
use crate::calendar::recurrence::{check_recurrence_id, occurrence_end, occurrence_start};
use crate::collaborator::{CalendarFolder, CalendarSession, Collaborators};
use crate::error::{ServiceError, ServiceResult};
use crate::result::{CalendarResult, ResultTracker, Tracked};

/// What a request addressing an event and an optional occurrence operates on.
#[derive(Debug)]
pub(crate) enum Target {
    /// A single event or a whole series.
    Event,
    /// A stored change exception of `master`.
    Exception { master: Event, exception: Event },
    /// An occurrence of the addressed series master without a change exception.
    Occurrence(RecurrenceId),
}

pub(crate) struct Performer<'s, S> {
    pub(crate) storage: &'s mut S,
    pub(crate) collaborators: &'s Collaborators,
    pub(crate) folder: CalendarFolder,
    pub(crate) acting_user: i32,
    /// The user whose calendar the folder represents.
    pub(crate) calendar_user: i32,
    pub(crate) timestamp: i64,
    pub(crate) now: DateTime<Utc>,
    pub(crate) tracker: ResultTracker,
}

impl<'s, S: CalendarStorage> Performer<'s, S> {
    pub(crate) fn new(
        storage: &'s mut S,
        collaborators: &'s Collaborators,
        folder: CalendarFolder,
        session: &CalendarSession,
    ) -> Self {
        let now = Utc::now();
        let calendar_user = folder.calendar_user(session.user_id);
        let tracker = ResultTracker::new(calendar_user, folder.is_public());
        Self {
            storage,
            collaborators,
            folder,
            acting_user: session.user_id,
            calendar_user,
            timestamp: now.timestamp_millis(),
            now,
            tracker,
        }
    }

    pub(crate) fn finish(self) -> CalendarResult {
        self.tracker.finish(self.timestamp)
    }

    /// Loads an event together with its attendees.
    pub(crate) async fn load(&mut self, id: Uuid) -> ServiceResult<Event> {
        let mut event = self
            .storage
            .load_event(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("event {id}")))?;
        event.attendees = self.storage.load_attendees(id).await?;
        Ok(event)
    }

    /// ## Summary
    /// Loads an event that appears in the performer's folder and is visible to
    /// the acting user.
    ///
    /// ## Errors
    /// Returns [`ServiceError::NotFound`] for missing, foreign and hidden events.
    pub(crate) async fn load_in_folder(&mut self, id: Uuid) -> ServiceResult<Event> {
        let event = self.load(id).await?;
        let folder_id = self.folder.id;
        let in_folder = event.folder_id == folder_id
            || event
                .attendees
                .iter()
                .any(|attendee| attendee.folder_id == Some(folder_id));
        if !in_folder {
            return Err(ServiceError::NotFound(format!(
                "event {id} in folder {folder_id}"
            )));
        }
        check_visibility(&self.folder, &event, self.acting_user)?;
        Ok(event)
    }

    pub(crate) async fn load_exceptions(&mut self, series_id: Uuid) -> ServiceResult<Vec<Event>> {
        let mut exceptions = self.storage.load_exceptions(series_id).await?;
        for exception in &mut exceptions {
            exception.attendees = self.storage.load_attendees(exception.id).await?;
        }
        Ok(exceptions)
    }

    pub(crate) async fn load_exception(
        &mut self,
        series_id: Uuid,
        recurrence_id: RecurrenceId,
    ) -> ServiceResult<Option<Event>> {
        match self.storage.load_exception(series_id, recurrence_id).await? {
            Some(mut exception) => {
                exception.attendees = self.storage.load_attendees(exception.id).await?;
                Ok(Some(exception))
            }
            None => Ok(None),
        }
    }

    /// Loads the series master of a change exception.
    pub(crate) async fn load_master(&mut self, exception: &Event) -> ServiceResult<Event> {
        let series_id = exception.series_id.ok_or_else(|| {
            ServiceError::InvalidRecurrenceId(format!(
                "event {} is not part of a series",
                exception.id
            ))
        })?;
        self.load(series_id).await
    }

    /// ## Summary
    /// Works out what a request for `event` and `recurrence_id` operates on.
    ///
    /// An exception may be addressed directly or through its master and
    /// recurrence id.
    ///
    /// ## Errors
    /// Returns [`ServiceError::InvalidRecurrenceId`] if the recurrence id does not
    /// name an existing exception or a live occurrence of the series.
    pub(crate) async fn resolve_target(
        &mut self,
        event: &Event,
        recurrence_id: Option<RecurrenceId>,
    ) -> ServiceResult<Target> {
        if event.is_series_exception() {
            if recurrence_id.is_some_and(|rid| event.recurrence_id != Some(rid)) {
                return Err(ServiceError::InvalidRecurrenceId(format!(
                    "exception {} does not represent the requested occurrence",
                    event.id
                )));
            }
            let master = self.load_master(event).await?;
            return Ok(Target::Exception {
                master,
                exception: event.clone(),
            });
        }
        let Some(recurrence_id) = recurrence_id else {
            return Ok(Target::Event);
        };
        if event.is_series_master()
            && let Some(exception) = self.load_exception(event.id, recurrence_id).await?
        {
            return Ok(Target::Exception {
                master: event.clone(),
                exception,
            });
        }
        check_recurrence_id(event, recurrence_id)?;
        Ok(Target::Occurrence(recurrence_id))
    }

    /// ## Summary
    /// Whether deleting as the calendar user removes the whole event rather than
    /// only the calendar user's participation.
    pub(crate) fn deletes_whole_event(&self, event: &Event) -> bool {
        self.acts_as_organizer(event) || event.is_last_user_attendee(self.calendar_user)
    }

    /// Whether the calendar user may change the event itself.
    pub(crate) fn acts_as_organizer(&self, event: &Event) -> bool {
        self.folder.is_public()
            || !event.is_group_scheduled()
            || event.is_organizer(self.calendar_user)
    }

    /// The calendar user's attendee entry, required for attendee-only changes.
    pub(crate) fn own_attendee(&self, event: &Event) -> ServiceResult<Attendee> {
        event.find_attendee(self.calendar_user).cloned().ok_or_else(|| {
            ServiceError::NotFound(format!(
                "user {} does not attend event {}",
                self.calendar_user, event.id
            ))
        })
    }

    pub(crate) fn touch_update(&self) -> EventUpdate {
        touch(self.timestamp, self.now, self.acting_user)
    }

    /// ## Summary
    /// Writes `update` onto the stored event and records the change.
    ///
    /// Attendees carried by `update` are only reflected in the result; callers
    /// write attendee changes through the attendee port themselves.
    pub(crate) async fn write_update(
        &mut self,
        original: &Event,
        update: &EventUpdate,
        parent: Tracked,
    ) -> ServiceResult<(Event, Tracked)> {
        let stored = EventUpdate {
            attendees: None,
            ..update.clone()
        };
        self.storage.update_event(original.id, &stored).await?;
        let updated = update.applied(original);
        let tracked = self.tracker.update(original, &updated, parent);
        Ok((updated, tracked))
    }

    /// Marks `event` as modified by this request.
    pub(crate) async fn touch(
        &mut self,
        event: &Event,
        parent: Tracked,
    ) -> ServiceResult<(Event, Tracked)> {
        let update = self.touch_update();
        self.write_update(event, &update, parent).await
    }

    async fn delete_storage(&mut self, event: &Event) -> ServiceResult<()> {
        tracing::trace!(event_id = %event.id, "Deleting event from storage");
        let tombstone = EventTombstone::new(event, self.timestamp, self.now, self.acting_user);
        self.storage.insert_tombstone_event(&tombstone).await?;
        let attendee_tombstones: Vec<AttendeeTombstone> = event
            .attendees
            .iter()
            .map(|attendee| AttendeeTombstone::new(attendee, self.timestamp))
            .collect();
        if !attendee_tombstones.is_empty() {
            self.storage
                .insert_tombstone_attendees(event.id, &attendee_tombstones)
                .await?;
        }
        self.storage.delete_all_alarms(event.id).await?;
        self.storage.delete_all_attendees(event.id).await?;
        self.storage.delete_event(event.id).await?;
        Ok(())
    }

    /// Deletes one stored event, exception or master row, and records the deletion.
    pub(crate) async fn delete_single(
        &mut self,
        event: &Event,
        parent: Tracked,
    ) -> ServiceResult<Tracked> {
        self.delete_storage(event).await?;
        Ok(self.tracker.deletion(self.timestamp, event, parent))
    }

    /// ## Summary
    /// Deletes an event. A series master takes its change exceptions along, each
    /// recorded as a deletion nested below the master's.
    pub(crate) async fn delete_event(
        &mut self,
        event: &Event,
        parent: Tracked,
    ) -> ServiceResult<Tracked> {
        if !event.is_series_master() {
            return self.delete_single(event, parent).await;
        }
        let tracked = self.tracker.deletion(self.timestamp, event, parent);
        for exception in self.load_exceptions(event.id).await? {
            self.delete_single(&exception, tracked).await?;
        }
        self.delete_storage(event).await?;
        Ok(tracked)
    }

    /// Adds `recurrence_id` to the master's delete exceptions, dropping it from
    /// the change exceptions.
    pub(crate) async fn add_delete_exception_date(
        &mut self,
        master: &Event,
        recurrence_id: RecurrenceId,
        parent: Tracked,
    ) -> ServiceResult<(Event, Tracked)> {
        let mut update = self.touch_update();
        let mut delete_dates = master.delete_exception_dates.clone();
        delete_dates.insert(recurrence_id);
        update.delete_exception_dates = Some(delete_dates);
        if master.change_exception_dates.contains(&recurrence_id) {
            let mut change_dates = master.change_exception_dates.clone();
            change_dates.remove(&recurrence_id);
            update.change_exception_dates = Some(change_dates);
        }
        check_exception_dates(&update.applied(master))?;
        self.write_update(master, &update, parent).await
    }

    /// Adds `recurrence_id` to the master's change exceptions.
    pub(crate) async fn add_change_exception_date(
        &mut self,
        master: &Event,
        recurrence_id: RecurrenceId,
        parent: Tracked,
    ) -> ServiceResult<(Event, Tracked)> {
        let mut update = self.touch_update();
        let mut change_dates = master.change_exception_dates.clone();
        change_dates.insert(recurrence_id);
        update.change_exception_dates = Some(change_dates);
        check_exception_dates(&update.applied(master))?;
        self.write_update(master, &update, parent).await
    }

    /// ## Summary
    /// Removes one attendee from an event and touches it.
    ///
    /// The attendee is tombstoned and their alarms on the event are deleted.
    pub(crate) async fn remove_attendee(
        &mut self,
        event: &Event,
        attendee: &Attendee,
        parent: Tracked,
    ) -> ServiceResult<(Event, Tracked)> {
        tracing::trace!(event_id = %event.id, entity = attendee.entity, "Removing attendee");
        let tombstone = AttendeeTombstone::new(attendee, self.timestamp);
        self.storage
            .insert_tombstone_attendees(event.id, &[tombstone])
            .await?;
        self.storage
            .delete_attendees(event.id, std::slice::from_ref(attendee))
            .await?;
        if attendee.is_internal() {
            let alarms = self.storage.load_alarms(event.id, attendee.entity).await?;
            if !alarms.is_empty() {
                self.storage
                    .delete_alarms(event.id, attendee.entity, &alarms)
                    .await?;
            }
        }

        let mut update = self.touch_update();
        update.attendees = Some(
            event
                .attendees
                .iter()
                .filter(|other| !other.matches(attendee))
                .cloned()
                .collect(),
        );
        self.write_update(event, &update, parent).await
    }

    /// ## Summary
    /// Builds the change exception for occurrence `recurrence_id` of `master`.
    ///
    /// The exception copies the master, starts at the occurrence and keeps the
    /// master's duration. It is not stored yet.
    pub(crate) fn prepare_exception(&self, master: &Event, recurrence_id: RecurrenceId) -> Event {
        let mut exception = master.clone();
        exception.id = Uuid::now_v7();
        exception.series_id = Some(master.id);
        exception.recurrence_id = Some(recurrence_id);
        exception.recurrence_rule = None;
        exception.start_date = occurrence_start(master, recurrence_id);
        exception.end_date = occurrence_end(master, recurrence_id);
        exception.change_exception_dates = BTreeSet::from([recurrence_id]);
        exception.delete_exception_dates = BTreeSet::new();
        exception.created = self.now;
        exception.timestamp = self.timestamp;
        exception.last_modified = self.now;
        exception.modified_by = self.acting_user;
        exception
    }

    /// ## Summary
    /// Stores a prepared change exception with its attendees and a copy of the
    /// master's per-user alarms, and records its creation.
    ///
    /// Alarms of `skip_alarms_of` are not copied.
    pub(crate) async fn insert_exception(
        &mut self,
        master: &Event,
        exception: &Event,
        skip_alarms_of: Option<i32>,
        parent: Tracked,
    ) -> ServiceResult<Tracked> {
        tracing::debug!(
            series_id = %master.id,
            exception_id = %exception.id,
            recurrence_id = ?exception.recurrence_id,
            "Materializing change exception"
        );
        self.storage.insert_event(exception).await?;
        if !exception.attendees.is_empty() {
            self.storage
                .insert_attendees(exception.id, &exception.attendees)
                .await?;
        }
        for (user, alarms) in self.storage.load_all_alarms(master.id).await? {
            if Some(user) == skip_alarms_of {
                continue;
            }
            let copies: Vec<Alarm> = alarms.iter().map(Alarm::copied).collect();
            self.storage.insert_alarms(exception.id, user, &copies).await?;
        }
        Ok(self.tracker.creation(exception, parent))
    }

    /// ## Summary
    /// Turns occurrence `recurrence_id` of `master` into a stored change exception
    /// and records it on the master.
    ///
    /// The master's update is nested below the exception's creation.
    pub(crate) async fn materialize(
        &mut self,
        master: &Event,
        recurrence_id: RecurrenceId,
        parent: Tracked,
    ) -> ServiceResult<(Event, Tracked)> {
        let exception = self.prepare_exception(master, recurrence_id);
        let tracked = self
            .insert_exception(master, &exception, None, parent)
            .await?;
        self.add_change_exception_date(master, recurrence_id, tracked)
            .await?;
        Ok((exception, tracked))
    }

    fn attendee_folder(&self, entity: i32, default_folder: Option<Uuid>) -> Option<Uuid> {
        if self.folder.is_public() {
            None
        } else if entity == self.calendar_user {
            Some(self.folder.id)
        } else {
            default_folder
        }
    }

    /// ## Summary
    /// Completes a requested attendee for storage.
    ///
    /// Internal attendees are looked up in the directory; every attendee gets a
    /// participation status and the request's timestamp.
    ///
    /// ## Errors
    /// Returns [`ServiceError::InvalidCalendarUser`] for unknown internal users and
    /// external attendees without an address.
    pub(crate) fn resolve_attendee(&self, attendee: &Attendee) -> ServiceResult<Attendee> {
        let partstat = Some(attendee.partstat.unwrap_or(ParticipationStatus::NeedsAction));
        if !attendee.is_internal() {
            if attendee.uri.is_none() {
                return Err(ServiceError::InvalidCalendarUser(
                    "external attendee without calendar address".to_string(),
                ));
            }
            return Ok(Attendee {
                partstat,
                cu_type: Some(attendee.cu_type.unwrap_or_default()),
                timestamp: Some(self.timestamp),
                ..attendee.clone()
            });
        }

        let cu_type = attendee.cu_type.unwrap_or_default();
        let user = self
            .collaborators
            .directory
            .resolve(attendee.entity, cu_type)?;
        Ok(Attendee {
            uri: Some(user.uri),
            cn: attendee.cn.clone().or(user.cn),
            cu_type: Some(cu_type),
            partstat,
            folder_id: attendee
                .folder_id
                .or_else(|| self.attendee_folder(attendee.entity, user.default_folder)),
            timestamp: Some(self.timestamp),
            ..attendee.clone()
        })
    }

    /// ## Summary
    /// Makes sure a group-scheduled event has an organizer and lists the calendar
    /// user as attendee.
    ///
    /// ## Errors
    /// Returns [`ServiceError::InvalidCalendarUser`] if the calendar user cannot be
    /// resolved.
    pub(crate) fn enforce_default_attendee(&self, event: &mut Event) -> ServiceResult<()> {
        if !event.is_group_scheduled() {
            return Ok(());
        }
        let user = self
            .collaborators
            .directory
            .resolve(self.calendar_user, CalendarUserType::Individual)?;
        if event.organizer.is_none() {
            event.organizer = Some(CalendarUser {
                entity: user.entity,
                uri: Some(user.uri.clone()),
                cn: user.cn.clone(),
            });
        }
        if event.find_attendee(self.calendar_user).is_none() {
            let partstat = if event.is_organizer(self.calendar_user) {
                ParticipationStatus::Accepted
            } else {
                ParticipationStatus::NeedsAction
            };
            tracing::trace!(entity = user.entity, "Adding default attendee");
            event.attendees.push(Attendee {
                entity: user.entity,
                uri: Some(user.uri),
                cn: user.cn,
                cu_type: Some(CalendarUserType::Individual),
                partstat: Some(partstat),
                folder_id: self.attendee_folder(user.entity, user.default_folder),
                timestamp: Some(self.timestamp),
                ..Attendee::default()
            });
        }
        Ok(())
    }
}
