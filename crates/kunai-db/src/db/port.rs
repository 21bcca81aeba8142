//! Storage ports used by the calendar engine.
//!
//! All methods run inside the transaction of the session they are called on and
//! must not commit or roll back by themselves. Events are stored without their
//! attendees; attendees and alarms live behind their own ports.

use std::collections::BTreeMap;
use std::future::Future;

use kunai_core::model::{
    Alarm, Attendee, AttendeeTombstone, Event, EventTombstone, EventUpdate, RecurrenceId,
};
use uuid::Uuid;

use crate::db::transaction::Session;
use crate::error::DbResult;

pub trait EventStorage: Send {
    /// Loads an event row. The returned event carries no attendees.
    fn load_event(&mut self, id: Uuid) -> impl Future<Output = DbResult<Option<Event>>> + Send;

    /// Loads every change exception of a series, ordered by recurrence id.
    fn load_exceptions(
        &mut self,
        series_id: Uuid,
    ) -> impl Future<Output = DbResult<Vec<Event>>> + Send;

    fn load_exception(
        &mut self,
        series_id: Uuid,
        recurrence_id: RecurrenceId,
    ) -> impl Future<Output = DbResult<Option<Event>>> + Send;

    /// Finds the single event or series master with the given uid.
    fn find_event_by_uid(
        &mut self,
        uid: &str,
    ) -> impl Future<Output = DbResult<Option<Event>>> + Send;

    fn insert_event(&mut self, event: &Event) -> impl Future<Output = DbResult<()>> + Send;

    /// Writes the populated fields of `update` onto the stored event.
    fn update_event(
        &mut self,
        id: Uuid,
        update: &EventUpdate,
    ) -> impl Future<Output = DbResult<()>> + Send;

    fn delete_event(&mut self, id: Uuid) -> impl Future<Output = DbResult<()>> + Send;

    fn insert_tombstone_event(
        &mut self,
        tombstone: &EventTombstone,
    ) -> impl Future<Output = DbResult<()>> + Send;
}

pub trait AttendeeStorage: Send {
    fn load_attendees(
        &mut self,
        event_id: Uuid,
    ) -> impl Future<Output = DbResult<Vec<Attendee>>> + Send;

    fn insert_attendees(
        &mut self,
        event_id: Uuid,
        attendees: &[Attendee],
    ) -> impl Future<Output = DbResult<()>> + Send;

    /// Replaces stored attendees matching the given ones.
    fn update_attendees(
        &mut self,
        event_id: Uuid,
        attendees: &[Attendee],
    ) -> impl Future<Output = DbResult<()>> + Send;

    /// Removes stored attendees matching the given ones.
    fn delete_attendees(
        &mut self,
        event_id: Uuid,
        attendees: &[Attendee],
    ) -> impl Future<Output = DbResult<()>> + Send;

    fn delete_all_attendees(
        &mut self,
        event_id: Uuid,
    ) -> impl Future<Output = DbResult<()>> + Send;

    fn insert_tombstone_attendees(
        &mut self,
        event_id: Uuid,
        tombstones: &[AttendeeTombstone],
    ) -> impl Future<Output = DbResult<()>> + Send;
}

/// Per-user alarms, keyed by event id and calendar user entity.
pub trait AlarmStorage: Send {
    fn load_alarms(
        &mut self,
        event_id: Uuid,
        user: i32,
    ) -> impl Future<Output = DbResult<Vec<Alarm>>> + Send;

    fn load_all_alarms(
        &mut self,
        event_id: Uuid,
    ) -> impl Future<Output = DbResult<BTreeMap<i32, Vec<Alarm>>>> + Send;

    fn insert_alarms(
        &mut self,
        event_id: Uuid,
        user: i32,
        alarms: &[Alarm],
    ) -> impl Future<Output = DbResult<()>> + Send;

    /// Replaces stored alarms with the same id.
    fn update_alarms(
        &mut self,
        event_id: Uuid,
        user: i32,
        alarms: &[Alarm],
    ) -> impl Future<Output = DbResult<()>> + Send;

    fn delete_alarms(
        &mut self,
        event_id: Uuid,
        user: i32,
        alarms: &[Alarm],
    ) -> impl Future<Output = DbResult<()>> + Send;

    fn delete_all_alarms(&mut self, event_id: Uuid) -> impl Future<Output = DbResult<()>> + Send;
}

/// A session that exposes every calendar storage port.
pub trait CalendarStorage: Session + EventStorage + AttendeeStorage + AlarmStorage {}

impl<T> CalendarStorage for T where T: Session + EventStorage + AttendeeStorage + AlarmStorage {}
