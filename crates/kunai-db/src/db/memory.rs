//! In-memory storage backend.
//!
//! [`MemoryStore`] keeps committed state behind a mutex. A [`MemorySession`]
//! works on a private copy while a transaction is open and publishes it on commit
//! (last commit wins). Outside a transaction every write applies directly.
//!
//! The store counts every write call and can be told to fail upcoming commits with
//! a transient error, which makes it usable as a spy in engine tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kunai_core::model::{
    Alarm, Attendee, AttendeeTombstone, Event, EventTombstone, EventUpdate, RecurrenceId,
};
use uuid::Uuid;

use crate::db::port::{AlarmStorage, AttendeeStorage, EventStorage};
use crate::db::transaction::{Session, SessionProvider};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, Default)]
struct StoreState {
    events: BTreeMap<Uuid, Event>,
    attendees: BTreeMap<Uuid, Vec<Attendee>>,
    alarms: BTreeMap<(Uuid, i32), Vec<Alarm>>,
    event_tombstones: Vec<EventTombstone>,
    attendee_tombstones: Vec<(Uuid, AttendeeTombstone)>,
}

impl StoreState {
    fn with_attendees(&self, event: &Event) -> Event {
        let mut event = event.clone();
        event.attendees = self.attendees.get(&event.id).cloned().unwrap_or_default();
        event
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<StoreState>,
    writes: AtomicUsize,
    failing_commits: AtomicU32,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared in-memory calendar storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write calls issued through any session, committed or not.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }

    /// Makes the next `count` commits fail with a transient serialization error.
    pub fn fail_commits(&self, count: u32) {
        self.shared.failing_commits.store(count, Ordering::SeqCst);
    }

    /// ## Summary
    /// Stores an event with its attendees and per-user alarms, bypassing sessions.
    ///
    /// Seeding does not count as a write.
    pub fn seed_event(&self, event: &Event, alarms: &BTreeMap<i32, Vec<Alarm>>) {
        let mut state = self.shared.lock();
        let mut row = event.clone();
        state
            .attendees
            .insert(event.id, std::mem::take(&mut row.attendees));
        state.events.insert(event.id, row);
        for (user, user_alarms) in alarms {
            state.alarms.insert((event.id, *user), user_alarms.clone());
        }
    }

    /// Committed state of one event, attendees included.
    #[must_use]
    pub fn event(&self, id: Uuid) -> Option<Event> {
        let state = self.shared.lock();
        state.events.get(&id).map(|event| state.with_attendees(event))
    }

    /// Every committed event, attendees included.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        let state = self.shared.lock();
        state
            .events
            .values()
            .map(|event| state.with_attendees(event))
            .collect()
    }

    #[must_use]
    pub fn alarms(&self, event_id: Uuid, user: i32) -> Vec<Alarm> {
        self.shared
            .lock()
            .alarms
            .get(&(event_id, user))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn event_tombstones(&self) -> Vec<EventTombstone> {
        self.shared.lock().event_tombstones.clone()
    }

    #[must_use]
    pub fn attendee_tombstones(&self, event_id: Uuid) -> Vec<AttendeeTombstone> {
        self.shared
            .lock()
            .attendee_tombstones
            .iter()
            .filter(|(id, _)| *id == event_id)
            .map(|(_, tombstone)| tombstone.clone())
            .collect()
    }
}

impl SessionProvider for MemoryStore {
    type Session = MemorySession;

    async fn open_session(&self) -> DbResult<MemorySession> {
        Ok(MemorySession {
            shared: Arc::clone(&self.shared),
            working: None,
        })
    }
}

/// A session on a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySession {
    shared: Arc<Shared>,
    working: Option<StoreState>,
}

impl MemorySession {
    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        match &self.working {
            Some(state) => f(state),
            None => f(&*self.shared.lock()),
        }
    }

    fn write<R>(&mut self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        self.shared.writes.fetch_add(1, Ordering::SeqCst);
        match &mut self.working {
            Some(state) => f(state),
            None => f(&mut *self.shared.lock()),
        }
    }
}

impl Session for MemorySession {
    async fn begin(&mut self) -> DbResult<()> {
        if self.working.is_some() {
            return Err(DbError::Fatal("transaction already open".to_string()));
        }
        self.working = Some(self.shared.lock().clone());
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        let Some(working) = self.working.take() else {
            return Err(DbError::Fatal("no open transaction".to_string()));
        };
        let injected = self
            .shared
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(DbError::Transient(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }
        *self.shared.lock() = working;
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.working = None;
        Ok(())
    }

    async fn reset(&mut self) -> DbResult<()> {
        if self.working.take().is_some() {
            tracing::debug!("Discarded open in-memory transaction");
        }
        Ok(())
    }
}

impl EventStorage for MemorySession {
    async fn load_event(&mut self, id: Uuid) -> DbResult<Option<Event>> {
        Ok(self.read(|state| state.events.get(&id).cloned()))
    }

    async fn load_exceptions(&mut self, series_id: Uuid) -> DbResult<Vec<Event>> {
        let mut exceptions: Vec<Event> = self.read(|state| {
            state
                .events
                .values()
                .filter(|event| event.series_id == Some(series_id) && event.id != series_id)
                .filter(|event| event.recurrence_id.is_some())
                .cloned()
                .collect()
        });
        exceptions.sort_by_key(|event| event.recurrence_id);
        Ok(exceptions)
    }

    async fn load_exception(
        &mut self,
        series_id: Uuid,
        recurrence_id: RecurrenceId,
    ) -> DbResult<Option<Event>> {
        Ok(self.read(|state| {
            state
                .events
                .values()
                .find(|event| {
                    event.series_id == Some(series_id)
                        && event.id != series_id
                        && event.recurrence_id == Some(recurrence_id)
                })
                .cloned()
        }))
    }

    async fn find_event_by_uid(&mut self, uid: &str) -> DbResult<Option<Event>> {
        Ok(self.read(|state| {
            state
                .events
                .values()
                .find(|event| event.uid == uid && event.recurrence_id.is_none())
                .cloned()
        }))
    }

    async fn insert_event(&mut self, event: &Event) -> DbResult<()> {
        self.write(|state| {
            if state.events.contains_key(&event.id) {
                return Err(DbError::Fatal(format!(
                    "duplicate key value violates unique constraint: event {}",
                    event.id
                )));
            }
            let mut row = event.clone();
            row.attendees.clear();
            state.events.insert(event.id, row);
            Ok(())
        })
    }

    async fn update_event(&mut self, id: Uuid, update: &EventUpdate) -> DbResult<()> {
        self.write(|state| {
            let event = state
                .events
                .get_mut(&id)
                .ok_or_else(|| DbError::Fatal(format!("event {id} does not exist")))?;
            update.apply_to(event);
            event.attendees.clear();
            Ok(())
        })
    }

    async fn delete_event(&mut self, id: Uuid) -> DbResult<()> {
        self.write(|state| {
            state.events.remove(&id);
        });
        Ok(())
    }

    async fn insert_tombstone_event(&mut self, tombstone: &EventTombstone) -> DbResult<()> {
        self.write(|state| state.event_tombstones.push(tombstone.clone()));
        Ok(())
    }
}

impl AttendeeStorage for MemorySession {
    async fn load_attendees(&mut self, event_id: Uuid) -> DbResult<Vec<Attendee>> {
        Ok(self.read(|state| state.attendees.get(&event_id).cloned().unwrap_or_default()))
    }

    async fn insert_attendees(&mut self, event_id: Uuid, attendees: &[Attendee]) -> DbResult<()> {
        self.write(|state| {
            state
                .attendees
                .entry(event_id)
                .or_default()
                .extend_from_slice(attendees);
        });
        Ok(())
    }

    async fn update_attendees(&mut self, event_id: Uuid, attendees: &[Attendee]) -> DbResult<()> {
        self.write(|state| {
            let stored = state.attendees.entry(event_id).or_default();
            for attendee in attendees {
                if let Some(slot) = stored.iter_mut().find(|a| a.matches(attendee)) {
                    slot.clone_from(attendee);
                }
            }
        });
        Ok(())
    }

    async fn delete_attendees(&mut self, event_id: Uuid, attendees: &[Attendee]) -> DbResult<()> {
        self.write(|state| {
            if let Some(stored) = state.attendees.get_mut(&event_id) {
                stored.retain(|a| !attendees.iter().any(|removed| removed.matches(a)));
            }
        });
        Ok(())
    }

    async fn delete_all_attendees(&mut self, event_id: Uuid) -> DbResult<()> {
        self.write(|state| {
            state.attendees.remove(&event_id);
        });
        Ok(())
    }

    async fn insert_tombstone_attendees(
        &mut self,
        event_id: Uuid,
        tombstones: &[AttendeeTombstone],
    ) -> DbResult<()> {
        self.write(|state| {
            state
                .attendee_tombstones
                .extend(tombstones.iter().map(|t| (event_id, t.clone())));
        });
        Ok(())
    }
}

impl AlarmStorage for MemorySession {
    async fn load_alarms(&mut self, event_id: Uuid, user: i32) -> DbResult<Vec<Alarm>> {
        Ok(self.read(|state| {
            state
                .alarms
                .get(&(event_id, user))
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn load_all_alarms(&mut self, event_id: Uuid) -> DbResult<BTreeMap<i32, Vec<Alarm>>> {
        Ok(self.read(|state| {
            state
                .alarms
                .range((event_id, i32::MIN)..=(event_id, i32::MAX))
                .filter(|(_, alarms)| !alarms.is_empty())
                .map(|((_, user), alarms)| (*user, alarms.clone()))
                .collect()
        }))
    }

    async fn insert_alarms(&mut self, event_id: Uuid, user: i32, alarms: &[Alarm]) -> DbResult<()> {
        self.write(|state| {
            state
                .alarms
                .entry((event_id, user))
                .or_default()
                .extend_from_slice(alarms);
        });
        Ok(())
    }

    async fn update_alarms(&mut self, event_id: Uuid, user: i32, alarms: &[Alarm]) -> DbResult<()> {
        self.write(|state| {
            let stored = state.alarms.entry((event_id, user)).or_default();
            for alarm in alarms {
                if let Some(slot) = stored.iter_mut().find(|a| a.id == alarm.id) {
                    slot.clone_from(alarm);
                }
            }
        });
        Ok(())
    }

    async fn delete_alarms(&mut self, event_id: Uuid, user: i32, alarms: &[Alarm]) -> DbResult<()> {
        self.write(|state| {
            if let Some(stored) = state.alarms.get_mut(&(event_id, user)) {
                stored.retain(|a| !alarms.iter().any(|removed| removed.id == a.id));
            }
        });
        Ok(())
    }

    async fn delete_all_alarms(&mut self, event_id: Uuid) -> DbResult<()> {
        self.write(|state| state.alarms.retain(|(id, _), _| *id != event_id));
        Ok(())
    }
}
