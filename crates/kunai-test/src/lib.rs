//! Kunai calendar engine - integration test support.
//!
//! [`TestCalendar`] wires a [`CalendarService`] to an in-memory store and to static
//! collaborators. Every test user owns one private calendar folder; access to
//! folders of other users must be granted explicitly.

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use kunai_core::config::RetryConfig;
use kunai_core::model::{Alarm, Attendee, CalendarUserType, Event, RecurrenceId};
use kunai_core::types::FolderType;
use kunai_db::db::RetryPolicy;
use kunai_db::db::memory::MemoryStore;
use kunai_service::CalendarService;
use kunai_service::calendar::CreateRequest;
use kunai_service::collaborator::{
    CalendarFolder, CalendarSession, Collaborators, Directory, FolderPermission,
    FolderResolver, NotificationSink, ResolvedUser,
};
use kunai_service::error::{ServiceError, ServiceResult};
use kunai_service::result::CalendarResult;
use uuid::Uuid;

pub use kunai_core;
pub use kunai_db;
pub use kunai_service;

pub const ORGANIZER: i32 = 1;
pub const ATTENDEE: i32 = 2;
pub const OUTSIDER: i32 = 3;

/// Locks a mutex and recovers from poisoning.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            mutex.clear_poison();
            poisoned.into_inner()
        }
    }
}

/// Folder resolver backed by a fixed table.
///
/// Owners and everyone in public folders get full permissions unless a grant says
/// otherwise. Private folders of other users appear as shared folders to grantees
/// and as missing to everybody else.
#[derive(Debug, Default)]
pub struct StaticFolders {
    folders: Mutex<HashMap<Uuid, (FolderType, i32)>>,
    grants: Mutex<HashMap<(Uuid, i32), FolderPermission>>,
}

impl StaticFolders {
    pub fn add(&self, folder_type: FolderType, owner: i32) -> Uuid {
        let id = Uuid::now_v7();
        lock(&self.folders).insert(id, (folder_type, owner));
        id
    }

    pub fn grant(&self, folder_id: Uuid, user: i32, permission: FolderPermission) {
        lock(&self.grants).insert((folder_id, user), permission);
    }
}

impl FolderResolver for StaticFolders {
    fn resolve(&self, folder_id: Uuid, session: &CalendarSession) -> ServiceResult<CalendarFolder> {
        let (stored_type, owner) = lock(&self.folders)
            .get(&folder_id)
            .copied()
            .ok_or_else(|| ServiceError::NotFound(format!("folder {folder_id}")))?;
        let public = stored_type == FolderType::Public;
        let grant = lock(&self.grants).get(&(folder_id, session.user_id)).copied();
        let permission = match grant {
            Some(permission) => permission,
            None if public || owner == session.user_id => FolderPermission::all(),
            None => return Err(ServiceError::NotFound(format!("folder {folder_id}"))),
        };
        let folder_type = if !public && owner != session.user_id {
            FolderType::Shared
        } else {
            stored_type
        };
        Ok(CalendarFolder {
            id: folder_id,
            folder_type,
            owner,
            permission,
        })
    }
}

/// Directory of registered internal users, addressed as `mailto:<name>@example.com`.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: Mutex<HashMap<i32, ResolvedUser>>,
}

impl StaticDirectory {
    pub fn register(&self, entity: i32, name: &str, default_folder: Option<Uuid>) -> ResolvedUser {
        let user = ResolvedUser {
            entity,
            uri: format!("mailto:{name}@example.com"),
            cn: Some(name.to_string()),
            default_folder,
        };
        lock(&self.users).insert(entity, user.clone());
        user
    }
}

impl Directory for StaticDirectory {
    fn resolve(&self, entity: i32, _cu_type: CalendarUserType) -> ServiceResult<ResolvedUser> {
        lock(&self.users)
            .get(&entity)
            .cloned()
            .ok_or_else(|| ServiceError::InvalidCalendarUser(format!("unknown user {entity}")))
    }
}

/// Notification sink that keeps every published result.
#[derive(Debug, Default)]
pub struct RecordingSink {
    results: Mutex<Vec<CalendarResult>>,
    failing: AtomicBool,
}

impl RecordingSink {
    /// Makes every following notification fail.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn results(&self) -> Vec<CalendarResult> {
        lock(&self.results).clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, result: &CalendarResult) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("notification channel closed");
        }
        lock(&self.results).push(result.clone());
        Ok(())
    }
}

/// ## Summary
/// An engine over an in-memory store with three registered users, each owning a
/// private calendar.
pub struct TestCalendar {
    pub store: MemoryStore,
    pub service: CalendarService<MemoryStore>,
    pub folders: Arc<StaticFolders>,
    pub directory: Arc<StaticDirectory>,
    pub sink: Arc<RecordingSink>,
    calendars: HashMap<i32, Uuid>,
}

impl Default for TestCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCalendar {
    #[must_use]
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let folders = Arc::new(StaticFolders::default());
        let directory = Arc::new(StaticDirectory::default());
        let sink = Arc::new(RecordingSink::default());

        let mut calendars = HashMap::new();
        for (entity, name) in [
            (ORGANIZER, "organizer"),
            (ATTENDEE, "attendee"),
            (OUTSIDER, "outsider"),
        ] {
            let folder = folders.add(FolderType::Private, entity);
            directory.register(entity, name, Some(folder));
            calendars.insert(entity, folder);
        }

        let collaborators = Collaborators {
            folders: Arc::clone(&folders) as Arc<dyn FolderResolver>,
            directory: Arc::clone(&directory) as Arc<dyn Directory>,
            notifications: Arc::clone(&sink) as Arc<dyn NotificationSink>,
        };
        let service = CalendarService::new(store.clone(), &RetryConfig::default(), collaborators)
            .with_policy(RetryPolicy::new(3, Duration::from_millis(5)));

        Self {
            store,
            service,
            folders,
            directory,
            sink,
            calendars,
        }
    }

    /// The private calendar folder of `user`.
    #[must_use]
    pub fn calendar(&self, user: i32) -> Uuid {
        *self.calendars.get(&user).expect("registered test user")
    }

    /// Adds another private calendar for `user`.
    pub fn add_calendar(&self, user: i32) -> Uuid {
        self.folders.add(FolderType::Private, user)
    }

    pub fn add_public_folder(&self) -> Uuid {
        self.folders.add(FolderType::Public, 0)
    }

    /// Creates `event` in the private calendar of `user` and returns the stored row.
    pub async fn create(&self, user: i32, event: Event, alarms: Vec<Alarm>) -> Event {
        let folder_id = self.calendar(user);
        self.create_in(user, folder_id, event, alarms).await
    }

    pub async fn create_in(
        &self,
        user: i32,
        folder_id: Uuid,
        event: Event,
        alarms: Vec<Alarm>,
    ) -> Event {
        let request = CreateRequest {
            folder_id,
            event,
            alarms,
        };
        let result = self
            .service
            .create_event(&session(user), &request)
            .await
            .expect("event created");
        let created = result.plain().first().expect("creation result");
        self.stored(created.event_id())
    }

    /// Committed state of an event.
    #[must_use]
    pub fn stored(&self, id: Uuid) -> Event {
        self.store.event(id).expect("event stored")
    }

    /// Committed change exception of `master` for `recurrence_id`.
    #[must_use]
    pub fn exception(&self, master: &Event, recurrence_id: RecurrenceId) -> Option<Event> {
        self.store.events().into_iter().find(|event| {
            event.series_id == Some(master.id) && event.recurrence_id == Some(recurrence_id)
        })
    }

    /// Every committed change exception of `master`.
    #[must_use]
    pub fn exceptions(&self, master: &Event) -> Vec<Event> {
        self.store
            .events()
            .into_iter()
            .filter(|event| event.series_id == Some(master.id) && event.id != master.id)
            .collect()
    }
}

#[must_use]
pub const fn session(user: i32) -> CalendarSession {
    CalendarSession::new(user)
}

/// `hour:00` UTC on the given day of June 2026.
#[must_use]
pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, day, hour, 0, 0)
        .single()
        .expect("valid test date")
}

/// A one hour event without uid; the engine assigns one.
#[must_use]
pub fn single_event(summary: &str, start: DateTime<Utc>) -> Event {
    let mut event = Event::new("", start.into(), (start + TimeDelta::hours(1)).into());
    event.summary = Some(summary.to_string());
    event
}

/// A one hour event repeating daily `count` times.
#[must_use]
pub fn daily_series(summary: &str, start: DateTime<Utc>, count: u32) -> Event {
    let mut event = single_event(summary, start);
    event.recurrence_rule = Some(format!("FREQ=DAILY;COUNT={count}"));
    event
}

/// Invites the given internal users.
#[must_use]
pub fn invite(mut event: Event, users: &[i32]) -> Event {
    event
        .attendees
        .extend(users.iter().map(|user| Attendee::internal(*user)));
    event
}

/// Recurrence id of the occurrence `days` after the first one of a daily series.
#[must_use]
pub fn occurrence(first: DateTime<Utc>, days: i64) -> RecurrenceId {
    RecurrenceId::new(first + TimeDelta::days(days))
}

#[must_use]
pub fn reminder(uid: &str) -> Alarm {
    Alarm::display(uid, TimeDelta::minutes(15))
}
