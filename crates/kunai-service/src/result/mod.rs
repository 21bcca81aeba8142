//! Results of a mutation request.
//!
//! Every storage side effect of a request is recorded as a [`MutationResult`].
//! Results referring to the same folder, event and occurrence are merged while the
//! request runs (see [`ResultTracker`]), and side effects caused by another change
//! are nested below it instead of being flattened.

mod tracker;

use kunai_core::diff::ItemUpdate;
use kunai_core::model::{Event, RecurrenceId};
use uuid::Uuid;

pub use tracker::{ResultTracker, Tracked};

/// Identifies the entity a result refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultKey {
    pub folder_id: Uuid,
    pub event_id: Uuid,
    pub recurrence_id: Option<RecurrenceId>,
}

impl ResultKey {
    #[must_use]
    pub fn of(folder_id: Uuid, event: &Event) -> Self {
        Self {
            folder_id,
            event_id: event.id,
            recurrence_id: event.recurrence_id,
        }
    }
}

/// The kind of change a result describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Creation(Event),
    Update(ItemUpdate<Event>),
    Deletion { timestamp: i64, original: Event },
}

impl Change {
    /// The most recent state of the event.
    #[must_use]
    pub fn event(&self) -> &Event {
        match self {
            Self::Creation(event) | Self::Deletion { original: event, .. } => event,
            Self::Update(update) => update.updated(),
        }
    }
}

/// One recorded change, with the changes it caused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResult {
    pub folder_id: Uuid,
    pub change: Change,
    pub nested: Vec<MutationResult>,
}

impl MutationResult {
    #[must_use]
    pub fn key(&self) -> ResultKey {
        ResultKey::of(self.folder_id, self.change.event())
    }

    #[must_use]
    pub fn event_id(&self) -> Uuid {
        self.change.event().id
    }

    #[must_use]
    pub const fn is_creation(&self) -> bool {
        matches!(self.change, Change::Creation(_))
    }

    #[must_use]
    pub const fn is_update(&self) -> bool {
        matches!(self.change, Change::Update(_))
    }

    #[must_use]
    pub const fn is_deletion(&self) -> bool {
        matches!(self.change, Change::Deletion { .. })
    }

    #[must_use]
    pub fn as_update(&self) -> Option<&ItemUpdate<Event>> {
        match &self.change {
            Change::Update(update) => Some(update),
            _ => None,
        }
    }

    fn find(&self, event_id: Uuid) -> Option<&Self> {
        if self.event_id() == event_id {
            return Some(self);
        }
        self.nested.iter().find_map(|nested| nested.find(event_id))
    }
}

/// The outcome of one request, in the system-wide and in the calendar user's view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarResult {
    timestamp: i64,
    plain: Vec<MutationResult>,
    userized: Vec<MutationResult>,
}

impl CalendarResult {
    #[must_use]
    pub const fn new(
        timestamp: i64,
        plain: Vec<MutationResult>,
        userized: Vec<MutationResult>,
    ) -> Self {
        Self {
            timestamp,
            plain,
            userized,
        }
    }

    /// Timestamp written by the request.
    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Results keyed by the folder each event is stored in.
    #[must_use]
    pub fn plain(&self) -> &[MutationResult] {
        &self.plain
    }

    /// Results keyed by the folder the calendar user sees each event in.
    #[must_use]
    pub fn userized(&self) -> &[MutationResult] {
        &self.userized
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.userized.is_empty()
    }

    /// Finds the plain result of an event at any nesting depth.
    #[must_use]
    pub fn find_plain(&self, event_id: Uuid) -> Option<&MutationResult> {
        self.plain.iter().find_map(|result| result.find(event_id))
    }

    /// Finds the userized result of an event at any nesting depth.
    #[must_use]
    pub fn find_userized(&self, event_id: Uuid) -> Option<&MutationResult> {
        self.userized.iter().find_map(|result| result.find(event_id))
    }
}
