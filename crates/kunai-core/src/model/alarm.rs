//! Per-user event alarms.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alarm action (ACTION).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmAction {
    Display,
    Audio,
    Email,
}

/// Alarm trigger (TRIGGER).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmTrigger {
    /// Offset in seconds relative to the event start; negative values fire before it.
    Relative(i64),
    Absolute(DateTime<Utc>),
}

/// An alarm owned by one calendar user on one event.
///
/// Alarms are identified by `uid`; all other properties are optional and `None`
/// means "not provided".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: Uuid,
    pub uid: String,
    pub action: Option<AlarmAction>,
    pub trigger: Option<AlarmTrigger>,
    pub description: Option<String>,
    pub acknowledged: Option<DateTime<Utc>>,
}

impl Alarm {
    /// Creates a display alarm firing `before` ahead of the event start.
    #[must_use]
    pub fn display(uid: impl Into<String>, before: TimeDelta) -> Self {
        Self {
            id: Uuid::now_v7(),
            uid: uid.into(),
            action: Some(AlarmAction::Display),
            trigger: Some(AlarmTrigger::Relative(-before.num_seconds())),
            description: None,
            acknowledged: None,
        }
    }

    /// Alarms match by their `uid`.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.uid == other.uid
    }

    /// Returns a copy with a fresh storage id, for carrying alarms over to a new event.
    #[must_use]
    pub fn copied(&self) -> Self {
        Self {
            id: Uuid::now_v7(),
            ..self.clone()
        }
    }
}
