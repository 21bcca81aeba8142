//! Models for calendar users and event attendees.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Participation status (PARTSTAT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParticipationStatus {
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
}

/// Role of an attendee (ROLE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttendeeRole {
    Chair,
    ReqParticipant,
    OptParticipant,
    NonParticipant,
}

/// Calendar user type (CUTYPE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalendarUserType {
    #[default]
    Individual,
    Group,
    Resource,
    Room,
    Unknown,
}

/// A calendar user reference, used for organizers and resolved directory entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarUser {
    /// Internal entity id, `0` for external users.
    pub entity: i32,
    /// Calendar user address (`mailto:` URI).
    pub uri: Option<String>,
    /// Common name.
    pub cn: Option<String>,
}

impl CalendarUser {
    #[must_use]
    pub fn internal(entity: i32, uri: impl Into<String>) -> Self {
        Self {
            entity,
            uri: Some(uri.into()),
            cn: None,
        }
    }

    #[must_use]
    pub fn external(uri: impl Into<String>) -> Self {
        Self {
            entity: 0,
            uri: Some(uri.into()),
            cn: None,
        }
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        self.entity > 0
    }

    /// Two calendar users match if their internal ids or their addresses agree.
    #[must_use]
    pub fn matches(&self, entity: i32, uri: Option<&str>) -> bool {
        (self.entity > 0 && self.entity == entity) || uris_match(self.uri.as_deref(), uri)
    }
}

/// An event attendee.
///
/// Everything except the identity (`entity`, `uri`) is optional: `None` means the
/// property was not provided, which the diff engine treats differently from a
/// provided default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attendee {
    /// Internal entity id, `0` for external participants.
    pub entity: i32,
    /// Calendar user address (`mailto:` URI).
    pub uri: Option<String>,
    /// Common name of the attendee.
    pub cn: Option<String>,
    pub cu_type: Option<CalendarUserType>,
    pub partstat: Option<ParticipationStatus>,
    pub role: Option<AttendeeRole>,
    /// RSVP requested flag.
    pub rsvp: Option<bool>,
    pub comment: Option<String>,
    /// The attendee's personal folder the event appears in.
    pub folder_id: Option<Uuid>,
    /// Last modification of this attendee, used for stale update detection.
    pub timestamp: Option<i64>,
}

impl Attendee {
    /// Creates an internal attendee.
    #[must_use]
    pub fn internal(entity: i32) -> Self {
        Self {
            entity,
            cu_type: Some(CalendarUserType::Individual),
            ..Self::default()
        }
    }

    /// Creates an external attendee identified by address only.
    #[must_use]
    pub fn external(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            cu_type: Some(CalendarUserType::Individual),
            ..Self::default()
        }
    }

    /// Sets the participation status.
    #[must_use]
    pub fn with_partstat(mut self, partstat: ParticipationStatus) -> Self {
        self.partstat = Some(partstat);
        self
    }

    /// Sets the personal folder.
    #[must_use]
    pub fn with_folder(mut self, folder_id: Uuid) -> Self {
        self.folder_id = Some(folder_id);
        self
    }

    /// Sets the calendar user address.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        self.entity > 0
    }

    /// ## Summary
    /// Two attendees match if their internal entity ids agree (both > 0) or their
    /// calendar user addresses agree.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        (self.entity > 0 && self.entity == other.entity)
            || uris_match(self.uri.as_deref(), other.uri.as_deref())
    }

    /// Returns whether this attendee represents the given calendar user.
    #[must_use]
    pub fn is_user(&self, entity: i32) -> bool {
        entity > 0 && self.entity == entity
    }
}

/// Calendar user addresses compare case-insensitively, ignoring the `mailto:` prefix.
#[must_use]
pub fn uris_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => strip_mailto(a).eq_ignore_ascii_case(strip_mailto(b)),
        _ => false,
    }
}

fn strip_mailto(uri: &str) -> &str {
    uri.get(..7)
        .filter(|prefix| prefix.eq_ignore_ascii_case("mailto:"))
        .map_or(uri, |_| &uri[7..])
}
