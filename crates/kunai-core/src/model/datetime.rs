//! Calendar date-time values and recurrence identifiers.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A date-time as it appears on a calendar event.
///
/// The variant carries the "form" of the value: fixed UTC instant, local time in a
/// named zone, floating local time, or an all-day date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarDateTime {
    Utc(DateTime<Utc>),
    Zoned { local: NaiveDateTime, tz: Tz },
    Floating(NaiveDateTime),
    Date(NaiveDate),
}

impl CalendarDateTime {
    #[must_use]
    pub const fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    #[must_use]
    pub const fn is_floating(&self) -> bool {
        matches!(self, Self::Floating(_))
    }

    /// Returns the zone of a zoned value.
    #[must_use]
    pub const fn time_zone(&self) -> Option<Tz> {
        match self {
            Self::Zoned { tz, .. } => Some(*tz),
            _ => None,
        }
    }

    /// ## Summary
    /// Resolves the value to a UTC instant.
    ///
    /// Floating times and dates are interpreted as UTC. Ambiguous local times pick
    /// the earlier instant; local times skipped by a DST gap are read as UTC.
    #[must_use]
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            Self::Utc(instant) => *instant,
            Self::Zoned { local, tz } => tz
                .from_local_datetime(local)
                .earliest()
                .map_or_else(|| local.and_utc(), |dt| dt.with_timezone(&Utc)),
            Self::Floating(local) => local.and_utc(),
            Self::Date(date) => date.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }

    /// ## Summary
    /// Returns the wall-clock reading of the value, with UTC and dates read in UTC.
    ///
    /// Recurrence expansion works on this local reading so that zoned series keep
    /// their wall-clock time across DST transitions.
    #[must_use]
    pub fn local(&self) -> NaiveDateTime {
        match self {
            Self::Utc(instant) => instant.naive_utc(),
            Self::Zoned { local, .. } | Self::Floating(local) => *local,
            Self::Date(date) => date.and_time(chrono::NaiveTime::MIN),
        }
    }

    /// Builds a value of the same form from a wall-clock reading.
    #[must_use]
    pub fn with_local(&self, local: NaiveDateTime) -> Self {
        match self {
            Self::Utc(_) => Self::Utc(local.and_utc()),
            Self::Zoned { tz, .. } => Self::Zoned { local, tz: *tz },
            Self::Floating(_) => Self::Floating(local),
            Self::Date(_) => Self::Date(local.date()),
        }
    }

    /// Builds a value of the same form that starts at the given instant.
    #[must_use]
    pub fn with_instant(&self, instant: DateTime<Utc>) -> Self {
        match self {
            Self::Utc(_) => Self::Utc(instant),
            Self::Zoned { tz, .. } => Self::Zoned {
                local: instant.with_timezone(tz).naive_local(),
                tz: *tz,
            },
            Self::Floating(_) => Self::Floating(instant.naive_utc()),
            Self::Date(_) => Self::Date(instant.date_naive()),
        }
    }

    /// Signed distance from `self` to `other` on the local clock.
    #[must_use]
    pub fn duration_until(&self, other: &Self) -> TimeDelta {
        match (self, other) {
            (Self::Floating(_) | Self::Date(_), _) | (_, Self::Floating(_) | Self::Date(_)) => {
                other.local() - self.local()
            }
            _ => other.to_utc() - self.to_utc(),
        }
    }

    /// Shifts the value by `delta` while keeping its form.
    #[must_use]
    pub fn shifted(&self, delta: TimeDelta) -> Self {
        match self {
            Self::Utc(instant) => Self::Utc(*instant + delta),
            Self::Zoned { .. } => self.with_instant(self.to_utc() + delta),
            Self::Floating(local) => Self::Floating(*local + delta),
            Self::Date(date) => Self::Date(*date + TimeDelta::days(delta.num_days())),
        }
    }

    /// ## Summary
    /// Collapses zoned values whose zone is UTC into the `Utc` form.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Zoned { local, tz } if tz == Tz::UTC || tz == Tz::Etc__UTC => {
                Self::Utc(local.and_utc())
            }
            other => other,
        }
    }
}

/// ## Summary
/// Checks that `start <= end` and that both agree on all-day and floating form.
///
/// ## Errors
/// Returns the [`CoreError`] naming the violated rule.
pub fn check_range(start: &CalendarDateTime, end: &CalendarDateTime) -> CoreResult<()> {
    if start.is_all_day() != end.is_all_day() {
        return Err(CoreError::MixedAllDay);
    }
    if start.is_floating() != end.is_floating() {
        return Err(CoreError::MixedFloating);
    }
    if start.duration_until(end) < TimeDelta::zero() {
        return Err(CoreError::EndBeforeStart {
            start: start.to_utc(),
            end: end.to_utc(),
        });
    }
    Ok(())
}

impl From<DateTime<Utc>> for CalendarDateTime {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Utc(value)
    }
}

/// Identifies one occurrence within a recurring series by its start instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecurrenceId(DateTime<Utc>);

impl RecurrenceId {
    #[must_use]
    pub const fn new(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    #[must_use]
    pub const fn instant(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for RecurrenceId {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%dT%H%M%SZ"))
    }
}
