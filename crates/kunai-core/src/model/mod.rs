//! Calendar data model.

pub mod alarm;
pub mod attendee;
pub mod datetime;
pub mod event;
pub mod tombstone;

pub use alarm::{Alarm, AlarmAction, AlarmTrigger};
pub use attendee::{
    Attendee, AttendeeRole, CalendarUser, CalendarUserType, ParticipationStatus, uris_match,
};
pub use datetime::{CalendarDateTime, RecurrenceId, check_range};
pub use event::{Classification, Event, EventUpdate};
pub use tombstone::{AttendeeTombstone, EventTombstone};
