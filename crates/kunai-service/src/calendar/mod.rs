//! Calendar event mutations.
//!
//! A [`performer::Performer`] runs one request inside one unit of work. The
//! request-specific state machines live in their own modules and share the storage
//! helpers of the performer.

pub mod alarm;
pub mod attendee;
pub mod consistency;
pub mod create;
pub mod delete;
pub mod performer;
pub mod permission;
pub mod recurrence;
pub mod relocate;
pub mod update;

pub use alarm::AlarmUpdateRequest;
pub use attendee::AttendeeUpdateRequest;
pub use create::CreateRequest;
pub use delete::DeleteRequest;
pub use relocate::MoveRequest;
pub use update::UpdateRequest;
