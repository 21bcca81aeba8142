pub mod calendar;
pub mod collaborator;
pub mod engine;
pub mod error;
pub mod result;

pub use engine::CalendarService;
