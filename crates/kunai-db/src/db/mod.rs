pub mod classify;
pub mod connection;
pub mod memory;
pub mod port;
pub mod retry;
pub mod transaction;
pub mod unit_of_work;

pub use port::{AlarmStorage, AttendeeStorage, CalendarStorage, EventStorage};
pub use retry::RetryPolicy;
pub use transaction::{Session, SessionProvider};
pub use unit_of_work::{RetryStats, UnitOfWork};
