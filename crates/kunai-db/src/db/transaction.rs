//! Transaction control of storage sessions.
//!
//! A [`Session`] is exclusively owned by one unit of work for its whole lifetime.
//! Storage ports operate inside the session's current transaction and never commit
//! or roll back on their own; only [`crate::db::UnitOfWork`] drives the calls below.

use std::future::Future;

use crate::error::DbResult;

/// A storage session with explicit transaction control.
pub trait Session: Send {
    /// Opens a write transaction.
    fn begin(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    fn commit(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    fn rollback(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// ## Summary
    /// Returns the session to autocommit state before it is released.
    ///
    /// A transaction that is still open is rolled back.
    fn reset(&mut self) -> impl Future<Output = DbResult<()>> + Send;
}

/// Hands out fresh sessions, one per unit-of-work attempt.
pub trait SessionProvider: Send + Sync {
    type Session: Session;

    /// ## Summary
    /// Acquires a new session.
    ///
    /// ## Errors
    /// Returns an error if no session can be acquired from the underlying pool.
    fn open_session(&self) -> impl Future<Output = DbResult<Self::Session>> + Send;
}
