//! Retrying unit of work.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use diesel_async::scoped_futures::ScopedFutureExt;
//!
//! let mut uow = UnitOfWork::new(&store, RetryPolicy::default());
//! let event = uow
//!     .execute_write(|session| {
//!         async move {
//!             session.insert_event(&event).await?;
//!             Ok::<_, DbError>(event.id)
//!         }
//!         .scope_boxed()
//!     })
//!     .await?;
//! ```

use std::fmt;
use std::time::Duration;

use diesel_async::scoped_futures::ScopedBoxFuture;

use crate::db::retry::RetryPolicy;
use crate::db::transaction::{Session, SessionProvider};
use crate::error::{DbError, TransientError};

/// Retries performed by one unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub retries: u32,
    /// Backoff slept before each retry, in order.
    pub delays: Vec<Duration>,
}

/// Executes caller-supplied work against fresh sessions of a [`SessionProvider`].
pub struct UnitOfWork<'p, P> {
    provider: &'p P,
    policy: RetryPolicy,
    stats: RetryStats,
}

impl<'p, P: SessionProvider> UnitOfWork<'p, P> {
    #[must_use]
    pub fn new(provider: &'p P, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            stats: RetryStats::default(),
        }
    }

    #[must_use]
    pub const fn stats(&self) -> &RetryStats {
        &self.stats
    }

    /// ## Summary
    /// Runs `work` inside a write transaction and commits its result.
    ///
    /// Every attempt acquires a new session and a new transaction. When the work or
    /// the commit fails the transaction is rolled back first; the error is then
    /// retried if it is transient and the retry bound is not reached, sleeping for
    /// the policy's backoff. The session is reset and released on every exit path.
    ///
    /// ## Errors
    /// Returns the first non-transient error, or the last transient error once
    /// `max_retries` retries are exhausted.
    pub async fn execute_write<'a, T, E, F>(&mut self, mut work: F) -> Result<T, E>
    where
        F: for<'r> FnMut(&'r mut P::Session) -> ScopedBoxFuture<'a, 'r, Result<T, E>>
            + Send
            + 'a,
        E: From<DbError> + TransientError + fmt::Display,
        T: Send + 'a,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.attempt_write(&mut work).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "Unit of work succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt <= self.policy.max_retries => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Transient storage error, retrying unit of work"
                    );
                    self.stats.retries += 1;
                    self.stats.delays.push(delay);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_transient() {
                        tracing::warn!(attempt, error = %err, "Retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// ## Summary
    /// Runs `work` against a session without opening a transaction.
    ///
    /// Reads are not retried.
    ///
    /// ## Errors
    /// Returns an error if no session can be acquired, or the error of `work`.
    pub async fn execute_read<'a, T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: for<'r> FnOnce(&'r mut P::Session) -> ScopedBoxFuture<'a, 'r, Result<T, E>>
            + Send
            + 'a,
        E: From<DbError>,
        T: Send + 'a,
    {
        let mut session = self.provider.open_session().await?;
        let result = work(&mut session).await;
        release(&mut session).await;
        result
    }

    async fn attempt_write<'a, T, E, F>(&self, work: &mut F) -> Result<T, E>
    where
        F: for<'r> FnMut(&'r mut P::Session) -> ScopedBoxFuture<'a, 'r, Result<T, E>>
            + Send
            + 'a,
        E: From<DbError> + fmt::Display,
        T: Send + 'a,
    {
        let mut session = self.provider.open_session().await?;
        let result = in_transaction(&mut session, work).await;
        release(&mut session).await;
        result
    }
}

async fn in_transaction<'a, S, T, E, F>(session: &mut S, work: &mut F) -> Result<T, E>
where
    S: Session,
    F: for<'r> FnMut(&'r mut S) -> ScopedBoxFuture<'a, 'r, Result<T, E>> + Send + 'a,
    E: From<DbError> + fmt::Display,
{
    session.begin().await?;
    match work(session).await {
        Ok(value) => match session.commit().await {
            Ok(()) => Ok(value),
            Err(err) => {
                tracing::debug!(error = %err, "Commit failed");
                rollback(session).await;
                Err(err.into())
            }
        },
        Err(err) => {
            tracing::debug!(error = %err, "Unit of work failed, rolling back");
            rollback(session).await;
            Err(err)
        }
    }
}

/// Rolls back without replacing the error that caused it.
async fn rollback<S: Session>(session: &mut S) {
    if let Err(err) = session.rollback().await {
        tracing::error!(error = %err, "Failed to roll back transaction");
    }
}

async fn release<S: Session>(session: &mut S) {
    if let Err(err) = session.reset().await {
        tracing::error!(error = %err, "Failed to reset session before release");
    }
}
