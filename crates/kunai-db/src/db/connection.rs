//! PostgreSQL session pool.
//!
//! Only the [`Session`] layer is backed by PostgreSQL; the storage ports have no
//! diesel implementation, so the calendar engine cannot run on [`DbPool`].

use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, TransactionManager};

use crate::db::transaction::{Session, SessionProvider};
use crate::error::DbResult;

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConnection<'pool> = PooledConnection<'pool, AsyncPgConnection>;

type PgTransactionManager = AnsiTransactionManager;

/// ## Summary
/// Creates a new database connection pool.
///
/// ## Errors
/// Returns an error if the pool cannot be created with the provided database URL.
#[tracing::instrument(skip(database_url), fields(pool_size = size))]
pub async fn create_pool(database_url: &str, size: u32) -> anyhow::Result<DbPool> {
    tracing::debug!("Creating database connection pool");

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);

    let pool = Pool::builder()
        .max_size(size)
        .min_idle(Some(size))
        .test_on_check_out(false)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(config)
        .await?;

    tracing::info!(
        pool_size = size,
        "Database connection pool created successfully"
    );

    Ok(pool)
}

impl SessionProvider for DbPool {
    type Session = DbConnection<'static>;

    #[tracing::instrument(skip(self))]
    async fn open_session(&self) -> DbResult<Self::Session> {
        let conn = self.get_owned().await?;
        Ok(conn)
    }
}

impl Session for DbConnection<'static> {
    async fn begin(&mut self) -> DbResult<()> {
        PgTransactionManager::begin_transaction(&mut **self).await?;
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        PgTransactionManager::commit_transaction(&mut **self).await?;
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        PgTransactionManager::rollback_transaction(&mut **self).await?;
        Ok(())
    }

    async fn reset(&mut self) -> DbResult<()> {
        if transaction_open(&mut **self) {
            tracing::debug!("Rolling back transaction left open on released connection");
            self.rollback().await?;
        }
        Ok(())
    }
}

fn transaction_open(conn: &mut AsyncPgConnection) -> bool {
    // A broken transaction manager reports an error instead of a depth.
    !matches!(
        PgTransactionManager::transaction_manager_status_mut(conn).transaction_depth(),
        Ok(None)
    )
}
