//! services/api/src/adapters/write_tx.rs
//!
//! Write transactions opened with `BEGIN IMMEDIATE`.
//!
//! A deferred transaction that reads before it writes has to upgrade its
//! read lock, and SQLite fails that upgrade at once when another connection
//! is writing. Taking the write lock up front makes a second writer wait on
//! the busy timeout instead, and it also serializes every read-then-write on
//! the order sequences.

use std::ops::{Deref, DerefMut};

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tasksync_core::ports::PortResult;
use tracing::warn;

use super::db::map_db_error;

pub struct WriteTx {
    /// `None` once the transaction has been committed or rolled back.
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTx {
    pub async fn begin(pool: &SqlitePool) -> PortResult<Self> {
        let mut conn = pool.acquire().await.map_err(map_db_error)?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(map_db_error)?;
        Ok(Self { conn: Some(conn) })
    }

    /// Commits when `result` is `Ok`, rolls back otherwise, and passes the
    /// result through. A failed commit is returned as the error.
    pub async fn finish<T>(mut self, result: PortResult<T>) -> PortResult<T> {
        match result {
            Ok(value) => {
                self.end("COMMIT").await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.end("ROLLBACK").await {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    async fn end(&mut self, statement: &'static str) -> PortResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        match sqlx::query(statement).execute(&mut *conn).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // Still open; `Drop` retries the rollback.
                self.conn = Some(conn);
                Err(map_db_error(e))
            }
        }
    }
}

impl Deref for WriteTx {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        self.conn
            .as_deref()
            .unwrap_or_else(|| unreachable!("write transaction used after it ended"))
    }
}

impl DerefMut for WriteTx {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        self.conn
            .as_deref_mut()
            .unwrap_or_else(|| unreachable!("write transaction used after it ended"))
    }
}

impl Drop for WriteTx {
    /// Reached with an open transaction when the owning future was cancelled
    /// or ending it failed. The connection only goes back to the pool after
    /// a successful rollback; otherwise it is closed, which also rolls back.
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        warn!("Closing connection after failed rollback: {}", e);
                        drop(conn.detach());
                    }
                });
            }
            Err(_) => drop(conn.detach()),
        }
    }
}
