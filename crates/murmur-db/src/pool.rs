//! deadpool manager for SQLite connections.

use std::cell::Cell;
use std::path::PathBuf;
use std::time::Duration;

use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use rusqlite::Connection;
use tracing::debug;

pub(crate) type SqlitePool = managed::Pool<SqliteManager>;
pub(crate) type PooledConnection = managed::Object<SqliteManager>;

pub(crate) struct SqliteManager {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteManager {
    pub(crate) fn new(path: PathBuf, busy_timeout: Duration) -> Self {
        Self { path, busy_timeout }
    }
}

impl managed::Manager for SqliteManager {
    type Type = Connection;
    type Error = rusqlite::Error;

    async fn create(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        // Per connection in SQLite, so every new handle needs it
        conn.pragma_update(None, "foreign_keys", "ON")?;
        debug!("Opened SQLite connection to {}", self.path.display());
        Ok(conn)
    }

    async fn recycle(&self, conn: &mut Connection, _: &Metrics) -> RecycleResult<rusqlite::Error> {
        // An interrupted workflow can leave a transaction open
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK").map_err(RecycleError::Backend)?;
        }
        Ok(())
    }
}

/// Close idle connections unused for longer than `max_idle_time`, keeping
/// up to `keep` of them regardless.
pub(crate) fn reap_idle(pool: &SqlitePool, keep: u32, max_idle_time: Duration) {
    let kept = Cell::new(0u32);
    pool.retain(|_, metrics| {
        if metrics.last_used() < max_idle_time || kept.get() < keep {
            kept.set(kept.get() + 1);
            true
        } else {
            false
        }
    });
}
