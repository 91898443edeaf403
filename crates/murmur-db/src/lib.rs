pub mod config;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod store;

mod codec;
mod comments;
mod feed;
mod followers;
mod pool;
mod posts;
mod users;

pub use config::DbConfig;
pub use error::StoreError;
pub use store::{CommentStore, FollowerStore, PostStore, Storage, UserStore};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use deadpool::Runtime;
use rusqlite::{Connection, InterruptHandle};
use tokio::{task, time};
use tracing::{debug, info, warn};

use crate::pool::{SqliteManager, SqlitePool};

/// Pooled SQLite handle. Cheap to clone; every clone shares the same pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl Database {
    pub async fn open(config: &DbConfig) -> Result<Self> {
        let manager = SqliteManager::new(config.path.clone(), config.query_timeout);
        let pool = SqlitePool::builder(manager)
            .max_size(config.max_open_conns.max(1) as usize)
            .wait_timeout(Some(config.acquire_timeout))
            .create_timeout(Some(config.acquire_timeout))
            .runtime(Runtime::Tokio1)
            .build()?;

        {
            let conn = pool.get().await?;
            task::spawn_blocking(move || -> Result<()> {
                // WAL mode for concurrent readers alongside the single writer
                conn.pragma_update(None, "journal_mode", "WAL")?;
                migrations::run(&conn)
            })
            .await??;
        }

        // Warm up the idle set
        let warm = config.max_idle_conns.min(config.max_open_conns);
        let mut held = Vec::with_capacity(warm as usize);
        for _ in 0..warm {
            held.push(pool.get().await?);
        }
        drop(held);

        let reaper = pool.clone();
        let (keep, max_idle_time) = (warm, config.max_idle_time);
        tokio::spawn(async move {
            let mut tick = time::interval(max_idle_time.max(Duration::from_secs(1)));
            loop {
                tick.tick().await;
                pool::reap_idle(&reaper, keep, max_idle_time);
            }
        });

        info!(
            "Database opened at {} (max_open={}, max_idle={}, idle_time={:?}, query_timeout={:?})",
            config.path.display(),
            config.max_open_conns,
            config.max_idle_conns,
            config.max_idle_time,
            config.query_timeout,
        );

        Ok(Self {
            pool,
            query_timeout: config.query_timeout,
        })
    }

    /// Run `op` on a pooled connection off the async runtime.
    ///
    /// The call is bounded by the query timeout. When the deadline passes, or
    /// the caller's future is dropped, `op` is skipped if it has not started
    /// yet. If it is already running, its statement is interrupted and any
    /// commit it attempts is turned into a rollback.
    pub async fn run<F, T>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self.pool.get().await?;
        let query_timeout = self.query_timeout;

        let call = Arc::new(Call::new(conn.get_interrupt_handle()));
        let guard = CancelOnDrop(Some(call.clone()));

        let mut work = task::spawn_blocking(move || {
            if !call.start() {
                return Err(StoreError::Timeout(query_timeout));
            }
            let hook = call.clone();
            conn.commit_hook(Some(move || hook.is_cancelled()));
            let result = op(&mut *conn);
            conn.commit_hook(None::<fn() -> bool>);
            call.finish();
            result
        });

        match time::timeout(query_timeout, &mut work).await {
            Ok(joined) => {
                guard.disarm();
                joined?
            }
            Err(_) => match guard.cancel() {
                Cancel::BeforeStart => {
                    warn!("Query still queued after {:?}, skipped", query_timeout);
                    Err(StoreError::Timeout(query_timeout))
                }
                // Nothing can commit past this point; wait for `op` to unwind
                Cancel::Interrupted => {
                    warn!("Query exceeded {:?}, interrupted", query_timeout);
                    match work.await? {
                        Ok(value) => Ok(value),
                        Err(e) => {
                            debug!("Interrupted query unwound with: {e}");
                            Err(StoreError::Timeout(query_timeout))
                        }
                    }
                }
                Cancel::TooLate => work.await?,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Queued,
    Running,
    Finished,
    Cancelled,
}

#[derive(Debug, PartialEq, Eq)]
enum Cancel {
    BeforeStart,
    Interrupted,
    TooLate,
}

/// Shared between a waiting caller and the blocking task holding the
/// connection. Phase changes happen under the lock, so the interrupt only
/// ever lands while `op` still owns the connection.
struct Call {
    phase: Mutex<Phase>,
    interrupt: InterruptHandle,
}

impl Call {
    fn new(interrupt: InterruptHandle) -> Self {
        Self {
            phase: Mutex::new(Phase::Queued),
            interrupt,
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self) -> bool {
        let mut phase = self.phase();
        if *phase == Phase::Queued {
            *phase = Phase::Running;
            true
        } else {
            false
        }
    }

    fn finish(&self) {
        *self.phase() = Phase::Finished;
    }

    fn is_cancelled(&self) -> bool {
        *self.phase() == Phase::Cancelled
    }

    fn cancel(&self) -> Cancel {
        let mut phase = self.phase();
        match *phase {
            Phase::Queued => {
                *phase = Phase::Cancelled;
                Cancel::BeforeStart
            }
            Phase::Running => {
                *phase = Phase::Cancelled;
                self.interrupt.interrupt();
                Cancel::Interrupted
            }
            Phase::Finished | Phase::Cancelled => Cancel::TooLate,
        }
    }
}

/// Cancels the call unless disarmed.
struct CancelOnDrop(Option<Arc<Call>>);

impl CancelOnDrop {
    fn disarm(mut self) {
        self.0.take();
    }

    fn cancel(mut self) -> Cancel {
        match self.0.take() {
            Some(call) => call.cancel(),
            None => Cancel::TooLate,
        }
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(call) = self.0.take() {
            call.cancel();
        }
    }
}
