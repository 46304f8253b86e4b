//! Bounded pool of `SQLite` connections.
//!
//! A semaphore caps how many connections are checked out at once. Returned
//! connections wait in an idle list (at most `max_idle`) and are closed
//! instead of reused once they have been idle longer than `idle_timeout`.
//! A [`PooledConnection`] goes back to the pool when dropped, whatever path
//! the caller leaves by.

use crate::error::{Result, TodoError};
use crate::storage::schema::configure_connection;
use rusqlite::Connection;
use std::collections::VecDeque;
use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

/// Pool sizing and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on connections checked out at the same time.
    pub max_open: usize,
    /// Upper bound on connections kept open while unused.
    pub max_idle: usize,
    /// Idle connections older than this are closed on the next checkout or
    /// return.
    pub idle_timeout: Duration,
    /// How long [`ConnectionPool::get`] waits for a free slot.
    pub acquire_timeout: Duration,
    /// `SQLite` busy timeout applied to each new connection.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: 10,
            max_idle: 5,
            idle_timeout: Duration::from_secs(5 * 60),
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_open: usize,
    pub in_use: usize,
    pub idle: usize,
}

type Opener = dyn Fn() -> rusqlite::Result<Connection> + Send + Sync;

struct IdleConnection {
    conn: Connection,
    since: Instant,
}

struct PoolInner {
    config: PoolConfig,
    opener: Box<Opener>,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConnection>>,
}

impl PoolInner {
    /// Pop the most recently returned connection, closing every expired one.
    fn take_idle(&self) -> Option<Connection> {
        let (found, expired) = {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            let expired = split_expired(&mut idle, self.config.idle_timeout);
            (idle.pop_back().map(|entry| entry.conn), expired)
        };
        close_expired(expired);
        found
    }

    fn release(&self, conn: Connection) {
        let (rejected, expired) = {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            // Checked under the lock: `close` marks the pool closed before
            // draining, so nothing can be pushed after the drain.
            if self.permits.is_closed() {
                (Some(conn), Vec::new())
            } else {
                let expired = split_expired(&mut idle, self.config.idle_timeout);
                if idle.len() < self.config.max_idle {
                    idle.push_back(IdleConnection {
                        conn,
                        since: Instant::now(),
                    });
                    (None, expired)
                } else {
                    (Some(conn), expired)
                }
            }
        };
        close_expired(expired);
        drop(rejected);
    }

    fn idle_len(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Remove every entry idle for longer than `timeout`, keeping the rest in
/// return order.
fn split_expired(idle: &mut VecDeque<IdleConnection>, timeout: Duration) -> Vec<Connection> {
    let mut expired = Vec::new();
    let mut kept = VecDeque::with_capacity(idle.len());
    for entry in idle.drain(..) {
        if entry.since.elapsed() > timeout {
            expired.push(entry.conn);
        } else {
            kept.push_back(entry);
        }
    }
    *idle = kept;
    expired
}

/// Close connections outside the idle lock.
fn close_expired(expired: Vec<Connection>) {
    if !expired.is_empty() {
        debug!(count = expired.len(), "Closing expired idle connections");
    }
    drop(expired);
}

/// Shared handle to a bounded connection pool. Cloning is cheap.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a pool over the database file at `path`.
    ///
    /// Connections are opened lazily; each new one gets the standard pragmas.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>, config: PoolConfig) -> Self {
        let path = path.into();
        let busy_timeout = config.busy_timeout;
        Self::with_opener(config, move || {
            let conn = Connection::open(&path)?;
            configure_connection(&conn, busy_timeout)?;
            Ok(conn)
        })
    }

    /// Create a pool that opens connections with `opener`.
    #[must_use]
    pub fn with_opener<F>(config: PoolConfig, opener: F) -> Self
    where
        F: Fn() -> rusqlite::Result<Connection> + Send + Sync + 'static,
    {
        let max_open = config.max_open.max(1);
        Self {
            inner: Arc::new(PoolInner {
                config,
                opener: Box::new(opener),
                permits: Arc::new(Semaphore::new(max_open)),
                idle: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Check out a connection, waiting up to `acquire_timeout` for a slot.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::PoolTimeout`] when no slot frees up in time,
    /// [`TodoError::PoolClosed`] after [`close`](Self::close), or the error
    /// from opening a new connection.
    pub async fn get(&self) -> Result<PooledConnection> {
        let wait = self.inner.config.acquire_timeout;
        let permit = match tokio::time::timeout(wait, Arc::clone(&self.inner.permits).acquire_owned())
            .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(TodoError::PoolClosed),
            Err(_) => return Err(TodoError::PoolTimeout(wait)),
        };

        if let Some(conn) = self.inner.take_idle() {
            trace!("Reusing idle connection");
            return Ok(PooledConnection::new(conn, Arc::clone(&self.inner), permit));
        }

        let inner = Arc::clone(&self.inner);
        let conn = tokio::task::spawn_blocking(move || (inner.opener)()).await??;
        debug!("Opened new database connection");
        Ok(PooledConnection::new(conn, Arc::clone(&self.inner), permit))
    }

    /// Stop handing out connections and close the idle ones.
    ///
    /// Connections still checked out are closed when they are returned.
    pub fn close(&self) {
        self.inner.permits.close();
        let drained: Vec<IdleConnection> = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        debug!(idle = drained.len(), "Connection pool closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let max_open = self.inner.config.max_open.max(1);
        PoolStatus {
            max_open,
            in_use: max_open.saturating_sub(self.inner.permits.available_permits()),
            idle: self.inner.idle_len(),
        }
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// A checked-out connection. Returns to the pool on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    fn new(conn: Connection, pool: Arc<PoolInner>, permit: OwnedSemaphorePermit) -> Self {
        Self {
            conn: Some(conn),
            pool,
            _permit: permit,
        }
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("connection is only taken in drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        // Runs before the permit field is dropped, so the slot only frees up
        // once the connection is back in the idle list.
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}
