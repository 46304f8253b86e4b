//! Async record store for todos.
//!
//! [`TodoStore`] is what request handlers talk to. Each call checks out one
//! pooled connection, runs one statement on the blocking thread pool, and
//! hands the connection back. Input that can be rejected without the
//! database is rejected before a connection is requested.
//!
//! Store futures are cancel-safe: dropping one (client gone, request timeout,
//! `tokio::time::timeout` around the call) interrupts the running statement,
//! and the connection returns to the pool as soon as the blocking task
//! unwinds.

use crate::error::{Result, TodoError};
use crate::model::{Todo, TodoPatch};
use crate::storage::{ConnectionPool, SqliteStorage};
use crate::validation::{ensure_patch, ensure_title};
use rusqlite::{Connection, InterruptHandle};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TodoStore {
    pool: ConnectionPool,
    statement_timeout: Option<Duration>,
}

impl TodoStore {
    #[must_use]
    pub const fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Bound every operation (connection checkout included) by `timeout`.
    #[must_use]
    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Create the backing table if needed.
    ///
    /// # Errors
    ///
    /// Returns a store error if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.run("ensure_schema", |conn| SqliteStorage::new(conn).ensure_schema())
            .await
    }

    /// All todos, ascending by id.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    pub async fn list(&self) -> Result<Vec<Todo>> {
        self.run("list", |conn| SqliteStorage::new(conn).list_todos())
            .await
    }

    /// # Errors
    ///
    /// Returns [`TodoError::NotFound`] or a store error.
    pub async fn get(&self, id: i64) -> Result<Todo> {
        self.run("get", move |conn| SqliteStorage::new(conn).get_todo(id))
            .await
    }

    /// # Errors
    ///
    /// Returns a validation error for a blank title, or a store error.
    pub async fn create(&self, title: impl Into<String>, completed: bool) -> Result<Todo> {
        let title = title.into();
        ensure_title(&title)?;
        self.run("create", move |conn| {
            SqliteStorage::new(conn).create_todo(&title, completed)
        })
        .await
    }

    /// # Errors
    ///
    /// Returns [`TodoError::EmptyPatch`] or a validation error without
    /// contacting the database, [`TodoError::NotFound`], or a store error.
    pub async fn update(&self, id: i64, patch: TodoPatch) -> Result<Todo> {
        ensure_patch(&patch)?;
        self.run("update", move |conn| {
            SqliteStorage::new(conn).update_todo(id, &patch)
        })
        .await
    }

    /// # Errors
    ///
    /// Returns [`TodoError::NotFound`] or a store error.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.run("delete", move |conn| SqliteStorage::new(conn).delete_todo(id))
            .await
    }

    /// Run `op` on a pooled connection, applying the store's own deadline.
    pub(crate) async fn run<T, F>(&self, name: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let started = Instant::now();
        let result = match self.statement_timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_on_connection(op))
                .await
                .unwrap_or(Err(TodoError::DeadlineExceeded(limit))),
            None => self.run_on_connection(op).await,
        };
        debug!(
            op = name,
            outcome = result.as_ref().map_or_else(|err| err.kind().as_str(), |_| "ok"),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "store operation finished"
        );
        result
    }

    async fn run_on_connection<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.pool.get().await?;
        let handle = conn.get_interrupt_handle();

        // The connection travels back inside the task output, so it cannot be
        // reused by anyone else before this future has seen the result.
        let task = tokio::task::spawn_blocking(move || {
            let result = op(&conn);
            (result, conn)
        });
        // Declared after `task`: on cancellation it is dropped first and
        // interrupts while the connection is still ours.
        let guard = InterruptOnDrop::new(handle);

        let (result, conn) = task.await?;
        guard.disarm();
        drop(conn);

        result.map_err(|err| {
            if err.is_interrupted() {
                TodoError::Cancelled
            } else {
                err
            }
        })
    }
}

/// Interrupts the connection's running statement unless disarmed.
struct InterruptOnDrop {
    handle: Option<InterruptHandle>,
}

impl InterruptOnDrop {
    const fn new(handle: InterruptHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn disarm(mut self) {
        self.handle = None;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Interrupting in-flight statement");
            handle.interrupt();
        }
    }
}
