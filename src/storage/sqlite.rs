//! `SQLite` storage implementation.
//!
//! Every operation is a single statement on the borrowed connection. Existence
//! is decided by that statement itself (`RETURNING` row present or not, rows
//! affected), never by a separate lookup first.

use crate::error::{Result, TodoError};
use crate::model::{Todo, TodoPatch};
use crate::storage::schema::ensure_schema;
use crate::storage::statement::UpdateStatement;
use crate::validation::{ensure_patch, ensure_title};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};

/// Columns of a full todo row, in the order [`todo_from_row`] reads them.
pub const TODO_COLUMNS: &str = "id, title, completed, created_at, updated_at";

/// Synchronous CRUD over one `SQLite` connection.
#[derive(Debug, Clone, Copy)]
pub struct SqliteStorage<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStorage<'conn> {
    #[must_use]
    pub const fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Create the `todos` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL fails.
    pub fn ensure_schema(&self) -> Result<()> {
        ensure_schema(self.conn)
    }

    /// List all todos in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_todos(&self) -> Result<Vec<Todo>> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let todos = stmt
            .query_map([], todo_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(todos)
    }

    /// Get a todo by id.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::NotFound`] if no row matches, or a database error.
    pub fn get_todo(&self, id: i64) -> Result<Todo> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1");
        self.conn
            .query_row(&sql, [id], todo_from_row)
            .optional()?
            .ok_or(TodoError::NotFound { id })
    }

    /// Insert a todo and return the persisted row.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank title, or a database error.
    pub fn create_todo(&self, title: &str, completed: bool) -> Result<Todo> {
        self.create_todo_at(title, completed, Utc::now())
    }

    pub(crate) fn create_todo_at(
        &self,
        title: &str,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<Todo> {
        ensure_title(title)?;

        let sql = format!(
            "INSERT INTO todos (title, completed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             RETURNING {TODO_COLUMNS}"
        );
        let todo = self.conn.query_row(
            &sql,
            rusqlite::params![title, completed, now.timestamp_micros()],
            todo_from_row,
        )?;
        Ok(todo)
    }

    /// Apply a partial update and return the updated row.
    ///
    /// Only the supplied fields are written. `updated_at` always moves
    /// forward: it becomes `max(now, previous + 1µs)`.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::EmptyPatch`] or a validation error without
    /// touching the database, [`TodoError::NotFound`] if the row does not
    /// exist, or a database error.
    pub fn update_todo(&self, id: i64, patch: &TodoPatch) -> Result<Todo> {
        self.update_todo_at(id, patch, Utc::now())
    }

    pub(crate) fn update_todo_at(
        &self,
        id: i64,
        patch: &TodoPatch,
        now: DateTime<Utc>,
    ) -> Result<Todo> {
        ensure_patch(patch)?;

        let mut update = UpdateStatement::new("todos");
        if let Some(title) = &patch.title {
            update.set("title", title.clone());
        }
        if let Some(completed) = patch.completed {
            update.set("completed", completed);
        }
        update.set_expr("updated_at", now.timestamp_micros(), |now| {
            format!("max({now}, updated_at + 1)")
        });

        let stmt = update.finish("id", id, TODO_COLUMNS)?;
        self.conn
            .query_row(stmt.sql(), stmt.params().as_slice(), todo_from_row)
            .optional()?
            .ok_or(TodoError::NotFound { id })
    }

    /// Delete a todo.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::NotFound`] if no row was deleted, or a database error.
    pub fn delete_todo(&self, id: i64) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM todos WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(TodoError::NotFound { id });
        }
        Ok(())
    }
}

fn todo_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        title: row.get(1)?,
        completed: row.get(2)?,
        created_at: datetime_from_micros(3, row.get(3)?)?,
        updated_at: datetime_from_micros(4, row.get(4)?)?,
    })
}

fn datetime_from_micros(column: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Integer,
            format!("timestamp out of range: {micros}").into(),
        )
    })
}
