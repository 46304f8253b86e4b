//! Dynamic `UPDATE` statement construction.
//!
//! [`UpdateStatement`] owns both the `SET` fragments and the positional
//! arguments. Every assignment that takes a value binds it in the same call
//! that writes its `?N` placeholder, so placeholder `N` always refers to
//! argument `N`. The id predicate is appended last and takes the final
//! position.

use crate::error::{Result, TodoError};
use rusqlite::ToSql;
use std::fmt;

/// Builder for `UPDATE <table> SET … WHERE <key> = ?N RETURNING …`.
pub struct UpdateStatement {
    table: &'static str,
    assignments: Vec<String>,
    args: Vec<Box<dyn ToSql>>,
}

impl UpdateStatement {
    #[must_use]
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
            args: Vec::new(),
        }
    }

    /// Bind a value and return its 1-based placeholder position.
    fn bind(&mut self, value: Box<dyn ToSql>) -> usize {
        self.args.push(value);
        self.args.len()
    }

    /// Append `column = ?N`, binding `value` at position `N`.
    pub fn set<V: ToSql + 'static>(&mut self, column: &str, value: V) -> &mut Self {
        let position = self.bind(Box::new(value));
        self.assignments.push(format!("{column} = ?{position}"));
        self
    }

    /// Append `column = <expr>` where `expr` is rendered from the placeholder
    /// (`?N`) that `value` was bound to.
    pub fn set_expr<V, F>(&mut self, column: &str, value: V, expr: F) -> &mut Self
    where
        V: ToSql + 'static,
        F: FnOnce(&str) -> String,
    {
        let position = self.bind(Box::new(value));
        let rendered = expr(&format!("?{position}"));
        self.assignments.push(format!("{column} = {rendered}"));
        self
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Bind the key as the last argument and render the full statement.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::EmptyPatch`] if no assignment was added.
    pub fn finish<K: ToSql + 'static>(
        mut self,
        key_column: &str,
        key: K,
        returning: &str,
    ) -> Result<BoundStatement> {
        if self.is_empty() {
            return Err(TodoError::EmptyPatch);
        }

        let key_position = self.bind(Box::new(key));
        let sql = format!(
            "UPDATE {} SET {} WHERE {key_column} = ?{key_position} RETURNING {returning}",
            self.table,
            self.assignments.join(", "),
        );

        Ok(BoundStatement {
            sql,
            args: self.args,
        })
    }
}

impl fmt::Debug for UpdateStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateStatement")
            .field("table", &self.table)
            .field("assignments", &self.assignments)
            .field("args", &self.args.len())
            .finish()
    }
}

/// SQL text plus the arguments its placeholders refer to, in order.
pub struct BoundStatement {
    sql: String,
    args: Vec<Box<dyn ToSql>>,
}

impl BoundStatement {
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[cfg(test)]
    fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Arguments as the slice form rusqlite accepts as `Params`.
    #[must_use]
    pub fn params(&self) -> Vec<&dyn ToSql> {
        self.args.iter().map(AsRef::as_ref).collect()
    }
}

impl fmt::Debug for BoundStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundStatement")
            .field("sql", &self.sql)
            .field("args", &self.args.len())
            .finish()
    }
}
