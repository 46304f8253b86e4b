//! `SQLite` storage layer for `todo_service`.
//!
//! # Submodules
//!
//! - [`schema`] - Table definition and per-connection pragmas
//! - [`statement`] - Builder for partial `UPDATE` statements
//! - [`sqlite`] - Synchronous CRUD over a single connection
//! - [`pool`] - Bounded connection pool

pub mod pool;
pub mod schema;
pub mod sqlite;
pub mod statement;

pub use pool::{ConnectionPool, PoolConfig, PoolStatus, PooledConnection};
pub use sqlite::SqliteStorage;
pub use statement::{BoundStatement, UpdateStatement};
