//! # HTTP Surface
//!
//! - [`routes`] - Todo endpoints and request payloads
//! - [`error`] - Store outcome to status code mapping
//! - [`server`] - Router assembly, middleware and graceful shutdown

pub mod error;
pub mod routes;
pub mod server;

pub use error::{ApiError, ErrorResponse, Operation};
pub use routes::{CreateTodoRequest, UpdateTodoRequest, todo_routes};
pub use server::{HttpServer, build_router};
