//! # Todo Routes
//!
//! JSON endpoints over [`TodoStore`]:
//!
//! | Method        | Path          | Success |
//! |---------------|---------------|---------|
//! | `GET`         | `/healthz`    | 200     |
//! | `GET`         | `/todos`      | 200     |
//! | `POST`        | `/todos`      | 201     |
//! | `GET`         | `/todos/:id`  | 200     |
//! | `PUT`/`PATCH` | `/todos/:id`  | 200     |
//! | `DELETE`      | `/todos/:id`  | 204     |

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::{Deserialize, Serialize};

use super::error::{ApiError, Operation};
use crate::model::{Todo, TodoPatch};
use crate::store::TodoStore;
use crate::validation::normalize_title;

// ==================
// Request Types
// ==================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTodoRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

impl CreateTodoRequest {
    /// Trim the title and reject a missing or blank one.
    ///
    /// # Errors
    ///
    /// Returns a 400 "title is required".
    pub fn validate(self) -> Result<(String, bool), ApiError> {
        let title = normalize_title(&self.title)
            .map_err(|_| ApiError::bad_request(Operation::Create.blank_title()))?;
        Ok((title, self.completed))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

impl UpdateTodoRequest {
    /// Turn the body into a patch, trimming any title.
    ///
    /// # Errors
    ///
    /// Returns a 400 for a blank title or a body with no fields.
    pub fn into_patch(self) -> Result<TodoPatch, ApiError> {
        let title = self
            .title
            .map(|raw| normalize_title(&raw))
            .transpose()
            .map_err(|_| ApiError::bad_request(Operation::Update.blank_title()))?;
        let patch = TodoPatch {
            title,
            completed: self.completed,
        };
        if patch.is_empty() {
            return Err(ApiError::bad_request("no fields to update"));
        }
        Ok(patch)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

// ==================
// Router
// ==================

/// Create the todo routes
#[must_use]
pub fn todo_routes(store: TodoStore) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/todos", get(list_handler).post(create_handler))
        .route(
            "/todos/:id",
            get(get_handler)
                .put(update_handler)
                .patch(update_handler)
                .delete(delete_handler),
        )
        .with_state(store)
}

// ==================
// Handlers
// ==================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn list_handler(State(store): State<TodoStore>) -> Result<Json<Vec<Todo>>, ApiError> {
    let todos = store
        .list()
        .await
        .map_err(|err| ApiError::from_store(&err, Operation::List))?;
    Ok(Json(todos))
}

async fn create_handler(
    State(store): State<TodoStore>,
    body: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.map_err(bad_body)?;
    let (title, completed) = request.validate()?;
    let todo = store
        .create(title, completed)
        .await
        .map_err(|err| ApiError::from_store(&err, Operation::Create))?;
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn get_handler(
    State(store): State<TodoStore>,
    Path(raw_id): Path<String>,
) -> Result<Json<Todo>, ApiError> {
    let id = parse_id(&raw_id)?;
    let todo = store
        .get(id)
        .await
        .map_err(|err| ApiError::from_store(&err, Operation::Get))?;
    Ok(Json(todo))
}

async fn update_handler(
    State(store): State<TodoStore>,
    Path(raw_id): Path<String>,
    body: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Result<Json<Todo>, ApiError> {
    let id = parse_id(&raw_id)?;
    let Json(request) = body.map_err(bad_body)?;
    let patch = request.into_patch()?;
    let todo = store
        .update(id, patch)
        .await
        .map_err(|err| ApiError::from_store(&err, Operation::Update))?;
    Ok(Json(todo))
}

async fn delete_handler(
    State(store): State<TodoStore>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;
    store
        .delete(id)
        .await
        .map_err(|err| ApiError::from_store(&err, Operation::Delete))?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================
// Helper Functions
// ==================

/// Any `i64` is accepted; ids that were never assigned come back as 404.
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| ApiError::bad_request("invalid id"))
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}
