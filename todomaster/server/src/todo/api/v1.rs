use axum::{
    Router,
    extract::{FromRequest, Path, Query, Request, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use todomaster_core::{FilterMode, NewTask, Priority, Task, TaskChanges, TodoStats};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::todo::web::TodoState;
use crate::todo::{LoadPhase, TodoListError};
use crate::web::api::v1::ServerErrorResponse;

type ApiError = (StatusCode, Json<ServerErrorResponse>);

/// JSON representation of a task for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TodoJson {
    /// Unique identifier assigned by the store
    id: Uuid,
    title: String,
    description: Option<String>,
    completed: bool,
    /// One of `low`, `medium` or `high`
    #[schema(value_type = String, example = "medium")]
    priority: Priority,
    due_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Task> for TodoJson {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            completed: task.completed,
            priority: task.priority,
            due_date: task.due_date,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Counts over every task, whatever filter was requested.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsJson {
    total: usize,
    active: usize,
    completed: usize,
}

impl From<TodoStats> for StatsJson {
    fn from(stats: TodoStats) -> Self {
        Self {
            total: stats.total,
            active: stats.active,
            completed: stats.completed,
        }
    }
}

/// API response for listing tasks.
#[derive(Debug, Serialize, ToSchema)]
pub struct TodosResponse {
    /// Tasks matching the filter, newest first
    todos: Vec<TodoJson>,
    stats: StatsJson,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TodosQuery {
    /// `all` (default), `active` or `completed`
    #[serde(default)]
    filter: Option<String>,
}

/// Request body for creating a task.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NewTodoJson {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    completed: bool,
    /// Defaults to `medium`
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "high")]
    priority: Option<Priority>,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
}

impl From<NewTodoJson> for NewTask {
    fn from(json: NewTodoJson) -> Self {
        NewTask {
            title: json.title,
            description: json.description,
            completed: json.completed,
            priority: json.priority.unwrap_or_default(),
            due_date: json.due_date,
        }
    }
}

/// Request body for a partial update. Omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTodoJson {
    #[serde(default)]
    title: Option<String>,
    /// `null` clears the description
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    description: Option<Option<String>>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "low")]
    priority: Option<Priority>,
    /// `null` clears the due date
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    due_date: Option<Option<DateTime<Utc>>>,
}

impl From<UpdateTodoJson> for TaskChanges {
    fn from(json: UpdateTodoJson) -> Self {
        TaskChanges {
            title: json.title,
            description: json.description,
            completed: json.completed,
            priority: json.priority,
            due_date: json.due_date,
        }
    }
}

/// Maps a present field to `Some`, so an explicit `null` becomes `Some(None)`.
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// JSON body extractor that reports malformed bodies as a [`ServerErrorResponse`].
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| error_response(rejection.status(), rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ServerErrorResponse::new(message.into())))
}

fn list_error(err: TodoListError) -> ApiError {
    match err {
        TodoListError::Invalid(err) => error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        TodoListError::NotFound(id) => {
            error_response(StatusCode::NOT_FOUND, format!("Task {} not found", id))
        }
        TodoListError::Store(_) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to reach the task store",
        ),
    }
}

/// Handler for GET /api/v1/todos - Returns the filtered tasks and overall counts.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/todos",
    params(TodosQuery),
    responses(
        (status = 200, description = "Successfully retrieved tasks", body = TodosResponse),
        (status = 400, description = "Unknown filter", body = ServerErrorResponse),
        (status = 503, description = "Tasks are still loading", body = ServerErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn list_todos_handler(
    State(state): State<Arc<TodoState>>,
    Query(query): Query<TodosQuery>,
) -> Result<Json<TodosResponse>, ApiError> {
    let mode: FilterMode = query
        .filter
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|err: todomaster_core::TaskError| {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        })?;

    let list = state.todos.lock().await;
    if list.phase() == LoadPhase::Loading {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Tasks are still loading",
        ));
    }

    Ok(Json(TodosResponse {
        todos: list.filtered_view(mode).into_iter().map(TodoJson::from).collect(),
        stats: list.stats().into(),
    }))
}

/// Handler for POST /api/v1/todos - Creates a task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/v1/todos",
    request_body = NewTodoJson,
    responses(
        (status = 201, description = "Task created", body = TodoJson),
        (status = 400, description = "Malformed JSON body", body = ServerErrorResponse),
        (status = 422, description = "Blank or missing title", body = ServerErrorResponse),
        (status = 500, description = "Internal server error", body = ServerErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn create_todo_handler(
    State(state): State<Arc<TodoState>>,
    ApiJson(body): ApiJson<NewTodoJson>,
) -> Result<(StatusCode, Json<TodoJson>), ApiError> {
    let mut list = state.todos.lock().await;
    let created = list.add(body.into()).await.map_err(list_error)?;
    Ok((StatusCode::CREATED, Json(TodoJson::from(&created))))
}

/// Handler for GET /api/v1/todos/{id} - Returns one task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/todos/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task found", body = TodoJson),
        (status = 404, description = "No such task", body = ServerErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn get_todo_handler(
    State(state): State<Arc<TodoState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TodoJson>, ApiError> {
    let list = state.todos.lock().await;
    list.get(id)
        .map(|task| Json(TodoJson::from(task)))
        .ok_or_else(|| list_error(TodoListError::NotFound(id)))
}

/// Handler for PATCH /api/v1/todos/{id} - Applies a partial update.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    patch,
    path = "/api/v1/todos/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = UpdateTodoJson,
    responses(
        (status = 200, description = "Task updated", body = TodoJson),
        (status = 404, description = "No such task", body = ServerErrorResponse),
        (status = 422, description = "Blank title", body = ServerErrorResponse),
        (status = 500, description = "Internal server error", body = ServerErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn update_todo_handler(
    State(state): State<Arc<TodoState>>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<UpdateTodoJson>,
) -> Result<Json<TodoJson>, ApiError> {
    let mut list = state.todos.lock().await;
    let updated = list.update_one(id, body.into()).await.map_err(list_error)?;
    Ok(Json(TodoJson::from(&updated)))
}

/// Handler for DELETE /api/v1/todos/{id} - Deletes a task. Deleting a missing task succeeds.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/v1/todos/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 500, description = "Internal server error", body = ServerErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn delete_todo_handler(
    State(state): State<Arc<TodoState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut list = state.todos.lock().await;
    list.remove_one(id).await.map_err(list_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates and returns the tasks API router.
pub fn create_api_router(state: Arc<TodoState>) -> Router {
    Router::new()
        .route("/todos", get(list_todos_handler).post(create_todo_handler))
        .route(
            "/todos/{id}",
            get(get_todo_handler)
                .patch(update_todo_handler)
                .delete(delete_todo_handler),
        )
        .with_state(state)
}
