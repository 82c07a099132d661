use askama::Template;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Html,
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use todomaster_core::{
    FilterMode, NewTask, Priority, Task, TaskChanges, TaskError, TodoStats, format_due_date,
    is_overdue, priority_classes, short_date,
};
use uuid::Uuid;

use crate::todo::{LoadPhase, SharedTodoList, TodoList, TodoListError};

#[derive(Clone)]
pub struct TodoState {
    pub todos: SharedTodoList,
}

/// The `filter` parameter carried by every request that re-renders the board.
#[derive(Debug, Deserialize, Default)]
pub struct FilterParams {
    #[serde(default)]
    filter: Option<String>,
}

impl FilterParams {
    fn mode(&self) -> FilterMode {
        filter_mode(self.filter.as_deref())
    }
}

/// Fields of both the add form and the edit form.
#[derive(Debug, Deserialize)]
pub struct TodoForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    priority: String,
    #[serde(default)]
    due_date: String,
    #[serde(default)]
    filter: Option<String>,
}

impl TodoForm {
    fn priority(&self) -> Result<Priority, TodoError> {
        if self.priority.trim().is_empty() {
            return Ok(Priority::default());
        }
        Ok(self.priority.parse()?)
    }

    fn into_new_task(self) -> Result<NewTask, TodoError> {
        Ok(NewTask {
            priority: self.priority()?,
            due_date: parse_due_date(&self.due_date)?,
            description: Some(self.description),
            title: self.title,
            completed: false,
        })
    }

    /// The edit form always submits every field, so every field is replaced.
    fn into_changes(self) -> Result<TaskChanges, TodoError> {
        Ok(TaskChanges {
            priority: Some(self.priority()?),
            due_date: Some(parse_due_date(&self.due_date)?),
            description: Some(Some(self.description)),
            title: Some(self.title),
            completed: None,
        })
    }
}

/// Unknown filter values fall back to showing everything.
fn filter_mode(value: Option<&str>) -> FilterMode {
    let value = value.unwrap_or_default();
    value.parse().unwrap_or_else(|err| {
        tracing::warn!("{}, showing all tasks", err);
        FilterMode::All
    })
}

/// Parses an `<input type="date">` value as midnight UTC. A blank value means no due date.
pub fn parse_due_date(value: &str) -> Result<Option<DateTime<Utc>>, TodoError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| Some(date.and_time(NaiveTime::MIN).and_utc()))
        .map_err(|_| TodoError::InvalidDate(value.to_string()))
}

/// Errors raised by the task page handlers.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    #[error(transparent)]
    List(#[from] TodoListError),
    #[error(transparent)]
    Invalid(#[from] TaskError),
    #[error("Invalid due date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

impl TodoError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            TodoError::Invalid(TaskError::EmptyTitle)
            | TodoError::List(TodoListError::Invalid(TaskError::EmptyTitle)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Please enter a title for the task.".to_string(),
            ),
            TodoError::Invalid(err) | TodoError::List(TodoListError::Invalid(err)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            TodoError::InvalidDate(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            TodoError::List(TodoListError::NotFound(_)) => (
                StatusCode::NOT_FOUND,
                "That task no longer exists. Refresh the page to see the latest list.".to_string(),
            ),
            TodoError::List(TodoListError::Store(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not save your changes. Please try again.".to_string(),
            ),
            TodoError::Template(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred while processing your request. Please try again later."
                    .to_string(),
            ),
        }
    }
}

impl axum::response::IntoResponse for TodoError {
    fn into_response(self) -> axum::response::Response {
        let (status_code, user_facing_error_message) = self.status_and_message();

        let error_template = ErrorMessageTemplate {
            message: user_facing_error_message,
        };
        let Ok(rendered) = error_template.render() else {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };

        let mut response = (status_code, Html(rendered)).into_response();
        // The message goes into the banner above the list, leaving the list untouched.
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("hx-retarget"),
            HeaderValue::from_static("#error-message"),
        );
        headers.insert(
            HeaderName::from_static("hx-reswap"),
            HeaderValue::from_static("innerHTML"),
        );
        response.headers_mut().extend(headers);
        response
    }
}

/// Everything a task card shows, computed up front.
#[derive(Debug)]
pub struct TaskCard {
    id: Uuid,
    title: String,
    description: String,
    completed: bool,
    overdue: bool,
    priority_label: &'static str,
    priority_classes: &'static str,
    due_label: String,
    due_date: String,
    created: String,
    filter: &'static str,
}

impl TaskCard {
    fn new(task: &Task, filter: FilterMode, now: DateTime<Utc>) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            completed: task.completed,
            overdue: is_overdue(task, now),
            priority_label: task.priority.label(),
            priority_classes: priority_classes(task.priority),
            due_label: task
                .due_date
                .map(|due| format_due_date(due, now).to_string())
                .unwrap_or_default(),
            due_date: task.due_date.map(short_date).unwrap_or_default(),
            created: short_date(task.created_at),
            filter: filter.as_str(),
        }
    }
}

#[derive(Debug)]
struct FilterTab {
    value: &'static str,
    label: &'static str,
    count: usize,
    selected: bool,
}

/// The stats cards, filter tabs and task list for one filter.
#[derive(Debug)]
pub struct BoardView {
    loading: bool,
    filter: &'static str,
    stats: TodoStats,
    tabs: Vec<FilterTab>,
    cards: Vec<TaskCard>,
    empty_heading: &'static str,
    empty_hint: &'static str,
}

impl BoardView {
    pub fn build(list: &TodoList, mode: FilterMode, now: DateTime<Utc>) -> Self {
        let stats = list.stats();
        let tabs = FilterMode::ALL
            .iter()
            .map(|tab| FilterTab {
                value: tab.as_str(),
                label: tab.label(),
                count: stats.count_for(*tab),
                selected: *tab == mode,
            })
            .collect();
        let cards = list
            .filtered_view(mode)
            .into_iter()
            .map(|task| TaskCard::new(task, mode, now))
            .collect();
        Self {
            loading: list.phase() == LoadPhase::Loading,
            filter: mode.as_str(),
            stats,
            tabs,
            cards,
            empty_heading: mode.empty_heading(),
            empty_hint: mode.empty_hint(),
        }
    }
}

#[derive(Debug)]
struct PriorityOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    board: BoardView,
    persistent: bool,
    backend: String,
}

#[derive(Template)]
#[template(path = "todos/board.html")]
struct BoardTemplate {
    board: BoardView,
}

#[derive(Template)]
#[template(path = "todos/card.html")]
struct CardTemplate {
    card: TaskCard,
}

#[derive(Template)]
#[template(path = "todos/edit_form.html")]
struct EditFormTemplate {
    id: Uuid,
    title: String,
    description: String,
    due_date: String,
    priorities: Vec<PriorityOption>,
    filter: &'static str,
}

impl EditFormTemplate {
    fn new(task: &Task, filter: FilterMode) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            due_date: task
                .due_date
                .map(|due| due.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            priorities: Priority::ALL
                .iter()
                .map(|priority| PriorityOption {
                    value: priority.as_str(),
                    label: priority.label(),
                    selected: *priority == task.priority,
                })
                .collect(),
            filter: filter.as_str(),
        }
    }
}

#[derive(Template)]
#[template(path = "todos/error_message.html")]
struct ErrorMessageTemplate {
    message: String,
}

fn render_board(list: &TodoList, mode: FilterMode) -> Result<Html<String>, TodoError> {
    let template = BoardTemplate {
        board: BoardView::build(list, mode, Utc::now()),
    };
    template.render().map(Html).map_err(TodoError::from)
}

/// Handler for the main page. Shows a spinner until the first load has finished.
#[tracing::instrument(skip(state))]
async fn index_handler(
    State(state): State<Arc<TodoState>>,
    Query(params): Query<FilterParams>,
) -> Result<Html<String>, TodoError> {
    let list = state.todos.lock().await;
    let backend = list.backend();
    let template = IndexTemplate {
        board: BoardView::build(&list, params.mode(), Utc::now()),
        persistent: backend.is_persistent(),
        backend: backend.to_string(),
    };
    template.render().map(Html).map_err(TodoError::from)
}

/// Handler for GET /todos that returns the board fragment for a filter.
#[tracing::instrument(skip(state))]
async fn board_handler(
    State(state): State<Arc<TodoState>>,
    Query(params): Query<FilterParams>,
) -> Result<Html<String>, TodoError> {
    let list = state.todos.lock().await;
    render_board(&list, params.mode())
}

/// Handler for creating a task from the add form.
#[tracing::instrument(skip(state))]
async fn create_todo_handler(
    State(state): State<Arc<TodoState>>,
    Form(form): Form<TodoForm>,
) -> Result<Html<String>, TodoError> {
    let mode = filter_mode(form.filter.as_deref());
    let fields = form.into_new_task()?;
    let mut list = state.todos.lock().await;
    list.add(fields).await?;
    render_board(&list, mode)
}

/// Handler for GET /todos/{id} that returns a single card, used to cancel an edit.
#[tracing::instrument(skip(state))]
async fn card_handler(
    State(state): State<Arc<TodoState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<FilterParams>,
) -> Result<Html<String>, TodoError> {
    let list = state.todos.lock().await;
    let task = list.get(id).ok_or(TodoListError::NotFound(id))?;
    let template = CardTemplate {
        card: TaskCard::new(task, params.mode(), Utc::now()),
    };
    template.render().map(Html).map_err(TodoError::from)
}

/// Handler for serving the edit form in place of a card.
#[tracing::instrument(skip(state))]
async fn edit_form_handler(
    State(state): State<Arc<TodoState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<FilterParams>,
) -> Result<Html<String>, TodoError> {
    let list = state.todos.lock().await;
    let task = list.get(id).ok_or(TodoListError::NotFound(id))?;
    let template = EditFormTemplate::new(task, params.mode());
    template.render().map(Html).map_err(TodoError::from)
}

/// Handler for saving the edit form via PUT request.
#[tracing::instrument(skip(state))]
async fn update_todo_handler(
    State(state): State<Arc<TodoState>>,
    Path(id): Path<Uuid>,
    Form(form): Form<TodoForm>,
) -> Result<Html<String>, TodoError> {
    let mode = filter_mode(form.filter.as_deref());
    let changes = form.into_changes()?;
    let mut list = state.todos.lock().await;
    list.update_one(id, changes).await?;
    render_board(&list, mode)
}

#[tracing::instrument(skip(state))]
async fn toggle_todo_handler(
    State(state): State<Arc<TodoState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<FilterParams>,
) -> Result<Html<String>, TodoError> {
    let mut list = state.todos.lock().await;
    list.toggle_completed(id).await?;
    render_board(&list, params.mode())
}

#[tracing::instrument(skip(state))]
async fn delete_todo_handler(
    State(state): State<Arc<TodoState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<FilterParams>,
) -> Result<Html<String>, TodoError> {
    let mut list = state.todos.lock().await;
    list.remove_one(id).await?;
    render_board(&list, params.mode())
}

/// Creates the router for the task pages and htmx fragments.
pub fn create_todo_router(state: Arc<TodoState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/todos", get(board_handler).post(create_todo_handler))
        .route(
            "/todos/{id}",
            get(card_handler)
                .put(update_todo_handler)
                .delete(delete_todo_handler),
        )
        .route("/todos/{id}/edit", get(edit_form_handler))
        .route("/todos/{id}/toggle", post(toggle_todo_handler))
        .with_state(state)
}
