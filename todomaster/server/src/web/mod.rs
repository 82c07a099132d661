use askama::Template;
use axum::Router;
use axum::http::{HeaderName, StatusCode, Uri};
use axum::response::{Html, IntoResponse};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::store::connect_store;
use crate::todo::web::{TodoState, create_todo_router};
use crate::todo::{SharedTodoList, TodoList};

pub mod api;

/// Custom error type for web handler operations.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Represents an error during template rendering.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        let user_facing_error_message =
            "An unexpected error occurred while processing your request. Please try again later.";
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!(
                "<h1>Internal Server Error</h1><p>{}</p>",
                user_facing_error_message
            )),
        )
            .into_response()
    }
}

/// Builds the whole application around an already created task list.
pub fn create_app(todos: SharedTodoList) -> Router {
    let todo_state = Arc::new(TodoState { todos });

    Router::new()
        .merge(create_todo_router(todo_state.clone()))
        .merge(api::create_api_router(todo_state))
        .route("/health", axum::routing::get(health_check_handler))
        .fallback(not_found_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().expose_headers([
                    HeaderName::from_static("hx-retarget"),
                    HeaderName::from_static("hx-reswap"),
                ])),
        )
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let store = connect_store(&config).await?;
    let todos = TodoList::new(store).shared();

    // Pages render a spinner until this finishes.
    let loader = todos.clone();
    tokio::spawn(async move {
        // Failures are logged by the list itself.
        let _ = TodoList::load_shared(&loader).await;
    });

    axum::serve(listener, create_app(todos)).await?;
    Ok(())
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

#[tracing::instrument]
async fn not_found_handler(uri: Uri) -> Result<(StatusCode, Html<String>), WebError> {
    let template = NotFoundTemplate {
        path: uri.path().to_string(),
    };
    let rendered = template.render()?;
    Ok((StatusCode::NOT_FOUND, Html(rendered)))
}

#[derive(Template)]
#[template(path = "not_found.html")]
struct NotFoundTemplate {
    path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn can_handle_template_error_with_internal_server_error() {
        let custom_error_message = "Simulated template rendering failure".to_string();
        let template_error = askama::Error::Custom(custom_error_message.into());

        let web_error = WebError::Template(template_error);
        let response = web_error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_text = std::str::from_utf8(&body).unwrap();

        insta::assert_snapshot!(
            body_text,
            @"<h1>Internal Server Error</h1><p>An unexpected error occurred while processing your request. Please try again later.</p>"
        );
    }
}
