use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::todo::api::v1 as todos_v1;
use crate::todo::web::TodoState;

pub mod v1 {
    use serde::{Deserialize, Serialize};
    use utoipa::ToSchema;

    /// Error body returned by every JSON endpoint.
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct ServerErrorResponse {
        /// Human readable description of what went wrong
        pub message: String,
    }

    impl ServerErrorResponse {
        pub fn new(message: String) -> Self {
            Self { message }
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "TodoMaster API", description = "Manage tasks over JSON"),
    paths(
        todos_v1::list_todos_handler,
        todos_v1::create_todo_handler,
        todos_v1::get_todo_handler,
        todos_v1::update_todo_handler,
        todos_v1::delete_todo_handler,
    ),
    components(schemas(
        todos_v1::TodoJson,
        todos_v1::TodosResponse,
        todos_v1::StatsJson,
        todos_v1::NewTodoJson,
        todos_v1::UpdateTodoJson,
        v1::ServerErrorResponse,
    )),
    tags((name = "Todos", description = "Task management"))
)]
pub struct ApiDoc;

/// Creates the API routes for JSON API endpoints, plus the Swagger UI that documents them.
pub fn create_api_router(todo_state: Arc<TodoState>) -> Router {
    let todos_router = todos_v1::create_api_router(todo_state);
    Router::new()
        .nest("/api/v1", todos_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
