use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::{postgres, testcontainers};
use todomaster_core::{NewTask, Task, TaskChanges};
use todomaster_server::store::{Backend, InMemoryStore, RecordStore, StoreError};
use todomaster_server::todo::{SharedTodoList, TodoList};
use todomaster_server::web::create_app;
use tokio::sync::Notify;
use uuid::Uuid;

#[allow(dead_code)]
pub async fn setup_container() -> anyhow::Result<testcontainers::ContainerAsync<postgres::Postgres>>
{
    let container = postgres::Postgres::default().start().await?;
    Ok(container)
}

/// Connects to the container without running any migrations.
#[allow(dead_code)]
pub async fn connect_db(
    container: &testcontainers::ContainerAsync<postgres::Postgres>,
) -> anyhow::Result<DatabaseConnection> {
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let db_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
    let db = Database::connect(&db_url).await?;
    Ok(db)
}

#[allow(dead_code)]
pub async fn setup_db(
    container: &testcontainers::ContainerAsync<postgres::Postgres>,
) -> anyhow::Result<DatabaseConnection> {
    let db = connect_db(container).await?;
    migration::migrate_with_prefix(&db, "").await?;
    Ok(db)
}

/// An in-memory store whose `get_all` waits until `release` is notified.
#[allow(dead_code)]
pub struct GatedStore {
    inner: InMemoryStore,
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[allow(dead_code)]
impl GatedStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl RecordStore for GatedStore {
    async fn get_all(&self, table: &str) -> Result<Vec<Task>, StoreError> {
        self.started.notify_one();
        self.release.notified().await;
        self.inner.get_all(table).await
    }

    async fn get_by_id(&self, table: &str, id: Uuid) -> Result<Option<Task>, StoreError> {
        self.inner.get_by_id(table, id).await
    }

    async fn create(&self, table: &str, fields: NewTask) -> Result<Task, StoreError> {
        self.inner.create(table, fields).await
    }

    async fn update(
        &self,
        table: &str,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        self.inner.update(table, id, changes).await
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<(), StoreError> {
        self.inner.delete(table, id).await
    }

    fn backend(&self) -> Backend {
        Backend::Remote
    }
}

/// The full application over an empty in-memory store, with the initial load already done.
#[allow(dead_code)]
pub async fn loaded_app() -> (Router, SharedTodoList) {
    let todos = TodoList::new(Arc::new(InMemoryStore::new())).shared();
    todos
        .lock()
        .await
        .load()
        .await
        .expect("in-memory load cannot fail");
    (create_app(todos.clone()), todos)
}

/// The full application before the initial load has run.
#[allow(dead_code)]
pub fn loading_app() -> Router {
    create_app(TodoList::new(Arc::new(InMemoryStore::new())).shared())
}

#[allow(dead_code)]
pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub fn form_request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
