//! Uniform CRUD over named task tables.
//!
//! Two backends implement [`RecordStore`]: [`SeaOrmStore`] talks to PostgreSQL and
//! [`InMemoryStore`] keeps everything in process for the lifetime of the server.

use async_trait::async_trait;
use sea_orm::Database;
use std::fmt;
use std::sync::Arc;
use todomaster_core::{NewTask, Task, TaskChanges};
use uuid::Uuid;

use crate::config::Config;

pub mod memory;
pub mod remote;

pub use memory::InMemoryStore;
pub use remote::SeaOrmStore;

/// Logical name of the table that holds tasks.
pub const TODOS_TABLE: &str = "todos";

/// Errors raised by a record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Record {id} not found in table '{table}'")]
    NotFound { table: String, id: Uuid },
    /// A stored row could not be turned back into a task.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Could not build query: {0}")]
    Query(String),
}

/// Which backend is serving records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Remote,
    InMemory,
}

impl Backend {
    pub fn is_persistent(&self) -> bool {
        matches!(self, Backend::Remote)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Remote => f.write_str("PostgreSQL"),
            Backend::InMemory => f.write_str("in-memory"),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns every record in `table`, newest first.
    async fn get_all(&self, table: &str) -> Result<Vec<Task>, StoreError>;

    async fn get_by_id(&self, table: &str, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Inserts a record, assigning its id and both timestamps.
    async fn create(&self, table: &str, fields: NewTask) -> Result<Task, StoreError>;

    /// Merges `changes` into the record and bumps `updated_at`.
    ///
    /// Returns `Ok(None)` when the in-memory backend has no such record. The remote
    /// backend reports a missing record as [`StoreError::NotFound`].
    async fn update(
        &self,
        table: &str,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError>;

    /// Removes the record. Deleting an id that does not exist is not an error.
    async fn delete(&self, table: &str, id: Uuid) -> Result<(), StoreError>;

    fn backend(&self) -> Backend;
}

/// Picks the backend from configuration.
///
/// With a database URL the tables under the configured prefix are migrated and a [`SeaOrmStore`] is returned,
/// otherwise an empty [`InMemoryStore`].
#[tracing::instrument(skip(config))]
pub async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.remote_url() {
        Some(url) => {
            let db = Database::connect(url).await?;
            migration::migrate_with_prefix(&db, &config.table_prefix).await?;
            tracing::info!("Database migrations applied successfully");
            Ok(Arc::new(SeaOrmStore::new(db, config.table_prefix.clone())))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, tasks will be kept in memory and lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
