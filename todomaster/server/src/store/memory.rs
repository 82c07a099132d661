use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use todomaster_core::task::{self, NewTask, Task, TaskChanges};
use uuid::Uuid;

use super::{Backend, RecordStore, StoreError};

/// Process-local tables keyed by name. Contents vanish when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<HashMap<String, Vec<Task>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `tasks` already in `table`.
    pub fn with_records(table: &str, mut tasks: Vec<Task>) -> Self {
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self {
            tables: Mutex::new(HashMap::from([(table.to_string(), tasks)])),
        }
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<String, Vec<Task>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_all(&self, table: &str) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.tables().get(table).cloned().unwrap_or_default();
        // Stable, so records created in the same microsecond keep newest-first order.
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn get_by_id(&self, table: &str, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self
            .tables()
            .get(table)
            .and_then(|tasks| tasks.iter().find(|task| task.id == id).cloned()))
    }

    #[tracing::instrument(skip(self, fields))]
    async fn create(&self, table: &str, fields: NewTask) -> Result<Task, StoreError> {
        let task = Task::from_new(Uuid::new_v4(), fields, task::now());
        self.tables()
            .entry(table.to_string())
            .or_default()
            .insert(0, task.clone());
        tracing::debug!(id = %task.id, "Created in-memory record");
        Ok(task)
    }

    #[tracing::instrument(skip(self, changes))]
    async fn update(
        &self,
        table: &str,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let mut tables = self.tables();
        let Some(record) = tables
            .get_mut(table)
            .and_then(|tasks| tasks.iter_mut().find(|task| task.id == id))
        else {
            return Ok(None);
        };
        record.apply(changes, task::now());
        Ok(Some(record.clone()))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, table: &str, id: Uuid) -> Result<(), StoreError> {
        if let Some(tasks) = self.tables().get_mut(table) {
            tasks.retain(|task| task.id != id);
        }
        Ok(())
    }

    fn backend(&self) -> Backend {
        Backend::InMemory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use todomaster_core::Priority;

    const TABLE: &str = "todos";

    #[tokio::test]
    async fn can_create_and_list_newest_first() {
        let store = InMemoryStore::new();

        let first = store.create(TABLE, NewTask::new("First")).await.unwrap();
        let second = store.create(TABLE, NewTask::new("Second")).await.unwrap();

        let all = store.get_all(TABLE).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn can_assign_identity_and_timestamps_on_create() {
        let store = InMemoryStore::new();
        let before = Utc::now() - Duration::seconds(1);

        let task = store
            .create(TABLE, NewTask::new("Buy milk").with_priority(Priority::High))
            .await
            .unwrap();

        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.priority, Priority::High);
        assert!(!task.completed);
        assert!(task.created_at >= before);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[tokio::test]
    async fn can_return_empty_list_for_unknown_table() {
        let store = InMemoryStore::new();

        assert!(store.get_all("nothing_here").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn can_keep_tables_separate() {
        let store = InMemoryStore::new();
        store.create("a", NewTask::new("In a")).await.unwrap();

        assert!(store.get_all("b").await.unwrap().is_empty());
        assert_eq!(store.get_all("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn can_update_record_and_bump_updated_at() {
        let store = InMemoryStore::new();
        let created = store.create(TABLE, NewTask::new("Draft")).await.unwrap();

        let updated = store
            .update(TABLE, created.id, TaskChanges::completed(true))
            .await
            .unwrap()
            .unwrap();

        assert!(updated.completed);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(store.get_by_id(TABLE, created.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn can_bump_only_updated_at_for_empty_changes() {
        let store = InMemoryStore::new();
        let created = store.create(TABLE, NewTask::new("Same")).await.unwrap();

        let updated = store
            .update(TABLE, created.id, TaskChanges::default())
            .await
            .unwrap()
            .unwrap();

        assert!(updated.updated_at > created.updated_at);
        assert_eq!(
            Task {
                updated_at: created.updated_at,
                ..updated
            },
            created
        );
    }

    #[tokio::test]
    async fn cannot_update_missing_record() {
        let store = InMemoryStore::new();

        let result = store
            .update(TABLE, Uuid::new_v4(), TaskChanges::completed(true))
            .await
            .unwrap();

        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn can_delete_record_idempotently() {
        let store = InMemoryStore::new();
        let created = store.create(TABLE, NewTask::new("Temporary")).await.unwrap();

        store.delete(TABLE, created.id).await.unwrap();
        store.delete(TABLE, created.id).await.unwrap();
        store.delete("never_created", created.id).await.unwrap();

        assert_eq!(store.get_by_id(TABLE, created.id).await.unwrap(), None);
        assert!(store.get_all(TABLE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn can_seed_records_in_newest_first_order() {
        let now = task::now();
        let old = Task::from_new(Uuid::new_v4(), NewTask::new("Old"), now - Duration::days(2));
        let new = Task::from_new(Uuid::new_v4(), NewTask::new("New"), now);

        let store = InMemoryStore::with_records(TABLE, vec![old.clone(), new.clone()]);

        let all = store.get_all(TABLE).await.unwrap();
        assert_eq!(all, vec![new, old]);
    }
}
