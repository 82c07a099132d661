use std::sync::Arc;
use todomaster_core::{FilterMode, NewTask, Task, TaskChanges, TaskError, TodoStats};
use uuid::Uuid;

use crate::store::{Backend, RecordStore, StoreError, TODOS_TABLE};

pub mod api;
pub mod web;

/// Whether the initial fetch from the store has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Loading,
    Ready,
}

/// Errors returned by [`TodoList`] operations. The list itself is unchanged whenever one is returned.
#[derive(Debug, thiserror::Error)]
pub enum TodoListError {
    #[error("Invalid task: {0}")]
    Invalid(#[from] TaskError),
    #[error("Task {0} not found")]
    NotFound(Uuid),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// The list handle shared by every request handler.
pub type SharedTodoList = Arc<tokio::sync::Mutex<TodoList>>;

/// The in-session collection of tasks, kept in step with a [`RecordStore`].
///
/// Every mutation goes to the store first and only touches the local
/// collection once the store has confirmed it.
pub struct TodoList {
    store: Arc<dyn RecordStore>,
    table: String,
    todos: Vec<Task>,
    phase: LoadPhase,
}

impl TodoList {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            table: TODOS_TABLE.to_string(),
            todos: Vec::new(),
            phase: LoadPhase::Loading,
        }
    }

    /// Wraps the list for sharing between handlers.
    pub fn shared(self) -> SharedTodoList {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn backend(&self) -> Backend {
        self.store.backend()
    }

    /// All tasks, newest first.
    pub fn todos(&self) -> &[Task] {
        &self.todos
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.todos.iter().find(|task| task.id == id)
    }

    /// Fetches every task from the store and marks the list as ready.
    ///
    /// # Returns
    ///
    /// The number of tasks loaded. On error the collection is left empty.
    #[tracing::instrument(skip(self))]
    pub async fn load(&mut self) -> Result<usize, TodoListError> {
        let fetched = self.store.get_all(&self.table).await;
        self.finish_load(fetched)
    }

    /// Loads a shared list without holding its lock while the store is queried.
    ///
    /// Handlers keep answering with the loading state until the fetch returns.
    #[tracing::instrument(skip(todos))]
    pub async fn load_shared(todos: &SharedTodoList) -> Result<usize, TodoListError> {
        let (store, table) = {
            let list = todos.lock().await;
            (list.store.clone(), list.table.clone())
        };
        let fetched = store.get_all(&table).await;
        todos.lock().await.finish_load(fetched)
    }

    /// Installs the result of a fetch. Tasks added while the first fetch was
    /// in flight stay at the head of the list.
    fn finish_load(
        &mut self,
        fetched: Result<Vec<Task>, StoreError>,
    ) -> Result<usize, TodoListError> {
        let added_meanwhile = match self.phase {
            LoadPhase::Loading => std::mem::take(&mut self.todos),
            LoadPhase::Ready => Vec::new(),
        };
        self.phase = LoadPhase::Ready;
        match fetched {
            Ok(mut todos) => {
                let unseen: Vec<Task> = added_meanwhile
                    .into_iter()
                    .filter(|task| !todos.iter().any(|stored| stored.id == task.id))
                    .collect();
                todos.splice(0..0, unseen);
                self.todos = todos;
                tracing::info!("Loaded {} todos from {} store", self.todos.len(), self.backend());
                Ok(self.todos.len())
            }
            Err(err) => {
                self.todos = added_meanwhile;
                Err(report("Failed to load todos", err))
            }
        }
    }

    /// Creates a task and puts it at the head of the list.
    ///
    /// # Arguments
    ///
    /// * `fields` - The caller-supplied fields. The title is trimmed and must not be blank.
    #[tracing::instrument(skip(self))]
    pub async fn add(&mut self, fields: NewTask) -> Result<Task, TodoListError> {
        let fields = fields
            .normalized()
            .map_err(|err| report("Rejected new todo", err))?;
        let created = self
            .store
            .create(&self.table, fields)
            .await
            .map_err(|err| report("Failed to add todo", err))?;
        self.todos.insert(0, created.clone());
        Ok(created)
    }

    /// Applies `changes` to the task with `id` and replaces the local copy with the stored one.
    #[tracing::instrument(skip(self))]
    pub async fn update_one(
        &mut self,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Task, TodoListError> {
        let changes = changes
            .normalized()
            .map_err(|err| report("Rejected todo update", err))?;
        let updated = match self.store.update(&self.table, id, changes).await {
            Ok(Some(task)) => task,
            Ok(None) | Err(StoreError::NotFound { .. }) => {
                return Err(report("Failed to update todo", TodoListError::NotFound(id)));
            }
            Err(err) => return Err(report("Failed to update todo", err)),
        };
        if let Some(slot) = self.todos.iter_mut().find(|task| task.id == id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    /// Flips the completion flag of the task with `id`.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_completed(&mut self, id: Uuid) -> Result<Task, TodoListError> {
        let completed = self
            .get(id)
            .map(|task| task.completed)
            .ok_or(TodoListError::NotFound(id))?;
        self.update_one(id, TaskChanges::completed(!completed)).await
    }

    /// Deletes the task with `id` from the store, then from the list.
    #[tracing::instrument(skip(self))]
    pub async fn remove_one(&mut self, id: Uuid) -> Result<(), TodoListError> {
        self.store
            .delete(&self.table, id)
            .await
            .map_err(|err| report("Failed to delete todo", err))?;
        self.todos.retain(|task| task.id != id);
        Ok(())
    }

    pub fn filtered_view(&self, mode: FilterMode) -> Vec<&Task> {
        mode.apply(&self.todos)
    }

    /// Counts over the whole collection, whatever filter is active.
    pub fn stats(&self) -> TodoStats {
        TodoStats::from_tasks(&self.todos)
    }
}

fn report(context: &str, err: impl Into<TodoListError>) -> TodoListError {
    let err = err.into();
    match &err {
        TodoListError::Store(_) => tracing::error!("{}: {}", context, err),
        TodoListError::Invalid(_) | TodoListError::NotFound(_) => {
            tracing::warn!("{}: {}", context, err)
        }
    }
    err
}
