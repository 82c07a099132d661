use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, Order, Query, SimpleExpr};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, Iterable, QueryResult};
use std::str::FromStr;
use todomaster_core::task::{self, NewTask, Priority, Task, TaskChanges};
use uuid::Uuid;

use super::{Backend, RecordStore, StoreError};
use crate::entities::todo::{self as todo_entity, Column};

/// Record store backed by PostgreSQL through SeaORM.
///
/// Every logical table name is prefixed with `table_prefix` before it reaches SQL.
#[derive(Debug)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
    table_prefix: String,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection, table_prefix: impl Into<String>) -> Self {
        Self {
            db,
            table_prefix: table_prefix.into(),
        }
    }

    #[cfg(test)]
    fn into_connection(self) -> DatabaseConnection {
        self.db
    }

    fn physical_table(&self, table: &str) -> Alias {
        Alias::new(migration::prefixed(&self.table_prefix, table))
    }

    async fn fetch_one(&self, table: &str, id: Uuid) -> Result<Option<Task>, StoreError> {
        let select = Query::select()
            .columns(Column::iter())
            .from(self.physical_table(table))
            .and_where(Expr::col(Column::Id).eq(id))
            .to_owned();
        let backend = self.db.get_database_backend();
        let row = self.db.query_one(backend.build(&select)).await?;
        row.as_ref().map(decode_row).transpose()
    }

    fn not_found(table: &str, id: Uuid) -> StoreError {
        StoreError::NotFound {
            table: table.to_string(),
            id,
        }
    }
}

fn decode_row(row: &QueryResult) -> Result<Task, StoreError> {
    let model = todo_entity::Model::from_query_result(row, "")?;
    model_into_task(model)
}

fn model_into_task(model: todo_entity::Model) -> Result<Task, StoreError> {
    let priority = Priority::from_str(&model.priority)
        .map_err(|err| StoreError::Corrupt(format!("task {}: {}", model.id, err)))?;
    Ok(Task {
        id: model.id,
        title: model.title,
        description: model.description,
        completed: model.completed,
        priority,
        due_date: model.due_date,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

/// Values for every mutable column, in the order of [`MUTABLE_COLUMNS`].
fn mutable_values(task: &Task) -> [SimpleExpr; 6] {
    [
        task.title.clone().into(),
        task.description.clone().into(),
        task.completed.into(),
        task.priority.as_str().into(),
        task.due_date.into(),
        task.updated_at.into(),
    ]
}

const MUTABLE_COLUMNS: [Column; 6] = [
    Column::Title,
    Column::Description,
    Column::Completed,
    Column::Priority,
    Column::DueDate,
    Column::UpdatedAt,
];

#[async_trait]
impl RecordStore for SeaOrmStore {
    #[tracing::instrument(skip(self))]
    async fn get_all(&self, table: &str) -> Result<Vec<Task>, StoreError> {
        let select = Query::select()
            .columns(Column::iter())
            .from(self.physical_table(table))
            .order_by(Column::CreatedAt, Order::Desc)
            .to_owned();
        let backend = self.db.get_database_backend();
        let rows = self.db.query_all(backend.build(&select)).await?;
        rows.iter().map(decode_row).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_id(&self, table: &str, id: Uuid) -> Result<Option<Task>, StoreError> {
        self.fetch_one(table, id).await
    }

    #[tracing::instrument(skip(self, fields))]
    async fn create(&self, table: &str, fields: NewTask) -> Result<Task, StoreError> {
        let task = Task::from_new(Uuid::new_v4(), fields, task::now());
        let identity: [SimpleExpr; 2] = [task.id.into(), task.created_at.into()];
        let values = identity.into_iter().chain(mutable_values(&task));
        let insert = Query::insert()
            .into_table(self.physical_table(table))
            .columns([Column::Id, Column::CreatedAt].into_iter().chain(MUTABLE_COLUMNS))
            .values(values)
            .map_err(|err| StoreError::Query(err.to_string()))?
            .returning_all()
            .to_owned();
        let backend = self.db.get_database_backend();
        let row = self
            .db
            .query_one(backend.build(&insert))
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("insert of {} returned no row", task.id)))?;
        let created = decode_row(&row)?;
        tracing::debug!(id = %created.id, "Inserted record");
        Ok(created)
    }

    #[tracing::instrument(skip(self, changes))]
    async fn update(
        &self,
        table: &str,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let Some(mut record) = self.fetch_one(table, id).await? else {
            return Err(Self::not_found(table, id));
        };
        record.apply(changes, task::now());

        let update = Query::update()
            .table(self.physical_table(table))
            .values(MUTABLE_COLUMNS.into_iter().zip(mutable_values(&record)))
            .and_where(Expr::col(Column::Id).eq(id))
            .returning_all()
            .to_owned();
        let backend = self.db.get_database_backend();
        match self.db.query_one(backend.build(&update)).await? {
            Some(row) => decode_row(&row).map(Some),
            // Deleted between the read and the write.
            None => Err(Self::not_found(table, id)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, table: &str, id: Uuid) -> Result<(), StoreError> {
        let delete = Query::delete()
            .from_table(self.physical_table(table))
            .and_where(Expr::col(Column::Id).eq(id))
            .to_owned();
        let backend = self.db.get_database_backend();
        let result = self.db.execute(backend.build(&delete)).await?;
        tracing::debug!(rows_affected = result.rows_affected(), "Deleted record");
        Ok(())
    }

    fn backend(&self) -> Backend {
        Backend::Remote
    }
}
