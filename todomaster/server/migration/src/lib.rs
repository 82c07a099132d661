pub use sea_orm_migration::prelude::*;

mod m20261017_000001_create_todos_table;

/// Environment variable holding the prefix prepended to every table name.
pub const TABLE_PREFIX_VAR: &str = "TABLE_PREFIX";

/// Returns the physical name of a logical table, e.g. `todos` -> `app_todos`.
pub fn prefixed(prefix: &str, table: &str) -> String {
    format!("{}{}", prefix, table)
}

tokio::task_local! {
    static SCOPED_PREFIX: String;
}

/// The prefix of the current [`migrate_with_prefix`] run, else the one in the environment.
pub fn table_prefix() -> String {
    SCOPED_PREFIX
        .try_with(String::clone)
        .unwrap_or_else(|_| std::env::var(TABLE_PREFIX_VAR).unwrap_or_default())
}

/// Physical name of the todos table for the active prefix.
pub fn todos_table() -> String {
    prefixed(&table_prefix(), "todos")
}

/// Applies every pending migration for the tables under `prefix`.
///
/// Each prefix keeps its own migration ledger, so several apps can share one database.
pub async fn migrate_with_prefix(
    db: &sea_orm::DatabaseConnection,
    prefix: &str,
) -> Result<(), DbErr> {
    SCOPED_PREFIX
        .scope(prefix.to_string(), Migrator::up(db, None))
        .await
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20261017_000001_create_todos_table::Migration)]
    }

    fn migration_table_name() -> DynIden {
        Alias::new(prefixed(&table_prefix(), "seaql_migrations")).into_iden()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_prefix_table_names() {
        assert_eq!(prefixed("app_", "todos"), "app_todos");
        assert_eq!(prefixed("", "todos"), "todos");
    }

    #[tokio::test]
    async fn can_scope_prefix_to_one_migration_run() {
        let (todos, ledger) = SCOPED_PREFIX
            .scope("app_".to_string(), async {
                (todos_table(), Migrator::migration_table_name().to_string())
            })
            .await;

        assert_eq!(todos, "app_todos");
        assert_eq!(ledger, "app_seaql_migrations");
    }
}
