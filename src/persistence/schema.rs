//! Idempotent DDL for the directory tables.

use super::archive::{ARCHIVE_COLUMNS, ARCHIVE_TABLE};
use super::dialect::Dialect;
use super::entity::{Column, Entity};
use super::error::StoreError;
use super::session::Session;
use crate::domain::{Restaurant, Review};

fn column_ddl<D: Dialect>(column: &Column) -> String {
    let mut ddl = format!("{} {}", column.name, D::column_type(column.kind));
    if !column.nullable {
        ddl.push_str(" NOT NULL");
    }
    if let Some(table) = column.references {
        ddl.push_str(&format!(" REFERENCES {table}(id)"));
    }
    ddl
}

fn table_ddl<D: Dialect>(table: &str, leading: &[&str], columns: &[Column]) -> Vec<String> {
    let body = leading
        .iter()
        .map(|c| (*c).to_string())
        .chain(columns.iter().map(column_ddl::<D>))
        .collect::<Vec<_>>()
        .join(",\n    ");
    let mut statements = vec![format!("CREATE TABLE IF NOT EXISTS {table} (\n    {body}\n)")];
    statements.extend(
        columns
            .iter()
            .filter(|c| c.filterable)
            .map(|c| index_ddl(table, c.name)),
    );
    statements
}

fn index_ddl(table: &str, column: &str) -> String {
    format!("CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table} ({column})")
}

/// `CREATE TABLE` plus one index per filterable column for entity `E`.
#[must_use]
pub fn entity_ddl<E: Entity, D: Dialect>() -> Vec<String> {
    table_ddl::<D>(
        E::TABLE,
        &[
            "id TEXT PRIMARY KEY",
            "created_at TEXT NOT NULL",
            "updated_at TEXT NOT NULL",
            "created_by TEXT NOT NULL",
            "updated_by TEXT NOT NULL",
        ],
        E::COLUMNS,
    )
}

/// `CREATE TABLE` for archive records with lookup indexes.
#[must_use]
pub fn archive_ddl<D: Dialect>() -> Vec<String> {
    let mut statements = table_ddl::<D>(ARCHIVE_TABLE, &["id TEXT PRIMARY KEY"], ARCHIVE_COLUMNS);
    statements.push(index_ddl(ARCHIVE_TABLE, "deleted_at"));
    statements
}

/// Every statement needed by the directory, in dependency order.
#[must_use]
pub fn directory_ddl<D: Dialect>() -> Vec<String> {
    let mut statements = entity_ddl::<Restaurant, D>();
    statements.extend(entity_ddl::<Review, D>());
    statements.extend(archive_ddl::<D>());
    statements
}

/// Creates missing tables and indexes. Safe to run on every start.
///
/// # Errors
///
/// Returns the first driver error.
pub async fn ensure_schema<D: Dialect>(session: &mut Session) -> Result<(), StoreError> {
    for statement in directory_ddl::<D>() {
        session.execute_raw(&statement).await?;
    }
    tracing::debug!(backend = %D::BACKEND, "schema ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::dialect::{PostgresDialect, SqliteDialect};

    #[test]
    fn review_table_has_foreign_key() {
        let ddl = entity_ddl::<Review, SqliteDialect>();
        let Some(create) = ddl.first() else {
            return;
        };
        assert!(create.contains("restaurant_id TEXT NOT NULL REFERENCES restaurants(id)"));
        assert!(create.contains("rating INTEGER NOT NULL"));
        assert!(ddl.iter().any(|s| s.contains("idx_reviews_restaurant_id")));
    }

    #[test]
    fn postgres_types() {
        let ddl = entity_ddl::<Restaurant, PostgresDialect>();
        assert!(ddl.iter().any(|s| s.contains("latitude DOUBLE PRECISION")));
        assert!(!ddl.iter().any(|s| s.contains("latitude DOUBLE PRECISION NOT NULL")));
    }

    #[test]
    fn archive_indexes_cover_lookups() {
        let ddl = archive_ddl::<SqliteDialect>();
        for column in ["original_table", "original_id", "deleted_at"] {
            assert!(
                ddl.iter()
                    .any(|s| s.contains(&format!("idx_archive_records_{column}"))),
                "missing index on {column}"
            );
        }
    }

    #[test]
    fn restaurants_come_before_reviews() {
        let ddl = directory_ddl::<SqliteDialect>();
        let position = |table: &str| {
            ddl.iter()
                .position(|s| s.starts_with(&format!("CREATE TABLE IF NOT EXISTS {table} ")))
        };
        assert!(position("restaurants") < position("reviews"));
    }
}
