//! Append-only store of deletion snapshots.

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::any::AnyRow;

use super::dialect::{Dialect, PostgresDialect, SqliteDialect, placeholders};
use super::entity::{Column, Filters, SqlValue, format_timestamp, parse_timestamp};
use super::error::StoreError;
use super::repository::{ensure_backend, paginate, push_where, with_page};
use super::session::{Session, WriteMode};
use crate::domain::audit::timestamp_now;
use crate::domain::{ArchiveRecord, EntityId, NewArchiveRecord};

/// Table holding [`ArchiveRecord`] rows.
pub const ARCHIVE_TABLE: &str = "archive_records";

/// Columns of the archive table after `id`.
pub const ARCHIVE_COLUMNS: &[Column] = &[
    Column::text("original_table").filterable(),
    Column::text("original_id").filterable(),
    Column::text("data"),
    Column::text("deleted_at"),
    Column::text("deleted_by").filterable(),
    Column::text("note").nullable(),
];

/// Write-once access to archive records. There is no update or delete.
#[async_trait]
pub trait ArchiveRepository: fmt::Debug + Send + Sync {
    /// Persists a snapshot, stamping `id` and `deleted_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnitOfWorkMisuse`] for [`WriteMode::Commit`]
    /// inside a unit of work, and driver errors otherwise.
    async fn create(
        &self,
        session: &mut Session,
        record: NewArchiveRecord,
        mode: WriteMode,
    ) -> Result<ArchiveRecord, StoreError>;

    /// Lists records matching `filters` (`original_table`, `original_id`,
    /// `deleted_by`), oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] for any other key.
    async fn find(
        &self,
        session: &mut Session,
        filters: &Filters,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ArchiveRecord>, StoreError>;

    /// Loads one record by its own id.
    ///
    /// # Errors
    ///
    /// Returns driver errors; a missing record is `Ok(None)`.
    async fn get_by_id(
        &self,
        session: &mut Session,
        id: &EntityId,
    ) -> Result<Option<ArchiveRecord>, StoreError>;
}

/// SQL archive repository in dialect `D`.
pub struct SqlArchiveRepository<D> {
    _marker: PhantomData<fn() -> D>,
}

/// Archive repository bound to SQLite.
pub type SqliteArchiveRepository = SqlArchiveRepository<SqliteDialect>;
/// Archive repository bound to PostgreSQL.
pub type PostgresArchiveRepository = SqlArchiveRepository<PostgresDialect>;

impl<D: Dialect> SqlArchiveRepository<D> {
    /// Creates the repository.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<D: Dialect> Default for SqlArchiveRepository<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dialect> fmt::Debug for SqlArchiveRepository<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlArchiveRepository")
            .field("backend", &D::BACKEND)
            .finish()
    }
}

#[async_trait]
impl<D: Dialect> ArchiveRepository for SqlArchiveRepository<D> {
    async fn create(
        &self,
        session: &mut Session,
        record: NewArchiveRecord,
        mode: WriteMode,
    ) -> Result<ArchiveRecord, StoreError> {
        ensure_backend::<D>(session)?;
        session.begin_write(mode).await?;

        let archived = ArchiveRecord {
            id: EntityId::new(),
            original_table: record.original_table,
            original_id: record.original_id,
            data: record.data,
            deleted_at: timestamp_now(),
            deleted_by: record.deleted_by,
            note: record.note,
        };
        let outcome = match serde_json::to_string(&archived.data) {
            Ok(data) => {
                let params = vec![
                    SqlValue::from(&archived.id),
                    SqlValue::from(archived.original_table.as_str()),
                    SqlValue::from(&archived.original_id),
                    SqlValue::from(data),
                    SqlValue::from(format_timestamp(&archived.deleted_at)),
                    SqlValue::from(archived.deleted_by.as_str()),
                    SqlValue::from(archived.note.clone()),
                ];
                let sql = format!(
                    "INSERT INTO {ARCHIVE_TABLE} ({}) VALUES ({})",
                    column_list(),
                    placeholders::<D>(1, params.len())
                );
                session.execute(&sql, params).await.map(|_| archived)
            }
            Err(e) => Err(StoreError::from(e)),
        };
        session.settle(mode, outcome).await
    }

    async fn find(
        &self,
        session: &mut Session,
        filters: &Filters,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ArchiveRecord>, StoreError> {
        filters.validate(ARCHIVE_TABLE, ARCHIVE_COLUMNS)?;
        ensure_backend::<D>(session)?;

        let mut sql = format!("SELECT {} FROM {ARCHIVE_TABLE}", column_list());
        let params = push_where::<D>(&mut sql, filters);
        let rows = session
            .fetch_all(&paginate::<D>(sql, params.len()), with_page(params, offset, limit))
            .await?;
        rows.iter().map(decode).collect()
    }

    async fn get_by_id(
        &self,
        session: &mut Session,
        id: &EntityId,
    ) -> Result<Option<ArchiveRecord>, StoreError> {
        ensure_backend::<D>(session)?;
        let sql = format!(
            "SELECT {} FROM {ARCHIVE_TABLE} WHERE id = {}",
            column_list(),
            D::placeholder(1)
        );
        session
            .fetch_optional(&sql, vec![SqlValue::from(id)])
            .await?
            .map(|row| decode(&row))
            .transpose()
    }
}

fn column_list() -> String {
    std::iter::once("id")
        .chain(ARCHIVE_COLUMNS.iter().map(|c| c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode(row: &AnyRow) -> Result<ArchiveRecord, StoreError> {
    let id: String = row.try_get("id")?;
    let original_id: String = row.try_get("original_id")?;
    let data: String = row.try_get("data")?;
    let deleted_at: String = row.try_get("deleted_at")?;
    Ok(ArchiveRecord {
        id: EntityId::from_stored(id),
        original_table: row.try_get("original_table")?,
        original_id: EntityId::from_stored(original_id),
        data: serde_json::from_str(&data)
            .map_err(|e| StoreError::CorruptRow(format!("archive data is not JSON: {e}")))?,
        deleted_at: parse_timestamp(&deleted_at)?,
        deleted_by: row.try_get("deleted_by")?,
        note: row.try_get("note")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_lookup_columns_are_filterable() {
        let filterable: Vec<_> = ARCHIVE_COLUMNS
            .iter()
            .filter(|c| c.filterable)
            .map(|c| c.name)
            .collect();
        assert_eq!(filterable, vec!["original_table", "original_id", "deleted_by"]);
        assert!(
            Filters::new()
                .eq("data", "{}")
                .validate(ARCHIVE_TABLE, ARCHIVE_COLUMNS)
                .is_err()
        );
    }

    #[test]
    fn column_list_starts_with_id() {
        assert!(column_list().starts_with("id, original_table"));
    }
}
