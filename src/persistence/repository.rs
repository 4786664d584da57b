//! Generic CRUD over any [`Entity`].
//!
//! Repositories are stateless: every call takes the [`Session`] it runs in,
//! so the caller decides whether a write commits on its own
//! ([`WriteMode::Commit`]) or joins a unit of work ([`WriteMode::Stage`]).

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;

use super::dialect::{Dialect, PostgresDialect, SqliteDialect, placeholders};
use super::entity::{AUDIT_COLUMNS, Entity, Filters, SqlValue, audit_values, format_timestamp};
use super::error::StoreError;
use super::session::{Session, WriteMode};
use crate::domain::{AuditFields, EntityId};

/// CRUD operations for one entity type.
#[async_trait]
pub trait Repository<E: Entity>: fmt::Debug + Send + Sync {
    /// Returns entities matching every filter, ordered by id (creation
    /// order), skipping `offset` and returning at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] before touching the database
    /// when a key is unknown, not filterable, or mistyped.
    async fn find(
        &self,
        session: &mut Session,
        filters: &Filters,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<E>, StoreError>;

    /// Loads one entity by id.
    ///
    /// # Errors
    ///
    /// Returns driver errors; a missing row is `Ok(None)`.
    async fn get_by_id(&self, session: &mut Session, id: &EntityId)
    -> Result<Option<E>, StoreError>;

    /// Inserts a new entity with fresh audit fields.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnitOfWorkMisuse`] for [`WriteMode::Commit`]
    /// inside a unit of work, [`StoreError::IntegrityViolation`] on
    /// constraint failures, and driver errors otherwise.
    async fn create(
        &self,
        session: &mut Session,
        draft: E::Draft,
        created_by: &str,
        mode: WriteMode,
    ) -> Result<E, StoreError>;

    /// Applies a partial update and refreshes `updated_at`/`updated_by`.
    /// Returns `Ok(None)` when the row does not exist.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::create`].
    async fn update(
        &self,
        session: &mut Session,
        id: &EntityId,
        patch: E::Patch,
        updated_by: &str,
        mode: WriteMode,
    ) -> Result<Option<E>, StoreError>;

    /// Hard-deletes a row. Returns `false` when nothing was deleted.
    ///
    /// This does not archive; use the archive workflow for deletions that
    /// must keep a snapshot.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::create`].
    async fn delete(
        &self,
        session: &mut Session,
        id: &EntityId,
        mode: WriteMode,
    ) -> Result<bool, StoreError>;
}

/// SQL repository for entity `E` in dialect `D`.
pub struct SqlRepository<E, D> {
    _marker: PhantomData<fn() -> (E, D)>,
}

/// Repository bound to SQLite.
pub type SqliteRepository<E> = SqlRepository<E, SqliteDialect>;
/// Repository bound to PostgreSQL.
pub type PostgresRepository<E> = SqlRepository<E, PostgresDialect>;

impl<E: Entity, D: Dialect> SqlRepository<E, D> {
    /// Creates the repository.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    async fn load(
        session: &mut Session,
        id: &EntityId,
        lock: &str,
    ) -> Result<Option<E>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = {}{lock}",
            select_list::<E>(),
            E::TABLE,
            D::placeholder(1)
        );
        session
            .fetch_optional(&sql, vec![SqlValue::from(id)])
            .await?
            .map(|row| E::from_row(&row))
            .transpose()
    }

    async fn update_row(
        session: &mut Session,
        id: &EntityId,
        patch: E::Patch,
        updated_by: &str,
    ) -> Result<Option<E>, StoreError> {
        let Some(mut entity) = Self::load(session, id, D::ROW_LOCK).await? else {
            return Ok(None);
        };
        entity.apply_patch(patch);
        entity.audit_mut().touch(updated_by);

        let assignments = E::COLUMNS
            .iter()
            .map(|c| c.name)
            .chain(["updated_at", "updated_by"])
            .enumerate()
            .map(|(i, name)| format!("{name} = {}", D::placeholder(i + 1)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params = entity.values();
        params.push(SqlValue::from(format_timestamp(&entity.audit().updated_at)));
        params.push(SqlValue::from(entity.audit().updated_by.as_str()));
        params.push(SqlValue::from(id));
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE id = {}",
            E::TABLE,
            D::placeholder(params.len())
        );
        session.execute(&sql, params).await?;
        Ok(Some(entity))
    }
}

impl<E: Entity, D: Dialect> Default for SqlRepository<E, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, D> fmt::Debug for SqlRepository<E, D>
where
    E: Entity,
    D: Dialect,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlRepository")
            .field("table", &E::TABLE)
            .field("backend", &D::BACKEND)
            .finish()
    }
}

#[async_trait]
impl<E: Entity, D: Dialect> Repository<E> for SqlRepository<E, D> {
    async fn find(
        &self,
        session: &mut Session,
        filters: &Filters,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<E>, StoreError> {
        filters.validate(E::TABLE, E::COLUMNS)?;
        ensure_backend::<D>(session)?;

        let mut sql = format!("SELECT {} FROM {}", select_list::<E>(), E::TABLE);
        let params = push_where::<D>(&mut sql, filters);
        let rows = session
            .fetch_all(&paginate::<D>(sql, params.len()), with_page(params, offset, limit))
            .await?;
        rows.iter().map(E::from_row).collect()
    }

    async fn get_by_id(
        &self,
        session: &mut Session,
        id: &EntityId,
    ) -> Result<Option<E>, StoreError> {
        ensure_backend::<D>(session)?;
        Self::load(session, id, "").await
    }

    async fn create(
        &self,
        session: &mut Session,
        draft: E::Draft,
        created_by: &str,
        mode: WriteMode,
    ) -> Result<E, StoreError> {
        ensure_backend::<D>(session)?;
        session.begin_write(mode).await?;

        let entity = E::from_draft(AuditFields::new(created_by), draft);
        let mut params = audit_values(entity.audit());
        params.extend(entity.values());
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::TABLE,
            select_list::<E>(),
            placeholders::<D>(1, params.len())
        );
        let outcome = session.execute(&sql, params).await.map(|_| entity);
        session.settle(mode, outcome).await
    }

    async fn update(
        &self,
        session: &mut Session,
        id: &EntityId,
        patch: E::Patch,
        updated_by: &str,
        mode: WriteMode,
    ) -> Result<Option<E>, StoreError> {
        ensure_backend::<D>(session)?;
        session.begin_write(mode).await?;
        let outcome = Self::update_row(session, id, patch, updated_by).await;
        session.settle(mode, outcome).await
    }

    async fn delete(
        &self,
        session: &mut Session,
        id: &EntityId,
        mode: WriteMode,
    ) -> Result<bool, StoreError> {
        ensure_backend::<D>(session)?;
        session.begin_write(mode).await?;
        let sql = format!("DELETE FROM {} WHERE id = {}", E::TABLE, D::placeholder(1));
        let outcome = session
            .execute(&sql, vec![SqlValue::from(id)])
            .await
            .map(|affected| affected > 0);
        session.settle(mode, outcome).await
    }
}

/// Audit columns followed by business columns, comma separated.
fn select_list<E: Entity>() -> String {
    AUDIT_COLUMNS
        .iter()
        .copied()
        .chain(E::COLUMNS.iter().map(|c| c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn ensure_backend<D: Dialect>(session: &Session) -> Result<(), StoreError> {
    if session.backend() == D::BACKEND {
        Ok(())
    } else {
        Err(StoreError::Config(format!(
            "{} repository used with a {} session",
            D::BACKEND,
            session.backend()
        )))
    }
}

/// Appends a `WHERE` clause for `filters` and returns its bind values.
/// Filter keys must already be validated against the column list.
pub(crate) fn push_where<D: Dialect>(sql: &mut String, filters: &Filters) -> Vec<SqlValue> {
    let mut params = Vec::new();
    for (i, (key, value)) in filters.iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        if value.is_null() {
            sql.push_str(&format!("{key} IS NULL"));
        } else {
            params.push(value.clone());
            sql.push_str(&format!("{key} = {}", D::placeholder(params.len())));
        }
    }
    params
}

/// Appends stable ordering and pagination placeholders.
pub(crate) fn paginate<D: Dialect>(mut sql: String, bound: usize) -> String {
    sql.push_str(&format!(
        " ORDER BY id LIMIT {} OFFSET {}",
        D::placeholder(bound + 1),
        D::placeholder(bound + 2)
    ));
    sql
}

pub(crate) fn with_page(mut params: Vec<SqlValue>, offset: u64, limit: u64) -> Vec<SqlValue> {
    params.push(SqlValue::from(i64::try_from(limit).unwrap_or(i64::MAX)));
    params.push(SqlValue::from(i64::try_from(offset).unwrap_or(i64::MAX)));
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Restaurant;

    #[test]
    fn where_clause_binds_in_key_order() {
        let filters = Filters::new().eq("city", "Tunja").eq("cuisine", "boyacense");
        let mut sql = String::from("SELECT * FROM restaurants");
        let params = push_where::<PostgresDialect>(&mut sql, &filters);
        assert_eq!(
            sql,
            "SELECT * FROM restaurants WHERE city = $1 AND cuisine = $2"
        );
        assert_eq!(params.len(), 2);
        assert_eq!(
            paginate::<PostgresDialect>(sql, params.len()),
            "SELECT * FROM restaurants WHERE city = $1 AND cuisine = $2 ORDER BY id LIMIT $3 OFFSET $4"
        );
    }

    #[test]
    fn null_filter_uses_is_null() {
        let filters = Filters::new().eq("cuisine", Option::<String>::None);
        let mut sql = String::new();
        let params = push_where::<SqliteDialect>(&mut sql, &filters);
        assert_eq!(sql, " WHERE cuisine IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn select_list_starts_with_audit_columns() {
        let list = select_list::<Restaurant>();
        assert!(list.starts_with("id, created_at, updated_at, created_by, updated_by, name"));
    }

    #[test]
    fn page_bounds_saturate() {
        let params = with_page(Vec::new(), u64::MAX, 10);
        assert_eq!(
            params,
            vec![SqlValue::from(10_i64), SqlValue::from(i64::MAX)]
        );
    }

    #[test]
    fn debug_names_table_and_backend() {
        let repo = SqliteRepository::<Restaurant>::new();
        let rendered = format!("{repo:?}");
        assert!(rendered.contains("restaurants"));
        assert!(rendered.contains("Sqlite"));
    }
}
