//! Row mapping contract shared by every persisted entity type.
//!
//! An [`Entity`] describes its table, its business columns, and how to
//! convert between itself and bind values / rows. The audit columns
//! (`id`, `created_at`, `updated_at`, `created_by`, `updated_by`) are common
//! to all entities and handled here once.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::any::{Any, AnyArguments, AnyRow};
use sqlx::query::Query;

use super::error::StoreError;
use crate::domain::{AuditFields, EntityId};

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// Double-precision float.
    Real,
}

/// Static description of one business column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
    /// Storage type.
    pub kind: ColumnKind,
    /// Whether `NULL` is allowed.
    pub nullable: bool,
    /// Whether `find` accepts this column as a filter key.
    pub filterable: bool,
    /// Referenced table (foreign key on its `id`), if any.
    pub references: Option<&'static str>,
}

impl Column {
    const fn of(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            filterable: false,
            references: None,
        }
    }

    /// Required text column.
    #[must_use]
    pub const fn text(name: &'static str) -> Self {
        Self::of(name, ColumnKind::Text)
    }

    /// Required integer column.
    #[must_use]
    pub const fn integer(name: &'static str) -> Self {
        Self::of(name, ColumnKind::Integer)
    }

    /// Required real column.
    #[must_use]
    pub const fn real(name: &'static str) -> Self {
        Self::of(name, ColumnKind::Real)
    }

    /// Allows `NULL`.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Accepts the column as a `find` filter key.
    #[must_use]
    pub const fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Adds a foreign key to `table(id)`.
    #[must_use]
    pub const fn references(mut self, table: &'static str) -> Self {
        self.references = Some(table);
        self
    }
}

/// Names of the audit columns, in storage order.
pub const AUDIT_COLUMNS: [&str; 5] = ["id", "created_at", "updated_at", "created_by", "updated_by"];

/// A typed bind value. `None` binds a typed `NULL`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// Text value.
    Text(Option<String>),
    /// Integer value.
    Integer(Option<i64>),
    /// Real value.
    Real(Option<f64>),
}

impl SqlValue {
    /// Storage type of the value.
    #[must_use]
    pub const fn kind(&self) -> ColumnKind {
        match self {
            Self::Text(_) => ColumnKind::Text,
            Self::Integer(_) => ColumnKind::Integer,
            Self::Real(_) => ColumnKind::Real,
        }
    }

    /// Returns `true` for a `NULL` of any type.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Text(None) | Self::Integer(None) | Self::Real(None))
    }

    pub(crate) fn bind_to<'q>(
        self,
        query: Query<'q, Any, AnyArguments<'q>>,
    ) -> Query<'q, Any, AnyArguments<'q>> {
        match self {
            Self::Text(v) => query.bind(v),
            Self::Integer(v) => query.bind(v),
            Self::Real(v) => query.bind(v),
        }
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(Some(v))
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(Some(v.to_string()))
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        Self::Text(v)
    }
}

impl From<&EntityId> for SqlValue {
    fn from(v: &EntityId) -> Self {
        Self::Text(Some(v.as_str().to_string()))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Integer(Some(v))
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(v: Option<i64>) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Real(Some(v))
    }
}

impl From<Option<f64>> for SqlValue {
    fn from(v: Option<f64>) -> Self {
        Self::Real(v)
    }
}

/// A persisted business record.
pub trait Entity:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static
{
    /// Payload accepted by `create`.
    type Draft: fmt::Debug + Send + Sync + 'static;
    /// Payload accepted by `update`.
    type Patch: fmt::Debug + Send + Sync + 'static;

    /// Table name.
    const TABLE: &'static str;
    /// Business columns, in the order of [`Entity::values`].
    const COLUMNS: &'static [Column];

    /// Embedded audit fields.
    fn audit(&self) -> &AuditFields;

    /// Mutable access to the audit fields.
    fn audit_mut(&mut self) -> &mut AuditFields;

    /// Builds a new entity from fresh audit fields and its draft.
    fn from_draft(audit: AuditFields, draft: Self::Draft) -> Self;

    /// Applies a partial update in memory.
    fn apply_patch(&mut self, patch: Self::Patch);

    /// Bind values of the business columns, in [`Entity::COLUMNS`] order.
    fn values(&self) -> Vec<SqlValue>;

    /// Decodes an entity from a row selected with all audit and business
    /// columns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRow`] when a column is missing or
    /// cannot be decoded.
    fn from_row(row: &AnyRow) -> Result<Self, StoreError>;
}

/// Formats a timestamp the way it is stored (RFC 3339, microseconds, `Z`).
#[must_use]
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp.
///
/// # Errors
///
/// Returns [`StoreError::CorruptRow`] if `raw` is not RFC 3339.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow(format!("bad timestamp `{raw}`: {e}")))
}

/// Bind values for the audit columns, in [`AUDIT_COLUMNS`] order.
#[must_use]
pub fn audit_values(audit: &AuditFields) -> Vec<SqlValue> {
    vec![
        SqlValue::from(&audit.id),
        SqlValue::from(format_timestamp(&audit.created_at)),
        SqlValue::from(format_timestamp(&audit.updated_at)),
        SqlValue::from(audit.created_by.as_str()),
        SqlValue::from(audit.updated_by.as_str()),
    ]
}

/// Decodes the audit columns of `row`.
///
/// # Errors
///
/// Returns [`StoreError::CorruptRow`] for missing or malformed columns.
pub fn audit_from_row(row: &AnyRow) -> Result<AuditFields, StoreError> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(AuditFields {
        id: EntityId::from_stored(id),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        created_by: row.try_get("created_by")?,
        updated_by: row.try_get("updated_by")?,
    })
}

/// Equality filters for `find`, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters(BTreeMap<String, SqlValue>);

impl Filters {
    /// Empty filter set (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key = value`. A `NULL` value matches `key IS NULL`.
    #[must_use]
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Parses raw string pairs (e.g. query parameters) using the column
    /// types of `columns`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] for unknown or non-filterable
    /// keys and for values that do not parse as the column's type.
    pub fn parse<I, K, V>(
        table: &'static str,
        columns: &[Column],
        pairs: I,
    ) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut filters = Self::new();
        for (key, raw) in pairs {
            let key = key.into();
            let column = lookup(table, columns, &key)?;
            let raw = raw.as_ref();
            let value = match column.kind {
                ColumnKind::Text => SqlValue::from(raw),
                ColumnKind::Integer => raw.parse::<i64>().map(SqlValue::from).map_err(|_| {
                    invalid(table, &key, format!("`{raw}` is not an integer"))
                })?,
                ColumnKind::Real => raw.parse::<f64>().map(SqlValue::from).map_err(|_| {
                    invalid(table, &key, format!("`{raw}` is not a number"))
                })?,
            };
            filters.0.insert(key, value);
        }
        Ok(filters)
    }

    /// Checks every key against `columns` before any query runs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] for unknown keys or values of
    /// the wrong type.
    pub fn validate(&self, table: &'static str, columns: &[Column]) -> Result<(), StoreError> {
        for (key, value) in &self.0 {
            let column = lookup(table, columns, key)?;
            if column.kind != value.kind() {
                return Err(invalid(
                    table,
                    key,
                    format!("expected {:?} value, got {:?}", column.kind, value.kind()),
                ));
            }
        }
        Ok(())
    }

    /// Iterates filters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no filter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn lookup<'c>(
    table: &'static str,
    columns: &'c [Column],
    key: &str,
) -> Result<&'c Column, StoreError> {
    columns
        .iter()
        .find(|c| c.name == key && c.filterable)
        .ok_or_else(|| invalid(table, key, "unrecognized filter key".to_string()))
}

fn invalid(table: &'static str, key: &str, reason: String) -> StoreError {
    StoreError::InvalidFilter {
        table,
        key: key.to_string(),
        reason,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const COLUMNS: &[Column] = &[
        Column::text("city").filterable(),
        Column::integer("rating").filterable(),
        Column::text("phone").nullable(),
    ];

    #[test]
    fn unknown_key_is_rejected() {
        let filters = Filters::new().eq("colour", "red");
        let Err(err) = filters.validate("t", COLUMNS) else {
            panic!("expected rejection");
        };
        assert!(matches!(err, StoreError::InvalidFilter { ref key, .. } if key == "colour"));
    }

    #[test]
    fn non_filterable_column_is_rejected() {
        let filters = Filters::new().eq("phone", "123");
        assert!(filters.validate("t", COLUMNS).is_err());
    }

    #[test]
    fn mistyped_value_is_rejected() {
        let filters = Filters::new().eq("rating", "five");
        assert!(filters.validate("t", COLUMNS).is_err());
        let filters = Filters::new().eq("rating", 5_i64);
        assert!(filters.validate("t", COLUMNS).is_ok());
    }

    #[test]
    fn parse_uses_column_types() {
        let Ok(filters) = Filters::parse("t", COLUMNS, [("city", "Tunja"), ("rating", "4")]) else {
            panic!("valid filters");
        };
        assert_eq!(filters.len(), 2);
        let values: Vec<_> = filters.iter().collect();
        assert_eq!(
            values,
            vec![
                ("city", &SqlValue::from("Tunja")),
                ("rating", &SqlValue::from(4_i64)),
            ]
        );
        assert!(Filters::parse("t", COLUMNS, [("rating", "x")]).is_err());
        assert!(Filters::parse("t", COLUMNS, [("nope", "x")]).is_err());
    }

    #[test]
    fn timestamps_round_trip_at_storage_precision() {
        let now = crate::domain::audit::timestamp_now();
        let stored = format_timestamp(&now);
        assert!(stored.ends_with('Z'));
        let Ok(parsed) = parse_timestamp(&stored) else {
            panic!("parse failed");
        };
        assert_eq!(parsed, now);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn null_detection() {
        assert!(SqlValue::Text(None).is_null());
        assert!(!SqlValue::from(1_i64).is_null());
    }
}
