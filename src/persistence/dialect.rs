//! SQL dialects of the supported backends.
//!
//! [`Backend`] is the runtime tag carried by connections and sessions.
//! [`Dialect`] is its compile-time counterpart: repositories are generic
//! over a dialect so each backend gets its own concrete repository type.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::entity::ColumnKind;
use super::error::StoreError;

/// Storage backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Embedded single-file store.
    Sqlite,
    /// Networked PostgreSQL server.
    Postgres,
}

impl Backend {
    /// Infers the backend from a connection URL scheme.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] for unsupported schemes.
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        let scheme = url.split_once(':').map_or(url, |(scheme, _)| scheme);
        match scheme {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(StoreError::Config(format!(
                "unsupported backend scheme `{other}`"
            ))),
        }
    }

    /// Lowercase backend name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }

    /// Statement that opens a write transaction.
    ///
    /// SQLite takes the write lock up front so concurrent writers queue on
    /// the busy timeout instead of failing on lock upgrade.
    #[must_use]
    pub const fn begin_statement(self) -> &'static str {
        match self {
            Self::Sqlite => "BEGIN IMMEDIATE",
            Self::Postgres => "BEGIN",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(StoreError::Config(format!("unknown backend `{other}`"))),
        }
    }
}

/// Compile-time SQL dialect.
pub trait Dialect: fmt::Debug + Send + Sync + 'static {
    /// Runtime tag of this dialect.
    const BACKEND: Backend;

    /// Suffix appended to a `SELECT` that precedes an update of the same row.
    const ROW_LOCK: &'static str;

    /// Bind-parameter placeholder for the 1-based `index`.
    fn placeholder(index: usize) -> String;

    /// Column type used in `CREATE TABLE`.
    fn column_type(kind: ColumnKind) -> &'static str;
}

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    const BACKEND: Backend = Backend::Sqlite;
    const ROW_LOCK: &'static str = "";

    fn placeholder(_index: usize) -> String {
        "?".to_string()
    }

    fn column_type(kind: ColumnKind) -> &'static str {
        match kind {
            ColumnKind::Text => "TEXT",
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Real => "REAL",
        }
    }
}

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    const BACKEND: Backend = Backend::Postgres;
    const ROW_LOCK: &'static str = " FOR UPDATE";

    fn placeholder(index: usize) -> String {
        format!("${index}")
    }

    fn column_type(kind: ColumnKind) -> &'static str {
        match kind {
            ColumnKind::Text => "TEXT",
            ColumnKind::Integer => "BIGINT",
            ColumnKind::Real => "DOUBLE PRECISION",
        }
    }
}

/// Renders `count` placeholders starting at `first`, comma separated.
pub(crate) fn placeholders<D: Dialect>(first: usize, count: usize) -> String {
    (first..first + count)
        .map(D::placeholder)
        .collect::<Vec<_>>()
        .join(", ")
}
