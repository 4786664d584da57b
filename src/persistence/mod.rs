//! Transactional persistence: pooled connections, sessions, units of work,
//! generic repositories, and the append-only archive.
//!
//! The entry point is [`Database::connect`], which takes a
//! [`BackendSelection`] from [`select`] and yields a
//! [`SessionProvider`] plus a [`RepositoryFactory`] for the chosen backend.

pub mod archive;
pub mod database;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod manager;
pub mod pool;
pub mod records;
pub mod repository;
pub mod schema;
pub mod selector;
pub mod session;
pub mod unit_of_work;

pub use archive::{ARCHIVE_TABLE, ArchiveRepository, SqlArchiveRepository};
pub use database::Database;
pub use dialect::{Backend, Dialect, PostgresDialect, SqliteDialect};
pub use entity::{Column, ColumnKind, Entity, Filters, SqlValue};
pub use error::StoreError;
pub use manager::SqlConnectionManager;
pub use pool::{Pool, PoolConfig, PoolLifecycle, PoolStatus, PooledConnection};
pub use records::{RESTAURANTS_TABLE, REVIEWS_TABLE};
pub use repository::{PostgresRepository, Repository, SqlRepository, SqliteRepository};
pub use selector::{BackendSelection, DeploymentScope, RepositoryFactory, select};
pub use session::{Session, SessionProvider, WriteMode};
pub use unit_of_work::{UnitOfWork, UnitOfWorkState};
