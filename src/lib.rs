//! # restodir
//!
//! Restaurant directory backend built around a transactional persistence
//! core.
//!
//! Every request runs through a pooled [`persistence::Session`]. Writes
//! either commit on their own or are staged in a
//! [`persistence::UnitOfWork`] that commits them together. Rows are never
//! removed without an [`domain::ArchiveRecord`] of their last state being
//! committed in the same transaction.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── DirectoryService, ArchiveWorkflow (service/)
//!     │
//!     ├── SessionProvider → Session / UnitOfWork
//!     ├── Repository<E>, ArchiveRepository   (persistence/)
//!     ├── Pool (sqlx AnyPool + lifecycle)
//!     │
//!     └── SQLite (local) | PostgreSQL (staging, prod)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
