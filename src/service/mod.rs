//! Service layer: use-case orchestration.
//!
//! [`DirectoryService`] coordinates repository calls for restaurants and
//! reviews. [`ArchiveWorkflow`] is the only way rows are removed: it writes
//! an archive snapshot and deletes the row in one unit of work.

pub mod archive_workflow;
pub mod directory_service;

pub use archive_workflow::{ArchiveWorkflow, DeletionStage};
pub use directory_service::DirectoryService;
