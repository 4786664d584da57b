//! Archive-then-delete: the only path by which an entity row is removed.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{ArchiveRecord, EntityId, NewArchiveRecord};
use crate::persistence::{
    ArchiveRepository, Entity, Repository, Session, SessionProvider, StoreError, WriteMode,
};

/// Progress of one deletion, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStage {
    /// The entity was loaded.
    Fetched,
    /// The snapshot is staged.
    Archived,
    /// The delete is staged.
    Deleted,
    /// Snapshot and delete are durable.
    Committed,
    /// Nothing changed.
    RolledBack,
}

/// Deletes entities of type `E` after writing an [`ArchiveRecord`] of
/// their full state, atomically.
///
/// The snapshot write and the row removal share one unit of work: either
/// both are committed or neither is.
#[derive(Debug, Clone)]
pub struct ArchiveWorkflow<E: Entity> {
    sessions: SessionProvider,
    repository: Arc<dyn Repository<E>>,
    archives: Arc<dyn ArchiveRepository>,
}

impl<E: Entity> ArchiveWorkflow<E> {
    /// Creates a workflow over the given repositories.
    #[must_use]
    pub fn new(
        sessions: SessionProvider,
        repository: Arc<dyn Repository<E>>,
        archives: Arc<dyn ArchiveRepository>,
    ) -> Self {
        Self {
            sessions,
            repository,
            archives,
        }
    }

    /// Archives and deletes entity `id` in its own unit of work.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no entity has that id (nothing runs).
    /// - [`StoreError::ArchiveWriteFailed`] if the snapshot cannot be
    ///   written.
    /// - Any delete or commit failure.
    ///
    /// In every error case the entity and the archive are unchanged.
    pub async fn run(
        &self,
        id: &EntityId,
        deleted_by: &str,
        note: Option<String>,
    ) -> Result<ArchiveRecord, StoreError> {
        let mut uow = self.sessions.unit_of_work().await?;
        let staged = self.stage(&mut uow, id, deleted_by, note).await;
        let outcome = match staged {
            Ok(record) => uow.commit().await.map(|()| record),
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback of failed deletion failed");
                }
                Err(err)
            }
        };
        match &outcome {
            Ok(record) => tracing::info!(
                table = E::TABLE,
                %id,
                archive_id = %record.id,
                deleted_by,
                stage = ?DeletionStage::Committed,
                "entity archived and deleted"
            ),
            Err(err) => tracing::warn!(
                table = E::TABLE,
                %id,
                error = %err,
                stage = ?DeletionStage::RolledBack,
                "deletion rolled back"
            ),
        }
        outcome
    }

    /// Stages the archive write and the delete inside the caller's unit of
    /// work, so several deletions can commit together.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnitOfWorkMisuse`] when `session` is not inside
    /// a unit of work, and otherwise the same errors as
    /// [`ArchiveWorkflow::run`]. The caller must roll back on error.
    pub async fn stage(
        &self,
        session: &mut Session,
        id: &EntityId,
        deleted_by: &str,
        note: Option<String>,
    ) -> Result<ArchiveRecord, StoreError> {
        if !session.in_unit_of_work() {
            return Err(StoreError::UnitOfWorkMisuse(
                "archive-then-delete must run inside a unit of work",
            ));
        }

        let Some(entity) = self.repository.get_by_id(session, id).await? else {
            return Err(StoreError::NotFound {
                table: E::TABLE,
                id: id.to_string(),
            });
        };
        tracing::debug!(table = E::TABLE, %id, stage = ?DeletionStage::Fetched);

        let snapshot = NewArchiveRecord {
            original_table: E::TABLE.to_string(),
            original_id: id.clone(),
            data: serde_json::to_value(&entity)?,
            deleted_by: deleted_by.to_string(),
            note,
        };
        let record = self
            .archives
            .create(session, snapshot, WriteMode::Stage)
            .await
            .map_err(|source| StoreError::ArchiveWriteFailed {
                table: E::TABLE,
                id: id.to_string(),
                source: Box::new(source),
            })?;
        tracing::debug!(table = E::TABLE, %id, stage = ?DeletionStage::Archived);

        if !self.repository.delete(session, id, WriteMode::Stage).await? {
            return Err(StoreError::TransactionConflict(format!(
                "{} {id} disappeared before it could be deleted",
                E::TABLE
            )));
        }
        tracing::debug!(table = E::TABLE, %id, stage = ?DeletionStage::Deleted);
        Ok(record)
    }
}
