//! Immutable snapshot of a deleted entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::EntityId;

/// Archived copy of an entity, written in the same transaction that
/// hard-deletes the original row.
///
/// Records are append-only: nothing in the crate updates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ArchiveRecord {
    /// Identifier of the archive record itself.
    pub id: EntityId,
    /// Table the deleted entity lived in (e.g. `"restaurants"`).
    pub original_table: String,
    /// Identifier of the deleted entity.
    pub original_id: EntityId,
    /// Full JSON state of the entity at deletion time.
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    /// Deletion timestamp.
    pub deleted_at: DateTime<Utc>,
    /// User who requested the deletion.
    pub deleted_by: String,
    /// Optional free-form reason.
    pub note: Option<String>,
}

/// Fields supplied when writing an archive record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArchiveRecord {
    /// Source table name.
    pub original_table: String,
    /// Identifier of the entity being deleted.
    pub original_id: EntityId,
    /// Snapshot of the entity.
    pub data: serde_json::Value,
    /// User requesting the deletion.
    pub deleted_by: String,
    /// Optional free-form reason.
    pub note: Option<String>,
}
