//! Type-safe, time-sortable entity identifier.
//!
//! [`EntityId`] wraps the canonical text form of a UUID v7. Because v7
//! UUIDs lead with a millisecond timestamp and the process-wide generator
//! is monotonic, identifiers sort lexically in creation order.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for any persisted entity or archive record.
///
/// Generated once at creation time and never reassigned. Stored as text so
/// that every backend orders it the same way.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, example = "01890a5d-ac96-774b-bcce-b302099a8057")]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new time-ordered identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Wraps an identifier read back from storage or a request path.
    ///
    /// No format validation is applied: an identifier that was never issued
    /// simply matches no row.
    #[must_use]
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<uuid::Uuid> for EntityId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid.to_string())
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}
