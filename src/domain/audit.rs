//! Audit metadata embedded in every persisted entity.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::EntityId;

/// Identity and audit trail shared by all entity types.
///
/// Entities embed this value (flattened in their JSON form) rather than
/// inheriting behavior from a base type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuditFields {
    /// Time-sortable identifier, assigned at creation.
    pub id: EntityId,
    /// Creation timestamp (immutable).
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update.
    pub updated_at: DateTime<Utc>,
    /// Identifier of the user that created the entity.
    pub created_by: String,
    /// Identifier of the user that last updated the entity.
    pub updated_by: String,
}

impl AuditFields {
    /// Creates audit fields for a brand-new entity.
    #[must_use]
    pub fn new(created_by: &str) -> Self {
        let now = timestamp_now();
        Self {
            id: EntityId::new(),
            created_at: now,
            updated_at: now,
            created_by: created_by.to_string(),
            updated_by: created_by.to_string(),
        }
    }

    /// Records an update by `updated_by` at the current time.
    pub fn touch(&mut self, updated_by: &str) {
        self.updated_at = timestamp_now();
        self.updated_by = updated_by.to_string();
    }
}

/// Current time truncated to the microsecond precision kept in storage.
#[must_use]
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn new_sets_both_actors_and_equal_timestamps() {
        let audit = AuditFields::new("u1");
        assert_eq!(audit.created_by, "u1");
        assert_eq!(audit.updated_by, "u1");
        assert_eq!(audit.created_at, audit.updated_at);
    }

    #[test]
    fn timestamps_have_microsecond_precision() {
        let now = timestamp_now();
        assert_eq!(now.nanosecond() % 1_000, 0);
    }

    #[test]
    fn touch_keeps_identity_and_creation() {
        let mut audit = AuditFields::new("u1");
        let before = audit.clone();
        audit.touch("u2");
        assert_eq!(audit.id, before.id);
        assert_eq!(audit.created_at, before.created_at);
        assert_eq!(audit.created_by, "u1");
        assert_eq!(audit.updated_by, "u2");
        assert!(audit.updated_at >= before.updated_at);
    }
}
