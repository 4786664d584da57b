//! DTOs for archive browsing and health reporting.

use serde::Serialize;
use utoipa::ToSchema;

use super::PaginationMeta;
use crate::domain::ArchiveRecord;
use crate::persistence::PoolStatus;

/// Paginated archive list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArchiveListResponse {
    /// Archive records on this page, oldest first.
    pub data: Vec<ArchiveRecord>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Connection pool state reported by `/health`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DatabaseHealth {
    /// Backend family (`sqlite` or `postgres`).
    pub backend: String,
    /// Pool lifecycle (`uninitialized`, `ready`, `disposed`).
    pub lifecycle: String,
    /// Open physical connections.
    pub live: usize,
    /// Parked connections.
    pub idle: usize,
    /// Checked-out capacity.
    pub in_use: usize,
    /// Free capacity.
    pub available: usize,
    /// Configured ceiling.
    pub max_connections: u32,
}

impl DatabaseHealth {
    /// Builds the report from a pool snapshot.
    #[must_use]
    pub fn new(backend: &str, status: &PoolStatus) -> Self {
        let lifecycle = serde_json::to_value(status.lifecycle)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        Self {
            backend: backend.to_string(),
            lifecycle,
            live: status.live,
            idle: status.idle,
            in_use: status.in_use,
            available: status.available,
            max_connections: status.max_connections,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` when the pool accepts sessions, otherwise `unavailable`.
    pub status: String,
    /// Response time (RFC 3339).
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Pool state.
    pub database: DatabaseHealth,
}
