//! Read-only archive browsing.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{ArchiveListResponse, PaginationParams};
use crate::app_state::AppState;
use crate::domain::{ArchiveRecord, EntityId};
use crate::error::{ApiError, ErrorResponse};
use crate::persistence::archive::ARCHIVE_COLUMNS;
use crate::persistence::{ARCHIVE_TABLE, Filters};

/// `GET /archives`: List archive records.
///
/// # Errors
///
/// Returns [`ApiError::InvalidFilter`] for keys other than
/// `original_table`, `original_id`, and `deleted_by`.
#[utoipa::path(
    get,
    path = "/api/v1/archives",
    tag = "Archives",
    summary = "List archive records",
    params(
        PaginationParams,
        ("original_table" = Option<String>, Query, description = "Source table"),
        ("original_id" = Option<String>, Query, description = "Deleted entity id"),
        ("deleted_by" = Option<String>, Query, description = "Deleting user"),
    ),
    responses(
        (status = 200, description = "Archive page", body = ArchiveListResponse),
        (status = 400, description = "Unknown filter", body = ErrorResponse),
    )
)]
pub async fn list_archives(
    State(state): State<AppState>,
    Query(mut query): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PaginationParams::take_from(&mut query)?;
    let filters = Filters::parse(ARCHIVE_TABLE, ARCHIVE_COLUMNS, query)?;
    let data = state
        .directory
        .list_archives(&filters, page.offset(), page.limit())
        .await?;
    Ok(Json(ArchiveListResponse {
        pagination: page.meta(data.len()),
        data,
    }))
}

/// `GET /archives/{id}`: Get one archive record.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the record does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/archives/{id}",
    tag = "Archives",
    summary = "Get an archive record",
    params(("id" = String, Path, description = "Archive record id")),
    responses(
        (status = 200, description = "Archive record", body = ArchiveRecord),
        (status = 404, description = "Record not found", body = ErrorResponse),
    )
)]
pub async fn get_archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.directory.get_archive(&EntityId::from_stored(id)).await?;
    Ok(Json(record))
}

/// Archive routes, relative to `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/archives", get(list_archives))
        .route("/archives/{id}", get(get_archive))
}
