//! Review handlers addressed by review id.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::actor::Actor;
use crate::api::dto::DeleteParams;
use crate::app_state::AppState;
use crate::domain::{ArchiveRecord, EntityId, Review, ReviewPatch};
use crate::error::{ApiError, ErrorResponse};

/// `GET /reviews/{id}`: Get one review.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the review does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/reviews/{id}",
    tag = "Reviews",
    summary = "Get a review",
    params(("id" = String, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review", body = Review),
        (status = 404, description = "Review not found", body = ErrorResponse),
    )
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let review = state.directory.get_review(&EntityId::from_stored(id)).await?;
    Ok(Json(review))
}

/// `PATCH /reviews/{id}`: Update a review.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the review does not exist.
#[utoipa::path(
    patch,
    path = "/api/v1/reviews/{id}",
    tag = "Reviews",
    summary = "Update a review",
    request_body = ReviewPatch,
    params(
        ("id" = String, Path, description = "Review id"),
        ("X-User-Id" = String, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Updated review", body = Review),
        (status = 400, description = "Invalid rating", body = ErrorResponse),
        (status = 404, description = "Review not found", body = ErrorResponse),
    )
)]
pub async fn update_review(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(patch): Json<ReviewPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let review = state
        .directory
        .update_review(&EntityId::from_stored(id), patch, actor.as_str())
        .await?;
    Ok(Json(review))
}

/// `DELETE /reviews/{id}`: Archive and delete a review.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the review does not exist.
#[utoipa::path(
    delete,
    path = "/api/v1/reviews/{id}",
    tag = "Reviews",
    summary = "Archive and delete a review",
    params(
        ("id" = String, Path, description = "Review id"),
        ("X-User-Id" = String, Header, description = "Acting user"),
        DeleteParams,
    ),
    responses(
        (status = 200, description = "Archive record", body = ArchiveRecord),
        (status = 404, description = "Review not found", body = ErrorResponse),
    )
)]
pub async fn archive_review(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .directory
        .archive_review(&EntityId::from_stored(id), actor.as_str(), params.note)
        .await?;
    Ok(Json(record))
}

/// Review routes, relative to `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/reviews/{id}",
        get(get_review).patch(update_review).delete(archive_review),
    )
}
