//! Restaurant handlers: create, list, get, update, archive, and the
//! restaurant-scoped review collection.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::actor::Actor;
use crate::api::dto::{
    ArchiveRestaurantResponse, CreateRestaurantRequest, CreateRestaurantResponse, DeleteParams,
    PaginationParams, RestaurantListResponse, ReviewListResponse,
};
use crate::app_state::AppState;
use crate::domain::{EntityId, Restaurant, RestaurantPatch, Review, ReviewDraft};
use crate::error::{ApiError, ErrorResponse};
use crate::persistence::{Entity, Filters};

/// `POST /restaurants`: Create a restaurant, optionally with reviews.
///
/// # Errors
///
/// Returns [`ApiError`] on invalid input or storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/restaurants",
    tag = "Restaurants",
    summary = "Create a restaurant",
    description = "Creates a restaurant. Reviews included in the body are stored in the same transaction: either all are stored or none.",
    request_body = CreateRestaurantRequest,
    params(("X-User-Id" = String, Header, description = "Acting user")),
    responses(
        (status = 201, description = "Restaurant created", body = CreateRestaurantResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse),
    )
)]
pub async fn create_restaurant(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateRestaurantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (restaurant, reviews) = state
        .directory
        .create_restaurant(req.restaurant, req.reviews, actor.as_str())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateRestaurantResponse {
            restaurant,
            reviews,
        }),
    ))
}

/// `GET /restaurants`: List restaurants with filters and pagination.
///
/// # Errors
///
/// Returns [`ApiError::InvalidFilter`] for query keys that are not
/// filterable columns.
#[utoipa::path(
    get,
    path = "/api/v1/restaurants",
    tag = "Restaurants",
    summary = "List restaurants",
    description = "Returns restaurants in creation order. Any query key other than `page` and `per_page` is an equality filter on `name`, `city`, or `cuisine`; other keys are rejected.",
    params(
        PaginationParams,
        ("name" = Option<String>, Query, description = "Exact name"),
        ("city" = Option<String>, Query, description = "Exact city"),
        ("cuisine" = Option<String>, Query, description = "Exact cuisine"),
    ),
    responses(
        (status = 200, description = "Restaurant page", body = RestaurantListResponse),
        (status = 400, description = "Unknown filter", body = ErrorResponse),
    )
)]
pub async fn list_restaurants(
    State(state): State<AppState>,
    Query(mut query): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PaginationParams::take_from(&mut query)?;
    let filters = Filters::parse(Restaurant::TABLE, Restaurant::COLUMNS, query)?;
    let data = state
        .directory
        .list_restaurants(&filters, page.offset(), page.limit())
        .await?;
    Ok(Json(RestaurantListResponse {
        pagination: page.meta(data.len()),
        data,
    }))
}

/// `GET /restaurants/{id}`: Get one restaurant.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the restaurant does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/restaurants/{id}",
    tag = "Restaurants",
    summary = "Get a restaurant",
    params(("id" = String, Path, description = "Restaurant id")),
    responses(
        (status = 200, description = "Restaurant", body = Restaurant),
        (status = 404, description = "Restaurant not found", body = ErrorResponse),
    )
)]
pub async fn get_restaurant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let restaurant = state
        .directory
        .get_restaurant(&EntityId::from_stored(id))
        .await?;
    Ok(Json(restaurant))
}

/// `PATCH /restaurants/{id}`: Update a restaurant.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the restaurant does not exist and
/// [`ApiError::InvalidRequest`] for invalid fields.
#[utoipa::path(
    patch,
    path = "/api/v1/restaurants/{id}",
    tag = "Restaurants",
    summary = "Update a restaurant",
    request_body = RestaurantPatch,
    params(
        ("id" = String, Path, description = "Restaurant id"),
        ("X-User-Id" = String, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Updated restaurant", body = Restaurant),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Restaurant not found", body = ErrorResponse),
    )
)]
pub async fn update_restaurant(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(patch): Json<RestaurantPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let restaurant = state
        .directory
        .update_restaurant(&EntityId::from_stored(id), patch, actor.as_str())
        .await?;
    Ok(Json(restaurant))
}

/// `DELETE /restaurants/{id}`: Archive and delete a restaurant and its
/// reviews.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the restaurant does not exist.
#[utoipa::path(
    delete,
    path = "/api/v1/restaurants/{id}",
    tag = "Restaurants",
    summary = "Archive and delete a restaurant",
    description = "Writes an archive snapshot of the restaurant and each of its reviews, then deletes them, all in one transaction.",
    params(
        ("id" = String, Path, description = "Restaurant id"),
        ("X-User-Id" = String, Header, description = "Acting user"),
        DeleteParams,
    ),
    responses(
        (status = 200, description = "Archive records", body = ArchiveRestaurantResponse),
        (status = 404, description = "Restaurant not found", body = ErrorResponse),
        (status = 409, description = "Concurrent modification", body = ErrorResponse),
    )
)]
pub async fn archive_restaurant(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (archive, archived_reviews) = state
        .directory
        .archive_restaurant(&EntityId::from_stored(id), actor.as_str(), params.note)
        .await?;
    Ok(Json(ArchiveRestaurantResponse {
        archive,
        archived_reviews,
    }))
}

/// `GET /restaurants/{id}/reviews`: List a restaurant's reviews.
///
/// # Errors
///
/// Returns [`ApiError::InvalidFilter`] for keys other than `rating`.
#[utoipa::path(
    get,
    path = "/api/v1/restaurants/{id}/reviews",
    tag = "Reviews",
    summary = "List reviews of a restaurant",
    params(
        ("id" = String, Path, description = "Restaurant id"),
        PaginationParams,
        ("rating" = Option<i64>, Query, description = "Exact rating"),
    ),
    responses(
        (status = 200, description = "Review page", body = ReviewListResponse),
        (status = 400, description = "Unknown filter", body = ErrorResponse),
    )
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(mut query): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PaginationParams::take_from(&mut query)?;
    let rating = match query.remove("rating") {
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            ApiError::InvalidFilter(format!("rating `{raw}` is not an integer"))
        })?),
        None => None,
    };
    if let Some(key) = query.keys().next() {
        return Err(ApiError::InvalidFilter(format!(
            "unrecognized filter key `{key}` for {}",
            Review::TABLE
        )));
    }
    let data = state
        .directory
        .list_reviews(&EntityId::from_stored(id), rating, page.offset(), page.limit())
        .await?;
    Ok(Json(ReviewListResponse {
        pagination: page.meta(data.len()),
        data,
    }))
}

/// `POST /restaurants/{id}/reviews`: Add a review.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the restaurant does not exist and
/// [`ApiError::InvalidRequest`] for an out-of-range rating.
#[utoipa::path(
    post,
    path = "/api/v1/restaurants/{id}/reviews",
    tag = "Reviews",
    summary = "Add a review",
    request_body = ReviewDraft,
    params(
        ("id" = String, Path, description = "Restaurant id"),
        ("X-User-Id" = String, Header, description = "Acting user"),
    ),
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Invalid rating", body = ErrorResponse),
        (status = 404, description = "Restaurant not found", body = ErrorResponse),
    )
)]
pub async fn add_review(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(draft): Json<ReviewDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let review = state
        .directory
        .add_review(&EntityId::from_stored(id), draft, actor.as_str())
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Restaurant routes, relative to `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/restaurants", get(list_restaurants).post(create_restaurant))
        .route(
            "/restaurants/{id}",
            get(get_restaurant)
                .patch(update_restaurant)
                .delete(archive_restaurant),
        )
        .route("/restaurants/{id}/reviews", get(list_reviews).post(add_review))
}
