//! DTOs for restaurant and review endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::PaginationMeta;
use crate::domain::{ArchiveRecord, NewRestaurant, Restaurant, Review, ReviewDraft};

/// Request body for `POST /restaurants`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRestaurantRequest {
    /// Restaurant fields.
    #[serde(flatten)]
    pub restaurant: NewRestaurant,
    /// Reviews stored atomically with the restaurant.
    #[serde(default)]
    pub reviews: Vec<ReviewDraft>,
}

/// Response body for `POST /restaurants`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateRestaurantResponse {
    /// The stored restaurant.
    pub restaurant: Restaurant,
    /// Initial reviews, if any were submitted.
    pub reviews: Vec<Review>,
}

/// Paginated restaurant list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RestaurantListResponse {
    /// Restaurants on this page, in creation order.
    pub data: Vec<Restaurant>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Paginated review list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewListResponse {
    /// Reviews on this page, in creation order.
    pub data: Vec<Review>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Response body for `DELETE /restaurants/{id}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArchiveRestaurantResponse {
    /// Snapshot of the deleted restaurant.
    pub archive: ArchiveRecord,
    /// Snapshots of the reviews deleted with it.
    pub archived_reviews: Vec<ArchiveRecord>,
}
