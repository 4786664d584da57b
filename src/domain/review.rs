//! Restaurant review and its create/update payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{AuditFields, EntityId};

/// Lowest accepted rating.
pub const MIN_RATING: i64 = 1;
/// Highest accepted rating.
pub const MAX_RATING: i64 = 5;

/// A user review of one restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Review {
    /// Identity and audit trail. `created_by` is the review author.
    #[serde(flatten)]
    pub audit: AuditFields,
    /// Reviewed restaurant.
    pub restaurant_id: EntityId,
    /// Star rating in `1..=5`.
    pub rating: i64,
    /// Free-form comment.
    pub comment: Option<String>,
}

/// Fields supplied when creating a review.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewReview {
    /// Reviewed restaurant.
    pub restaurant_id: EntityId,
    /// Star rating in `1..=5`.
    pub rating: i64,
    /// Free-form comment.
    #[serde(default)]
    pub comment: Option<String>,
}

impl NewReview {
    /// Checks the rating range.
    ///
    /// # Errors
    ///
    /// Returns a message when the rating is outside `1..=5`.
    pub fn validate(&self) -> Result<(), String> {
        check_rating(self.rating)
    }
}

/// A review submitted together with a new restaurant, before the
/// restaurant has an id.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewDraft {
    /// Star rating in `1..=5`.
    pub rating: i64,
    /// Free-form comment.
    #[serde(default)]
    pub comment: Option<String>,
}

impl ReviewDraft {
    /// Attaches the draft to `restaurant_id`.
    #[must_use]
    pub fn for_restaurant(self, restaurant_id: EntityId) -> NewReview {
        NewReview {
            restaurant_id,
            rating: self.rating,
            comment: self.comment,
        }
    }

    /// Checks the rating range.
    ///
    /// # Errors
    ///
    /// Returns a message when the rating is outside `1..=5`.
    pub fn validate(&self) -> Result<(), String> {
        check_rating(self.rating)
    }
}

/// Partial update for a review.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReviewPatch {
    /// New rating.
    #[serde(default)]
    pub rating: Option<i64>,
    /// New comment.
    #[serde(default)]
    pub comment: Option<String>,
}

impl Review {
    /// Builds a review from its audit fields and creation payload.
    #[must_use]
    pub fn from_new(audit: AuditFields, new: NewReview) -> Self {
        Self {
            audit,
            restaurant_id: new.restaurant_id,
            rating: new.rating,
            comment: new.comment,
        }
    }

    /// Applies every `Some` field of `patch`.
    pub fn apply(&mut self, patch: ReviewPatch) {
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        if patch.comment.is_some() {
            self.comment = patch.comment;
        }
    }
}

impl ReviewPatch {
    /// Checks the rating range when a rating is provided.
    ///
    /// # Errors
    ///
    /// Returns a message when the rating is outside `1..=5`.
    pub fn validate(&self) -> Result<(), String> {
        self.rating.map_or(Ok(()), check_rating)
    }
}

fn check_rating(rating: i64) -> Result<(), String> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(format!("rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"))
    }
}
