//! [`Entity`] implementations for the directory records.

use sqlx::Row;
use sqlx::any::AnyRow;

use super::entity::{Column, Entity, SqlValue, audit_from_row};
use super::error::StoreError;
use crate::domain::{
    AuditFields, EntityId, NewRestaurant, NewReview, Restaurant, RestaurantPatch, Review,
    ReviewPatch,
};

/// Table holding [`Restaurant`] rows.
pub const RESTAURANTS_TABLE: &str = "restaurants";
/// Table holding [`Review`] rows.
pub const REVIEWS_TABLE: &str = "reviews";

impl Entity for Restaurant {
    type Draft = NewRestaurant;
    type Patch = RestaurantPatch;

    const TABLE: &'static str = RESTAURANTS_TABLE;
    const COLUMNS: &'static [Column] = &[
        Column::text("name").filterable(),
        Column::text("city").filterable(),
        Column::text("address").nullable(),
        Column::text("cuisine").nullable().filterable(),
        Column::text("phone").nullable(),
        Column::real("latitude").nullable(),
        Column::real("longitude").nullable(),
    ];

    fn audit(&self) -> &AuditFields {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditFields {
        &mut self.audit
    }

    fn from_draft(audit: AuditFields, draft: NewRestaurant) -> Self {
        Self::from_new(audit, draft)
    }

    fn apply_patch(&mut self, patch: RestaurantPatch) {
        self.apply(patch);
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.name.as_str()),
            SqlValue::from(self.city.as_str()),
            SqlValue::from(self.address.clone()),
            SqlValue::from(self.cuisine.clone()),
            SqlValue::from(self.phone.clone()),
            SqlValue::from(self.latitude),
            SqlValue::from(self.longitude),
        ]
    }

    fn from_row(row: &AnyRow) -> Result<Self, StoreError> {
        Ok(Self {
            audit: audit_from_row(row)?,
            name: row.try_get("name")?,
            city: row.try_get("city")?,
            address: row.try_get("address")?,
            cuisine: row.try_get("cuisine")?,
            phone: row.try_get("phone")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
        })
    }
}

impl Entity for Review {
    type Draft = NewReview;
    type Patch = ReviewPatch;

    const TABLE: &'static str = REVIEWS_TABLE;
    const COLUMNS: &'static [Column] = &[
        Column::text("restaurant_id")
            .filterable()
            .references(RESTAURANTS_TABLE),
        Column::integer("rating").filterable(),
        Column::text("comment").nullable(),
    ];

    fn audit(&self) -> &AuditFields {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditFields {
        &mut self.audit
    }

    fn from_draft(audit: AuditFields, draft: NewReview) -> Self {
        Self::from_new(audit, draft)
    }

    fn apply_patch(&mut self, patch: ReviewPatch) {
        self.apply(patch);
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(&self.restaurant_id),
            SqlValue::from(self.rating),
            SqlValue::from(self.comment.clone()),
        ]
    }

    fn from_row(row: &AnyRow) -> Result<Self, StoreError> {
        let restaurant_id: String = row.try_get("restaurant_id")?;
        Ok(Self {
            audit: audit_from_row(row)?,
            restaurant_id: EntityId::from_stored(restaurant_id),
            rating: row.try_get("rating")?,
            comment: row.try_get("comment")?,
        })
    }
}
