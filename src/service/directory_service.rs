//! Directory service: restaurant and review use-cases over the persistence
//! layer.

use std::sync::Arc;

use crate::domain::{
    ArchiveRecord, EntityId, NewRestaurant, Restaurant, RestaurantPatch, Review, ReviewDraft,
    ReviewPatch,
};
use crate::error::ApiError;
use crate::persistence::{
    ArchiveRepository, Entity, Filters, Repository, RepositoryFactory, Session, SessionProvider,
    StoreError, WriteMode,
};

use super::archive_workflow::ArchiveWorkflow;

/// Page size used when collecting every review of a restaurant.
const REVIEW_BATCH: u64 = 200;

/// Orchestration layer for directory operations.
///
/// Stateless coordinator: every method acquires its own session (or unit
/// of work), runs repository calls through it, and releases it before
/// returning. Multi-step writes share one unit of work.
#[derive(Debug, Clone)]
pub struct DirectoryService {
    sessions: SessionProvider,
    restaurants: Arc<dyn Repository<Restaurant>>,
    reviews: Arc<dyn Repository<Review>>,
    archives: Arc<dyn ArchiveRepository>,
    restaurant_deletion: ArchiveWorkflow<Restaurant>,
    review_deletion: ArchiveWorkflow<Review>,
}

impl DirectoryService {
    /// Creates a service whose repositories come from `factory`.
    #[must_use]
    pub fn new(sessions: SessionProvider, factory: RepositoryFactory) -> Self {
        let restaurants = factory.repository::<Restaurant>();
        let reviews = factory.repository::<Review>();
        let archives = factory.archives();
        Self {
            restaurant_deletion: ArchiveWorkflow::new(
                sessions.clone(),
                Arc::clone(&restaurants),
                Arc::clone(&archives),
            ),
            review_deletion: ArchiveWorkflow::new(
                sessions.clone(),
                Arc::clone(&reviews),
                Arc::clone(&archives),
            ),
            sessions,
            restaurants,
            reviews,
            archives,
        }
    }

    /// Creates a restaurant. When `reviews` is non-empty, the restaurant and
    /// all its reviews are written in one unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for invalid input and the
    /// mapped storage error otherwise. On error nothing is stored.
    pub async fn create_restaurant(
        &self,
        new: NewRestaurant,
        reviews: Vec<ReviewDraft>,
        actor: &str,
    ) -> Result<(Restaurant, Vec<Review>), ApiError> {
        new.validate().map_err(ApiError::InvalidRequest)?;
        for draft in &reviews {
            draft.validate().map_err(ApiError::InvalidRequest)?;
        }

        if reviews.is_empty() {
            let mut session = self.sessions.acquire().await?;
            let restaurant = self
                .restaurants
                .create(&mut session, new, actor, WriteMode::Commit)
                .await?;
            tracing::info!(id = %restaurant.audit.id, actor, "restaurant created");
            return Ok((restaurant, Vec::new()));
        }

        let mut uow = self.sessions.unit_of_work().await?;
        let staged = self.stage_restaurant(&mut uow, new, reviews, actor).await;
        match staged {
            Ok(created) => {
                uow.commit().await?;
                tracing::info!(
                    id = %created.0.audit.id,
                    reviews = created.1.len(),
                    actor,
                    "restaurant created with initial reviews"
                );
                Ok(created)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err.into())
            }
        }
    }

    async fn stage_restaurant(
        &self,
        session: &mut Session,
        new: NewRestaurant,
        drafts: Vec<ReviewDraft>,
        actor: &str,
    ) -> Result<(Restaurant, Vec<Review>), StoreError> {
        let restaurant = self
            .restaurants
            .create(session, new, actor, WriteMode::Stage)
            .await?;
        let mut reviews = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let review = self
                .reviews
                .create(
                    session,
                    draft.for_restaurant(restaurant.audit.id.clone()),
                    actor,
                    WriteMode::Stage,
                )
                .await?;
            reviews.push(review);
        }
        Ok((restaurant, reviews))
    }

    /// Lists restaurants matching `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidFilter`] for unknown filter keys.
    pub async fn list_restaurants(
        &self,
        filters: &Filters,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Restaurant>, ApiError> {
        let mut session = self.sessions.acquire().await?;
        Ok(self
            .restaurants
            .find(&mut session, filters, offset, limit)
            .await?)
    }

    /// Loads one restaurant.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if it does not exist.
    pub async fn get_restaurant(&self, id: &EntityId) -> Result<Restaurant, ApiError> {
        let mut session = self.sessions.acquire().await?;
        self.restaurants
            .get_by_id(&mut session, id)
            .await?
            .ok_or_else(|| not_found::<Restaurant>(id))
    }

    /// Applies a partial update to a restaurant.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for invalid fields and
    /// [`ApiError::NotFound`] if it does not exist.
    pub async fn update_restaurant(
        &self,
        id: &EntityId,
        patch: RestaurantPatch,
        actor: &str,
    ) -> Result<Restaurant, ApiError> {
        patch.validate().map_err(ApiError::InvalidRequest)?;
        let mut session = self.sessions.acquire().await?;
        let updated = self
            .restaurants
            .update(&mut session, id, patch, actor, WriteMode::Commit)
            .await?
            .ok_or_else(|| not_found::<Restaurant>(id))?;
        tracing::info!(%id, actor, "restaurant updated");
        Ok(updated)
    }

    /// Archives and deletes a restaurant together with all of its reviews,
    /// in one unit of work. Returns the restaurant's archive record followed
    /// by the records of its reviews.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the restaurant does not exist. On
    /// any error nothing is archived or deleted.
    pub async fn archive_restaurant(
        &self,
        id: &EntityId,
        actor: &str,
        note: Option<String>,
    ) -> Result<(ArchiveRecord, Vec<ArchiveRecord>), ApiError> {
        let mut uow = self.sessions.unit_of_work().await?;
        let staged = self.stage_restaurant_archive(&mut uow, id, actor, note).await;
        match staged {
            Ok(records) => {
                uow.commit().await?;
                tracing::info!(
                    %id,
                    actor,
                    reviews = records.1.len(),
                    "restaurant archived"
                );
                Ok(records)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err.into())
            }
        }
    }

    async fn stage_restaurant_archive(
        &self,
        session: &mut Session,
        id: &EntityId,
        actor: &str,
        note: Option<String>,
    ) -> Result<(ArchiveRecord, Vec<ArchiveRecord>), StoreError> {
        let filters = Filters::new().eq("restaurant_id", id);
        let mut review_ids = Vec::new();
        loop {
            let batch = self
                .reviews
                .find(session, &filters, review_ids.len() as u64, REVIEW_BATCH)
                .await?;
            let done = (batch.len() as u64) < REVIEW_BATCH;
            review_ids.extend(batch.into_iter().map(|r| r.audit.id));
            if done {
                break;
            }
        }

        let mut dependents = Vec::with_capacity(review_ids.len());
        for review_id in &review_ids {
            let record = self
                .review_deletion
                .stage(session, review_id, actor, note.clone())
                .await?;
            dependents.push(record);
        }
        let record = self
            .restaurant_deletion
            .stage(session, id, actor, note)
            .await?;
        Ok((record, dependents))
    }

    /// Adds a review to an existing restaurant.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for an out-of-range rating and
    /// [`ApiError::NotFound`] if the restaurant does not exist.
    pub async fn add_review(
        &self,
        restaurant_id: &EntityId,
        draft: ReviewDraft,
        actor: &str,
    ) -> Result<Review, ApiError> {
        draft.validate().map_err(ApiError::InvalidRequest)?;
        let mut session = self.sessions.acquire().await?;
        if self
            .restaurants
            .get_by_id(&mut session, restaurant_id)
            .await?
            .is_none()
        {
            return Err(not_found::<Restaurant>(restaurant_id));
        }
        let review = self
            .reviews
            .create(
                &mut session,
                draft.for_restaurant(restaurant_id.clone()),
                actor,
                WriteMode::Commit,
            )
            .await?;
        tracing::info!(id = %review.audit.id, %restaurant_id, actor, "review added");
        Ok(review)
    }

    /// Lists reviews of one restaurant, optionally restricted to a rating.
    ///
    /// # Errors
    ///
    /// Returns the mapped storage error.
    pub async fn list_reviews(
        &self,
        restaurant_id: &EntityId,
        rating: Option<i64>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Review>, ApiError> {
        let mut filters = Filters::new().eq("restaurant_id", restaurant_id);
        if let Some(rating) = rating {
            filters = filters.eq("rating", rating);
        }
        let mut session = self.sessions.acquire().await?;
        Ok(self
            .reviews
            .find(&mut session, &filters, offset, limit)
            .await?)
    }

    /// Loads one review.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if it does not exist.
    pub async fn get_review(&self, id: &EntityId) -> Result<Review, ApiError> {
        let mut session = self.sessions.acquire().await?;
        self.reviews
            .get_by_id(&mut session, id)
            .await?
            .ok_or_else(|| not_found::<Review>(id))
    }

    /// Applies a partial update to a review.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for an out-of-range rating and
    /// [`ApiError::NotFound`] if it does not exist.
    pub async fn update_review(
        &self,
        id: &EntityId,
        patch: ReviewPatch,
        actor: &str,
    ) -> Result<Review, ApiError> {
        patch.validate().map_err(ApiError::InvalidRequest)?;
        let mut session = self.sessions.acquire().await?;
        self.reviews
            .update(&mut session, id, patch, actor, WriteMode::Commit)
            .await?
            .ok_or_else(|| not_found::<Review>(id))
    }

    /// Archives and deletes one review.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if it does not exist.
    pub async fn archive_review(
        &self,
        id: &EntityId,
        actor: &str,
        note: Option<String>,
    ) -> Result<ArchiveRecord, ApiError> {
        Ok(self.review_deletion.run(id, actor, note).await?)
    }

    /// Lists archive records.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidFilter`] for unknown filter keys.
    pub async fn list_archives(
        &self,
        filters: &Filters,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ArchiveRecord>, ApiError> {
        let mut session = self.sessions.acquire().await?;
        Ok(self
            .archives
            .find(&mut session, filters, offset, limit)
            .await?)
    }

    /// Loads one archive record by its own id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if it does not exist.
    pub async fn get_archive(&self, id: &EntityId) -> Result<ArchiveRecord, ApiError> {
        let mut session = self.sessions.acquire().await?;
        self.archives
            .get_by_id(&mut session, id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: crate::persistence::ARCHIVE_TABLE,
                id: id.to_string(),
            })
    }
}

fn not_found<E: Entity>(id: &EntityId) -> ApiError {
    ApiError::NotFound {
        resource: E::TABLE,
        id: id.to_string(),
    }
}
