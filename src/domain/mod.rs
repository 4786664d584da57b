//! Domain layer: entity identity, audit metadata, and directory records.
//!
//! These types are storage-agnostic. Row mapping lives in
//! [`crate::persistence::entity`].

pub mod archive_record;
pub mod audit;
pub mod entity_id;
pub mod restaurant;
pub mod review;

pub use archive_record::{ArchiveRecord, NewArchiveRecord};
pub use audit::AuditFields;
pub use entity_id::EntityId;
pub use restaurant::{NewRestaurant, Restaurant, RestaurantPatch};
pub use review::{NewReview, Review, ReviewDraft, ReviewPatch};
