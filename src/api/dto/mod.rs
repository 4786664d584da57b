//! Data Transfer Objects for REST request/response serialization.
//!
//! Domain records serialize directly; the types here wrap them in list
//! envelopes and multi-part responses.

pub mod archive_dto;
pub mod common_dto;
pub mod restaurant_dto;

pub use archive_dto::*;
pub use common_dto::*;
pub use restaurant_dto::*;
