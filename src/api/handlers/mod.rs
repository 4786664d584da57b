//! REST endpoint handlers organized by resource.

pub mod archives;
pub mod restaurants;
pub mod reviews;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(restaurants::routes())
        .merge(reviews::routes())
        .merge(archives::routes())
}
