//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` sits at the
//! root. With the `swagger-ui` feature the OpenAPI document is served at
//! `/api-docs/openapi.json` and browsable at `/swagger-ui`.

pub mod actor;
pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "restodir", description = "Restaurant directory API"),
    paths(
        handlers::restaurants::create_restaurant,
        handlers::restaurants::list_restaurants,
        handlers::restaurants::get_restaurant,
        handlers::restaurants::update_restaurant,
        handlers::restaurants::archive_restaurant,
        handlers::restaurants::list_reviews,
        handlers::restaurants::add_review,
        handlers::reviews::get_review,
        handlers::reviews::update_review,
        handlers::reviews::archive_review,
        handlers::archives::list_archives,
        handlers::archives::get_archive,
        handlers::system::health_handler,
    ),
    tags(
        (name = "Restaurants", description = "Restaurant directory"),
        (name = "Reviews", description = "Restaurant reviews"),
        (name = "Archives", description = "Snapshots of deleted records"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());
    with_docs(router)
}

#[cfg(feature = "swagger-ui")]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
}

#[cfg(not(feature = "swagger-ui"))]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_resource_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/restaurants",
            "/api/v1/restaurants/{id}",
            "/api/v1/restaurants/{id}/reviews",
            "/api/v1/reviews/{id}",
            "/api/v1/archives",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
