//! Acting-user extraction.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

/// Header carrying the acting user's identifier.
pub const ACTOR_HEADER: &str = "x-user-id";

/// Identifier of the user performing a write, recorded in audit fields and
/// archive records. Taken verbatim from the `X-User-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Self(value.to_string()))
            .ok_or(ApiError::MissingActor)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Actor, ApiError> {
        let (mut parts, ()) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_trimmed_header() {
        let Ok(request) = Request::builder().header("X-User-Id", " u42 ").body(()) else {
            panic!("request");
        };
        let Ok(actor) = extract(request).await else {
            panic!("actor expected");
        };
        assert_eq!(actor.as_str(), "u42");
    }

    #[tokio::test]
    async fn missing_or_blank_header_is_rejected() {
        let Ok(request) = Request::builder().body(()) else {
            panic!("request");
        };
        assert!(matches!(extract(request).await, Err(ApiError::MissingActor)));
        let Ok(request) = Request::builder().header("X-User-Id", "  ").body(()) else {
            panic!("request");
        };
        assert!(extract(request).await.is_err());
    }
}
