//! Shared DTO types used across multiple endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Items on this page.
    pub returned: usize,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    /// Clamps `per_page` to the allowed maximum of 100.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 100),
        }
    }

    /// Rows to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Rows to return.
    #[must_use]
    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }

    /// Metadata for a page that returned `returned` items.
    #[must_use]
    pub const fn meta(&self, returned: usize) -> PaginationMeta {
        PaginationMeta {
            page: self.page,
            per_page: self.per_page,
            returned,
        }
    }

    /// Removes `page` and `per_page` from raw query parameters, leaving the
    /// remaining keys to be interpreted as filters.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] if either value is not a
    /// positive integer.
    pub fn take_from(query: &mut BTreeMap<String, String>) -> Result<Self, ApiError> {
        let mut params = Self::default();
        if let Some(page) = query.remove("page") {
            params.page = parse_positive("page", &page)?;
        }
        if let Some(per_page) = query.remove("per_page") {
            params.per_page = parse_positive("per_page", &per_page)?;
        }
        Ok(params.clamped())
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u32, ApiError> {
    raw.parse::<u32>()
        .map_err(|_| ApiError::InvalidRequest(format!("{key} must be a positive integer")))
}

/// Optional free-form reason attached to a deletion.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteParams {
    /// Reason recorded in the archive.
    #[serde(default)]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_follows_page() {
        let params = PaginationParams {
            page: 3,
            per_page: 10,
        };
        assert_eq!(params.offset(), 20);
        assert_eq!(params.limit(), 10);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let params = PaginationParams {
            page: 0,
            per_page: 1000,
        }
        .clamped();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn take_from_leaves_filters() {
        let mut query = BTreeMap::from([
            ("page".to_string(), "2".to_string()),
            ("city".to_string(), "Tunja".to_string()),
        ]);
        let params = PaginationParams::take_from(&mut query);
        assert!(matches!(params, Ok(PaginationParams { page: 2, per_page: 20 })));
        assert_eq!(query.len(), 1);
        assert!(query.contains_key("city"));

        let mut bad = BTreeMap::from([("per_page".to_string(), "many".to_string())]);
        assert!(PaginationParams::take_from(&mut bad).is_err());
    }
}
