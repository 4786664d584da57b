//! Restaurant aggregate and its create/update payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AuditFields;

/// A restaurant listed in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Restaurant {
    /// Identity and audit trail.
    #[serde(flatten)]
    pub audit: AuditFields,
    /// Display name.
    pub name: String,
    /// City the restaurant is located in.
    pub city: String,
    /// Street address.
    pub address: Option<String>,
    /// Cuisine label (e.g. `"boyacense"`).
    pub cuisine: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// WGS84 latitude.
    pub latitude: Option<f64>,
    /// WGS84 longitude.
    pub longitude: Option<f64>,
}

/// Fields supplied when creating a restaurant.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewRestaurant {
    /// Display name (required, non-empty).
    pub name: String,
    /// City (required, non-empty).
    pub city: String,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// Cuisine label.
    #[serde(default)]
    pub cuisine: Option<String>,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// WGS84 latitude.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// WGS84 longitude.
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl NewRestaurant {
    /// Convenience constructor for the two required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            city: city.into(),
            ..Self::default()
        }
    }

    /// Checks required fields and coordinate ranges.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name)?;
        require_text("city", &self.city)?;
        check_coordinates(self.latitude, self.longitude)
    }
}

/// Partial update for a restaurant. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RestaurantPatch {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New city.
    #[serde(default)]
    pub city: Option<String>,
    /// New street address.
    #[serde(default)]
    pub address: Option<String>,
    /// New cuisine label.
    #[serde(default)]
    pub cuisine: Option<String>,
    /// New phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// New latitude.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// New longitude.
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl RestaurantPatch {
    /// Checks that provided fields are acceptable.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(city) = &self.city {
            require_text("city", city)?;
        }
        check_coordinates(self.latitude, self.longitude)
    }
}

impl Restaurant {
    /// Builds a restaurant from its audit fields and creation payload.
    #[must_use]
    pub fn from_new(audit: AuditFields, new: NewRestaurant) -> Self {
        Self {
            audit,
            name: new.name,
            city: new.city,
            address: new.address,
            cuisine: new.cuisine,
            phone: new.phone,
            latitude: new.latitude,
            longitude: new.longitude,
        }
    }

    /// Applies every `Some` field of `patch`.
    pub fn apply(&mut self, patch: RestaurantPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(city) = patch.city {
            self.city = city;
        }
        if patch.address.is_some() {
            self.address = patch.address;
        }
        if patch.cuisine.is_some() {
            self.cuisine = patch.cuisine;
        }
        if patch.phone.is_some() {
            self.phone = patch.phone;
        }
        if patch.latitude.is_some() {
            self.latitude = patch.latitude;
        }
        if patch.longitude.is_some() {
            self.longitude = patch.longitude;
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

fn check_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), String> {
    if let Some(lat) = latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        return Err(format!("latitude {lat} out of range"));
    }
    if let Some(lon) = longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        return Err(format!("longitude {lon} out of range"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_restaurant_requires_name_and_city() {
        assert!(NewRestaurant::new("Test", "Tunja").validate().is_ok());
        assert!(NewRestaurant::new("", "Tunja").validate().is_err());
        assert!(NewRestaurant::new("Test", "  ").validate().is_err());
    }

    #[test]
    fn coordinates_are_range_checked() {
        let mut new = NewRestaurant::new("Test", "Tunja");
        new.latitude = Some(91.0);
        assert!(new.validate().is_err());
        new.latitude = Some(5.53);
        new.longitude = Some(-73.36);
        assert!(new.validate().is_ok());
    }

    #[test]
    fn apply_only_touches_provided_fields() {
        let mut restaurant =
            Restaurant::from_new(AuditFields::new("u1"), NewRestaurant::new("Test", "Tunja"));
        restaurant.apply(RestaurantPatch {
            cuisine: Some("boyacense".to_string()),
            ..RestaurantPatch::default()
        });
        assert_eq!(restaurant.name, "Test");
        assert_eq!(restaurant.city, "Tunja");
        assert_eq!(restaurant.cuisine.as_deref(), Some("boyacense"));
    }

    #[test]
    fn json_form_flattens_audit_fields() {
        let restaurant =
            Restaurant::from_new(AuditFields::new("u1"), NewRestaurant::new("Test", "Tunja"));
        let json = serde_json::to_value(&restaurant).ok();
        let id = json
            .as_ref()
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        assert_eq!(id.as_deref(), Some(restaurant.audit.id.as_str()));
    }

    #[test]
    fn patch_rejects_blank_name() {
        let patch = RestaurantPatch {
            name: Some(String::new()),
            ..RestaurantPatch::default()
        };
        assert!(patch.validate().is_err());
    }
}
