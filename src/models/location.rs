//! Location model: where a reading is fetched for and where that place came from

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a bound business record (e.g. an account)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user on whose behalf the widget runs when no entity is bound
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both values fall inside the valid WGS84 ranges
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Format as "lat, lon" with four decimals
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// What we know about the place to look weather up for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Place {
    Coordinates(Coordinates),
    CityCountry { city: String, country: String },
    #[default]
    Unresolved,
}

impl Place {
    /// Build a place from loose address fields.
    ///
    /// Coordinates win when both are present; otherwise city and country are
    /// used when both are non-empty. Anything less is `Unresolved`.
    #[must_use]
    pub fn from_fields(
        latitude: Option<f64>,
        longitude: Option<f64>,
        city: Option<&str>,
        country: Option<&str>,
    ) -> Self {
        if let (Some(latitude), Some(longitude)) = (latitude, longitude) {
            return Self::Coordinates(Coordinates::new(latitude, longitude));
        }

        match (non_blank(city), non_blank(country)) {
            (Some(city), Some(country)) => Self::CityCountry {
                city: city.to_string(),
                country: country.to_string(),
            },
            _ => Self::Unresolved,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinates(coords) => f.write_str(&coords.format_coordinates()),
            Self::CityCountry { city, country } => write!(f, "{city}, {country}"),
            Self::Unresolved => f.write_str("unresolved"),
        }
    }
}

/// Which origin produced the current location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LocationSource {
    Entity,
    Device,
    #[default]
    None,
}

/// A place together with the source it was resolved from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Location {
    pub place: Place,
    pub source: LocationSource,
}

impl Location {
    #[must_use]
    pub fn new(place: Place, source: LocationSource) -> Self {
        Self { place, source }
    }

    #[must_use]
    pub fn from_entity(place: Place) -> Self {
        Self::new(place, LocationSource::Entity)
    }

    #[must_use]
    pub fn from_device(coordinates: Coordinates) -> Self {
        Self::new(Place::Coordinates(coordinates), LocationSource::Device)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_take_precedence_over_city() {
        let place = Place::from_fields(Some(48.85), Some(2.35), Some("Paris"), Some("France"));
        assert_eq!(place, Place::Coordinates(Coordinates::new(48.85, 2.35)));
    }

    #[test]
    fn test_half_coordinates_fall_back_to_city() {
        let place = Place::from_fields(Some(48.85), None, Some("Paris"), Some("France"));
        assert_eq!(
            place,
            Place::CityCountry {
                city: "Paris".to_string(),
                country: "France".to_string()
            }
        );
    }

    #[test]
    fn test_nothing_usable_is_unresolved() {
        assert_eq!(Place::from_fields(None, None, Some("Paris"), None), Place::Unresolved);
        assert_eq!(Place::from_fields(None, None, Some(" "), Some("France")), Place::Unresolved);
        assert!(!Place::Unresolved.is_resolved());
    }

    #[test]
    fn test_coordinate_ranges() {
        assert!(Coordinates::new(46.8182, 8.2275).is_valid());
        assert!(!Coordinates::new(91.0, 8.0).is_valid());
        assert!(!Coordinates::new(46.0, -181.0).is_valid());
        assert_eq!(Coordinates::new(46.818_23, 8.2275).format_coordinates(), "46.8182, 8.2275");
    }
}
