//! Reference entities (countries, cities, agencies, speakers)
//!
//! The backend is the system of record; these are transient, request-scoped
//! copies. Backend payloads differ per table (`country`, `city`, `nombre`,
//! `name`; nested or flat country references; numbers or decimal strings for
//! coordinates), so parsing is done field by field from JSON values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use fela_common::ReferenceKind;

/// Latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and within WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Canonical place descriptor held by drafts (`countryData` / `cityData`)
///
/// Only complete when both coordinates are present; a record restored from
/// an older draft may carry a name without coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceData {
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub created_now: bool,
}

impl PlaceData {
    /// Place that already existed in the reference store
    pub fn existing(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: name.into(),
            lat: Some(coordinates.lat),
            lon: Some(coordinates.lon),
            is_new: false,
            created_now: false,
        }
    }

    /// Place created in the reference store by the current resolution
    pub fn created(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: name.into(),
            lat: Some(coordinates.lat),
            lon: Some(coordinates.lon),
            is_new: true,
            created_now: true,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                let coords = Coordinates::new(lat, lon);
                coords.is_valid().then_some(coords)
            }
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && self.coordinates().is_some()
    }
}

/// Reference record as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    pub kind: ReferenceKind,
    /// Backend primary key (countries are keyed by name and may omit it)
    pub id: Option<i64>,
    pub name: String,
    pub coordinates: Option<Coordinates>,
    /// Owning country (cities) or home country (speakers)
    pub country: Option<String>,
    /// Coordinates of `country` when the backend nests the country record
    pub country_coordinates: Option<Coordinates>,
    /// Speaker's agency
    pub agency: Option<String>,
}

impl ReferenceEntity {
    pub fn new(kind: ReferenceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: None,
            name: name.into(),
            coordinates: None,
            country: None,
            country_coordinates: None,
            agency: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_agency(mut self, agency: impl Into<String>) -> Self {
        self.agency = Some(agency.into());
        self
    }

    /// Build a `PlaceData` for countries and cities that carry coordinates
    pub fn place_data(&self, is_new: bool, created_now: bool) -> Option<PlaceData> {
        let coords = self.coordinates.filter(Coordinates::is_valid)?;
        Some(PlaceData {
            name: self.name.clone(),
            lat: Some(coords.lat),
            lon: Some(coords.lon),
            is_new,
            created_now,
        })
    }

    /// A speaker's country as a `PlaceData`, when the backend nested it
    pub fn country_place(&self) -> Option<PlaceData> {
        let name = self.country.as_ref()?;
        let coords = self.country_coordinates.filter(Coordinates::is_valid)?;
        Some(PlaceData::existing(name.clone(), coords))
    }

    /// Parse one backend record of the given kind
    pub fn from_backend(kind: ReferenceKind, value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = obj.get("id").and_then(parse_id);

        let name = match kind {
            ReferenceKind::Country => text_field(value, &["country", "name"]),
            ReferenceKind::City => text_field(value, &["city", "name"]),
            ReferenceKind::Agency => text_field(value, &["nombre", "name"]),
            ReferenceKind::Speaker => text_field(value, &["name"]),
        }?;

        let mut entity = Self::new(kind, name);
        entity.id = id;
        entity.coordinates = coordinates_of(value);

        match kind {
            ReferenceKind::City => {
                if let Some(country) = obj.get("country") {
                    entity.country = nested_name(country, &["country", "name"]);
                    entity.country_coordinates = coordinates_of(country);
                }
            }
            ReferenceKind::Speaker => {
                if let Some(country) = obj.get("country_s").or_else(|| obj.get("country")) {
                    entity.country = nested_name(country, &["country", "name"]);
                    entity.country_coordinates = coordinates_of(country);
                }
                if let Some(agency) = obj.get("agency_s").or_else(|| obj.get("agency")) {
                    entity.agency = nested_name(agency, &["nombre", "name"])
                        .filter(|a| !a.trim().is_empty());
                }
            }
            ReferenceKind::Country | ReferenceKind::Agency => {}
        }

        Some(entity)
    }
}

/// Accept ids as JSON numbers or numeric strings
pub(crate) fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accept coordinates as JSON numbers or decimal strings
pub(crate) fn parse_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Name of a reference that may be a plain string or a nested record
fn nested_name(value: &Value, keys: &[&str]) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(_) => text_field(value, keys),
        _ => None,
    }
}

fn coordinates_of(value: &Value) -> Option<Coordinates> {
    let lat = value.get("lat").and_then(parse_float)?;
    let lon = value
        .get("lon")
        .or_else(|| value.get("lng"))
        .and_then(parse_float)?;
    Some(Coordinates::new(lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_country_with_decimal_strings() {
        let entity = ReferenceEntity::from_backend(
            ReferenceKind::Country,
            &json!({"country": "Spain", "lat": "40.4168", "lon": "-3.7038"}),
        )
        .unwrap();
        assert_eq!(entity.name, "Spain");
        assert_eq!(entity.id, None);
        assert_eq!(entity.coordinates, Some(Coordinates::new(40.4168, -3.7038)));
    }

    #[test]
    fn test_parse_city_with_nested_country() {
        let entity = ReferenceEntity::from_backend(
            ReferenceKind::City,
            &json!({"id": 4, "city": "Quito", "lat": -0.18, "lon": -78.47,
                    "country": {"country": "Ecuador", "lat": -1.8, "lon": -78.2}}),
        )
        .unwrap();
        assert_eq!(entity.id, Some(4));
        assert_eq!(entity.country.as_deref(), Some("Ecuador"));
        assert_eq!(entity.country_coordinates, Some(Coordinates::new(-1.8, -78.2)));
    }

    #[test]
    fn test_parse_speaker_variants() {
        let nested = ReferenceEntity::from_backend(
            ReferenceKind::Speaker,
            &json!({"id": "12", "name": "Ana Ruiz",
                    "country_s": {"country": "Chile", "lat": -35.7, "lon": -71.5},
                    "agency_s": "CEPAL"}),
        )
        .unwrap();
        assert_eq!(nested.id, Some(12));
        assert_eq!(nested.agency.as_deref(), Some("CEPAL"));
        assert_eq!(
            nested.country_place(),
            Some(PlaceData::existing("Chile", Coordinates::new(-35.7, -71.5)))
        );

        let flat = ReferenceEntity::from_backend(
            ReferenceKind::Speaker,
            &json!({"id": 3, "name": "Luis", "country_s": "Peru", "agency_s": ""}),
        )
        .unwrap();
        assert_eq!(flat.country.as_deref(), Some("Peru"));
        assert_eq!(flat.country_place(), None);
        assert_eq!(flat.agency, None);
    }

    #[test]
    fn test_parse_rejects_nameless_records() {
        assert!(ReferenceEntity::from_backend(ReferenceKind::Agency, &json!({"id": 1})).is_none());
        assert!(ReferenceEntity::from_backend(ReferenceKind::Agency, &json!("UNESCO")).is_none());
    }

    #[test]
    fn test_place_data_completeness() {
        let place = PlaceData::created("Andorra", Coordinates::new(42.5, 1.5));
        assert!(place.is_complete());
        assert!(place.is_new && place.created_now);

        let missing = PlaceData {
            lon: None,
            ..place.clone()
        };
        assert!(!missing.is_complete());

        let out_of_range = PlaceData {
            lat: Some(123.0),
            ..place
        };
        assert!(!out_of_range.is_complete());
    }

    #[test]
    fn test_place_data_camel_case() {
        let json = serde_json::to_value(PlaceData::created("Andorra", Coordinates::new(42.5, 1.5)))
            .unwrap();
        assert_eq!(
            json,
            json!({"name": "Andorra", "lat": 42.5, "lon": 1.5, "isNew": true, "createdNow": true})
        );
    }
}
