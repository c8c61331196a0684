//! Geocoding client (Nominatim text search)
//!
//! Results arrive with coordinates encoded as strings and with the place name
//! buried in `display_name` or `address`; both are normalized into
//! `ExternalPlace`. Requests are rate limited client-side.

use crate::error::GeocodingError;
use crate::models::{ExternalPlace, ReferenceKind};
use async_trait::async_trait;
use fela_common::config::FelaConfig;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

const COUNTRY_LIMIT: u32 = 5;
const CITY_LIMIT: u32 = 10;
const CITY_TYPES: [&str; 4] = ["city", "town", "village", "municipality"];

/// Public geocoding index
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Candidates for a dropdown; only countries and cities are geocoded
    async fn search_place(
        &self,
        kind: ReferenceKind,
        text: &str,
        scope_country: Option<&str>,
    ) -> Result<Vec<ExternalPlace>, GeocodingError>;

    /// Candidates for lazy validation, where the first result wins
    async fn geocode(
        &self,
        kind: ReferenceKind,
        text: &str,
        scope_country: Option<&str>,
    ) -> Result<Vec<ExternalPlace>, GeocodingError> {
        self.search_place(kind, text, scope_country).await
    }
}

/// Raw Nominatim search result
#[derive(Debug, Clone, Deserialize)]
pub struct NominatimPlace {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "class")]
    pub class: Option<String>,
    #[serde(default, rename = "type")]
    pub place_type: Option<String>,
    #[serde(default)]
    pub address: HashMap<String, String>,
}

impl NominatimPlace {
    fn is_country_like(&self) -> bool {
        self.place_type.as_deref() == Some("administrative")
            || self.class.as_deref() == Some("boundary")
    }

    fn is_city_like(&self) -> bool {
        self.place_type
            .as_deref()
            .is_some_and(|t| CITY_TYPES.contains(&t))
    }

    fn first_label_segment(&self) -> &str {
        self.display_name.split(',').next().unwrap_or("").trim()
    }

    fn city_name(&self) -> Option<String> {
        ["city", "town", "village"]
            .iter()
            .find_map(|key| self.address.get(*key))
            .cloned()
            .or_else(|| self.name.clone())
            .filter(|n| !n.trim().is_empty())
    }

    fn to_external(&self, name: String) -> Option<ExternalPlace> {
        let lat = self.lat.trim().parse::<f64>().ok()?;
        let lon = self.lon.trim().parse::<f64>().ok()?;
        Some(ExternalPlace {
            name,
            lat,
            lon,
            raw_label: self.display_name.clone(),
            country: self.address.get("country").cloned(),
        })
    }
}

/// Keep dropdown-worthy results and normalize them
pub fn filter_results(kind: ReferenceKind, raw: &[NominatimPlace]) -> Vec<ExternalPlace> {
    raw.iter()
        .filter_map(|place| match kind {
            ReferenceKind::Country if place.is_country_like() => {
                place.to_external(place.first_label_segment().to_string())
            }
            ReferenceKind::City if place.is_city_like() => {
                place.to_external(place.city_name()?)
            }
            _ => None,
        })
        .filter(|p| !p.name.is_empty())
        .collect()
}

/// Normalize every result, in service order
pub fn unfiltered_results(kind: ReferenceKind, raw: &[NominatimPlace]) -> Vec<ExternalPlace> {
    raw.iter()
        .filter_map(|place| {
            let name = match kind {
                ReferenceKind::City => place
                    .city_name()
                    .unwrap_or_else(|| place.first_label_segment().to_string()),
                _ => place.first_label_segment().to_string(),
            };
            place.to_external(name)
        })
        .collect()
}

/// Query string for a search of the given kind
pub fn search_params(
    kind: ReferenceKind,
    text: &str,
    scope_country: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("format", "json".to_string()),
        ("addressdetails", "1".to_string()),
    ];
    match kind {
        ReferenceKind::City => {
            params.push(("city", text.trim().to_string()));
            if let Some(country) = scope_country.map(str::trim).filter(|c| !c.is_empty()) {
                params.push(("country", country.to_string()));
            }
            params.push(("limit", CITY_LIMIT.to_string()));
        }
        _ => {
            params.push(("country", text.trim().to_string()));
            params.push(("limit", COUNTRY_LIMIT.to_string()));
        }
    }
    params
}

/// Nominatim client
pub struct NominatimClient {
    client: Client,
    base_url: String,
    accept_language: String,
    /// Nominatim usage policy allows at most 1 request/second
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl NominatimClient {
    pub fn new(config: &FelaConfig) -> Result<Self, GeocodingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.geocoding_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GeocodingError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.geocoding_requests_per_second)
            .unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: config.geocoding_url.trim_end_matches('/').to_string(),
            accept_language: config.accept_language.clone(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    async fn fetch(
        &self,
        kind: ReferenceKind,
        text: &str,
        scope_country: Option<&str>,
    ) -> Result<Vec<NominatimPlace>, GeocodingError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/search", self.base_url);
        debug!(kind = %kind, text = %text, scope = ?scope_country, "Querying geocoding service");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT_LANGUAGE, &self.accept_language)
            .query(&search_params(kind, text, scope_country))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(GeocodingError::RateLimited);
        }
        if !status.is_success() {
            return Err(GeocodingError::Status(status.as_u16()));
        }

        response
            .json::<Vec<NominatimPlace>>()
            .await
            .map_err(|e| GeocodingError::Parse(e.to_string()))
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn search_place(
        &self,
        kind: ReferenceKind,
        text: &str,
        scope_country: Option<&str>,
    ) -> Result<Vec<ExternalPlace>, GeocodingError> {
        if !kind.has_coordinates() || text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.fetch(kind, text, scope_country).await?;
        Ok(filter_results(kind, &raw))
    }

    async fn geocode(
        &self,
        kind: ReferenceKind,
        text: &str,
        scope_country: Option<&str>,
    ) -> Result<Vec<ExternalPlace>, GeocodingError> {
        if !kind.has_coordinates() || text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.fetch(kind, text, scope_country).await?;
        Ok(unfiltered_results(kind, &raw))
    }
}
