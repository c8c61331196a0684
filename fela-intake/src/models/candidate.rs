//! Suggestion candidates
//!
//! A candidate lives only for one dropdown render and is discarded on
//! selection or blur.

use super::reference::{Coordinates, ReferenceEntity, ReferenceKind};
use serde::{Deserialize, Serialize};

/// Where a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    /// Backend reference table
    Local,
    /// Public geocoding index
    External,
}

/// Place returned by the geocoding service, normalized across result shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalPlace {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Full label as returned by the service (`display_name`)
    pub raw_label: String,
    /// Country reported by the service for city results
    #[serde(default)]
    pub country: Option<String>,
}

impl ExternalPlace {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }
}

/// One suggestion for an input field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "record", rename_all = "lowercase")]
pub enum CandidateResult {
    Local(ReferenceEntity),
    External(ExternalPlace),
}

impl CandidateResult {
    pub fn source(&self) -> CandidateSource {
        match self {
            CandidateResult::Local(_) => CandidateSource::Local,
            CandidateResult::External(_) => CandidateSource::External,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CandidateResult::Local(entity) => &entity.name,
            CandidateResult::External(place) => &place.name,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            CandidateResult::Local(entity) => entity.coordinates,
            CandidateResult::External(place) => Some(place.coordinates()),
        }
    }

    /// Dropdown label for this candidate
    pub fn label(&self, kind: ReferenceKind) -> String {
        match (self, kind) {
            (CandidateResult::Local(e), ReferenceKind::Country) => match e.coordinates {
                Some(c) => format!("{} 📍 {}, {}", e.name, c.lat, c.lon),
                None => e.name.clone(),
            },
            (CandidateResult::Local(e), ReferenceKind::City) => match &e.country {
                Some(country) => format!("{}, {}", e.name, country),
                None => e.name.clone(),
            },
            (CandidateResult::Local(e), ReferenceKind::Speaker) => match &e.country {
                Some(country) => format!("{} ({})", e.name, country),
                None => e.name.clone(),
            },
            (CandidateResult::Local(e), ReferenceKind::Agency) => e.name.clone(),
            (CandidateResult::External(p), ReferenceKind::City) => match &p.country {
                Some(country) => format!("{}, {} 🌍 (Nominatim)", p.name, country),
                None => format!("{} 🌍 (Nominatim)", p.name),
            },
            (CandidateResult::External(p), ReferenceKind::Country) => {
                format!("{} 🌍 (Nominatim)", p.name)
            }
            (CandidateResult::External(p), _) => p.raw_label.clone(),
        }
    }
}
