//! Draft records held in client memory until submission
//!
//! Drafts are plain values. Speaker descriptors are never edited in place:
//! every transition returns a new descriptor that replaces the old one
//! wholesale, so a half-updated descriptor is never observable.

use super::reference::{PlaceData, ReferenceEntity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Speaker row model (`SpeakerDescriptor`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeakerDescriptor {
    /// Bound backend speaker; when set, name/country/agency are authoritative
    pub id: Option<i64>,
    pub name: String,
    /// Free-text country name as typed
    pub country: String,
    pub country_data: Option<PlaceData>,
    pub agency: Option<String>,
}

impl SpeakerDescriptor {
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
            ..Default::default()
        }
    }

    /// Bind to an existing backend speaker picked from the dropdown
    pub fn from_existing(entity: &ReferenceEntity) -> Self {
        let country_data = entity.country_place();
        Self {
            id: entity.id,
            name: entity.name.clone(),
            country: entity
                .country
                .clone()
                .or_else(|| country_data.as_ref().map(|c| c.name.clone()))
                .unwrap_or_default(),
            country_data,
            agency: entity.agency.clone(),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.id.is_some()
    }

    /// Nothing typed and nothing bound
    pub fn is_blank(&self) -> bool {
        self.id.is_none()
            && self.name.trim().is_empty()
            && self.country.trim().is_empty()
            && self.agency.as_deref().map_or(true, |a| a.trim().is_empty())
    }

    /// Submit-ready only with complete country coordinates
    pub fn is_submit_ready(&self) -> bool {
        !self.name.trim().is_empty()
            && self.country_data.as_ref().is_some_and(PlaceData::is_complete)
    }

    /// Country and agency inputs are read-only while bound to a backend speaker
    pub fn sub_fields_locked(&self) -> bool {
        self.is_bound()
    }

    /// Country input is read-only once bound or resolved
    pub fn country_locked(&self) -> bool {
        self.is_bound() || self.country_data.as_ref().is_some_and(PlaceData::is_complete)
    }

    /// Typing into the name field
    ///
    /// A name that differs from the bound one releases the binding and
    /// unlocks the sibling fields; their values stay as they were.
    pub fn with_name_input(&self, text: &str) -> Self {
        let mut next = self.clone();
        if self.is_bound() && text.trim() != self.name.trim() {
            next.id = None;
        }
        next.name = text.to_string();
        next
    }

    /// Typing into the country field; `None` when the field is locked.
    ///
    /// Clearing the field drops cached country data and re-enables it.
    pub fn with_country_input(&self, text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if self.is_bound() {
            return None;
        }
        if trimmed.is_empty() {
            return Some(Self {
                country: String::new(),
                country_data: None,
                ..self.clone()
            });
        }
        if self.country_locked() {
            return None;
        }
        let keep = self
            .country_data
            .as_ref()
            .is_some_and(|data| data.name == trimmed);
        Some(Self {
            country: text.to_string(),
            country_data: if keep { self.country_data.clone() } else { None },
            ..self.clone()
        })
    }

    /// Typing into the agency field; `None` when the field is locked
    pub fn with_agency_input(&self, text: &str) -> Option<Self> {
        if self.is_bound() {
            return None;
        }
        let trimmed = text.trim();
        Some(Self {
            agency: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            ..self.clone()
        })
    }

    /// Replace the country with a resolved place
    pub fn with_country_data(&self, place: PlaceData) -> Self {
        Self {
            country: place.name.clone(),
            country_data: Some(place),
            ..self.clone()
        }
    }
}

/// Presentation being drafted (`PresentationDraft`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresentationDraft {
    pub title: String,
    pub languages: BTreeSet<String>,
    pub url: Option<String>,
    pub observations: Option<String>,
    pub speakers: Vec<SpeakerDescriptor>,
}

impl PresentationDraft {
    /// New presentation with one empty speaker row
    pub fn with_blank_speaker() -> Self {
        Self {
            speakers: vec![SpeakerDescriptor::default()],
            ..Default::default()
        }
    }

    /// Add a language chip; blanks and duplicates are ignored
    pub fn add_language(&mut self, language: &str) -> bool {
        let language = language.trim();
        !language.is_empty() && self.languages.insert(language.to_string())
    }

    pub fn remove_language(&mut self, language: &str) -> bool {
        self.languages.remove(language.trim())
    }

    /// Speakers that carry any input
    pub fn filled_speakers(&self) -> impl Iterator<Item = (usize, &SpeakerDescriptor)> {
        self.speakers.iter().enumerate().filter(|(_, s)| !s.is_blank())
    }
}

/// Event being drafted (`EventDraft`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventDraft {
    pub country: Option<PlaceData>,
    pub city: Option<PlaceData>,
    pub date: String,
    pub year: Option<i32>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub title: String,
    pub agencies: BTreeSet<String>,
    pub presentations: Vec<PresentationDraft>,
}

impl EventDraft {
    /// Backend payload for `POST /events/create-complete/`
    ///
    /// Returns `None` unless country, city and year are present with
    /// coordinates; callers validate first.
    pub fn to_payload(&self) -> Option<CreateCompletePayload> {
        let country = self.country.as_ref()?;
        let city = self.city.as_ref()?;
        let country_coords = country.coordinates()?;
        let city_coords = city.coordinates()?;

        Some(CreateCompletePayload {
            country: country.name.clone(),
            city: city.name.clone(),
            country_lat: country_coords.lat,
            country_lon: country_coords.lon,
            city_lat: city_coords.lat,
            city_lon: city_coords.lon,
            date: self.date.trim().to_string(),
            year: self.year?,
            event_type: self.event_type.trim().to_string(),
            event_title: self.title.trim().to_string(),
            agencies: self.agencies.iter().cloned().collect(),
            presentations: self
                .presentations
                .iter()
                .map(|p| PresentationPayload {
                    title: p.title.trim().to_string(),
                    language: p.languages.iter().cloned().collect(),
                    url: p.url.clone().unwrap_or_default(),
                    observations: p.observations.clone().unwrap_or_default(),
                    speakers: p
                        .filled_speakers()
                        .map(|(_, s)| SpeakerPayload {
                            id: s.id,
                            name: s.name.trim().to_string(),
                            country: s
                                .country_data
                                .as_ref()
                                .map(|c| c.name.clone())
                                .unwrap_or_else(|| s.country.trim().to_string()),
                            agency: s.agency.clone().unwrap_or_default(),
                        })
                        .collect(),
                })
                .collect(),
        })
    }
}

/// Nested create payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateCompletePayload {
    pub country: String,
    pub city: String,
    pub country_lat: f64,
    pub country_lon: f64,
    pub city_lat: f64,
    pub city_lon: f64,
    pub date: String,
    pub year: i32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub event_title: String,
    pub agencies: Vec<String>,
    pub presentations: Vec<PresentationPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationPayload {
    pub title: String,
    pub language: Vec<String>,
    pub url: String,
    pub observations: String,
    pub speakers: Vec<SpeakerPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerPayload {
    pub id: Option<i64>,
    pub name: String,
    pub country: String,
    pub agency: String,
}
