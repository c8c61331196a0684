//! Catalogue records (events and presentations) and their query filters

use super::reference::parse_id;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Event as listed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    #[serde(alias = "event_title")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub year: Option<i32>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default, alias = "country_e")]
    pub country: Option<String>,
    #[serde(default, alias = "city_e")]
    pub city: Option<String>,
}

impl EventRecord {
    /// One-line label used when picking a target event
    pub fn label(&self) -> String {
        format!(
            "{} ({}) - {}",
            self.title,
            self.year.map_or_else(|| "N/A".to_string(), |y| y.to_string()),
            self.country.as_deref().unwrap_or("N/A")
        )
    }
}

/// Speaker reference nested in a presentation listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PresentationSpeaker {
    Record {
        #[serde(default)]
        id: Option<i64>,
        name: String,
    },
    Name(String),
}

impl PresentationSpeaker {
    pub fn name(&self) -> &str {
        match self {
            PresentationSpeaker::Record { name, .. } => name,
            PresentationSpeaker::Name(name) => name,
        }
    }
}

/// Presentation as listed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub event_title: Option<String>,
    #[serde(default)]
    pub event_country: Option<String>,
    #[serde(default, deserialize_with = "lenient_languages")]
    pub language: Vec<String>,
    #[serde(default, alias = "url_document")]
    pub url: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub speakers: Vec<PresentationSpeaker>,
}

impl PresentationRecord {
    pub fn label(&self) -> String {
        let speakers: Vec<&str> = self.speakers.iter().map(PresentationSpeaker::name).collect();
        format!(
            "{} | {} ({}) | {}",
            self.title,
            self.event_title.as_deref().unwrap_or("N/A"),
            self.event_country.as_deref().unwrap_or("N/A"),
            if speakers.is_empty() {
                "N/A".to_string()
            } else {
                speakers.join(", ")
            }
        )
    }
}

/// `{id, ...}` reply of a create call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    #[serde(deserialize_with = "strict_id")]
    pub id: i64,
}

/// Body of `POST /presentations/`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPresentation {
    pub title: String,
    pub event_title: String,
    pub language: Vec<String>,
    pub url_document: String,
    pub observations: String,
}

impl NewPresentation {
    pub fn new(
        title: &str,
        event_title: &str,
        languages: &BTreeSet<String>,
        url: Option<&str>,
        observations: Option<&str>,
    ) -> Self {
        Self {
            title: title.trim().to_string(),
            event_title: event_title.to_string(),
            language: languages.iter().cloned().collect(),
            url_document: url.unwrap_or_default().trim().to_string(),
            observations: observations.unwrap_or_default().trim().to_string(),
        }
    }
}

/// Filters for `GET /events/`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilters {
    pub search: Option<String>,
    pub year: Option<i32>,
    pub country: Option<String>,
    pub event_type: Option<String>,
}

impl EventFilters {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_text(&mut pairs, "search", self.search.as_deref());
        if let Some(year) = self.year {
            pairs.push(("year", year.to_string()));
        }
        push_text(&mut pairs, "country", self.country.as_deref());
        push_text(&mut pairs, "type", self.event_type.as_deref());
        pairs
    }
}

/// Filters for `GET /presentations/`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentationFilters {
    pub event_id: Option<i64>,
    pub search: Option<String>,
    pub event_title: Option<String>,
    pub speaker_id: Option<i64>,
    pub language: Option<String>,
}

impl PresentationFilters {
    pub fn for_event(event_id: i64) -> Self {
        Self {
            event_id: Some(event_id),
            ..Default::default()
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.event_id {
            pairs.push(("event_id", id.to_string()));
        }
        push_text(&mut pairs, "search", self.search.as_deref());
        push_text(&mut pairs, "event_title", self.event_title.as_deref());
        if let Some(id) = self.speaker_id {
            pairs.push(("speaker_id", id.to_string()));
        }
        push_text(&mut pairs, "language", self.language.as_deref());
        pairs
    }
}

fn push_text(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        pairs.push((key, value.to_string()));
    }
}

fn lenient_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(parse_id)
        .and_then(|v| i32::try_from(v).ok()))
}

fn strict_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    parse_id(&value).ok_or_else(|| serde::de::Error::custom("id is not an integer"))
}

/// Languages arrive as a list or as a comma-separated string
fn lenient_languages<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    })
}
