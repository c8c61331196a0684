//! Field paths, place fields and resolver requests

use crate::error::ResolutionError;
use crate::models::{CandidateResult, PlaceData, ReferenceKind};
use crate::services::{EntityResolver, Resolution};
use serde::Serialize;
use std::fmt;

/// Address of one input in a form, for inline error display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldPath {
    EventCountry,
    EventCity,
    EventYear,
    EventTitle,
    Presentations,
    TargetEvent,
    TargetPresentation,
    PresentationTitle { presentation: usize },
    PresentationSpeakers { presentation: usize },
    SpeakerName { presentation: usize, speaker: usize },
    SpeakerCountry { presentation: usize, speaker: usize },
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::EventCountry => write!(f, "country"),
            FieldPath::EventCity => write!(f, "city"),
            FieldPath::EventYear => write!(f, "year"),
            FieldPath::EventTitle => write!(f, "title"),
            FieldPath::Presentations => write!(f, "presentations"),
            FieldPath::TargetEvent => write!(f, "event"),
            FieldPath::TargetPresentation => write!(f, "presentation"),
            FieldPath::PresentationTitle { presentation } => {
                write!(f, "presentation #{} title", presentation + 1)
            }
            FieldPath::PresentationSpeakers { presentation } => {
                write!(f, "presentation #{} speakers", presentation + 1)
            }
            FieldPath::SpeakerName {
                presentation,
                speaker,
            } => write!(
                f,
                "presentation #{} speaker #{} name",
                presentation + 1,
                speaker + 1
            ),
            FieldPath::SpeakerCountry {
                presentation,
                speaker,
            } => write!(
                f,
                "presentation #{} speaker #{} country",
                presentation + 1,
                speaker + 1
            ),
        }
    }
}

/// Country or city input with its resolved data
///
/// Once resolved the field is read-only; clearing it re-enables input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceField {
    pub kind: ReferenceKind,
    pub text: String,
    pub data: Option<PlaceData>,
    pub error: Option<String>,
}

impl PlaceField {
    pub fn new(kind: ReferenceKind) -> Self {
        Self {
            kind,
            text: String::new(),
            data: None,
            error: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.data.as_ref().is_some_and(PlaceData::is_complete)
    }

    pub fn is_locked(&self) -> bool {
        self.is_resolved()
    }

    /// Non-empty text without complete data
    pub fn needs_resolution(&self) -> bool {
        !self.text.trim().is_empty() && !self.is_resolved()
    }

    /// Typing; returns false when the field is locked
    pub fn input(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            self.clear();
            return true;
        }
        if self.is_locked() {
            return false;
        }
        self.text = text.to_string();
        self.data = None;
        self.error = None;
        true
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.data = None;
        self.error = None;
    }

    pub fn set_resolved(&mut self, place: PlaceData) {
        self.text = place.name.clone();
        self.data = Some(place);
        self.error = None;
    }
}

/// Pending resolution for one field
///
/// Created by a form on blur or selection; the caller runs it against the
/// resolver and hands the result back to the form, which drops it if the
/// field changed in the meantime.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveRequest {
    pub path: FieldPath,
    pub kind: ReferenceKind,
    pub text: String,
    pub cached: Option<PlaceData>,
    /// Country the lookup is scoped to (cities)
    pub scope: Option<String>,
    /// Dropdown commit, when the request came from a selection
    pub candidate: Option<CandidateResult>,
}

impl ResolveRequest {
    pub fn blur(path: FieldPath, kind: ReferenceKind, text: &str, cached: Option<&PlaceData>) -> Self {
        Self {
            path,
            kind,
            text: text.trim().to_string(),
            cached: cached.cloned(),
            scope: None,
            candidate: None,
        }
    }

    pub fn selection(path: FieldPath, kind: ReferenceKind, candidate: CandidateResult) -> Self {
        Self {
            path,
            kind,
            text: candidate.name().trim().to_string(),
            cached: None,
            scope: None,
            candidate: Some(candidate),
        }
    }

    pub fn scoped(mut self, scope: Option<&str>) -> Self {
        self.scope = scope.map(str::to_string);
        self
    }

    pub async fn run(&self, resolver: &EntityResolver) -> Result<Resolution, ResolutionError> {
        match &self.candidate {
            Some(candidate) => {
                resolver
                    .adopt_candidate(self.kind, candidate, self.scope.as_deref())
                    .await
            }
            None => {
                resolver
                    .resolve_place(
                        self.kind,
                        &self.text,
                        self.cached.as_ref(),
                        self.scope.as_deref(),
                    )
                    .await
            }
        }
    }
}
