//! Event entry form
//!
//! Explicit state for one event draft. Speaker rows are an indexed array of
//! `SpeakerDescriptor`s and every handler mutates exactly the row it was
//! raised for. Resolution is split into a request produced here and a result
//! applied here, so the resolver never holds a reference to the form.

use super::fields::{FieldPath, PlaceField, ResolveRequest};
use super::pipeline::SubmissionPipeline;
use super::rows;
use super::status::FormStatus;
use super::validation::validate_event;
use crate::error::{IntakeError, IntakeResult, ResolutionError};
use crate::models::{
    CandidateResult, EventDraft, PlaceData, PresentationDraft, ReferenceEntity, ReferenceKind,
    SpeakerDescriptor,
};
use crate::services::Resolution;
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Clone)]
pub struct EventForm {
    max_presentations: usize,
    pub country: PlaceField,
    pub city: PlaceField,
    pub date: String,
    pub year: Option<i32>,
    pub event_type: String,
    pub title: String,
    pub agencies: BTreeSet<String>,
    pub presentations: Vec<PresentationDraft>,
    pub status: FormStatus,
}

impl EventForm {
    /// Empty form with one presentation holding one speaker row
    pub fn new(max_presentations: usize) -> Self {
        Self {
            max_presentations: max_presentations.max(1),
            country: PlaceField::new(ReferenceKind::Country),
            city: PlaceField::new(ReferenceKind::City),
            date: String::new(),
            year: None,
            event_type: String::new(),
            title: String::new(),
            agencies: BTreeSet::new(),
            presentations: vec![PresentationDraft::with_blank_speaker()],
            status: FormStatus::default(),
        }
    }

    /// City search is scoped to the resolved country and disabled before it
    pub fn city_enabled(&self) -> bool {
        self.country.is_resolved()
    }

    pub fn city_scope(&self) -> Option<&str> {
        self.country
            .data
            .as_ref()
            .filter(|_| self.city_enabled())
            .map(|c| c.name.as_str())
    }

    /// Typing into the country field; a changed country clears the city
    pub fn input_country(&mut self, text: &str) -> bool {
        let was_resolved = self.country.is_resolved();
        if !self.country.input(text) {
            return false;
        }
        if was_resolved && !self.country.is_resolved() {
            self.city.clear();
        }
        self.status.clear_issue(&FieldPath::EventCountry);
        self.status.touch();
        true
    }

    pub fn input_city(&mut self, text: &str) -> bool {
        if !self.city_enabled() || !self.city.input(text) {
            return false;
        }
        self.status.clear_issue(&FieldPath::EventCity);
        self.status.touch();
        true
    }

    pub fn blur_country(&self) -> Option<ResolveRequest> {
        self.country.needs_resolution().then(|| {
            ResolveRequest::blur(
                FieldPath::EventCountry,
                ReferenceKind::Country,
                &self.country.text,
                self.country.data.as_ref(),
            )
        })
    }

    pub fn blur_city(&self) -> Option<ResolveRequest> {
        if !self.city_enabled() || !self.city.needs_resolution() {
            return None;
        }
        Some(
            ResolveRequest::blur(
                FieldPath::EventCity,
                ReferenceKind::City,
                &self.city.text,
                self.city.data.as_ref(),
            )
            .scoped(self.city_scope()),
        )
    }

    /// Dropdown commit on the country field
    pub fn select_country(&mut self, candidate: CandidateResult) -> ResolveRequest {
        let was_resolved = self.country.is_resolved();
        self.country.clear();
        self.country.text = candidate.name().to_string();
        if was_resolved {
            self.city.clear();
        }
        self.status.touch();
        ResolveRequest::selection(FieldPath::EventCountry, ReferenceKind::Country, candidate)
    }

    pub fn select_city(&mut self, candidate: CandidateResult) -> Option<ResolveRequest> {
        if !self.city_enabled() {
            return None;
        }
        self.city.clear();
        self.city.text = candidate.name().to_string();
        self.status.touch();
        Some(
            ResolveRequest::selection(FieldPath::EventCity, ReferenceKind::City, candidate)
                .scoped(self.city_scope()),
        )
    }

    /// Unparsable text leaves the year unset
    pub fn set_year(&mut self, text: &str) {
        self.year = text.trim().parse().ok();
        self.status.clear_issue(&FieldPath::EventYear);
        self.status.touch();
    }

    pub fn set_title(&mut self, text: &str) {
        self.title = text.to_string();
        self.status.clear_issue(&FieldPath::EventTitle);
        self.status.touch();
    }

    pub fn set_date(&mut self, text: &str) {
        self.date = text.to_string();
        self.status.touch();
    }

    pub fn set_event_type(&mut self, text: &str) {
        self.event_type = text.to_string();
        self.status.touch();
    }

    /// Agencies are local chips until submit
    pub fn add_agency(&mut self, name: &str) -> bool {
        let name = name.trim();
        let added = !name.is_empty() && self.agencies.insert(name.to_string());
        if added {
            self.status.touch();
        }
        added
    }

    pub fn remove_agency(&mut self, name: &str) -> bool {
        let removed = self.agencies.remove(name.trim());
        if removed {
            self.status.touch();
        }
        removed
    }

    pub fn add_presentation(&mut self) -> IntakeResult<usize> {
        if self.presentations.len() >= self.max_presentations {
            return Err(IntakeError::user_input(
                FieldPath::Presentations,
                format!("At most {} presentations per event", self.max_presentations),
            ));
        }
        self.presentations.push(PresentationDraft::with_blank_speaker());
        self.status.touch();
        Ok(self.presentations.len() - 1)
    }

    pub fn remove_presentation(&mut self, index: usize) -> IntakeResult<()> {
        if self.presentations.len() <= 1 {
            return Err(IntakeError::user_input(
                FieldPath::Presentations,
                "An event needs at least one presentation",
            ));
        }
        self.presentation_mut(index)?;
        self.presentations.remove(index);
        self.status.touch();
        Ok(())
    }

    fn presentation_mut(&mut self, index: usize) -> IntakeResult<&mut PresentationDraft> {
        self.presentations.get_mut(index).ok_or_else(|| {
            IntakeError::user_input(
                FieldPath::Presentations,
                format!("No presentation #{}", index + 1),
            )
        })
    }

    /// Apply `edit` to one presentation and mark the form edited
    fn edit_presentation<T>(
        &mut self,
        index: usize,
        edit: impl FnOnce(&mut PresentationDraft) -> IntakeResult<T>,
    ) -> IntakeResult<T> {
        let out = edit(self.presentation_mut(index)?)?;
        self.status.touch();
        Ok(out)
    }

    pub fn set_presentation_title(&mut self, index: usize, title: &str) -> IntakeResult<()> {
        self.status.clear_issue(&FieldPath::PresentationTitle {
            presentation: index,
        });
        self.edit_presentation(index, |p| {
            p.title = title.to_string();
            Ok(())
        })
    }

    pub fn set_presentation_url(&mut self, index: usize, url: &str) -> IntakeResult<()> {
        self.edit_presentation(index, |p| {
            p.url = non_blank(url);
            Ok(())
        })
    }

    pub fn set_presentation_observations(&mut self, index: usize, text: &str) -> IntakeResult<()> {
        self.edit_presentation(index, |p| {
            p.observations = non_blank(text);
            Ok(())
        })
    }

    pub fn add_language(&mut self, index: usize, language: &str) -> IntakeResult<bool> {
        self.edit_presentation(index, |p| Ok(p.add_language(language)))
    }

    pub fn remove_language(&mut self, index: usize, language: &str) -> IntakeResult<bool> {
        self.edit_presentation(index, |p| Ok(p.remove_language(language)))
    }

    pub fn add_speaker_row(&mut self, presentation: usize) -> IntakeResult<usize> {
        self.edit_presentation(presentation, |p| Ok(rows::add_row(p)))
    }

    pub fn remove_speaker_row(&mut self, presentation: usize, speaker: usize) -> IntakeResult<()> {
        self.edit_presentation(presentation, |p| rows::remove_row(p, presentation, speaker))
    }

    pub fn speaker(&self, presentation: usize, speaker: usize) -> Option<&SpeakerDescriptor> {
        self.presentations.get(presentation)?.speakers.get(speaker)
    }

    pub fn input_speaker_name(
        &mut self,
        presentation: usize,
        speaker: usize,
        text: &str,
    ) -> IntakeResult<()> {
        self.status.clear_issue(&FieldPath::SpeakerName {
            presentation,
            speaker,
        });
        self.edit_presentation(presentation, |p| {
            rows::edit_row(p, presentation, speaker, |s| Some(s.with_name_input(text)))
        })
        .map(|_| ())
    }

    /// Returns false when the country input is locked
    pub fn input_speaker_country(
        &mut self,
        presentation: usize,
        speaker: usize,
        text: &str,
    ) -> IntakeResult<bool> {
        let changed = self.edit_presentation(presentation, |p| {
            rows::edit_row(p, presentation, speaker, |s| s.with_country_input(text))
        })?;
        if changed {
            self.status.clear_issue(&FieldPath::SpeakerCountry {
                presentation,
                speaker,
            });
        }
        Ok(changed)
    }

    pub fn input_speaker_agency(
        &mut self,
        presentation: usize,
        speaker: usize,
        text: &str,
    ) -> IntakeResult<bool> {
        self.edit_presentation(presentation, |p| {
            rows::edit_row(p, presentation, speaker, |s| s.with_agency_input(text))
        })
    }

    /// Existing speaker picked from the name dropdown
    pub fn select_speaker(
        &mut self,
        presentation: usize,
        speaker: usize,
        entity: &ReferenceEntity,
    ) -> IntakeResult<()> {
        self.edit_presentation(presentation, |p| {
            rows::edit_row(p, presentation, speaker, |_| {
                Some(SpeakerDescriptor::from_existing(entity))
            })
        })
        .map(|_| ())
    }

    pub fn blur_speaker_country(
        &self,
        presentation: usize,
        speaker: usize,
    ) -> Option<ResolveRequest> {
        rows::country_request(self.presentations.get(presentation)?, presentation, speaker)
    }

    /// Dropdown commit on a speaker's country field; `None` when locked
    pub fn select_speaker_country(
        &mut self,
        presentation: usize,
        speaker: usize,
        candidate: CandidateResult,
    ) -> IntakeResult<Option<ResolveRequest>> {
        let changed = self.edit_presentation(presentation, |p| {
            rows::edit_row(p, presentation, speaker, |s| {
                s.with_country_input(candidate.name())
            })
        })?;
        Ok(changed.then(|| {
            ResolveRequest::selection(
                FieldPath::SpeakerCountry {
                    presentation,
                    speaker,
                },
                ReferenceKind::Country,
                candidate,
            )
        }))
    }

    /// Apply a finished resolution
    ///
    /// Dropped (returns false) when the field no longer shows the text the
    /// request was made for, or has been resolved by another request.
    pub fn complete_resolution(
        &mut self,
        request: &ResolveRequest,
        result: Result<Resolution, ResolutionError>,
    ) -> bool {
        match request.path {
            FieldPath::EventCountry => {
                if !is_current(&self.country, request) {
                    return false;
                }
                match rows::place_of(result) {
                    Ok(place) => {
                        self.country.set_resolved(place);
                        self.city.clear();
                        self.status.clear_issue(&FieldPath::EventCountry);
                    }
                    Err(message) => {
                        self.country.error = Some(message.clone());
                        self.status.set_issue(FieldPath::EventCountry, message);
                    }
                }
                true
            }
            FieldPath::EventCity => {
                if !self.city_enabled() || !is_current(&self.city, request) {
                    return false;
                }
                match rows::place_of(result) {
                    Ok(place) => {
                        self.city.set_resolved(place);
                        self.status.clear_issue(&FieldPath::EventCity);
                    }
                    Err(message) => {
                        self.city.error = Some(message.clone());
                        self.status.set_issue(FieldPath::EventCity, message);
                    }
                }
                true
            }
            FieldPath::SpeakerCountry { presentation, .. } => {
                match self.presentations.get_mut(presentation) {
                    Some(draft) => rows::apply_country(draft, &mut self.status, request, result),
                    None => false,
                }
            }
            _ => false,
        }
    }

    /// Snapshot for validation and submission
    pub fn to_draft(&self) -> EventDraft {
        EventDraft {
            country: self.country.data.clone().or_else(|| typed_place(&self.country)),
            city: self.city.data.clone().or_else(|| typed_place(&self.city)),
            date: self.date.trim().to_string(),
            year: self.year,
            event_type: self.event_type.trim().to_string(),
            title: self.title.trim().to_string(),
            agencies: self.agencies.clone(),
            presentations: self.presentations.clone(),
        }
    }

    /// Validate, resolve and submit the draft
    ///
    /// Speaker countries resolved during submission are written back to the
    /// form even when a later step fails.
    pub async fn submit(&mut self, pipeline: &SubmissionPipeline) -> IntakeResult<i64> {
        if self.status.is_busy() {
            return Err(IntakeError::user_input(
                FieldPath::Presentations,
                "A submission is already in progress",
            ));
        }

        self.status.begin_validation();
        let mut draft = self.to_draft();
        if let Err(e) = validate_event(&draft, pipeline.limits()) {
            self.status.fail(&e);
            return Err(e);
        }

        self.status.begin_submission();
        let result = pipeline.submit_event(&mut draft).await;
        self.presentations = draft.presentations;

        match result {
            Ok(id) => {
                info!(event_id = id, title = %self.title.trim(), "Event saved");
                self.status.succeed(id);
                Ok(id)
            }
            Err(e) => {
                self.status.fail(&e);
                Err(e)
            }
        }
    }
}

fn is_current(field: &PlaceField, request: &ResolveRequest) -> bool {
    field.text.trim() == request.text && !field.is_resolved()
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Typed but unresolved place; present for validation, without coordinates
fn typed_place(field: &PlaceField) -> Option<PlaceData> {
    let name = field.text.trim();
    (!name.is_empty()).then(|| PlaceData {
        name: name.to_string(),
        lat: None,
        lon: None,
        is_new: false,
        created_now: false,
    })
}
