//! Forms that attach records to existing ones
//!
//! `AddPresentationForm` targets an existing event, `AddSpeakerForm` an
//! existing presentation. Neither submits without a selected target.

use super::fields::{FieldPath, ResolveRequest};
use super::pipeline::{AttachReport, SubmissionPipeline};
use super::rows;
use super::status::FormStatus;
use crate::error::{IntakeError, IntakeResult, ResolutionError};
use crate::models::{
    CandidateResult, EventRecord, PresentationDraft, PresentationRecord, ReferenceEntity,
    ReferenceKind, SpeakerDescriptor,
};
use crate::services::Resolution;

/// New presentation for an existing event
#[derive(Debug, Clone, Default)]
pub struct AddPresentationForm {
    pub target: Option<EventRecord>,
    pub draft: PresentationDraft,
    pub status: FormStatus,
}

impl AddPresentationForm {
    pub fn new() -> Self {
        Self {
            draft: PresentationDraft::with_blank_speaker(),
            ..Default::default()
        }
    }

    pub fn select_event(&mut self, event: EventRecord) {
        self.target = Some(event);
        self.status.clear_issue(&FieldPath::TargetEvent);
        self.status.touch();
    }

    pub fn set_title(&mut self, title: &str) {
        self.draft.title = title.to_string();
        self.status
            .clear_issue(&FieldPath::PresentationTitle { presentation: 0 });
        self.status.touch();
    }

    pub fn set_url(&mut self, url: &str) {
        let url = url.trim();
        self.draft.url = (!url.is_empty()).then(|| url.to_string());
        self.status.touch();
    }

    pub fn set_observations(&mut self, text: &str) {
        let text = text.trim();
        self.draft.observations = (!text.is_empty()).then(|| text.to_string());
        self.status.touch();
    }

    pub fn add_language(&mut self, language: &str) -> bool {
        self.status.touch();
        self.draft.add_language(language)
    }

    pub fn remove_language(&mut self, language: &str) -> bool {
        self.status.touch();
        self.draft.remove_language(language)
    }

    pub fn add_speaker_row(&mut self) -> usize {
        self.status.touch();
        rows::add_row(&mut self.draft)
    }

    pub fn remove_speaker_row(&mut self, speaker: usize) -> IntakeResult<()> {
        rows::remove_row(&mut self.draft, 0, speaker)?;
        self.status.touch();
        Ok(())
    }

    pub fn input_speaker_name(&mut self, speaker: usize, text: &str) -> IntakeResult<()> {
        rows::edit_row(&mut self.draft, 0, speaker, |s| Some(s.with_name_input(text)))?;
        self.status.touch();
        Ok(())
    }

    pub fn input_speaker_country(&mut self, speaker: usize, text: &str) -> IntakeResult<bool> {
        let changed = rows::edit_row(&mut self.draft, 0, speaker, |s| s.with_country_input(text))?;
        self.status.touch();
        Ok(changed)
    }

    pub fn input_speaker_agency(&mut self, speaker: usize, text: &str) -> IntakeResult<bool> {
        let changed = rows::edit_row(&mut self.draft, 0, speaker, |s| s.with_agency_input(text))?;
        self.status.touch();
        Ok(changed)
    }

    pub fn select_speaker(&mut self, speaker: usize, entity: &ReferenceEntity) -> IntakeResult<()> {
        rows::edit_row(&mut self.draft, 0, speaker, |_| {
            Some(SpeakerDescriptor::from_existing(entity))
        })?;
        self.status.touch();
        Ok(())
    }

    pub fn blur_speaker_country(&self, speaker: usize) -> Option<ResolveRequest> {
        rows::country_request(&self.draft, 0, speaker)
    }

    pub fn complete_resolution(
        &mut self,
        request: &ResolveRequest,
        result: Result<Resolution, ResolutionError>,
    ) -> bool {
        rows::apply_country(&mut self.draft, &mut self.status, request, result)
    }

    pub async fn submit(&mut self, pipeline: &SubmissionPipeline) -> IntakeResult<AttachReport> {
        let Some(event) = self.target.clone() else {
            let err = IntakeError::user_input(FieldPath::TargetEvent, "Select an event first");
            self.status.fail(&err);
            return Err(err);
        };

        self.status.begin_validation();
        self.status.begin_submission();
        let result = pipeline.add_presentation(&event, &mut self.draft).await;
        match result {
            Ok(report) => {
                self.status.succeed(report.presentation_id);
                Ok(report)
            }
            Err(e) => {
                self.status.fail(&e);
                Err(e)
            }
        }
    }
}

/// New or existing speaker for an existing presentation
#[derive(Debug, Clone, Default)]
pub struct AddSpeakerForm {
    pub target: Option<PresentationRecord>,
    pub speaker: SpeakerDescriptor,
    pub status: FormStatus,
}

impl AddSpeakerForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_presentation(&mut self, presentation: PresentationRecord) {
        self.target = Some(presentation);
        self.status.clear_issue(&FieldPath::TargetPresentation);
        self.status.touch();
    }

    fn replace(&mut self, next: Option<SpeakerDescriptor>) -> bool {
        self.status.touch();
        match next {
            Some(next) => {
                self.speaker = next;
                true
            }
            None => false,
        }
    }

    pub fn input_name(&mut self, text: &str) {
        let next = self.speaker.with_name_input(text);
        self.replace(Some(next));
    }

    pub fn input_country(&mut self, text: &str) -> bool {
        let next = self.speaker.with_country_input(text);
        self.replace(next)
    }

    pub fn input_agency(&mut self, text: &str) -> bool {
        let next = self.speaker.with_agency_input(text);
        self.replace(next)
    }

    pub fn select_existing(&mut self, entity: &ReferenceEntity) {
        self.replace(Some(SpeakerDescriptor::from_existing(entity)));
    }

    pub fn blur_country(&self) -> Option<ResolveRequest> {
        let mut draft = PresentationDraft::default();
        draft.speakers.push(self.speaker.clone());
        rows::country_request(&draft, 0, 0)
    }

    pub fn select_country(&mut self, candidate: CandidateResult) -> Option<ResolveRequest> {
        let next = self.speaker.with_country_input(candidate.name());
        self.replace(next).then(|| {
            ResolveRequest::selection(
                FieldPath::SpeakerCountry {
                    presentation: 0,
                    speaker: 0,
                },
                ReferenceKind::Country,
                candidate,
            )
        })
    }

    pub fn complete_resolution(
        &mut self,
        request: &ResolveRequest,
        result: Result<Resolution, ResolutionError>,
    ) -> bool {
        let mut draft = PresentationDraft::default();
        draft.speakers.push(self.speaker.clone());
        let applied = rows::apply_country(&mut draft, &mut self.status, request, result);
        if let Some(next) = draft.speakers.pop() {
            self.speaker = next;
        }
        applied
    }

    pub async fn submit(&mut self, pipeline: &SubmissionPipeline) -> IntakeResult<i64> {
        let Some(presentation) = self.target.clone() else {
            let err = IntakeError::user_input(
                FieldPath::TargetPresentation,
                "Select a presentation first",
            );
            self.status.fail(&err);
            return Err(err);
        };

        self.status.begin_validation();
        self.status.begin_submission();
        match pipeline.add_speaker(&presentation, &mut self.speaker).await {
            Ok(id) => {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, PlaceData};
    use crate::services::ResolutionOutcome;

    #[test]
    fn test_add_presentation_rows() {
        let mut form = AddPresentationForm::new();
        assert_eq!(form.draft.speakers.len(), 1);
        assert!(form.remove_speaker_row(0).is_err());
        assert_eq!(form.add_speaker_row(), 1);
        form.input_speaker_name(1, "Luis").unwrap();
        assert_eq!(form.draft.speakers[1].name, "Luis");
    }

    #[test]
    fn test_add_speaker_country_resolution() {
        let mut form = AddSpeakerForm::new();
        form.input_name("Luis");
        assert!(form.input_country("Peru"));
        let request = form.blur_country().unwrap();

        let entity = ReferenceEntity::new(ReferenceKind::Country, "Peru")
            .with_coordinates(Coordinates::new(-9.2, -75.0));
        let resolution = Resolution {
            outcome: ResolutionOutcome::Resolved,
            place: entity.place_data(false, false),
            entity,
        };
        assert!(form.complete_resolution(&request, Ok(resolution)));
        assert_eq!(
            form.speaker.country_data,
            Some(PlaceData::existing("Peru", Coordinates::new(-9.2, -75.0)))
        );
        assert!(!form.input_country("Chile"));
    }

    #[test]
    fn test_existing_speaker_locks_fields() {
        let mut form = AddSpeakerForm::new();
        let entity = ReferenceEntity::new(ReferenceKind::Speaker, "Ana")
            .with_id(9)
            .with_country("Chile");
        form.select_existing(&entity);
        assert!(!form.input_agency("OEA"));
        assert!(form.blur_country().is_none());
    }
}
