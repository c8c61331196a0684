//! Submission pipeline
//!
//! Full events go to the backend as one nested create. Adding a presentation
//! to an existing event, or a speaker to an existing presentation, is a
//! sequence of independent calls that is rolled forward, never back: once a
//! write has committed, a later failure is reported as a `PartialFailure`
//! naming the last step that succeeded. Nothing is retried.

use super::fields::FieldPath;
use super::validation::{validate_event, validate_presentation, validate_speaker, DraftLimits};
use crate::error::{IntakeError, IntakeResult, ResolutionError, StepReport};
use crate::models::{
    EventDraft, EventFilters, EventRecord, NewPresentation, PresentationDraft,
    PresentationFilters, PresentationRecord, ReferenceKind, SpeakerDescriptor,
};
use crate::services::{CatalogApi, EntityResolver, NewReference};
use fela_common::api::AuthProvider;
use fela_common::events::{EventBus, FelaEvent, SubmissionKind, SubmissionStep};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of attaching a presentation to an existing event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachReport {
    pub presentation_id: i64,
    /// Speaker ids in row order
    pub speaker_ids: Vec<i64>,
    pub completed: Vec<SubmissionStep>,
}

/// Progress of one submission, mirrored onto the event bus
struct Run<'a> {
    draft_id: Uuid,
    completed: Vec<SubmissionStep>,
    /// A backend write has committed
    committed: bool,
    events: Option<&'a EventBus>,
}

impl<'a> Run<'a> {
    fn start(kind: SubmissionKind, events: Option<&'a EventBus>) -> Self {
        let run = Self {
            draft_id: Uuid::new_v4(),
            completed: Vec::new(),
            committed: false,
            events,
        };
        info!(draft_id = %run.draft_id, kind = ?kind, "Submission started");
        run.emit(FelaEvent::SubmissionStarted {
            draft_id: run.draft_id,
            kind,
            timestamp: chrono::Utc::now(),
        });
        run
    }

    fn emit(&self, event: FelaEvent) {
        if let Some(bus) = self.events {
            bus.emit_lossy(event);
        }
    }

    fn complete(&mut self, step: SubmissionStep, wrote: bool) {
        debug!(draft_id = %self.draft_id, step = %step, "Step completed");
        self.committed |= wrote;
        self.emit(FelaEvent::SubmissionStepCompleted {
            draft_id: self.draft_id,
            step: step.clone(),
            timestamp: chrono::Utc::now(),
        });
        self.completed.push(step);
    }

    /// Record the failure; after a committed write the error becomes a
    /// `PartialFailure` naming what already succeeded
    fn fail(&self, step: Option<SubmissionStep>, err: IntakeError) -> IntakeError {
        let message = err.to_string();
        match &step {
            Some(step) => warn!(draft_id = %self.draft_id, step = %step, error = %message, "Submission failed"),
            None => warn!(draft_id = %self.draft_id, error = %message, "Submission rejected"),
        }
        self.emit(FelaEvent::SubmissionFailed {
            draft_id: self.draft_id,
            step: step.clone(),
            message: message.clone(),
            completed: self.completed.clone(),
            timestamp: chrono::Utc::now(),
        });
        match step {
            Some(failed_step) if self.committed => IntakeError::PartialFailure(StepReport {
                completed: self.completed.clone(),
                failed_step,
                message,
            }),
            _ => err,
        }
    }

    fn succeed(&self, record_id: Option<i64>) {
        info!(draft_id = %self.draft_id, record_id = ?record_id, "Submission succeeded");
        self.emit(FelaEvent::SubmissionSucceeded {
            draft_id: self.draft_id,
            record_id,
            timestamp: chrono::Utc::now(),
        });
    }
}

/// Owns the collaborators a form submits through
///
/// Only constructed for users allowed to edit.
pub struct SubmissionPipeline {
    resolver: Arc<EntityResolver>,
    catalog: Arc<dyn CatalogApi>,
    limits: DraftLimits,
    events: Option<EventBus>,
}

impl SubmissionPipeline {
    /// Refuses with `PermissionDenied` when the current user cannot edit
    pub fn mount(
        auth: &dyn AuthProvider,
        resolver: Arc<EntityResolver>,
        catalog: Arc<dyn CatalogApi>,
        limits: DraftLimits,
    ) -> IntakeResult<Self> {
        if !auth.can_edit() {
            let who = auth
                .current_user()
                .map(|u| u.username)
                .unwrap_or_else(|| "anonymous".to_string());
            warn!(user = %who, "Intake forms refused: user may not edit");
            return Err(IntakeError::PermissionDenied(format!(
                "{} is not approved to edit records",
                who
            )));
        }
        Ok(Self {
            resolver,
            catalog,
            limits,
            events: None,
        })
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn limits(&self) -> &DraftLimits {
        &self.limits
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    /// Submit a whole event as one nested create
    ///
    /// Returns the new event id. Speaker rows in `draft` are updated with
    /// the country data resolved on the way.
    pub async fn submit_event(&self, draft: &mut EventDraft) -> IntakeResult<i64> {
        let mut run = Run::start(SubmissionKind::CompleteEvent, self.events.as_ref());

        validate_event(draft, &self.limits).map_err(|e| run.fail(None, e))?;
        for (index, presentation) in draft.presentations.iter_mut().enumerate() {
            self.resolve_countries(&mut run, index, presentation).await?;
        }

        let payload = draft.to_payload().ok_or_else(|| {
            run.fail(
                None,
                IntakeError::user_input(
                    FieldPath::EventCountry,
                    "Country and city need coordinates",
                ),
            )
        })?;

        let step = SubmissionStep::CreateComplete;
        let created = self
            .catalog
            .create_complete(&payload)
            .await
            .map_err(|e| run.fail(Some(step.clone()), e.into()))?;
        run.complete(step, true);
        run.succeed(Some(created.id));
        Ok(created.id)
    }

    /// Add a presentation, with its speakers, to an existing event
    pub async fn add_presentation(
        &self,
        event: &EventRecord,
        draft: &mut PresentationDraft,
    ) -> IntakeResult<AttachReport> {
        let mut run = Run::start(SubmissionKind::AddPresentation, self.events.as_ref());

        validate_presentation(0, draft).map_err(|e| run.fail(None, e))?;

        let step = SubmissionStep::CheckDuplicateTitle;
        let existing = self
            .catalog
            .list_presentations(&PresentationFilters::for_event(event.id))
            .await
            .map_err(|e| run.fail(Some(step.clone()), e.into()))?;
        let title = draft.title.trim().to_string();
        if existing.iter().any(|p| same_title(&p.title, &title)) {
            let err = IntakeError::user_input(
                FieldPath::PresentationTitle { presentation: 0 },
                format!("\"{}\" already exists for this event", title),
            );
            return Err(run.fail(Some(step), err));
        }
        run.complete(step, false);

        // Country resolution can create records; it must follow the title guard
        self.resolve_countries(&mut run, 0, draft).await?;

        let step = SubmissionStep::CreatePresentation;
        let new = NewPresentation::new(
            &title,
            &event.title,
            &draft.languages,
            draft.url.as_deref(),
            draft.observations.as_deref(),
        );
        let presentation_id = self
            .catalog
            .create_presentation(&new)
            .await
            .map_err(|e| run.fail(Some(step.clone()), e.into()))?
            .id;
        run.complete(step, true);

        let rows: Vec<usize> = draft.filled_speakers().map(|(i, _)| i).collect();
        let mut speaker_ids = Vec::with_capacity(rows.len());
        for index in rows {
            let speaker = &mut draft.speakers[index];
            speaker_ids.push(self.attach(&mut run, presentation_id, 0, index, speaker).await?);
        }

        run.succeed(Some(presentation_id));
        Ok(AttachReport {
            presentation_id,
            speaker_ids,
            completed: run.completed,
        })
    }

    /// Add one speaker to an existing presentation; returns the speaker id
    pub async fn add_speaker(
        &self,
        presentation: &PresentationRecord,
        speaker: &mut SpeakerDescriptor,
    ) -> IntakeResult<i64> {
        let mut run = Run::start(SubmissionKind::AddSpeaker, self.events.as_ref());

        validate_speaker(0, 0, speaker).map_err(|e| run.fail(None, e))?;
        self.resolve_country(&mut run, 0, 0, speaker).await?;
        let speaker_id = self.attach(&mut run, presentation.id, 0, 0, speaker).await?;

        run.succeed(Some(speaker_id));
        Ok(speaker_id)
    }

    /// Lazy country validation for every filled row lacking coordinates
    async fn resolve_countries(
        &self,
        run: &mut Run<'_>,
        presentation: usize,
        draft: &mut PresentationDraft,
    ) -> IntakeResult<()> {
        let rows: Vec<usize> = draft.filled_speakers().map(|(i, _)| i).collect();
        for index in rows {
            self.resolve_country(run, presentation, index, &mut draft.speakers[index])
                .await?;
        }
        Ok(())
    }

    async fn resolve_country(
        &self,
        run: &mut Run<'_>,
        presentation: usize,
        index: usize,
        speaker: &mut SpeakerDescriptor,
    ) -> IntakeResult<()> {
        if speaker.is_submit_ready() {
            return Ok(());
        }
        let step = SubmissionStep::ResolveSpeakerCountry {
            speaker_index: index,
        };
        let field = FieldPath::SpeakerCountry {
            presentation,
            speaker: index,
        };
        let name = match speaker.country.trim() {
            "" => speaker
                .country_data
                .as_ref()
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            typed => typed.to_string(),
        };

        let resolution = self
            .resolver
            .resolve_place(ReferenceKind::Country, &name, speaker.country_data.as_ref(), None)
            .await
            .map_err(|source| run.fail(Some(step.clone()), IntakeError::Resolution { field, source }))?;
        let place = resolution.place.ok_or_else(|| {
            let source = ResolutionError::NotFound {
                kind: ReferenceKind::Country,
                name: name.clone(),
            };
            run.fail(Some(step.clone()), IntakeError::Resolution { field, source })
        })?;

        let created = place.created_now;
        *speaker = speaker.with_country_data(place);
        run.complete(step, created);
        Ok(())
    }

    /// Search-or-create the speaker, then link it to the presentation
    async fn attach(
        &self,
        run: &mut Run<'_>,
        presentation_id: i64,
        presentation: usize,
        index: usize,
        speaker: &mut SpeakerDescriptor,
    ) -> IntakeResult<i64> {
        let step = SubmissionStep::ResolveSpeaker {
            speaker_index: index,
        };
        let speaker_id = match speaker.id {
            Some(id) => {
                run.complete(step, false);
                id
            }
            None => {
                let country = speaker.country_data.as_ref().map(|c| c.name.as_str());
                let new = NewReference::new(ReferenceKind::Speaker, speaker.name.trim())
                    .with_country(country)
                    .with_agency(speaker.agency.as_deref());
                let field = FieldPath::SpeakerName {
                    presentation,
                    speaker: index,
                };
                let resolution = self.resolver.resolve_named(&new).await.map_err(|source| {
                    run.fail(Some(step.clone()), IntakeError::Resolution { field, source })
                })?;
                let id = resolution.entity.id.ok_or_else(|| {
                    run.fail(
                        Some(step.clone()),
                        IntakeError::Backend(format!(
                            "speaker \"{}\" has no id",
                            resolution.entity.name
                        )),
                    )
                })?;
                speaker.id = Some(id);
                run.complete(step, resolution.created_now());
                id
            }
        };

        let step = SubmissionStep::AssociateSpeaker {
            speaker_index: index,
        };
        self.catalog
            .add_speaker(presentation_id, speaker_id)
            .await
            .map_err(|e| run.fail(Some(step.clone()), e.into()))?;
        run.complete(step, true);
        Ok(speaker_id)
    }

    pub async fn browse_events(&self, filters: &EventFilters) -> IntakeResult<Vec<EventRecord>> {
        Ok(self.catalog.list_events(filters).await?)
    }

    pub async fn find_presentations(&self, title: &str) -> IntakeResult<Vec<PresentationRecord>> {
        if title.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.catalog.search_presentations(title.trim()).await?)
    }

    pub async fn event_presentations(&self, event_id: i64) -> IntakeResult<Vec<PresentationRecord>> {
        Ok(self
            .catalog
            .list_presentations(&PresentationFilters::for_event(event_id))
            .await?)
    }

    pub async fn get_event(&self, id: i64) -> IntakeResult<EventRecord> {
        Ok(self.catalog.get_event(id).await?)
    }

    pub async fn get_presentation(&self, id: i64) -> IntakeResult<PresentationRecord> {
        Ok(self.catalog.get_presentation(id).await?)
    }
}

/// Case-insensitive title comparison, ignoring surrounding whitespace
fn same_title(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_title_ignores_case() {
        assert!(same_title("Keynote", " KEYNOTE "));
        assert!(same_title("Apertura", "apertura"));
        assert!(!same_title("Keynote", "Keynote 2"));
    }

    #[test]
    fn test_failure_before_commit_is_not_partial() {
        let mut run = Run::start(SubmissionKind::AddPresentation, None);
        run.complete(SubmissionStep::CheckDuplicateTitle, false);
        let err = run.fail(
            Some(SubmissionStep::CreatePresentation),
            IntakeError::Backend("HTTP 500".to_string()),
        );
        assert_eq!(err, IntakeError::Backend("HTTP 500".to_string()));
    }

    #[test]
    fn test_failure_after_commit_is_partial() {
        let mut run = Run::start(SubmissionKind::AddPresentation, None);
        run.complete(SubmissionStep::CheckDuplicateTitle, false);
        run.complete(SubmissionStep::CreatePresentation, true);
        let err = run.fail(
            Some(SubmissionStep::AssociateSpeaker { speaker_index: 0 }),
            IntakeError::Backend("HTTP 500".to_string()),
        );
        match err {
            IntakeError::PartialFailure(report) => {
                assert_eq!(report.completed.len(), 2);
                assert!(report.to_string().starts_with("presentation creation succeeded"));
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_reports_to_event_bus() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut run = Run::start(SubmissionKind::CompleteEvent, Some(&bus));
        run.complete(SubmissionStep::CreateComplete, true);
        run.succeed(Some(7));

        assert!(matches!(rx.recv().await.unwrap(), FelaEvent::SubmissionStarted { .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            FelaEvent::SubmissionStepCompleted { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            FelaEvent::SubmissionSucceeded {
                record_id: Some(7),
                ..
            }
        ));
    }
}
