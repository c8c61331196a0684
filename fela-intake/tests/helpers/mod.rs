//! Test Helper Utilities
//!
//! In-memory collaborators with call counters for driving the intake
//! pipeline without a backend or geocoding service.

#![allow(dead_code)]

use async_trait::async_trait;
use fela_common::api::{CurrentUser, SessionCredentials, StaticAuth};
use fela_common::config::FelaConfig;
use fela_intake::error::{BackendError, GeocodingError};
use fela_intake::form::{DraftLimits, SubmissionPipeline};
use fela_intake::models::{
    Coordinates, CreateCompletePayload, CreatedRecord, EventFilters, EventRecord, ExternalPlace,
    NewPresentation, PresentationFilters, PresentationRecord, PresentationSpeaker,
    ReferenceEntity, ReferenceKind,
};
use fela_intake::services::{
    CatalogApi, EntityResolver, Geocoder, NewReference, ReferenceQuery, ReferenceStore,
};
use fela_intake::utils::{names_match, normalize_name};
use fela_intake::IntakeState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

// ============================================================================
// Reference store
// ============================================================================

/// Backend reference tables held in memory
///
/// Creating a name that already exists (same kind, same normalized name,
/// same owning country for cities) fails with `BackendError::Conflict`.
#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<Vec<ReferenceEntity>>,
    next_id: AtomicI64,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    /// Every create reports a conflict without storing anything
    pub phantom_conflicts: AtomicBool,
    /// Every list fails with HTTP 500
    pub failing_lists: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, entity: ReferenceEntity) -> ReferenceEntity {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let entity = ReferenceEntity {
            id: entity.id.or(Some(id)),
            ..entity
        };
        self.rows.lock().unwrap().push(entity.clone());
        entity
    }

    pub fn seed_country(&self, name: &str, lat: f64, lon: f64) -> ReferenceEntity {
        self.seed(
            ReferenceEntity::new(ReferenceKind::Country, name)
                .with_coordinates(Coordinates::new(lat, lon)),
        )
    }

    pub fn rows(&self, kind: ReferenceKind) -> Vec<ReferenceEntity> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

fn same_scope(entity: &ReferenceEntity, country: Option<&str>) -> bool {
    match (entity.kind, country) {
        (ReferenceKind::City | ReferenceKind::Speaker, Some(country)) => entity
            .country
            .as_deref()
            .is_some_and(|c| names_match(c, country)),
        _ => true,
    }
}

#[async_trait]
impl ReferenceStore for InMemoryStore {
    async fn list(
        &self,
        kind: ReferenceKind,
        query: &ReferenceQuery,
    ) -> Result<Vec<ReferenceEntity>, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_lists.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 500,
                message: "list failed".to_string(),
            });
        }
        let needle = normalize_name(&query.search);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .filter(|e| normalize_name(&e.name).contains(&needle))
            .filter(|e| same_scope(e, query.country.as_deref()))
            .cloned()
            .collect())
    }

    async fn create(&self, new: &NewReference) -> Result<ReferenceEntity, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.phantom_conflicts.load(Ordering::SeqCst) {
            return Err(BackendError::Conflict(format!(
                "{} with this name already exists.",
                new.kind
            )));
        }
        let mut rows = self.rows.lock().unwrap();
        let duplicate = rows.iter().any(|e| {
            e.kind == new.kind
                && names_match(&e.name, &new.name)
                && same_scope(e, new.country.as_deref())
        });
        if duplicate {
            return Err(BackendError::Conflict(format!(
                "{} with this name already exists.",
                new.kind
            )));
        }
        let entity = ReferenceEntity {
            id: Some(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            ..new.as_entity()
        };
        rows.push(entity.clone());
        Ok(entity)
    }
}

// ============================================================================
// Geocoder
// ============================================================================

/// Geocoder answering from a fixed table keyed by normalized text
#[derive(Default)]
pub struct ScriptedGeocoder {
    answers: Mutex<HashMap<String, Vec<ExternalPlace>>>,
    latency: Mutex<HashMap<String, Duration>>,
    /// When set, every call waits here before answering
    barrier: Option<Arc<Barrier>>,
    pub calls: AtomicUsize,
}

impl ScriptedGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn place(self, query: &str, name: &str, lat: f64, lon: f64) -> Self {
        self.answers
            .lock()
            .unwrap()
            .entry(normalize_name(query))
            .or_default()
            .push(external(name, lat, lon));
        self
    }

    pub fn slow(self, query: &str, latency: Duration) -> Self {
        self.latency
            .lock()
            .unwrap()
            .insert(normalize_name(query), latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn external(name: &str, lat: f64, lon: f64) -> ExternalPlace {
    ExternalPlace {
        name: name.to_string(),
        lat,
        lon,
        raw_label: name.to_string(),
        country: None,
    }
}

#[async_trait]
impl Geocoder for ScriptedGeocoder {
    async fn search_place(
        &self,
        _kind: ReferenceKind,
        text: &str,
        _scope_country: Option<&str>,
    ) -> Result<Vec<ExternalPlace>, GeocodingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = normalize_name(text);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        let latency = self.latency.lock().unwrap().get(&key).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Events and presentations held in memory
#[derive(Default)]
pub struct MockCatalog {
    events: Mutex<Vec<EventRecord>>,
    /// (event id, presentation)
    presentations: Mutex<Vec<(i64, PresentationRecord)>>,
    pub associations: Mutex<Vec<(i64, i64)>>,
    pub last_payload: Mutex<Option<CreateCompletePayload>>,
    next_id: AtomicI64,
    pub create_complete_calls: AtomicUsize,
    pub create_presentation_calls: AtomicUsize,
    pub add_speaker_calls: AtomicUsize,
    pub list_presentation_calls: AtomicUsize,
    /// `add_speaker` fails with HTTP 500
    pub failing_association: AtomicBool,
}

impl MockCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(100),
            ..Default::default()
        })
    }

    pub fn seed_event(&self, id: i64, title: &str) -> EventRecord {
        let event = EventRecord {
            id,
            title: title.to_string(),
            year: Some(2024),
            date: None,
            event_type: None,
            country: Some("Peru".to_string()),
            city: Some("Lima".to_string()),
        };
        self.events.lock().unwrap().push(event.clone());
        event
    }

    pub fn seed_presentation(&self, event: &EventRecord, id: i64, title: &str) -> PresentationRecord {
        let presentation = PresentationRecord {
            id,
            title: title.to_string(),
            event_title: Some(event.title.clone()),
            event_country: event.country.clone(),
            language: Vec::new(),
            url: None,
            observations: None,
            speakers: Vec::new(),
        };
        self.presentations
            .lock()
            .unwrap()
            .push((event.id, presentation.clone()));
        presentation
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn not_found() -> BackendError {
    BackendError::NotFound("record not found".to_string())
}

#[async_trait]
impl CatalogApi for MockCatalog {
    async fn create_complete(
        &self,
        payload: &CreateCompletePayload,
    ) -> Result<CreatedRecord, BackendError> {
        self.create_complete_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock().unwrap() = Some(payload.clone());
        Ok(CreatedRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn list_events(&self, filters: &EventFilters) -> Result<Vec<EventRecord>, BackendError> {
        let search = filters.search.as_deref().map(normalize_name).unwrap_or_default();
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| normalize_name(&e.title).contains(&search))
            .filter(|e| filters.year.map_or(true, |y| e.year == Some(y)))
            .cloned()
            .collect())
    }

    async fn get_event(&self, id: i64) -> Result<EventRecord, BackendError> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn list_presentations(
        &self,
        filters: &PresentationFilters,
    ) -> Result<Vec<PresentationRecord>, BackendError> {
        self.list_presentation_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .presentations
            .lock()
            .unwrap()
            .iter()
            .filter(|(event_id, _)| filters.event_id.map_or(true, |id| id == *event_id))
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn search_presentations(
        &self,
        title: &str,
    ) -> Result<Vec<PresentationRecord>, BackendError> {
        let needle = normalize_name(title);
        Ok(self
            .presentations
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| normalize_name(&p.title).contains(&needle))
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn get_presentation(&self, id: i64) -> Result<PresentationRecord, BackendError> {
        self.presentations
            .lock()
            .unwrap()
            .iter()
            .find(|(_, p)| p.id == id)
            .map(|(_, p)| p.clone())
            .ok_or_else(not_found)
    }

    async fn create_presentation(
        &self,
        new: &NewPresentation,
    ) -> Result<CreatedRecord, BackendError> {
        self.create_presentation_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event_id = self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.title == new.event_title)
            .map(|e| e.id)
            .unwrap_or_default();
        let record = PresentationRecord {
            id,
            title: new.title.clone(),
            event_title: Some(new.event_title.clone()),
            event_country: None,
            language: new.language.clone(),
            url: Some(new.url_document.clone()).filter(|u| !u.is_empty()),
            observations: Some(new.observations.clone()).filter(|o| !o.is_empty()),
            speakers: Vec::new(),
        };
        self.presentations.lock().unwrap().push((event_id, record));
        Ok(CreatedRecord { id })
    }

    async fn add_speaker(&self, presentation_id: i64, speaker_id: i64) -> Result<(), BackendError> {
        self.add_speaker_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_association.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 500,
                message: "association failed".to_string(),
            });
        }
        self.associations
            .lock()
            .unwrap()
            .push((presentation_id, speaker_id));
        let mut presentations = self.presentations.lock().unwrap();
        if let Some((_, p)) = presentations.iter_mut().find(|(_, p)| p.id == presentation_id) {
            p.speakers.push(PresentationSpeaker::Record {
                id: Some(speaker_id),
                name: String::new(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Auth and wiring
// ============================================================================

pub fn approved_auth() -> Arc<StaticAuth> {
    Arc::new(StaticAuth::new(
        Some(CurrentUser {
            id: Some(1),
            username: "editor".to_string(),
            is_approved: true,
            is_superuser: false,
        }),
        SessionCredentials::new(Some("session".to_string()), Some("csrf".to_string())),
    ))
}

pub fn unapproved_auth() -> Arc<StaticAuth> {
    Arc::new(StaticAuth::new(
        Some(CurrentUser {
            id: Some(2),
            username: "pending".to_string(),
            is_approved: false,
            is_superuser: false,
        }),
        SessionCredentials::default(),
    ))
}

pub fn resolver(store: &Arc<InMemoryStore>, geocoder: &Arc<ScriptedGeocoder>) -> EntityResolver {
    EntityResolver::new(store.clone(), geocoder.clone())
}

pub fn pipeline(
    store: &Arc<InMemoryStore>,
    geocoder: &Arc<ScriptedGeocoder>,
    catalog: &Arc<MockCatalog>,
) -> SubmissionPipeline {
    SubmissionPipeline::mount(
        approved_auth().as_ref(),
        Arc::new(resolver(store, geocoder)),
        catalog.clone(),
        DraftLimits::default(),
    )
    .expect("approved user may edit")
}

pub fn state(
    store: &Arc<InMemoryStore>,
    geocoder: &Arc<ScriptedGeocoder>,
    catalog: &Arc<MockCatalog>,
) -> IntakeState {
    IntakeState::new(
        FelaConfig::default(),
        store.clone(),
        catalog.clone(),
        geocoder.clone(),
        approved_auth(),
    )
}
