//! fela-intake library interface
//!
//! Geocoding-assisted record entry for the FELA catalogue: suggestion
//! dropdowns over the backend's reference tables and the geocoding index,
//! resolution of free-text names into canonical entities with coordinates,
//! and validated submission of events, presentations and speakers.

pub mod error;
pub mod form;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{IntakeError, IntakeResult};

use chrono::{DateTime, Utc};
use fela_common::api::AuthProvider;
use fela_common::config::FelaConfig;
use fela_common::events::EventBus;
use fela_common::ReferenceKind;
use form::{DraftLimits, EventForm, SubmissionPipeline};
use services::{
    CatalogApi, DebouncedSearch, EntityResolver, FieldOptions, Geocoder, HttpBackendClient,
    NominatimClient, ReferenceStore, SuggestionEngine, SuggestionUpdate,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Collaborators and configuration shared by every form
#[derive(Clone)]
pub struct IntakeState {
    pub config: FelaConfig,
    pub store: Arc<dyn ReferenceStore>,
    pub catalog: Arc<dyn CatalogApi>,
    pub geocoder: Arc<dyn Geocoder>,
    pub auth: Arc<dyn AuthProvider>,
    /// Resolver and submission progress
    pub event_bus: EventBus,
    pub startup_time: DateTime<Utc>,
}

impl IntakeState {
    pub fn new(
        config: FelaConfig,
        store: Arc<dyn ReferenceStore>,
        catalog: Arc<dyn CatalogApi>,
        geocoder: Arc<dyn Geocoder>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        Self {
            config,
            store,
            catalog,
            geocoder,
            auth,
            event_bus,
            startup_time: Utc::now(),
        }
    }

    /// HTTP backend and Nominatim clients built from `config`
    pub fn connect(config: FelaConfig, auth: Arc<dyn AuthProvider>) -> IntakeResult<Self> {
        let backend = Arc::new(HttpBackendClient::new(&config, Arc::clone(&auth))?);
        let geocoder = Arc::new(
            NominatimClient::new(&config).map_err(|e| IntakeError::Network(e.to_string()))?,
        );
        Ok(Self::new(config, backend.clone(), backend, geocoder, auth))
    }

    pub fn limits(&self) -> DraftLimits {
        DraftLimits::from_config(&self.config)
    }

    pub fn field_options(&self, kind: ReferenceKind) -> FieldOptions {
        FieldOptions::for_kind(kind, self.config.min_chars)
    }

    pub fn suggestion_engine(&self) -> SuggestionEngine {
        SuggestionEngine::new(Arc::clone(&self.store), Arc::clone(&self.geocoder))
    }

    /// Debounced search for one input field; must be called inside a runtime
    pub fn debounced_search(
        &self,
        kind: ReferenceKind,
    ) -> (DebouncedSearch, mpsc::UnboundedReceiver<SuggestionUpdate>) {
        let (search, rx) = DebouncedSearch::new(
            self.suggestion_engine(),
            self.field_options(kind),
            Duration::from_millis(self.config.debounce_ms),
        );
        (search.with_events(self.event_bus.clone()), rx)
    }

    pub fn resolver(&self) -> EntityResolver {
        EntityResolver::new(Arc::clone(&self.store), Arc::clone(&self.geocoder))
            .with_events(self.event_bus.clone())
    }

    /// Submission pipeline; `PermissionDenied` unless the user may edit
    pub fn pipeline(&self) -> IntakeResult<SubmissionPipeline> {
        Ok(SubmissionPipeline::mount(
            self.auth.as_ref(),
            Arc::new(self.resolver()),
            Arc::clone(&self.catalog),
            self.limits(),
        )?
        .with_events(self.event_bus.clone()))
    }

    pub fn event_form(&self) -> EventForm {
        EventForm::new(self.config.max_presentations)
    }
}
