//! Entity resolver
//!
//! Turns a free-text name into a canonical reference entity. For places the
//! order of steps is fixed:
//!
//! 1. complete cached data short-circuits (no network)
//! 2. backend lookup; exact normalized match preferred, else first hit
//! 3. geocoding; no candidates means the name is unresolvable
//! 4. create with the first candidate's coordinates
//! 5. created: `CreatedNow`
//! 6. duplicate reported: re-query once and adopt, or give up
//! 7. any other failure: surface the backend message
//!
//! Creation is never assumed to be exclusive. Another tab or another row can
//! create the same name between steps 2 and 4, which is reconciled in step 6.

use crate::error::{BackendError, ResolutionError};
use crate::models::{
    CandidateResult, Coordinates, ExternalPlace, PlaceData, ReferenceEntity, ReferenceKind,
};
use crate::services::backend_client::{NewReference, ReferenceQuery, ReferenceStore};
use crate::services::geocoding_client::Geocoder;
use crate::utils::names_match;
use fela_common::events::{EventBus, FelaEvent};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// Entity already existed
    Resolved,
    /// Entity was created by this resolution
    CreatedNow,
}

/// Successful resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    pub entity: ReferenceEntity,
    /// Place descriptor for countries and cities
    pub place: Option<PlaceData>,
}

impl Resolution {
    fn resolved(entity: ReferenceEntity) -> Self {
        let place = entity.place_data(false, false);
        Self {
            outcome: ResolutionOutcome::Resolved,
            entity,
            place,
        }
    }

    fn created(entity: ReferenceEntity) -> Self {
        let place = entity.place_data(true, true);
        Self {
            outcome: ResolutionOutcome::CreatedNow,
            entity,
            place,
        }
    }

    fn cached(kind: ReferenceKind, place: &PlaceData) -> Self {
        let mut entity = ReferenceEntity::new(kind, place.name.clone());
        entity.coordinates = place.coordinates();
        Self {
            outcome: ResolutionOutcome::Resolved,
            entity,
            place: Some(place.clone()),
        }
    }

    pub fn created_now(&self) -> bool {
        self.outcome == ResolutionOutcome::CreatedNow
    }
}

#[derive(Clone)]
pub struct EntityResolver {
    store: Arc<dyn ReferenceStore>,
    geocoder: Arc<dyn Geocoder>,
    events: Option<EventBus>,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn ReferenceStore>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            store,
            geocoder,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: FelaEvent) {
        if let Some(bus) = &self.events {
            bus.emit_lossy(event);
        }
    }

    /// Resolve a country or city name
    ///
    /// `cached` is the descriptor's current place data; `scope_country`
    /// restricts city lookups to the already chosen country.
    pub async fn resolve_place(
        &self,
        kind: ReferenceKind,
        name: &str,
        cached: Option<&PlaceData>,
        scope_country: Option<&str>,
    ) -> Result<Resolution, ResolutionError> {
        if let Some(place) = cached.filter(|p| p.is_complete()) {
            debug!(kind = %kind, name = %place.name, "Cached place data is complete");
            return Ok(Resolution::cached(kind, place));
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(ResolutionError::MissingName { kind });
        }

        self.emit(FelaEvent::ResolutionStarted {
            kind,
            name: name.to_string(),
            timestamp: chrono::Utc::now(),
        });

        let result = self.resolve_place_uncached(kind, name, scope_country).await;
        self.report(kind, name, &result);
        result
    }

    async fn resolve_place_uncached(
        &self,
        kind: ReferenceKind,
        name: &str,
        scope_country: Option<&str>,
    ) -> Result<Resolution, ResolutionError> {
        let scope = scope_for(kind, scope_country);

        debug!(kind = %kind, name = %name, "Looking up reference store");
        let existing = self.lookup(kind, name, scope, false).await?;

        if let Some(entity) = &existing {
            if entity.place_data(false, false).is_some() {
                return Ok(Resolution::resolved(entity.clone()));
            }
            debug!(kind = %kind, name = %name, "Stored record has no coordinates");
        }

        debug!(kind = %kind, name = %name, "Querying geocoding service");
        let candidates = self.geocoder.geocode(kind, name, scope).await?;
        let Some(first) = candidates.first() else {
            return Err(ResolutionError::NotFound {
                kind,
                name: name.to_string(),
            });
        };
        let coordinates = first.coordinates();

        // Stored without coordinates: adopt the record, fill in geocoded ones.
        if let Some(entity) = existing {
            return Ok(Resolution::resolved(entity.with_coordinates(coordinates)));
        }

        let new = NewReference::new(kind, name)
            .with_coordinates(coordinates)
            .with_country(scope);
        self.create_and_reconcile(&new, scope).await
    }

    /// Resolve an agency or speaker by name, creating it when missing
    ///
    /// Only an exact normalized name match is adopted; for speakers the
    /// lookup is scoped to `new.country`.
    pub async fn resolve_named(&self, new: &NewReference) -> Result<Resolution, ResolutionError> {
        let name = new.name.trim();
        let kind = new.kind;
        if name.is_empty() {
            return Err(ResolutionError::MissingName { kind });
        }

        self.emit(FelaEvent::ResolutionStarted {
            kind,
            name: name.to_string(),
            timestamp: chrono::Utc::now(),
        });

        let scope = scope_for(kind, new.country.as_deref());
        let result = match self.lookup(kind, name, scope, true).await {
            Ok(Some(entity)) => Ok(Resolution::resolved(entity)),
            Ok(None) => {
                let new = NewReference {
                    name: name.to_string(),
                    ..new.clone()
                };
                self.create_and_reconcile(&new, scope).await
            }
            Err(e) => Err(e.into()),
        };

        self.report(kind, name, &result);
        result
    }

    /// Resolve a dropdown commit
    ///
    /// Local candidates with coordinates are adopted as-is. External
    /// candidates are created in the reference store with their own
    /// coordinates.
    pub async fn adopt_candidate(
        &self,
        kind: ReferenceKind,
        candidate: &CandidateResult,
        scope_country: Option<&str>,
    ) -> Result<Resolution, ResolutionError> {
        match candidate {
            CandidateResult::Local(entity) => {
                if !kind.has_coordinates() || entity.place_data(false, false).is_some() {
                    return Ok(Resolution::resolved(entity.clone()));
                }
                self.resolve_place(kind, &entity.name, None, scope_country)
                    .await
            }
            CandidateResult::External(place) => {
                let name = place.name.trim();
                if name.is_empty() {
                    return Err(ResolutionError::MissingName { kind });
                }
                self.emit(FelaEvent::ResolutionStarted {
                    kind,
                    name: name.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                let scope = scope_for(kind, scope_country.or(place.country.as_deref()));
                let result = self.create_external(kind, place, scope).await;
                self.report(kind, name, &result);
                result
            }
        }
    }

    async fn create_external(
        &self,
        kind: ReferenceKind,
        place: &ExternalPlace,
        scope: Option<&str>,
    ) -> Result<Resolution, ResolutionError> {
        let new = NewReference::new(kind, place.name.trim())
            .with_coordinates(Coordinates::new(place.lat, place.lon))
            .with_country(scope);
        self.create_and_reconcile(&new, scope).await
    }

    /// Create, and on a duplicate signal re-query exactly once
    async fn create_and_reconcile(
        &self,
        new: &NewReference,
        scope: Option<&str>,
    ) -> Result<Resolution, ResolutionError> {
        let kind = new.kind;
        debug!(kind = %kind, name = %new.name, "Creating reference record");

        match self.store.create(new).await {
            Ok(created) => {
                let created = ReferenceEntity {
                    coordinates: created.coordinates.or(new.coordinates),
                    ..created
                };
                Ok(Resolution::created(created))
            }
            Err(BackendError::Conflict(message)) => {
                warn!(kind = %kind, name = %new.name, %message, "Record created concurrently, re-querying");
                let exact = !kind.has_coordinates();
                match self.lookup(kind, &new.name, scope, exact).await? {
                    Some(entity) => {
                        self.emit(FelaEvent::ConflictRecovered {
                            kind,
                            name: new.name.clone(),
                            timestamp: chrono::Utc::now(),
                        });
                        let entity = ReferenceEntity {
                            coordinates: entity.coordinates.or(new.coordinates),
                            ..entity
                        };
                        Ok(Resolution::resolved(entity))
                    }
                    None => Err(ResolutionError::CouldNotVerify {
                        kind,
                        name: new.name.clone(),
                    }),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Backend lookup; prefers an exact normalized match
    async fn lookup(
        &self,
        kind: ReferenceKind,
        name: &str,
        scope: Option<&str>,
        exact_only: bool,
    ) -> Result<Option<ReferenceEntity>, BackendError> {
        let query = ReferenceQuery::search(name).in_country(scope);
        let mut rows = self.store.list(kind, &query).await?;
        if let Some(pos) = rows.iter().position(|e| names_match(&e.name, name)) {
            return Ok(Some(rows.swap_remove(pos)));
        }
        if exact_only || rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.swap_remove(0)))
    }

    fn report(&self, kind: ReferenceKind, name: &str, result: &Result<Resolution, ResolutionError>) {
        match result {
            Ok(resolution) => {
                info!(
                    kind = %kind,
                    name = %name,
                    outcome = ?resolution.outcome,
                    id = ?resolution.entity.id,
                    "Resolved reference"
                );
                self.emit(FelaEvent::ResolutionCompleted {
                    kind,
                    name: resolution.entity.name.clone(),
                    created_now: resolution.created_now(),
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => {
                error!(kind = %kind, name = %name, error = %e, "Resolution failed");
                self.emit(FelaEvent::ResolutionFailed {
                    kind,
                    name: name.to_string(),
                    reason: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }
}

/// Country scope only applies to cities and speakers
fn scope_for(kind: ReferenceKind, scope_country: Option<&str>) -> Option<&str> {
    match kind {
        ReferenceKind::City | ReferenceKind::Speaker => {
            scope_country.map(str::trim).filter(|c| !c.is_empty())
        }
        ReferenceKind::Country | ReferenceKind::Agency => None,
    }
}
