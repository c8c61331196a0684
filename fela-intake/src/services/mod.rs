//! Service modules for reference reconciliation
//!
//! Collaborator clients (backend, geocoding) and the components built on
//! them: suggestion engine, debounced search, dropdown binding, resolver.

pub mod autocomplete;
pub mod backend_client;
pub mod debounce;
pub mod entity_resolver;
pub mod geocoding_client;
pub mod suggestion_engine;

pub use autocomplete::{AutocompleteField, CreateCallback, SelectCallback};
pub use backend_client::{CatalogApi, HttpBackendClient, NewReference, ReferenceQuery, ReferenceStore};
pub use debounce::{DebouncedSearch, SuggestionUpdate};
pub use entity_resolver::{EntityResolver, Resolution, ResolutionOutcome};
pub use geocoding_client::{Geocoder, NominatimClient};
pub use suggestion_engine::{Commit, FieldOptions, NavKey, SuggestionEngine, SuggestionList};
