//! Suggestion engine
//!
//! Merges backend reference matches and geocoding matches into one ranked,
//! deduplicated dropdown list, and implements the dropdown's keyboard
//! contract. The engine never touches form state: a commit is handed back to
//! the caller as a `Commit` value.

use crate::models::{CandidateResult, ExternalPlace, ReferenceEntity, ReferenceKind};
use crate::services::backend_client::{ReferenceQuery, ReferenceStore};
use crate::services::geocoding_client::Geocoder;
use crate::utils::{names_match, normalize_name, similarity};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-field search configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOptions {
    pub kind: ReferenceKind,
    pub search_local: bool,
    pub search_external: bool,
    pub allow_create: bool,
    pub min_chars: usize,
}

impl FieldOptions {
    /// Defaults for each field kind
    pub fn for_kind(kind: ReferenceKind, min_chars: usize) -> Self {
        let (search_external, allow_create) = match kind {
            ReferenceKind::Country | ReferenceKind::City => (true, false),
            ReferenceKind::Agency => (false, true),
            ReferenceKind::Speaker => (false, false),
        };
        Self {
            kind,
            search_local: true,
            search_external,
            allow_create,
            min_chars: min_chars.max(1),
        }
    }

    pub fn accepts(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.min_chars
    }
}

/// Dropdown navigation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Down,
    Up,
    Enter,
    Escape,
}

/// What the user committed from the dropdown
#[derive(Debug, Clone, PartialEq)]
pub enum Commit {
    Select(CandidateResult),
    /// Free-text creation of the typed value
    Create(String),
    /// List dismissed without committing
    Dismiss,
}

/// Rendered dropdown state for one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionList {
    pub kind: ReferenceKind,
    pub query: String,
    pub candidates: Vec<CandidateResult>,
    /// "Create new" entry, always rendered last
    pub create: Option<String>,
    pub highlighted: Option<usize>,
    /// Source failure shown instead of silently dropping results
    pub notice: Option<String>,
}

impl SuggestionList {
    pub fn empty(kind: ReferenceKind, query: impl Into<String>) -> Self {
        Self {
            kind,
            query: query.into(),
            candidates: Vec::new(),
            create: None,
            highlighted: None,
            notice: None,
        }
    }

    /// Navigable entries, including the create entry
    pub fn len(&self) -> usize {
        self.candidates.len() + usize::from(self.create.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.candidates.iter().map(|c| c.label(self.kind)).collect();
        if let Some(create) = &self.create {
            labels.push(format!("➕ Create \"{}\"", create));
        }
        labels
    }

    /// Apply one key press
    ///
    /// Returns `None` while navigating, a `Commit` on Enter/Escape. Enter with
    /// nothing highlighted creates when a create entry is offered and
    /// dismisses otherwise.
    pub fn handle_key(&mut self, key: NavKey) -> Option<Commit> {
        let len = self.len();
        match key {
            NavKey::Down if len > 0 => {
                self.highlighted = Some(self.highlighted.map_or(0, |i| (i + 1).min(len - 1)));
                None
            }
            NavKey::Up if len > 0 => {
                self.highlighted = Some(self.highlighted.map_or(0, |i| i.saturating_sub(1)));
                None
            }
            NavKey::Down | NavKey::Up => None,
            NavKey::Enter => match self.highlighted {
                Some(i) if i < self.candidates.len() => {
                    Some(Commit::Select(self.candidates[i].clone()))
                }
                _ => match self.create.clone() {
                    Some(text) => Some(Commit::Create(text)),
                    None => {
                        self.highlighted = None;
                        Some(Commit::Dismiss)
                    }
                },
            },
            NavKey::Escape => {
                self.highlighted = None;
                Some(Commit::Dismiss)
            }
        }
    }
}

/// Merge local and external candidates
///
/// Local results come first, ranked by similarity to the query; external
/// results follow in service order, dropping any whose normalized name
/// matches a local one (or an earlier external one). A create entry is
/// offered when allowed and nothing matches the query exactly.
pub fn merge_candidates(
    query: &str,
    local: Vec<ReferenceEntity>,
    external: Vec<ExternalPlace>,
    allow_create: bool,
) -> (Vec<CandidateResult>, Option<String>) {
    let mut local = local;
    local.sort_by(|a, b| {
        similarity(query, &b.name)
            .partial_cmp(&similarity(query, &a.name))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen: HashSet<String> = local.iter().map(|e| normalize_name(&e.name)).collect();
    let mut merged: Vec<CandidateResult> = local.into_iter().map(CandidateResult::Local).collect();

    for place in external {
        if seen.insert(normalize_name(&place.name)) {
            merged.push(CandidateResult::External(place));
        }
    }

    let trimmed = query.trim();
    let exact = merged.iter().any(|c| names_match(c.name(), trimmed));
    let create = (allow_create && !exact && !trimmed.is_empty()).then(|| trimmed.to_string());

    (merged, create)
}

/// Candidate search over both sources
#[derive(Clone)]
pub struct SuggestionEngine {
    store: Arc<dyn ReferenceStore>,
    geocoder: Arc<dyn Geocoder>,
}

impl SuggestionEngine {
    pub fn new(store: Arc<dyn ReferenceStore>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { store, geocoder }
    }

    /// Build the dropdown list for `text`
    ///
    /// `scope_country` restricts city searches to the chosen country. Input
    /// shorter than `min_chars` yields an empty list without network calls.
    pub async fn suggest(
        &self,
        options: &FieldOptions,
        text: &str,
        scope_country: Option<&str>,
    ) -> SuggestionList {
        let query = text.trim();
        let mut list = SuggestionList::empty(options.kind, query);
        if !options.accepts(query) {
            return list;
        }

        let mut notices = Vec::new();

        let local = if options.search_local {
            let request = ReferenceQuery::search(query).in_country(match options.kind {
                ReferenceKind::City => scope_country,
                _ => None,
            });
            match self.store.list(options.kind, &request).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(kind = %options.kind, query = %query, error = %e, "Local search failed");
                    notices.push(format!("Local search failed: {}", e));
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let external = if options.search_external && options.kind.has_coordinates() {
            match self
                .geocoder
                .search_place(options.kind, query, scope_country)
                .await
            {
                Ok(places) => places,
                Err(e) => {
                    warn!(kind = %options.kind, query = %query, error = %e, "Geocoding search failed");
                    notices.push(e.to_string());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        debug!(
            kind = %options.kind,
            query = %query,
            local = local.len(),
            external = external.len(),
            "Merging suggestions"
        );

        let (candidates, create) = merge_candidates(query, local, external, options.allow_create);
        list.candidates = candidates;
        list.create = create;
        if !notices.is_empty() {
            list.notice = Some(notices.join("; "));
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateSource, Coordinates};

    fn external(name: &str) -> ExternalPlace {
        ExternalPlace {
            name: name.to_string(),
            lat: 23.6,
            lon: -102.5,
            raw_label: name.to_string(),
            country: None,
        }
    }

    fn local(kind: ReferenceKind, name: &str) -> ReferenceEntity {
        ReferenceEntity::new(kind, name).with_coordinates(Coordinates::new(23.6, -102.5))
    }

    #[test]
    fn test_field_defaults() {
        let country = FieldOptions::for_kind(ReferenceKind::Country, 1);
        assert!(country.search_external && !country.allow_create);
        let agency = FieldOptions::for_kind(ReferenceKind::Agency, 1);
        assert!(!agency.search_external && agency.allow_create);
        assert!(!FieldOptions::for_kind(ReferenceKind::Speaker, 2).accepts(" a "));
    }

    #[test]
    fn test_merge_drops_external_duplicates() {
        let (merged, create) = merge_candidates(
            "mex",
            vec![local(ReferenceKind::Country, "México")],
            vec![external("mexico"), external("New Mexico"), external("new  mexico")],
            false,
        );
        let names: Vec<&str> = merged.iter().map(CandidateResult::name).collect();
        assert_eq!(names, vec!["México", "New Mexico"]);
        assert_eq!(merged[0].source(), CandidateSource::Local);
        assert_eq!(create, None);
    }

    #[test]
    fn test_merge_ranks_local_by_similarity() {
        let (merged, _) = merge_candidates(
            "Peru",
            vec![
                local(ReferenceKind::Country, "Papua New Guinea"),
                local(ReferenceKind::Country, "Perú"),
            ],
            Vec::new(),
            false,
        );
        assert_eq!(merged[0].name(), "Perú");
    }

    #[test]
    fn test_create_entry_only_without_exact_match() {
        let (_, create) = merge_candidates(
            "UNESCO",
            vec![local(ReferenceKind::Agency, "unesco")],
            Vec::new(),
            true,
        );
        assert_eq!(create, None);

        let (_, create) = merge_candidates(
            " UNES ",
            vec![local(ReferenceKind::Agency, "UNESCO")],
            Vec::new(),
            true,
        );
        assert_eq!(create.as_deref(), Some("UNES"));
    }

    #[test]
    fn test_keyboard_contract() {
        let mut list = SuggestionList::empty(ReferenceKind::Agency, "UN");
        list.candidates = vec![
            CandidateResult::Local(ReferenceEntity::new(ReferenceKind::Agency, "UNESCO")),
            CandidateResult::Local(ReferenceEntity::new(ReferenceKind::Agency, "UNICEF")),
        ];
        list.create = Some("UN".to_string());

        assert_eq!(list.handle_key(NavKey::Up), None);
        assert_eq!(list.highlighted, Some(0));
        for _ in 0..5 {
            list.handle_key(NavKey::Down);
        }
        assert_eq!(list.highlighted, Some(2));
        assert_eq!(list.handle_key(NavKey::Enter), Some(Commit::Create("UN".to_string())));

        list.handle_key(NavKey::Up);
        match list.handle_key(NavKey::Enter) {
            Some(Commit::Select(c)) => assert_eq!(c.name(), "UNICEF"),
            other => panic!("expected selection, got {other:?}"),
        }

        assert_eq!(list.handle_key(NavKey::Escape), Some(Commit::Dismiss));
        assert_eq!(list.highlighted, None);
    }

    #[test]
    fn test_enter_without_highlight_respects_create_flag() {
        let mut list = SuggestionList::empty(ReferenceKind::Country, "Atl");
        assert_eq!(list.handle_key(NavKey::Down), None);
        assert_eq!(list.highlighted, None);
        assert_eq!(list.handle_key(NavKey::Enter), Some(Commit::Dismiss));

        let mut agencies = SuggestionList::empty(ReferenceKind::Agency, "OEA");
        agencies.create = Some("OEA".to_string());
        assert_eq!(
            agencies.handle_key(NavKey::Enter),
            Some(Commit::Create("OEA".to_string()))
        );
    }
}
