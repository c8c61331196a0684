//! Suggestion engine and debounced search tests

mod helpers;

use fela_intake::models::{CandidateSource, Coordinates, ReferenceEntity, ReferenceKind};
use fela_intake::services::{DebouncedSearch, FieldOptions, SuggestionEngine};
use helpers::{InMemoryStore, ScriptedGeocoder};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn engine(store: &Arc<InMemoryStore>, geocoder: &Arc<ScriptedGeocoder>) -> SuggestionEngine {
    SuggestionEngine::new(store.clone(), geocoder.clone())
}

#[tokio::test]
async fn test_external_duplicate_of_local_is_dropped() {
    let store = InMemoryStore::new();
    store.seed_country("México", 23.6, -102.5);
    let geocoder = Arc::new(ScriptedGeocoder::new().place("mexico", "mexico", 23.6, -102.5));

    let list = engine(&store, &geocoder)
        .suggest(&FieldOptions::for_kind(ReferenceKind::Country, 1), "mexico", None)
        .await;

    assert_eq!(list.candidates.len(), 1);
    assert_eq!(list.candidates[0].source(), CandidateSource::Local);
    assert_eq!(list.candidates[0].name(), "México");
    assert_eq!(list.create, None);
    assert_eq!(geocoder.calls(), 1);
}

#[tokio::test]
async fn test_city_suggestions_are_scoped_to_country() {
    let store = InMemoryStore::new();
    store.seed(
        ReferenceEntity::new(ReferenceKind::City, "Santiago")
            .with_coordinates(Coordinates::new(-33.4, -70.6))
            .with_country("Chile"),
    );
    store.seed(
        ReferenceEntity::new(ReferenceKind::City, "Santiago de Compostela")
            .with_coordinates(Coordinates::new(42.9, -8.5))
            .with_country("Spain"),
    );
    let geocoder = Arc::new(ScriptedGeocoder::new());

    let list = engine(&store, &geocoder)
        .suggest(
            &FieldOptions::for_kind(ReferenceKind::City, 1),
            "Santiago",
            Some("Chile"),
        )
        .await;

    assert_eq!(list.labels(), vec!["Santiago, Chile".to_string()]);
}

#[tokio::test]
async fn test_agency_offers_create_unless_exact_match() {
    let store = InMemoryStore::new();
    store.seed(ReferenceEntity::new(ReferenceKind::Agency, "CEPAL"));
    let geocoder = Arc::new(ScriptedGeocoder::new());
    let engine = engine(&store, &geocoder);
    let options = FieldOptions::for_kind(ReferenceKind::Agency, 1);

    let fresh = engine.suggest(&options, "OEA", None).await;
    assert!(fresh.candidates.is_empty());
    assert_eq!(fresh.create.as_deref(), Some("OEA"));

    let known = engine.suggest(&options, " cepal", None).await;
    assert_eq!(known.candidates.len(), 1);
    assert_eq!(known.create, None);
    assert_eq!(geocoder.calls(), 0, "agencies never hit the geocoder");
}

#[tokio::test]
async fn test_failed_source_is_reported_not_swallowed() {
    let store = InMemoryStore::new();
    store.failing_lists.store(true, Ordering::SeqCst);
    let geocoder = Arc::new(ScriptedGeocoder::new().place("Peru", "Peru", -9.2, -75.0));

    let list = engine(&store, &geocoder)
        .suggest(&FieldOptions::for_kind(ReferenceKind::Country, 1), "Peru", None)
        .await;

    assert_eq!(list.candidates.len(), 1);
    assert_eq!(list.candidates[0].source(), CandidateSource::External);
    assert!(list.notice.unwrap().contains("Local search failed"));
}

// ============================================================================
// Debounce
// ============================================================================

#[tokio::test]
async fn test_stale_response_is_discarded() {
    let store = InMemoryStore::new();
    store.seed_country("Peru", -9.2, -75.0);
    let geocoder = Arc::new(ScriptedGeocoder::new().slow("Per", Duration::from_millis(300)));
    let (search, mut rx) = DebouncedSearch::new(
        engine(&store, &geocoder),
        FieldOptions::for_kind(ReferenceKind::Country, 3),
        Duration::from_millis(10),
    );

    let first = search.input("Per", None);
    // Let the first request get past its timer and into the slow geocoder.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let second = search.input("Peru", None);

    let update = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("update arrives")
        .expect("channel open");
    assert_eq!(update.request_id, second);
    assert_eq!(update.list.query, "Peru");

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(rx.try_recv().is_err(), "request {} must not surface", first);
    assert_eq!(geocoder.calls(), 2);
}

#[tokio::test]
async fn test_keystrokes_within_delay_coalesce() {
    let store = InMemoryStore::new();
    let geocoder = Arc::new(ScriptedGeocoder::new().place("Peru", "Perú", -9.2, -75.0));
    let (search, mut rx) = DebouncedSearch::new(
        engine(&store, &geocoder),
        FieldOptions::for_kind(ReferenceKind::Country, 3),
        Duration::from_millis(80),
    );

    search.input("Per", None);
    search.input("Peru", None);
    let last = search.input("Peru ", None);

    let update = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("update arrives")
        .expect("channel open");
    assert_eq!(update.request_id, last);
    assert!(search.is_latest(last));
    assert_eq!(update.list.candidates.len(), 1);
    assert_eq!(geocoder.calls(), 1);
    assert_eq!(store.lists(), 1);
}

#[tokio::test]
async fn test_short_input_clears_without_network() {
    let store = InMemoryStore::new();
    let geocoder = Arc::new(ScriptedGeocoder::new());
    let (search, mut rx) = DebouncedSearch::new(
        engine(&store, &geocoder),
        FieldOptions::for_kind(ReferenceKind::Country, 3),
        Duration::from_millis(10),
    );

    let id = search.input("Pe", None);
    let update = rx.recv().await.expect("channel open");

    assert_eq!(update.request_id, id);
    assert!(update.list.is_empty());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.lists(), 0);
    assert_eq!(geocoder.calls(), 0);
}
