//! IntakeState wiring from a resolved configuration

mod helpers;

use fela_common::config::{ConfigOverrides, FelaConfig, ENV_BACKEND_URL};
use fela_intake::form::{DraftLimits, FieldPath};
use fela_intake::models::ReferenceKind;
use fela_intake::{IntakeError, IntakeState};
use helpers::{InMemoryStore, MockCatalog, ScriptedGeocoder};
use serial_test::serial;
use std::sync::Arc;
use tempfile::TempDir;

fn config_from_toml(contents: &str) -> FelaConfig {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    FelaConfig::resolve(&ConfigOverrides {
        config_path: Some(path),
        ..Default::default()
    })
    .unwrap()
}

#[test]
#[serial]
fn test_limits_follow_config_file() {
    let config = config_from_toml("max_presentations = 2\nmin_event_year = 2010\nmin_chars = 3\n");
    let store = InMemoryStore::new();
    let geocoder = Arc::new(ScriptedGeocoder::new());
    let catalog = MockCatalog::new();
    let state = IntakeState::new(
        config,
        store,
        catalog,
        geocoder,
        helpers::approved_auth(),
    );

    assert_eq!(
        state.limits(),
        DraftLimits {
            min_event_year: 2010,
            max_presentations: 2,
        }
    );
    assert_eq!(state.field_options(ReferenceKind::City).min_chars, 3);
    assert!(state.field_options(ReferenceKind::Agency).allow_create);

    let mut form = state.event_form();
    assert_eq!(form.add_presentation().unwrap(), 1);
    let err = form.add_presentation().unwrap_err();
    assert_eq!(err.field(), Some(&FieldPath::Presentations));
}

#[test]
#[serial]
fn test_env_overrides_file_for_backend_url() {
    std::env::set_var(ENV_BACKEND_URL, "http://env.test/");
    let config = config_from_toml("backend_url = \"http://file.test\"\n");
    std::env::remove_var(ENV_BACKEND_URL);

    assert_eq!(config.backend_url, "http://env.test");
    assert_eq!(config.api_base_url(), "http://env.test/FELA");
}

#[tokio::test]
#[serial]
async fn test_connect_builds_http_clients() {
    let config = config_from_toml("geocoding_requests_per_second = 2\n");
    let state = IntakeState::connect(config, helpers::approved_auth()).unwrap();

    assert!(state.pipeline().is_ok());
    let (search, _rx) = state.debounced_search(ReferenceKind::Country);
    assert_eq!(search.options().kind, ReferenceKind::Country);
}

#[test]
fn test_unapproved_state_refuses_pipeline() {
    let store = InMemoryStore::new();
    let geocoder = Arc::new(ScriptedGeocoder::new());
    let catalog = MockCatalog::new();
    let state = IntakeState::new(
        FelaConfig::default(),
        store,
        catalog,
        geocoder,
        helpers::unapproved_auth(),
    );

    assert!(matches!(state.pipeline(), Err(IntakeError::PermissionDenied(_))));
}
