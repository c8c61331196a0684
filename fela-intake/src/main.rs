//! fela-intake - headless driver for the FELA intake pipeline
//!
//! Runs suggestions, resolutions and submissions against the configured
//! backend and geocoding service. Results are printed as JSON on stdout;
//! logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fela_common::api::{AuthProvider, SessionCredentials, StaticAuth};
use fela_common::config::{ConfigOverrides, FelaConfig};
use fela_common::ReferenceKind;
use fela_intake::models::{EventDraft, PresentationDraft, SpeakerDescriptor};
use fela_intake::services::{HttpBackendClient, NewReference};
use fela_intake::IntakeState;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Command-line arguments for fela-intake
#[derive(Parser, Debug)]
#[command(name = "fela-intake")]
#[command(about = "Geocoding-assisted record entry for the FELA catalogue")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(long, global = true, env = "FELA_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Geocoding service base URL
    #[arg(long, global = true)]
    geocoding_url: Option<String>,

    /// Default log level (RUST_LOG overrides)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// CSRF token passed through to the backend
    #[arg(long, global = true, env = "FELA_CSRF_TOKEN", hide_env_values = true)]
    csrf_token: Option<String>,

    /// Session id passed through to the backend
    #[arg(long, global = true, env = "FELA_SESSION_ID", hide_env_values = true)]
    session_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show dropdown suggestions for a field
    Suggest {
        #[arg(value_parser = parse_kind)]
        kind: ReferenceKind,
        text: String,
        /// Country the search is scoped to (cities)
        #[arg(long)]
        scope: Option<String>,
    },
    /// Resolve a name to a canonical record, creating it when missing
    Resolve {
        #[arg(value_parser = parse_kind)]
        kind: ReferenceKind,
        name: String,
        /// Owning country (cities) or home country (speakers)
        #[arg(long)]
        scope: Option<String>,
    },
    /// Submit a complete event draft (JSON)
    SubmitEvent { draft: PathBuf },
    /// Add a presentation draft (JSON) to an existing event
    AddPresentation { event_id: i64, draft: PathBuf },
    /// Add a speaker (JSON) to an existing presentation
    AddSpeaker { presentation_id: i64, speaker: PathBuf },
}

fn parse_kind(value: &str) -> std::result::Result<ReferenceKind, String> {
    value.parse().map_err(|e: fela_common::Error| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        config_path: args.config.clone(),
        backend_url: args.backend_url.clone(),
        geocoding_url: args.geocoding_url.clone(),
        log_level: args.log_level.clone(),
    };
    let config = FelaConfig::resolve(&overrides).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting fela-intake v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", config.api_base_url());
    debug!("Geocoding: {}", config.geocoding_url);

    let credentials = SessionCredentials::new(args.session_id.clone(), args.csrf_token.clone());
    let auth = authenticate(&config, credentials).await?;
    let state = IntakeState::connect(config, auth)?;

    match args.command {
        Command::Suggest { kind, text, scope } => {
            let list = state
                .suggestion_engine()
                .suggest(&state.field_options(kind), &text, scope.as_deref())
                .await;
            print_json(&list)
        }
        Command::Resolve { kind, name, scope } => {
            let resolver = state.resolver();
            let resolution = if kind.has_coordinates() {
                resolver
                    .resolve_place(kind, &name, None, scope.as_deref())
                    .await?
            } else {
                resolver
                    .resolve_named(&NewReference::new(kind, name).with_country(scope.as_deref()))
                    .await?
            };
            print_json(&resolution)
        }
        Command::SubmitEvent { draft } => {
            let pipeline = state.pipeline()?;
            let mut draft: EventDraft = read_json(&draft)?;
            let event_id = pipeline.submit_event(&mut draft).await?;
            print_json(&serde_json::json!({ "event_id": event_id, "draft": draft }))
        }
        Command::AddPresentation { event_id, draft } => {
            let pipeline = state.pipeline()?;
            let mut draft: PresentationDraft = read_json(&draft)?;
            let event = pipeline.get_event(event_id).await?;
            let report = pipeline.add_presentation(&event, &mut draft).await?;
            print_json(&report)
        }
        Command::AddSpeaker {
            presentation_id,
            speaker,
        } => {
            let pipeline = state.pipeline()?;
            let mut speaker: SpeakerDescriptor = read_json(&speaker)?;
            let presentation = pipeline.get_presentation(presentation_id).await?;
            let speaker_id = pipeline.add_speaker(&presentation, &mut speaker).await?;
            print_json(&serde_json::json!({ "speaker_id": speaker_id, "speaker": speaker }))
        }
    }
}

/// Look up the signed-in user for the given session
async fn authenticate(
    config: &FelaConfig,
    credentials: SessionCredentials,
) -> Result<Arc<dyn AuthProvider>> {
    let probe = HttpBackendClient::new(config, Arc::new(StaticAuth::new(None, credentials.clone())))?;
    let user = probe
        .current_user()
        .await
        .context("Failed to query current user")?;
    match &user {
        Some(u) => info!(user = %u.username, approved = u.is_approved, "Signed in"),
        None => info!("No active session"),
    }
    Ok(Arc::new(StaticAuth::new(user, credentials)))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
