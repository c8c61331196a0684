//! Error types for fela-intake
//!
//! Collaborator errors (`BackendError`, `GeocodingError`) are classified at
//! the HTTP boundary. `ResolutionError` is the typed Unresolvable reason of
//! the entity resolver, and `IntakeError` is what forms and the submission
//! pipeline surface to the user.

use crate::form::FieldPath;
use fela_common::api::ErrorBody;
use fela_common::events::SubmissionStep;
use fela_common::ReferenceKind;
use thiserror::Error;

/// Failure of a backend REST call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// Record already exists (HTTP 409, or a uniqueness violation reported as 400)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Field validation rejected by the backend (400)
    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<(String, Vec<String>)>,
    },

    /// Session missing or expired (401)
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    /// Permission or CSRF failure (403)
    #[error("{}", forbidden_message(.csrf, .message))]
    Forbidden { csrf: bool, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// No response from the backend
    #[error("Network error: {0}")]
    Network(String),

    /// Response arrived but could not be decoded
    #[error("Invalid response: {0}")]
    Parse(String),
}

impl BackendError {
    /// Classify a non-success response
    pub fn classify(status: u16, body: &str) -> Self {
        let parsed = ErrorBody::parse(body);
        let message = parsed
            .message()
            .unwrap_or_else(|| format!("request failed with status {status}"));

        match status {
            409 => BackendError::Conflict(message),
            400 if is_uniqueness_violation(body) => BackendError::Conflict(message),
            400 | 422 => BackendError::Validation {
                message,
                fields: parsed.field_errors,
            },
            401 => BackendError::Unauthorized(message),
            403 => BackendError::Forbidden {
                csrf: message.to_ascii_lowercase().contains("csrf"),
                message,
            },
            404 => BackendError::NotFound(message),
            _ => BackendError::Status { status, message },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, BackendError::Conflict(_))
    }

    /// Message as the backend phrased it, without the variant prefix
    pub fn raw_message(&self) -> String {
        match self {
            BackendError::Conflict(m)
            | BackendError::Unauthorized(m)
            | BackendError::NotFound(m)
            | BackendError::Network(m)
            | BackendError::Parse(m) => m.clone(),
            BackendError::Validation { message, .. }
            | BackendError::Forbidden { message, .. }
            | BackendError::Status { message, .. } => message.clone(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Parse(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

fn forbidden_message(csrf: &bool, message: &str) -> String {
    if *csrf {
        format!("CSRF verification failed: {message}")
    } else {
        format!("Forbidden: {message}")
    }
}

/// The backend reports uniqueness violations as free text; this is the only
/// place that text is inspected.
fn is_uniqueness_violation(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("unique") || lower.contains("already exists")
}

/// Failure of a geocoding search
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeocodingError {
    #[error("Geocoding service unreachable: {0}")]
    Network(String),

    #[error("Geocoding service rate limit exceeded")]
    RateLimited,

    #[error("Geocoding service returned HTTP {0}")]
    Status(u16),

    #[error("Invalid geocoding response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GeocodingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GeocodingError::Parse(err.to_string())
        } else {
            GeocodingError::Network(err.to_string())
        }
    }
}

/// Reason a name could not be turned into a canonical entity
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    #[error("{kind} name is empty")]
    MissingName { kind: ReferenceKind },

    #[error("{kind} \"{name}\" not found; select from dropdown")]
    NotFound { kind: ReferenceKind, name: String },

    /// Creation reported a duplicate but the re-query still found nothing
    #[error("{kind} \"{name}\" could not verify")]
    CouldNotVerify { kind: ReferenceKind, name: String },

    #[error("{0}")]
    Backend(String),

    #[error("Connection problem: {0}")]
    Network(String),
}

impl From<BackendError> for ResolutionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Network(m) => ResolutionError::Network(m),
            other => ResolutionError::Backend(other.raw_message()),
        }
    }
}

impl From<GeocodingError> for ResolutionError {
    fn from(err: GeocodingError) -> Self {
        match err {
            GeocodingError::Network(m) => ResolutionError::Network(m),
            other => ResolutionError::Backend(other.to_string()),
        }
    }
}

/// Steps that committed before a non-transactional pipeline stopped
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub completed: Vec<SubmissionStep>,
    pub failed_step: SubmissionStep,
    pub message: String,
}

impl std::fmt::Display for StepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.completed.last() {
            Some(last) => write!(
                f,
                "{} succeeded, but {} failed: {}",
                last, self.failed_step, self.message
            ),
            None => write!(f, "{} failed: {}", self.failed_step, self.message),
        }
    }
}

/// Error surfaced by forms and the submission pipeline
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IntakeError {
    /// Missing or invalid required field; corrected by the user
    #[error("{message}")]
    UserInput { field: FieldPath, message: String },

    /// A name could not be resolved; reported next to `field`
    #[error("{source}")]
    Resolution {
        field: FieldPath,
        #[source]
        source: ResolutionError,
    },

    /// Record already exists and could not be reconciled
    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("{0}")]
    Backend(String),

    #[error("Connection problem: {0}")]
    Network(String),

    /// The current user may not edit the catalogue
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Some steps of a multi-step submission committed before one failed
    #[error("{0}")]
    PartialFailure(StepReport),
}

impl IntakeError {
    pub fn user_input(field: FieldPath, message: impl Into<String>) -> Self {
        IntakeError::UserInput {
            field,
            message: message.into(),
        }
    }

    /// Field the error belongs to, for inline display
    pub fn field(&self) -> Option<&FieldPath> {
        match self {
            IntakeError::UserInput { field, .. } | IntakeError::Resolution { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }
}

impl From<BackendError> for IntakeError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Conflict(m) => IntakeError::Conflict(m),
            BackendError::Network(m) => IntakeError::Network(m),
            BackendError::Unauthorized(m) => IntakeError::PermissionDenied(m),
            BackendError::Forbidden { message, .. } => IntakeError::PermissionDenied(message),
            other => IntakeError::Backend(other.raw_message()),
        }
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;
