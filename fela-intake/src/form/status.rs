//! Draft submission state machine
//!
//! `editing → validating → submitting → succeeded | failed`. A failed draft
//! returns to `editing` on the next edit; nothing is retried automatically.

use super::fields::FieldPath;
use crate::error::IntakeError;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum DraftPhase {
    Editing,
    Validating,
    Submitting,
    Succeeded { record_id: i64 },
    Failed { message: String },
}

/// Phase plus the inline issues and banner shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormStatus {
    pub phase: DraftPhase,
    pub issues: BTreeMap<FieldPath, String>,
    pub banner: Option<String>,
}

impl Default for FormStatus {
    fn default() -> Self {
        Self {
            phase: DraftPhase::Editing,
            issues: BTreeMap::new(),
            banner: None,
        }
    }
}

impl FormStatus {
    /// Any edit; leaves a failed state
    pub fn touch(&mut self) {
        if matches!(self.phase, DraftPhase::Failed { .. }) {
            self.phase = DraftPhase::Editing;
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, DraftPhase::Validating | DraftPhase::Submitting)
    }

    pub fn begin_validation(&mut self) {
        self.phase = DraftPhase::Validating;
        self.issues.clear();
        self.banner = None;
    }

    pub fn begin_submission(&mut self) {
        self.phase = DraftPhase::Submitting;
    }

    pub fn succeed(&mut self, record_id: i64) {
        self.phase = DraftPhase::Succeeded { record_id };
        self.issues.clear();
        self.banner = None;
    }

    /// Field errors go inline next to the field; every failure sets the banner
    pub fn fail(&mut self, err: &IntakeError) {
        if let Some(field) = err.field() {
            self.issues.insert(*field, err.to_string());
        }
        let message = err.to_string();
        self.banner = Some(message.clone());
        self.phase = DraftPhase::Failed { message };
    }

    pub fn set_issue(&mut self, field: FieldPath, message: impl Into<String>) {
        self.issues.insert(field, message.into());
    }

    pub fn clear_issue(&mut self, field: &FieldPath) {
        self.issues.remove(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_returns_to_editing_on_touch() {
        let mut status = FormStatus::default();
        status.begin_validation();
        assert!(status.is_busy());

        status.fail(&IntakeError::user_input(FieldPath::EventYear, "Year is required"));
        assert_eq!(
            status.issues.get(&FieldPath::EventYear).map(String::as_str),
            Some("Year is required")
        );
        assert!(matches!(status.phase, DraftPhase::Failed { .. }));

        status.touch();
        assert_eq!(status.phase, DraftPhase::Editing);
        assert!(status.banner.is_some());
    }

    #[test]
    fn test_backend_failures_only_set_banner() {
        let mut status = FormStatus::default();
        status.fail(&IntakeError::Backend("HTTP 500".to_string()));
        assert!(status.issues.is_empty());
        assert_eq!(status.banner.as_deref(), Some("HTTP 500"));
    }
}
