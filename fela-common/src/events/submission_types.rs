//! Submission step types carried by pipeline events

use serde::{Deserialize, Serialize};
use std::fmt;

/// One backend-facing step of a submission
///
/// Full-event submission is a single `CreateComplete` step. Adding a
/// presentation or a speaker to an existing record walks through the other
/// steps in order, each committed independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SubmissionStep {
    /// Lazy country validation for one speaker row
    ResolveSpeakerCountry { speaker_index: usize },
    /// Single nested create for a whole event
    CreateComplete,
    /// Duplicate presentation title guard
    CheckDuplicateTitle,
    CreatePresentation,
    /// Search-or-create of one speaker
    ResolveSpeaker { speaker_index: usize },
    /// Link one speaker to the presentation
    AssociateSpeaker { speaker_index: usize },
}

impl fmt::Display for SubmissionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionStep::ResolveSpeakerCountry { speaker_index } => {
                write!(f, "country validation for speaker #{}", speaker_index + 1)
            }
            SubmissionStep::CreateComplete => write!(f, "event creation"),
            SubmissionStep::CheckDuplicateTitle => write!(f, "duplicate title check"),
            SubmissionStep::CreatePresentation => write!(f, "presentation creation"),
            SubmissionStep::ResolveSpeaker { speaker_index } => {
                write!(f, "speaker #{} lookup/creation", speaker_index + 1)
            }
            SubmissionStep::AssociateSpeaker { speaker_index } => {
                write!(f, "speaker #{} association", speaker_index + 1)
            }
        }
    }
}

/// Which submission flow an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    CompleteEvent,
    AddPresentation,
    AddSpeaker,
}
