//! Form state and submission
//!
//! Each form owns its draft and status explicitly. Handlers return
//! `ResolveRequest`s rather than calling the resolver, and results are
//! applied back through `complete_resolution`.

pub mod attach_forms;
pub mod event_form;
pub mod fields;
pub mod pipeline;
mod rows;
pub mod status;
pub mod validation;

pub use attach_forms::{AddPresentationForm, AddSpeakerForm};
pub use event_form::EventForm;
pub use fields::{FieldPath, PlaceField, ResolveRequest};
pub use pipeline::{AttachReport, SubmissionPipeline};
pub use status::{DraftPhase, FormStatus};
pub use validation::{
    validate_event, validate_presentation, validate_speaker, DraftLimits,
};
