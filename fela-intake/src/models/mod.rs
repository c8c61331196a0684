//! Data model for reference entities, candidates, drafts and catalogue records

pub mod candidate;
pub mod catalog;
pub mod draft;
pub mod reference;

pub use candidate::{CandidateResult, CandidateSource, ExternalPlace};
pub use catalog::{
    CreatedRecord, EventFilters, EventRecord, NewPresentation, PresentationFilters,
    PresentationRecord, PresentationSpeaker,
};
pub use draft::{CreateCompletePayload, EventDraft, PresentationDraft, SpeakerDescriptor};
pub use reference::{Coordinates, PlaceData, ReferenceEntity, ReferenceKind};
