//! Pre-submission checks
//!
//! Checks run in a fixed order and the first failure wins. None of them
//! touch the network.

use super::fields::FieldPath;
use crate::error::{IntakeError, IntakeResult};
use crate::models::{EventDraft, PlaceData, PresentationDraft, SpeakerDescriptor};

/// Limits applied to event drafts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftLimits {
    pub min_event_year: i32,
    pub max_presentations: usize,
}

impl Default for DraftLimits {
    fn default() -> Self {
        Self {
            min_event_year: fela_common::config::DEFAULT_MIN_EVENT_YEAR,
            max_presentations: fela_common::config::DEFAULT_MAX_PRESENTATIONS,
        }
    }
}

impl DraftLimits {
    pub fn from_config(config: &fela_common::config::FelaConfig) -> Self {
        Self {
            min_event_year: config.min_event_year,
            max_presentations: config.max_presentations,
        }
    }
}

fn has_name(place: Option<&PlaceData>) -> bool {
    place.is_some_and(|p| !p.name.trim().is_empty())
}

pub fn validate_event(draft: &EventDraft, limits: &DraftLimits) -> IntakeResult<()> {
    if !has_name(draft.country.as_ref()) {
        return Err(IntakeError::user_input(FieldPath::EventCountry, "Country is required"));
    }
    if !has_name(draft.city.as_ref()) {
        return Err(IntakeError::user_input(FieldPath::EventCity, "City is required"));
    }
    match draft.year {
        None => return Err(IntakeError::user_input(FieldPath::EventYear, "Year is required")),
        Some(year) if year < limits.min_event_year => {
            return Err(IntakeError::user_input(
                FieldPath::EventYear,
                format!("Year must be {} or later", limits.min_event_year),
            ))
        }
        Some(_) => {}
    }
    if draft.title.trim().is_empty() {
        return Err(IntakeError::user_input(FieldPath::EventTitle, "Event title is required"));
    }
    if !draft.country.as_ref().is_some_and(PlaceData::is_complete) {
        return Err(IntakeError::user_input(
            FieldPath::EventCountry,
            "Country has no coordinates; select it from the dropdown",
        ));
    }
    if !draft.city.as_ref().is_some_and(PlaceData::is_complete) {
        return Err(IntakeError::user_input(
            FieldPath::EventCity,
            "City has no coordinates; select it from the dropdown",
        ));
    }
    if draft.presentations.is_empty() {
        return Err(IntakeError::user_input(
            FieldPath::Presentations,
            "At least one presentation is required",
        ));
    }
    if draft.presentations.len() > limits.max_presentations {
        return Err(IntakeError::user_input(
            FieldPath::Presentations,
            format!("At most {} presentations per event", limits.max_presentations),
        ));
    }
    for (index, presentation) in draft.presentations.iter().enumerate() {
        check_presentation_shape(index, presentation)?;
    }
    for (index, presentation) in draft.presentations.iter().enumerate() {
        check_speakers(index, presentation)?;
    }
    Ok(())
}

/// Checks for a presentation added to an existing event
pub fn validate_presentation(index: usize, presentation: &PresentationDraft) -> IntakeResult<()> {
    check_presentation_shape(index, presentation)?;
    check_speakers(index, presentation)
}

/// Title and at least one filled speaker row
fn check_presentation_shape(index: usize, presentation: &PresentationDraft) -> IntakeResult<()> {
    if presentation.title.trim().is_empty() {
        return Err(IntakeError::user_input(
            FieldPath::PresentationTitle {
                presentation: index,
            },
            format!("Presentation #{} needs a title", index + 1),
        ));
    }
    if presentation.filled_speakers().next().is_none() {
        return Err(IntakeError::user_input(
            FieldPath::PresentationSpeakers {
                presentation: index,
            },
            format!("Presentation #{} needs at least one speaker", index + 1),
        ));
    }
    Ok(())
}

fn check_speakers(index: usize, presentation: &PresentationDraft) -> IntakeResult<()> {
    for (speaker_index, speaker) in presentation.filled_speakers() {
        validate_speaker(index, speaker_index, speaker)?;
    }
    Ok(())
}

pub fn validate_speaker(
    presentation: usize,
    speaker_index: usize,
    speaker: &SpeakerDescriptor,
) -> IntakeResult<()> {
    if speaker.name.trim().is_empty() {
        return Err(IntakeError::user_input(
            FieldPath::SpeakerName {
                presentation,
                speaker: speaker_index,
            },
            format!("Speaker #{} needs a name", speaker_index + 1),
        ));
    }
    let has_country = !speaker.country.trim().is_empty()
        || speaker.country_data.as_ref().is_some_and(|c| !c.name.trim().is_empty());
    if !has_country {
        return Err(IntakeError::user_input(
            FieldPath::SpeakerCountry {
                presentation,
                speaker: speaker_index,
            },
            format!("Speaker \"{}\" needs a country", speaker.name.trim()),
        ));
    }
    Ok(())
}
