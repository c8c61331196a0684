//! Speaker row edits shared by the event and add-presentation forms
//!
//! Rows are addressed by `(presentation, speaker)` index. Each edit builds
//! the next descriptor from the current one and swaps it in.

use super::fields::{FieldPath, ResolveRequest};
use super::status::FormStatus;
use crate::error::{IntakeError, IntakeResult, ResolutionError};
use crate::models::{PlaceData, PresentationDraft, ReferenceKind, SpeakerDescriptor};
use crate::services::Resolution;
use tracing::debug;

pub(crate) fn add_row(draft: &mut PresentationDraft) -> usize {
    draft.speakers.push(SpeakerDescriptor::default());
    draft.speakers.len() - 1
}

pub(crate) fn remove_row(
    draft: &mut PresentationDraft,
    presentation: usize,
    speaker: usize,
) -> IntakeResult<()> {
    if draft.speakers.len() <= 1 {
        return Err(IntakeError::user_input(
            FieldPath::PresentationSpeakers { presentation },
            "A presentation needs at least one speaker",
        ));
    }
    if speaker >= draft.speakers.len() {
        return Err(missing_row(presentation, speaker));
    }
    draft.speakers.remove(speaker);
    Ok(())
}

fn missing_row(presentation: usize, speaker: usize) -> IntakeError {
    IntakeError::user_input(
        FieldPath::PresentationSpeakers { presentation },
        format!("No speaker #{}", speaker + 1),
    )
}

/// Replace one row with the descriptor `next` builds; `Ok(false)` when
/// `next` refuses the edit (locked field)
pub(crate) fn edit_row<F>(
    draft: &mut PresentationDraft,
    presentation: usize,
    speaker: usize,
    next: F,
) -> IntakeResult<bool>
where
    F: FnOnce(&SpeakerDescriptor) -> Option<SpeakerDescriptor>,
{
    let slot = draft
        .speakers
        .get_mut(speaker)
        .ok_or_else(|| missing_row(presentation, speaker))?;
    match next(slot) {
        Some(replacement) => {
            *slot = replacement;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Blur-time country resolution for a row that still needs it
pub(crate) fn country_request(
    draft: &PresentationDraft,
    presentation: usize,
    speaker: usize,
) -> Option<ResolveRequest> {
    let row = draft.speakers.get(speaker)?;
    if row.is_bound() || row.country.trim().is_empty() || row.country_locked() {
        return None;
    }
    Some(ResolveRequest::blur(
        FieldPath::SpeakerCountry {
            presentation,
            speaker,
        },
        ReferenceKind::Country,
        &row.country,
        row.country_data.as_ref(),
    ))
}

/// Apply a finished speaker-country resolution to `draft`
///
/// Stale results (row rebound, retyped or already resolved) are dropped.
pub(crate) fn apply_country(
    draft: &mut PresentationDraft,
    status: &mut FormStatus,
    request: &ResolveRequest,
    result: Result<Resolution, ResolutionError>,
) -> bool {
    let FieldPath::SpeakerCountry { speaker, .. } = request.path else {
        return false;
    };
    let Some(row) = draft.speakers.get_mut(speaker) else {
        return false;
    };
    if row.is_bound()
        || row.country.trim() != request.text
        || row.country_data.as_ref().is_some_and(PlaceData::is_complete)
    {
        debug!(path = %request.path, "Dropping stale resolution");
        return false;
    }
    match place_of(result) {
        Ok(place) => {
            *row = row.with_country_data(place);
            status.clear_issue(&request.path);
        }
        Err(message) => status.set_issue(request.path, message),
    }
    true
}

/// Place carried by a resolution, or the message to show inline
pub(crate) fn place_of(result: Result<Resolution, ResolutionError>) -> Result<PlaceData, String> {
    match result {
        Ok(resolution) => resolution
            .place
            .ok_or_else(|| format!("\"{}\" has no coordinates", resolution.entity.name)),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_row_cannot_be_removed() {
        let mut draft = PresentationDraft::with_blank_speaker();
        assert!(remove_row(&mut draft, 0, 0).is_err());
        assert_eq!(add_row(&mut draft), 1);
        assert!(remove_row(&mut draft, 0, 5).is_err());
        assert!(remove_row(&mut draft, 0, 0).is_ok());
        assert_eq!(draft.speakers.len(), 1);
    }

    #[test]
    fn test_refused_edit_leaves_row() {
        let mut draft = PresentationDraft::with_blank_speaker();
        draft.speakers[0].id = Some(3);
        draft.speakers[0].name = "Ana".to_string();
        assert!(!edit_row(&mut draft, 0, 0, |s| s.with_agency_input("OEA")).unwrap());
        assert_eq!(draft.speakers[0].agency, None);
        assert!(edit_row(&mut draft, 0, 2, |s| Some(s.clone())).is_err());
    }
}
