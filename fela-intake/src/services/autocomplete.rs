//! Dropdown state bound to one input field
//!
//! Owns the rendered list, its visibility and the caller's selection
//! callbacks. Form state is only ever changed by those callbacks.

use crate::models::{CandidateResult, CandidateSource};
use crate::services::debounce::SuggestionUpdate;
use crate::services::suggestion_engine::{Commit, FieldOptions, NavKey, SuggestionList};

pub type SelectCallback = Box<dyn FnMut(&CandidateResult, CandidateSource) + Send>;
pub type CreateCallback = Box<dyn FnMut(&str) + Send>;

pub struct AutocompleteField {
    options: FieldOptions,
    list: Option<SuggestionList>,
    visible: bool,
    rendered_request: u64,
    on_select: SelectCallback,
    on_create: Option<CreateCallback>,
}

impl AutocompleteField {
    pub fn new(options: FieldOptions, on_select: SelectCallback) -> Self {
        Self {
            options,
            list: None,
            visible: false,
            rendered_request: 0,
            on_select,
            on_create: None,
        }
    }

    pub fn with_on_create(mut self, on_create: CreateCallback) -> Self {
        self.on_create = Some(on_create);
        self
    }

    pub fn options(&self) -> &FieldOptions {
        &self.options
    }

    /// Currently shown list
    pub fn visible_list(&self) -> Option<&SuggestionList> {
        self.list.as_ref().filter(|_| self.visible)
    }

    /// Render an update if it is still the latest request for this field
    pub fn apply(&mut self, update: SuggestionUpdate, latest_request: u64) -> bool {
        if update.request_id != latest_request || update.request_id < self.rendered_request {
            return false;
        }
        self.rendered_request = update.request_id;
        self.visible = !update.list.is_empty() || update.list.notice.is_some();
        self.list = Some(update.list);
        true
    }

    /// Re-show a non-empty previous list
    pub fn focus(&mut self) {
        self.visible = self.list.as_ref().is_some_and(|l| !l.is_empty());
    }

    pub fn hide(&mut self) {
        self.visible = false;
        if let Some(list) = &mut self.list {
            list.highlighted = None;
        }
    }

    /// Keyboard handling; returns true when something was committed
    pub fn key(&mut self, key: NavKey) -> bool {
        if !self.visible {
            return false;
        }
        let Some(list) = self.list.as_mut() else {
            return false;
        };
        match list.handle_key(key) {
            None => false,
            Some(Commit::Dismiss) => {
                self.hide();
                false
            }
            Some(commit) => self.commit(commit),
        }
    }

    /// Mouse selection of a candidate
    pub fn select(&mut self, index: usize) -> bool {
        let candidate = self
            .list
            .as_ref()
            .and_then(|l| l.candidates.get(index))
            .cloned();
        match candidate {
            Some(c) => self.commit(Commit::Select(c)),
            None => false,
        }
    }

    fn commit(&mut self, commit: Commit) -> bool {
        let committed = match commit {
            Commit::Select(candidate) => {
                (self.on_select)(&candidate, candidate.source());
                true
            }
            Commit::Create(text) if self.options.allow_create => match &mut self.on_create {
                Some(on_create) => {
                    on_create(&text);
                    true
                }
                None => false,
            },
            Commit::Create(_) | Commit::Dismiss => false,
        };
        if committed {
            self.hide();
        }
        committed
    }
}
