//! Client-side polling state machine.
//!
//! Mirrors how the desktop client treats the insight document: keep polling
//! on the chunk cadence, pause entirely while the user is editing, and flush
//! the edit to the backend before the next poll so regeneration merges
//! around it instead of overwriting it.

use crate::api_client::{FetchedInsight, InsightDocument};

#[derive(Debug, Default)]
pub struct Poller {
    edit_mode: bool,
    pending_edit: Option<String>,
    last_document: Option<InsightDocument>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters edit mode; polling stays paused until the edit is saved or
    /// discarded.
    pub fn begin_edit(&mut self) {
        self.edit_mode = true;
    }

    pub fn discard_edit(&mut self) {
        self.edit_mode = false;
        self.pending_edit = None;
    }

    /// Leaves edit mode and stages the edited content to be pushed to the
    /// backend before the next poll.
    pub fn end_edit(&mut self, content: String) {
        self.pending_edit = Some(content);
        self.edit_mode = false;
    }

    pub fn is_editing(&self) -> bool {
        self.edit_mode
    }

    /// Whether this tick should hit the insight endpoint at all.
    pub fn should_poll(&self) -> bool {
        !self.edit_mode
    }

    /// The staged edit to push before polling, if any. Returned at most once.
    pub fn take_pending_edit(&mut self) -> Option<String> {
        self.pending_edit.take()
    }

    /// Folds a poll result into the state; returns the document when its
    /// content or regeneration timestamp changed since the last one shown.
    pub fn observe(&mut self, fetched: FetchedInsight) -> Option<InsightDocument> {
        match fetched {
            FetchedInsight::NotReady => None,
            FetchedInsight::Ready(document) => {
                let changed = self
                    .last_document
                    .as_ref()
                    .map(|last| {
                        last.content != document.content
                            || last.llm_updated_at != document.llm_updated_at
                    })
                    .unwrap_or(true);
                self.last_document = Some(document.clone());
                changed.then_some(document)
            }
        }
    }
}
