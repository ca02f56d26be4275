//! # Undo / Redo History
//!
//! Records applied patch sequences together with their reverse patches.
//!
//! ```text
//! apply ──▶ undo stack ──undo──▶ redo stack
//!               ▲                    │
//!               └───────redo─────────┘
//! ```
//!
//! The history never owns the document. Callers pass the current document in
//! and get the next one back, which keeps documents plain values.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::patch::{apply_patches, apply_patches_with_reverse, Patch, PatchError};
use crate::CanvasDocument;

/// Default number of undo steps kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// One recorded edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Forward patches as applied.
    pub patches: Vec<Patch>,
    /// Patches that undo the edit, in application order.
    pub reverse_patches: Vec<Patch>,
    /// When the edit was recorded (ms since epoch).
    pub timestamp: u64,
}

/// Bounded undo/redo stacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    /// Maximum undo depth (oldest entries dropped when exceeded).
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Create an empty history with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create an empty history keeping at most `capacity` undo steps.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Maximum undo depth.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Apply `patches` to `document` and record the edit.
    ///
    /// Clears the redo stack.
    ///
    /// # Errors
    ///
    /// Returns the patch error; nothing is recorded in that case.
    pub fn apply(
        &mut self,
        document: &CanvasDocument,
        patches: &[Patch],
    ) -> Result<CanvasDocument, PatchError> {
        let outcome = apply_patches_with_reverse(document, patches)?;
        self.redo.clear();
        if self.undo.len() >= self.capacity {
            self.undo.pop_front();
            tracing::debug!(capacity = self.capacity, "history full, dropped oldest entry");
        }
        self.undo.push_back(HistoryEntry {
            patches: outcome.patches,
            reverse_patches: outcome.reverse_patches,
            timestamp: current_timestamp_ms(),
        });
        Ok(outcome.document)
    }

    /// Undo the most recent edit.
    ///
    /// Returns `None` when there is nothing to undo. On error the entry stays
    /// on the undo stack.
    pub fn undo(
        &mut self,
        document: &CanvasDocument,
    ) -> Option<Result<CanvasDocument, PatchError>> {
        let entry = self.undo.pop_back()?;
        match apply_patches(document, &entry.reverse_patches) {
            Ok(previous) => {
                self.redo.push(entry);
                Some(Ok(previous))
            }
            Err(e) => {
                tracing::warn!(error = %e, "undo failed, document no longer matches history");
                self.undo.push_back(entry);
                Some(Err(e))
            }
        }
    }

    /// Redo the most recently undone edit.
    ///
    /// Returns `None` when there is nothing to redo.
    pub fn redo(
        &mut self,
        document: &CanvasDocument,
    ) -> Option<Result<CanvasDocument, PatchError>> {
        let entry = self.redo.pop()?;
        match apply_patches(document, &entry.patches) {
            Ok(next) => {
                self.undo.push_back(entry);
                Some(Ok(next))
            }
            Err(e) => {
                tracing::warn!(error = %e, "redo failed, document no longer matches history");
                self.redo.push(entry);
                Some(Err(e))
            }
        }
    }

    /// Whether an undo step is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether a redo step is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of undo steps recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.undo.len()
    }

    /// Check if no undo steps are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// Recorded edits, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.undo.iter()
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Serialize to JSON for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Current time in milliseconds since epoch.
pub(crate) fn current_timestamp_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| {
        // Timestamp will not exceed u64 max for millennia
        #[allow(clippy::cast_possible_truncation)]
        {
            d.as_millis() as u64
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::would_be_identical;
    use crate::{Artboard, Id, Node, Rect};
    use serde_json::json;

    fn sample() -> CanvasDocument {
        let hero = Node::frame("Hero", Rect::new(0.0, 0.0, 1440.0, 480.0)).with_id(Id::from_u128(2));
        let artboard = Artboard::new("Desktop", Rect::new(0.0, 0.0, 1440.0, 900.0))
            .with_id(Id::from_u128(1))
            .with_children([hero]);
        CanvasDocument::with_id(Id::from_u128(100), "Landing", vec![artboard]).expect("doc")
    }

    fn rename(name: &str) -> Vec<Patch> {
        vec![Patch::replace("/name", json!(name))]
    }

    #[test]
    fn test_history_creation() {
        let history = History::new();
        assert!(history.is_empty());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.capacity(), DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let doc = sample();
        let mut history = History::new();
        let edited = history
            .apply(&doc, &[Patch::replace("/artboards/0/children/0/frame/x", json!(24))])
            .expect("apply");
        assert_eq!(history.len(), 1);

        let undone = history.undo(&edited).expect("entry").expect("undo");
        assert!(would_be_identical(&undone, &doc));
        assert!(history.can_redo());

        let redone = history.redo(&undone).expect("entry").expect("redo");
        assert!(would_be_identical(&redone, &edited));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let doc = sample();
        let mut history = History::new();
        let a = history.apply(&doc, &rename("A")).expect("apply");
        let back = history.undo(&a).expect("entry").expect("undo");
        assert!(history.can_redo());
        history.apply(&back, &rename("B")).expect("apply");
        assert!(!history.can_redo());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut doc = sample();
        let mut history = History::with_capacity(2);
        for name in ["A", "B", "C"] {
            doc = history.apply(&doc, &rename(name)).expect("apply");
        }
        assert_eq!(history.len(), 2);
        let first = history.entries().next().expect("entry");
        assert_eq!(first.patches, rename("B"));
    }

    #[test]
    fn test_failed_apply_records_nothing() {
        let doc = sample();
        let mut history = History::new();
        let result = history.apply(&doc, &[Patch::remove("/artboards/0/children/9")]);
        assert!(result.is_err());
        assert!(history.is_empty());
    }

    #[test]
    fn test_undo_on_empty_history() {
        let mut history = History::new();
        assert!(history.undo(&sample()).is_none());
        assert!(history.redo(&sample()).is_none());
    }

    #[test]
    fn test_json_persistence() {
        let doc = sample();
        let mut history = History::with_capacity(5);
        let edited = history.apply(&doc, &rename("A")).expect("apply");

        let json = history.to_json().expect("to_json");
        let mut restored = History::from_json(&json).expect("from_json");
        assert_eq!(restored, history);
        let undone = restored.undo(&edited).expect("entry").expect("undo");
        assert!(would_be_identical(&undone, &doc));
    }

    #[test]
    fn test_clear() {
        let doc = sample();
        let mut history = History::new();
        history.apply(&doc, &rename("A")).expect("apply");
        history.clear();
        assert!(!history.can_undo());
    }
}
