//! Overlay transactions: atomic, invertible node replacements
//!
//! Every overlay edit is one `OverlayTransaction`: a contiguous run of
//! children of `parent` (`removed`) is swapped for another run (`inserted`).
//! `inverse()` swaps the two runs back, which is exactly what cleanup needs.

use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayTransaction {
    pub parent: NodeId,
    /// Child slot of the first removed node when the transaction was planned
    pub slot: usize,
    pub removed: Vec<NodeId>,
    pub inserted: Vec<NodeId>,
}

impl OverlayTransaction {
    /// Describe replacing the attached node `target` with `inserted`.
    /// Returns `None` when `target` has no parent.
    pub fn replace(doc: &Document, target: NodeId, inserted: Vec<NodeId>) -> Option<Self> {
        let parent = doc.parent(target)?;
        let slot = doc.child_position(parent, target)?;
        Some(Self {
            parent,
            slot,
            removed: vec![target],
            inserted,
        })
    }

    /// The transaction that undoes this one
    pub fn inverse(&self) -> Self {
        Self {
            parent: self.parent,
            slot: self.slot,
            removed: self.inserted.clone(),
            inserted: self.removed.clone(),
        }
    }

    /// True when `removed` currently sits under `parent` as one contiguous run
    pub fn can_apply(&self, doc: &Document) -> bool {
        self.current_slot(doc).is_some()
    }

    fn current_slot(&self, doc: &Document) -> Option<usize> {
        let first = *self.removed.first()?;
        let start = doc.child_position(self.parent, first)?;
        let children = doc.children(self.parent);
        let run = children.get(start..start + self.removed.len())?;
        (run == self.removed.as_slice()).then_some(start)
    }

    /// Apply atomically. Leaves the document untouched and returns `false`
    /// if the removed run is no longer in place. New nodes go in before the
    /// old run leaves, so a node that sits inside the old run is moved out of
    /// it rather than detached with it.
    pub fn apply(&self, doc: &mut Document) -> bool {
        let Some(&anchor) = self.removed.first() else {
            return false;
        };
        if self.current_slot(doc).is_none() {
            return false;
        }
        for node in &self.inserted {
            doc.insert_before(self.parent, *node, anchor);
        }
        for node in &self.removed {
            if !self.inserted.contains(node) {
                doc.detach(*node);
            }
        }
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
