//! MentionIndex: canonical ordered collection of mention records
//!
//! Two ways in:
//! - `rebuild` replaces everything and re-derives document order
//! - `merge_new` appends unseen records after the existing ones, leaving
//!   earlier positions and overlays untouched
//!
//! The index also owns the current-position cursor so both operations can
//! clamp it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::ops::Range;

use crate::dom::{Document, NodeId};

// =============================================================================
// Types
// =============================================================================

/// How an occurrence was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MentionKind {
    /// Existing hyperlink whose text or target is the viewer
    NativeLink,
    /// Raw `@handle` text
    PlainText,
}

impl MentionKind {
    fn rank(self) -> u8 {
        match self {
            MentionKind::NativeLink => 0,
            MentionKind::PlainText => 1,
        }
    }
}

/// One occurrence of the viewer's handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionRecord {
    /// Text node the occurrence was found in (owned by the document)
    pub source_node: NodeId,
    /// Snapshot of the node's text at detection time
    pub source_text: String,
    /// Byte offset of the match in `source_text`
    pub offset: usize,
    /// Byte length of the match
    pub len: usize,
    pub kind: MentionKind,
    /// The hyperlink element for `NativeLink` records
    pub link: Option<NodeId>,
    /// Rendered overlay element, if any
    pub overlay: Option<NodeId>,
    /// Stable index used for navigation and numbering
    pub position: usize,
}

impl MentionRecord {
    pub fn plain_text(source_node: NodeId, source_text: &str, offset: usize, len: usize) -> Self {
        Self {
            source_node,
            source_text: source_text.to_string(),
            offset,
            len,
            kind: MentionKind::PlainText,
            link: None,
            overlay: None,
            position: 0,
        }
    }

    /// A native link record always spans the whole link text
    pub fn native_link(link: NodeId, source_node: NodeId, source_text: &str) -> Self {
        Self {
            source_node,
            source_text: source_text.to_string(),
            offset: 0,
            len: source_text.len(),
            kind: MentionKind::NativeLink,
            link: Some(link),
            overlay: None,
            position: 0,
        }
    }

    /// Matched text as it appeared in the source
    pub fn matched_text(&self) -> &str {
        self.source_text
            .get(self.offset..self.offset + self.len)
            .unwrap_or("")
    }

    pub fn span(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    fn key(&self) -> (NodeId, usize, MentionKind) {
        (self.source_node, self.offset, self.kind)
    }

    fn overlaps(&self, other: &MentionRecord) -> bool {
        self.source_node == other.source_node
            && self.offset < other.offset + other.len
            && other.offset < self.offset + self.len
    }
}

/// Document order, link-derived records first on a shared node, then offset
fn document_order(doc: &Document, a: &MentionRecord, b: &MentionRecord) -> Ordering {
    let node_a = a.link.unwrap_or(a.source_node);
    let node_b = b.link.unwrap_or(b.source_node);
    doc.compare_document_order(node_a, node_b)
        .then_with(|| a.kind.rank().cmp(&b.kind.rank()))
        .then_with(|| a.offset.cmp(&b.offset))
}

// =============================================================================
// MentionIndex
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct MentionIndex {
    records: Vec<MentionRecord>,
    current: Option<usize>,
}

impl MentionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&MentionRecord> {
        self.records.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut MentionRecord> {
        self.records.get_mut(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MentionRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[MentionRecord] {
        &self.records
    }

    /// Current position, `None` when nothing is selected
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Current position as the host-facing integer (-1 when unset)
    pub fn current_position(&self) -> i64 {
        self.current.map_or(-1, |c| c as i64)
    }

    /// Set the cursor; out-of-range values are ignored
    pub fn set_current(&mut self, position: usize) -> bool {
        if position < self.records.len() {
            self.current = Some(position);
            true
        } else {
            false
        }
    }

    /// Replace the collection, assigning positions in document order
    pub fn rebuild(&mut self, doc: &Document, mut records: Vec<MentionRecord>) {
        // Stable sort keeps scan order for ties
        records.sort_by(|a, b| document_order(doc, a, b));
        let mut kept: Vec<MentionRecord> = Vec::with_capacity(records.len());
        for record in records {
            if kept.iter().rev().take_while(|k| k.source_node == record.source_node).any(|k| k.overlaps(&record)) {
                continue;
            }
            kept.push(record);
        }
        for (position, record) in kept.iter_mut().enumerate() {
            record.position = position;
        }
        self.records = kept;
        self.clamp_current();
    }

    /// Append records not already represented. Returns the appended range.
    pub fn merge_new(&mut self, doc: &Document, mut records: Vec<MentionRecord>) -> Range<usize> {
        let start = self.records.len();
        let mut seen: HashSet<(NodeId, usize, MentionKind)> = self.records.iter().map(|r| r.key()).collect();

        records.sort_by(|a, b| document_order(doc, a, b));
        for mut record in records {
            if !seen.insert(record.key()) {
                continue;
            }
            if self.records.iter().any(|existing| existing.overlaps(&record)) {
                continue;
            }
            record.position = self.records.len();
            record.overlay = None;
            self.records.push(record);
        }

        self.clamp_current();
        start..self.records.len()
    }

    /// Forget the reading position; the next rebuild starts at the first record
    pub fn reset_cursor(&mut self) {
        self.current = None;
    }

    /// Drop every record and the cursor
    pub fn clear(&mut self) {
        self.records.clear();
        self.current = None;
    }

    fn clamp_current(&mut self) {
        let len = self.records.len();
        self.current = match (self.current, len) {
            (_, 0) => None,
            (None, _) => Some(0),
            (Some(c), len) => Some(c.min(len - 1)),
        };
    }
}

// =============================================================================
// Tests
// =============================================================================
