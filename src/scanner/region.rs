//! RegionClassifier: eligible vs excluded document regions
//!
//! Classification walks from a node towards the root. At each ancestor the
//! allow rules are consulted first, then the deny rules; the first hit wins.
//! Allow therefore outranks any deny rule at the same or a farther ancestor,
//! which keeps comment bodies nested inside header-like containers eligible.

use crate::config::Catalog;
use crate::dom::{Document, NodeId, SelectorList};

/// Outcome of classifying one ancestor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionVerdict {
    Allowed,
    Denied,
    Neutral,
}

/// Ordered allow and deny rule tables
#[derive(Debug, Clone, Default)]
pub struct RegionRules {
    pub allow: SelectorList,
    pub deny: SelectorList,
}

impl RegionRules {
    pub fn new(allow: SelectorList, deny: SelectorList) -> Self {
        Self { allow, deny }
    }

    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self::new(catalog.content.clone(), catalog.exclude.clone())
    }

    /// Verdict for a single element, allow first
    pub fn verdict(&self, doc: &Document, element: NodeId) -> RegionVerdict {
        if self.allow.matches(doc, element) {
            RegionVerdict::Allowed
        } else if self.deny.matches(doc, element) {
            RegionVerdict::Denied
        } else {
            RegionVerdict::Neutral
        }
    }

    /// True when `node` must not be scanned. Checks ancestors only (the node
    /// itself is typically a text node), stopping before the document root.
    pub fn is_excluded(&self, doc: &Document, node: NodeId) -> bool {
        let root = doc.root();
        for ancestor in doc.ancestors(node) {
            if ancestor == root {
                break;
            }
            match self.verdict(doc, ancestor) {
                RegionVerdict::Allowed => return false,
                RegionVerdict::Denied => return true,
                RegionVerdict::Neutral => {}
            }
        }
        false
    }

    /// True when `node` is, or sits inside, an allow-matched region
    pub fn in_content_region(&self, doc: &Document, node: NodeId) -> bool {
        self.content_container(doc, node).is_some()
    }

    /// Nearest allow-matched element at or above `node`
    pub fn content_container(&self, doc: &Document, node: NodeId) -> Option<NodeId> {
        doc.closest(node, |n| self.allow.matches(doc, n))
    }
}

// =============================================================================
// Tests
// =============================================================================
