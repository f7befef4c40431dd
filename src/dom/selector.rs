//! CSS selectors over `Document`
//!
//! Matching is scraper's (the `selectors` crate), so catalogs may use any
//! selector a browser's `querySelectorAll` would take: compound selectors,
//! combinators, attribute operators with the ` i` flag, and comma groups.
//! This module keeps the source text for diagnostics and runs queries over
//! `NodeId`s.

use std::fmt;

use crate::dom::{Document, NodeId};
use crate::error::{EngineError, Result};

// =============================================================================
// Types
// =============================================================================

/// One compiled selector source (which may itself be a comma group)
#[derive(Debug, Clone)]
pub struct Selector {
    inner: scraper::Selector,
    source: String,
}

/// Several selector sources matched as one
#[derive(Debug, Clone, Default)]
pub struct SelectorList {
    selectors: Vec<Selector>,
}

impl Selector {
    pub fn parse(src: &str) -> Result<Selector> {
        let trimmed = src.trim();
        if trimmed.is_empty() {
            return Err(EngineError::selector(src, "empty selector"));
        }
        let inner = scraper::Selector::parse(trimmed)
            .map_err(|e| EngineError::selector(trimmed, e.to_string()))?;
        Ok(Selector {
            inner,
            source: trimmed.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Test `node` against this selector. Non-elements never match.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.element_ref(node)
            .is_some_and(|el| self.inner.matches(&el))
    }
}

impl SelectorList {
    pub fn parse(src: &str) -> Result<SelectorList> {
        Ok(SelectorList {
            selectors: vec![Selector::parse(src)?],
        })
    }

    /// Build from several independent selector strings (each may itself be a list)
    pub fn from_sources<S: AsRef<str>>(sources: &[S]) -> Result<SelectorList> {
        let selectors = sources
            .iter()
            .map(|src| Selector::parse(src.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(SelectorList { selectors })
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(el) = doc.element_ref(node) else {
            return false;
        };
        self.selectors.iter().any(|s| s.inner.matches(&el))
    }

    /// All matching elements in document order, including `scope` itself
    pub fn query_all(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        if self.is_empty() {
            return Vec::new();
        }
        std::iter::once(scope)
            .chain(doc.descendants(scope))
            .filter(|n| self.matches(doc, *n))
            .collect()
    }

    /// First matching element in document order, including `scope` itself
    pub fn query_first(&self, doc: &Document, scope: NodeId) -> Option<NodeId> {
        if self.is_empty() {
            return None;
        }
        std::iter::once(scope)
            .chain(doc.descendants(scope))
            .find(|n| self.matches(doc, *n))
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<&str> = self.selectors.iter().map(|s| s.source()).collect();
        write!(f, "{}", sources.join(", "))
    }
}

// =============================================================================
// Tests
// =============================================================================
