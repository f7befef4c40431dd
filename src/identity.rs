//! Viewer identity and page gating
//!
//! The viewer's handle is read from page metadata using the configured
//! identity sources; a missing or malformed value leaves the engine idle.
//! `PageGate` decides whether the current location is a page the engine
//! should run on.

use regex::Regex;
use url::Url;

use crate::config::Catalog;
use crate::dom::Document;
use crate::logging::lens_debug;
use crate::scanner::Handle;

/// First valid handle found in the document's identity metadata
pub fn resolve_identity(doc: &Document, catalog: &Catalog) -> Option<Handle> {
    for (selector, attribute) in &catalog.identity {
        let value = doc
            .descendants(doc.root())
            .find(|n| selector.matches(doc, *n))
            .and_then(|n| doc.attr(n, attribute));
        let Some(value) = value else {
            continue;
        };
        match Handle::parse(value.trim()) {
            Ok(handle) => return Some(handle),
            Err(e) => lens_debug!("ignoring identity from {}: {}", selector.source(), e),
        }
    }
    None
}

// =============================================================================
// PageGate
// =============================================================================

pub trait PageGate {
    /// True when the engine should run at `location` (a full URL)
    fn allows(&self, location: &str) -> bool;
}

/// Allows locations whose path matches any of the configured patterns
#[derive(Debug, Clone, Default)]
pub struct PathPatternGate {
    patterns: Vec<Regex>,
}

impl PathPatternGate {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self::new(catalog.pages.clone())
    }
}

impl PageGate for PathPatternGate {
    fn allows(&self, location: &str) -> bool {
        let path = match Url::parse(location) {
            Ok(url) => url.path().to_string(),
            Err(_) => location.to_string(),
        };
        self.patterns.iter().any(|p| p.is_match(&path))
    }
}

/// Gate that allows every page
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PageGate for AllowAll {
    fn allows(&self, _location: &str) -> bool {
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn catalog() -> Catalog {
        EngineConfig::default().compile().unwrap()
    }

    #[test]
    fn test_identity_from_meta() {
        let doc = Document::parse_html(
            r#"<html><head><meta name="user-login" content="alice"></head><body><div data-login="bob"></div></body></html>"#,
            "about:blank",
        );
        assert_eq!(resolve_identity(&doc, &catalog()).unwrap().as_str(), "alice");
    }

    #[test]
    fn test_identity_falls_back_to_data_login() {
        let doc = Document::parse_html(
            r#"<html><head><meta name="user-login" content=""></head><body><div data-login="bob"></div></body></html>"#,
            "about:blank",
        );
        assert_eq!(resolve_identity(&doc, &catalog()).unwrap().as_str(), "bob");
    }

    #[test]
    fn test_invalid_identity_is_absent() {
        let doc = Document::parse_html(
            r#"<html><head><meta name="user-login" content="not a handle"></head><body></body></html>"#,
            "about:blank",
        );
        assert!(resolve_identity(&doc, &catalog()).is_none());
    }

    #[test]
    fn test_path_gate() {
        let gate = PathPatternGate::from_catalog(&catalog());
        assert!(gate.allows("https://github.com/o/r/issues/12"));
        assert!(gate.allows("https://github.com/o/r/pull/3/files"));
        assert!(gate.allows("https://github.com/o/r/discussions/4#top"));
        assert!(gate.allows("https://github.com/o/r/commit/abc123"));
        assert!(!gate.allows("https://github.com/o/r"));
        assert!(!gate.allows("https://github.com/notifications"));
        assert!(AllowAll.allows("anything"));
    }
}
