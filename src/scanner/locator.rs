//! MentionLocator: one pass over a scope, producing raw mention records
//!
//! # Phases
//! 1. **Native links**: catalog-matched hyperlinks whose text is `@handle` or
//!    whose target is the handle's profile page
//! 2. **Plain text**: text nodes under content regions, skipping matched
//!    links, engine chrome, raw-text elements and excluded regions
//!
//! The locator keeps no state between passes; ordering is left to the index.

use regex::Regex;
use std::collections::HashSet;
use url::Url;

use crate::config::Catalog;
use crate::dom::{Document, NodeId, SelectorList};
use crate::error::{EngineError, Result};
use crate::index::MentionRecord;
use crate::logging::{lens_debug, lens_warn};
use crate::render::chrome;
use crate::scanner::{Handle, MentionPattern, RegionRules};

/// Elements whose text is never scanned
const SKIP_TAGS: &[&str] = &["head", "title", "script", "style", "noscript", "textarea", "template"];

/// Navigation glyphs and `i/N` labels a broken cleanup can leave behind
const NAV_RESIDUE_PATTERN: &str = r"[\u{2190}\u{2192}]|\b\d+\s*/\s*\d+\b";

// =============================================================================
// Types
// =============================================================================

/// Result of one locate pass
#[derive(Debug, Clone, Default)]
pub struct LocateOutcome {
    /// Records in discovery order (links first, then plain text)
    pub records: Vec<MentionRecord>,
    /// Matching links that had no text node to anchor a record on
    pub skipped_links: usize,
    /// Links whose text was repaired from overlay residue
    pub repaired_links: usize,
    /// Content regions whose text was walked
    pub content_regions: usize,
}

// =============================================================================
// MentionLocator
// =============================================================================

#[derive(Debug, Clone)]
pub struct MentionLocator {
    handle: Handle,
    pattern: MentionPattern,
    links: SelectorList,
    rules: RegionRules,
    residue: Regex,
}

impl MentionLocator {
    pub fn new(handle: Handle, catalog: &Catalog) -> Result<Self> {
        Ok(Self {
            pattern: MentionPattern::new(&handle)?,
            links: catalog.link_selectors(&handle)?,
            rules: RegionRules::from_catalog(catalog),
            residue: Regex::new(NAV_RESIDUE_PATTERN)
                .map_err(|e| EngineError::Config(format!("Failed to compile residue pattern: {}", e)))?,
            handle,
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn pattern(&self) -> &MentionPattern {
        &self.pattern
    }

    pub fn rules(&self) -> &RegionRules {
        &self.rules
    }

    /// Locate every mention under `scope` (inclusive)
    pub fn locate(&self, doc: &mut Document, scope: NodeId) -> LocateOutcome {
        let mut outcome = LocateOutcome::default();
        let matched_links = self.locate_links(doc, scope, &mut outcome);
        self.locate_text(doc, scope, &matched_links, &mut outcome);
        lens_debug!(
            "locate: {} records ({} links matched, {} skipped, {} repaired)",
            outcome.records.len(),
            matched_links.len(),
            outcome.skipped_links,
            outcome.repaired_links
        );
        outcome
    }

    // =========================================================================
    // Phase 1: native links
    // =========================================================================

    fn locate_links(&self, doc: &mut Document, scope: NodeId, outcome: &mut LocateOutcome) -> HashSet<NodeId> {
        let mut matched = HashSet::new();
        let candidates = self.links.query_all(doc, scope);

        for link in candidates {
            if chrome::is_inside_ui(doc, link) || self.rules.is_excluded(doc, link) {
                continue;
            }
            if self.repair_link(doc, link) {
                outcome.repaired_links += 1;
            }

            let text = self.sanitize(&doc.text_content(link));
            let matches_text = self.handle.is_mention_text(&text);
            let matches_href = doc
                .attr(link, "href")
                .is_some_and(|href| self.href_targets_handle(doc.location(), href));
            if !matches_text && !matches_href {
                continue;
            }

            matched.insert(link);
            match text_bearing_node(doc, link) {
                Some(node) => {
                    let source_text = doc.text(node).unwrap_or_default().to_string();
                    outcome.records.push(MentionRecord::native_link(link, node, &source_text));
                }
                None => {
                    outcome.skipped_links += 1;
                    lens_warn!("mention link {:?} has no text node; skipped", link);
                }
            }
        }
        matched
    }

    /// True when `href` resolves to the handle's profile page (`/<handle>`)
    fn href_targets_handle(&self, location: &str, href: &str) -> bool {
        profile_segment(location, href).is_some_and(|segment| self.handle.is_same(&segment))
    }

    /// Strip navigation residue and collapse whitespace
    pub fn sanitize(&self, text: &str) -> String {
        let stripped = self.residue.replace_all(text, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Undo overlay residue left inside a link by an interrupted cleanup.
    /// Returns true when the link was modified.
    fn repair_link(&self, doc: &mut Document, link: NodeId) -> bool {
        let leaked: Vec<NodeId> = doc
            .descendants(link)
            .filter(|n| chrome::is_ui_element(doc, *n))
            .collect();
        for node in &leaked {
            doc.detach(*node);
            doc.release(*node);
        }

        let raw = doc.text_content(link);
        if !self.residue.is_match(&raw) {
            return !leaked.is_empty();
        }
        let clean = self.sanitize(&raw);
        if !self.handle.is_mention_text(&clean) {
            return !leaked.is_empty();
        }

        let text_nodes: Vec<NodeId> = doc
            .descendants(link)
            .filter(|n| doc.text(*n).is_some_and(|t| !t.trim().is_empty()))
            .collect();
        for (i, node) in text_nodes.iter().enumerate() {
            doc.set_text(*node, if i == 0 { &clean } else { "" });
        }
        lens_debug!("repaired mention link text to {:?}", clean);
        true
    }

    // =========================================================================
    // Phase 2: plain text
    // =========================================================================

    fn locate_text(&self, doc: &Document, scope: NodeId, matched_links: &HashSet<NodeId>, outcome: &mut LocateOutcome) {
        let roots = self.scan_roots(doc, scope);
        outcome.content_regions = roots.len();
        if roots.is_empty() {
            lens_debug!("no content region under scope; plain text not scanned");
        }

        for root in roots {
            let blocked = std::iter::once(root).chain(doc.ancestors(root)).any(|n| {
                matched_links.contains(&n) || chrome::is_chrome_element(doc, n) || is_skip_tag(doc, n)
            });
            if blocked {
                continue;
            }

            if doc.is_text(root) {
                self.scan_text_node(doc, root, outcome);
                continue;
            }

            let mut walk = doc.descendants(root);
            while let Some(node) = walk.next() {
                if doc.is_element(node) {
                    if is_skip_tag(doc, node) || chrome::is_chrome_element(doc, node) || matched_links.contains(&node) {
                        walk.skip_children_of(node);
                    }
                    continue;
                }
                self.scan_text_node(doc, node, outcome);
            }
        }
    }

    fn scan_text_node(&self, doc: &Document, node: NodeId, outcome: &mut LocateOutcome) {
        let Some(text) = doc.text(node) else {
            return;
        };
        if !self.pattern.is_candidate(text) || self.rules.is_excluded(doc, node) {
            return;
        }
        for offset in self.pattern.find_offsets(text) {
            outcome
                .records
                .push(MentionRecord::plain_text(node, text, offset, self.pattern.match_len()));
        }
    }

    /// Content regions to walk: the scope itself when it sits in one, else
    /// the outermost regions under it. Empty when the page has none.
    fn scan_roots(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        if self.rules.in_content_region(doc, scope) {
            return vec![scope];
        }

        let mut roots = Vec::new();
        let mut walk = doc.descendants(scope);
        while let Some(node) = walk.next() {
            if doc.is_element(node) && self.rules.allow.matches(doc, node) {
                roots.push(node);
                walk.skip_children_of(node);
            }
        }

        roots
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn is_skip_tag(doc: &Document, node: NodeId) -> bool {
    doc.tag(node).is_some_and(|tag| SKIP_TAGS.contains(&tag))
}

fn is_text_bearing(doc: &Document, node: NodeId) -> bool {
    doc.text(node).is_some_and(|t| !t.trim().is_empty())
}

/// The link's sole text-bearing child, else its first text-bearing descendant
fn text_bearing_node(doc: &Document, link: NodeId) -> Option<NodeId> {
    let direct: Vec<NodeId> = doc
        .children(link)
        .into_iter()
        .filter(|c| is_text_bearing(doc, *c))
        .collect();
    if direct.len() == 1 {
        return Some(direct[0]);
    }
    doc.descendants(link).find(|n| is_text_bearing(doc, *n))
}

/// Single path segment of a profile URL (`https://host/<segment>`), resolving
/// relative hrefs against the document location
fn profile_segment(location: &str, href: &str) -> Option<String> {
    let resolved = Url::parse(href)
        .or_else(|_| Url::parse(location).and_then(|base| base.join(href)))
        .ok()?;
    let mut segments = resolved.path_segments()?.filter(|s| !s.is_empty());
    let first = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    Some(first.to_string())
}

// =============================================================================
// Tests
// =============================================================================
