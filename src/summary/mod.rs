//! Summary Overlay: count badge plus a dropdown list of mentions
//!
//! - `snippet.rs` - Context windows with emphasized matches
//! - `placement.rs` - Pure viewport-aware list placement
//!
//! The badge is attached to the first visible anchor from the configured
//! catalog. The list lives inside the badge, hidden until toggled.

pub mod placement;
pub mod snippet;

pub use placement::*;
pub use snippet::*;

use crate::config::{Catalog, SummaryConfig};
use crate::dom::{Document, NodeId};
use crate::index::{MentionIndex, MentionKind, MentionRecord};
use crate::logging::{lens_debug, lens_info};
use crate::render::chrome;
use crate::scanner::{Handle, MentionPattern, RegionRules};
use crate::surface::{Size, Surface};

/// List size assumed when the surface cannot measure it
const FALLBACK_LIST_SIZE: Size = Size { width: 320.0, height: 240.0 };

// =============================================================================
// Types
// =============================================================================

/// Everything summary rendering needs besides the document
pub struct SummaryContext<'a> {
    pub catalog: &'a Catalog,
    pub config: &'a SummaryConfig,
    pub handle: &'a Handle,
    pub pattern: &'a MentionPattern,
    pub rules: &'a RegionRules,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryOverlay {
    badge: Option<NodeId>,
    label: Option<NodeId>,
    dropdown: Option<NodeId>,
    list: Option<NodeId>,
    entries: usize,
    open: bool,
    placement: Option<Placement>,
}

// =============================================================================
// SummaryOverlay
// =============================================================================

impl SummaryOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn badge(&self) -> Option<NodeId> {
        self.badge
    }

    pub fn dropdown(&self) -> Option<NodeId> {
        self.dropdown
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    pub fn placement(&self) -> Option<Placement> {
        self.placement
    }

    /// True when the badge exists and is still in the document
    pub fn is_attached(&self, doc: &Document) -> bool {
        self.badge.is_some_and(|b| doc.is_attached(b))
    }

    /// First visible anchor from the prioritized catalog
    pub fn find_anchor(doc: &Document, surface: &dyn Surface, catalog: &Catalog) -> Option<NodeId> {
        catalog.anchors.iter().find_map(|anchors| {
            anchors
                .query_all(doc, doc.root())
                .into_iter()
                .find(|n| !chrome::is_inside_chrome(doc, *n) && surface.is_visible(*n))
        })
    }

    /// Build badge and list from scratch. Returns false when there is nothing
    /// to show or no anchor.
    pub fn render(&mut self, doc: &mut Document, surface: &dyn Surface, index: &MentionIndex, ctx: &SummaryContext<'_>) -> bool {
        self.remove(doc);
        if index.is_empty() {
            return false;
        }
        let Some(anchor) = Self::find_anchor(doc, surface, ctx.catalog) else {
            lens_info!("no visible summary anchor; badge not rendered");
            return false;
        };

        let badge = doc.create_element("span");
        doc.add_class(badge, chrome::COUNTER_CLASS);
        let label = doc.create_text("");
        doc.append_child(badge, label);

        let dropdown = doc.create_element("div");
        doc.add_class(dropdown, chrome::DROPDOWN_CLASS);
        doc.set_attr(dropdown, "hidden", "");
        let list = doc.create_element("ul");
        doc.add_class(list, chrome::DROPDOWN_LIST_CLASS);
        doc.append_child(dropdown, list);
        doc.append_child(badge, dropdown);
        attach_badge(doc, anchor, badge);

        self.badge = Some(badge);
        self.label = Some(label);
        self.dropdown = Some(dropdown);
        self.list = Some(list);
        self.entries = 0;
        self.open = false;

        self.update(doc, surface, index, ctx);
        lens_debug!("summary badge attached with {} entries", self.entries);
        true
    }

    /// Refresh count and title in place and append entries for new records.
    /// Falls back to a full render when the badge is gone.
    pub fn update(&mut self, doc: &mut Document, surface: &dyn Surface, index: &MentionIndex, ctx: &SummaryContext<'_>) -> bool {
        if !self.is_attached(doc) {
            return self.render(doc, surface, index, ctx);
        }
        let (Some(badge), Some(label), Some(list)) = (self.badge, self.label, self.list) else {
            return false;
        };

        let count = index.len();
        doc.set_text(label, &badge_text(count));
        doc.set_attr(badge, chrome::COUNT_ATTR, &count.to_string());
        doc.set_attr(badge, "title", &badge_title(count, ctx.handle));

        for record in index.records().iter().skip(self.entries) {
            let item = build_entry(doc, record, ctx);
            doc.append_child(list, item);
            self.entries += 1;
        }
        true
    }

    /// Show or hide the list; returns the new state
    pub fn toggle(&mut self, doc: &mut Document, surface: &dyn Surface, config: &SummaryConfig) -> bool {
        if self.open {
            self.dismiss(doc);
        } else {
            self.show(doc, surface, config);
        }
        self.open
    }

    fn show(&mut self, doc: &mut Document, surface: &dyn Surface, config: &SummaryConfig) {
        let (Some(badge), Some(dropdown)) = (self.badge, self.dropdown) else {
            return;
        };
        doc.remove_attr(dropdown, "hidden");
        self.open = true;

        let Some(badge_rect) = surface.rect(badge) else {
            self.placement = None;
            return;
        };
        let list_size = surface
            .rect(dropdown)
            .map(|r| Size { width: r.width, height: r.height })
            .unwrap_or(FALLBACK_LIST_SIZE);
        let p = place(badge_rect, list_size, surface.viewport(), config.viewport_margin, config.list_gap);
        doc.set_attr(dropdown, "style", &format!("position: fixed; left: {}px; top: {}px;", p.x, p.y));
        self.placement = Some(p);
    }

    pub fn dismiss(&mut self, doc: &mut Document) {
        if let Some(dropdown) = self.dropdown {
            doc.set_attr(dropdown, "hidden", "");
        }
        self.open = false;
    }

    /// Detach badge and list, free their nodes and forget them
    pub fn remove(&mut self, doc: &mut Document) {
        if let Some(badge) = self.badge {
            doc.detach(badge);
            doc.release(badge);
        }
        *self = Self::default();
    }
}

/// Badges go inside the anchor, except that a link anchor (or one wrapping a
/// link) gets the badge as its next sibling so the link text stays as it was.
fn attach_badge(doc: &mut Document, anchor: NodeId, badge: NodeId) {
    let holds_link = std::iter::once(anchor)
        .chain(doc.descendants(anchor))
        .any(|n| doc.tag(n) == Some("a"));
    let after = doc
        .parent(anchor)
        .and_then(|parent| Some((parent, doc.child_position(parent, anchor)? + 1)));
    match after {
        Some((parent, slot)) if holds_link => doc.insert_at(parent, badge, slot),
        _ => doc.append_child(anchor, badge),
    }
}

// =============================================================================
// Entries
// =============================================================================

pub fn badge_text(count: usize) -> String {
    format!("@{}", count)
}

pub fn badge_title(count: usize, handle: &Handle) -> String {
    let noun = if count == 1 { "mention" } else { "mentions" };
    format!("{} {} of @{}", count, noun, handle)
}

fn build_entry(doc: &mut Document, record: &MentionRecord, ctx: &SummaryContext<'_>) -> NodeId {
    let item = doc.create_element("li");
    doc.add_class(item, chrome::DROPDOWN_ITEM_CLASS);
    doc.set_attr(item, chrome::INDEX_ATTR, &record.position.to_string());

    let number = doc.create_element("span");
    doc.add_class(number, chrome::DROPDOWN_INDEX_CLASS);
    doc.set_text_content(number, &format!("#{}", record.position + 1));

    let context = doc.create_element("span");
    doc.add_class(context, chrome::DROPDOWN_CONTEXT_CLASS);
    let (text, offset) = mention_context(doc, record, ctx.rules);
    let snippet = Snippet::around(&text, offset, record.len, ctx.config.snippet_radius, &ctx.config.ellipsis, ctx.pattern);
    for segment in &snippet.segments {
        if segment.emphasized {
            let strong = doc.create_element("strong");
            doc.set_text_content(strong, &segment.text);
            doc.append_child(context, strong);
        } else {
            let t = doc.create_text(&segment.text);
            doc.append_child(context, t);
        }
    }

    doc.append_child(item, number);
    doc.append_child(item, context);
    item
}

/// Flattened text around a record and the match offset within it. Uses the
/// nearest content-body container (engine UI excluded), else the record's
/// own source text.
pub fn mention_context(doc: &Document, record: &MentionRecord, rules: &RegionRules) -> (String, usize) {
    let fallback = || (record.source_text.clone(), record.offset);

    let rendered_overlay = record
        .overlay
        .filter(|o| record.kind == MentionKind::PlainText && doc.is_attached(*o));
    let (marker, extra) = match rendered_overlay {
        Some(overlay) => (overlay, 0),
        None => (record.source_node, record.offset),
    };
    if !doc.is_attached(marker) {
        return fallback();
    }
    let Some(container) = rules.content_container(doc, marker) else {
        return fallback();
    };

    let mut text = String::new();
    let mut found = None;
    let mut walk = doc.descendants(container);
    while let Some(node) = walk.next() {
        if node == marker {
            found = Some(text.len() + extra);
        }
        if chrome::is_ui_element(doc, node) {
            walk.skip_children_of(node);
        } else if let Some(t) = doc.text(node) {
            text.push_str(t);
        }
    }

    match found {
        Some(offset) if offset + record.len <= text.len() => (text, offset),
        _ => fallback(),
    }
}

// =============================================================================
// Tests
// =============================================================================
