//! Engine-owned markup: class names, attributes and small builders
//!
//! Everything the engine writes into the host document carries a class with
//! the `mention-lens-` prefix so it can be recognised (and skipped) on later
//! passes.

use crate::dom::{Document, NodeId};

pub const CHROME_PREFIX: &str = "mention-lens-";

pub const MENTION_CLASS: &str = "mention-lens-mention";
pub const LINK_WRAPPER_CLASS: &str = "mention-lens-link-wrapper";
pub const ACTIVE_CLASS: &str = "active";

pub const NAV_CLASS: &str = "mention-lens-nav";
pub const NAV_BUTTON_CLASS: &str = "mention-lens-nav-btn";
pub const NAV_PREV_CLASS: &str = "mention-lens-prev";
pub const NAV_NEXT_CLASS: &str = "mention-lens-next";
pub const NAV_INDEX_CLASS: &str = "mention-lens-nav-index";

pub const COUNTER_CLASS: &str = "mention-lens-counter";
pub const DROPDOWN_CLASS: &str = "mention-lens-dropdown";
pub const DROPDOWN_LIST_CLASS: &str = "mention-lens-dropdown-list";
pub const DROPDOWN_ITEM_CLASS: &str = "mention-lens-dropdown-item";
pub const DROPDOWN_INDEX_CLASS: &str = "mention-lens-dropdown-index";
pub const DROPDOWN_CONTEXT_CLASS: &str = "mention-lens-dropdown-context";

pub const INDEX_ATTR: &str = "data-mention-index";
pub const COUNT_ATTR: &str = "data-mention-count";

pub const PREV_GLYPH: &str = "\u{2190}";
pub const NEXT_GLYPH: &str = "\u{2192}";

/// True when the element itself carries any engine class
pub fn is_chrome_element(doc: &Document, node: NodeId) -> bool {
    doc.classes(node).any(|c| c.starts_with(CHROME_PREFIX))
}

/// True when `node` is engine markup or lies inside it
pub fn is_inside_chrome(doc: &Document, node: NodeId) -> bool {
    doc.closest(node, |n| is_chrome_element(doc, n)).is_some()
}

/// Navigation affordance and summary UI (everything except the overlay
/// wrappers themselves)
pub fn is_ui_element(doc: &Document, node: NodeId) -> bool {
    is_chrome_element(doc, node)
        && !doc.has_class(node, MENTION_CLASS)
        && !doc.has_class(node, LINK_WRAPPER_CLASS)
}

/// True when `node` is inside navigation or summary UI
pub fn is_inside_ui(doc: &Document, node: NodeId) -> bool {
    doc.closest(node, |n| is_ui_element(doc, n)).is_some()
}

/// Nearest overlay element at or above `node`
pub fn overlay_of(doc: &Document, node: NodeId) -> Option<NodeId> {
    doc.closest(node, |n| doc.has_class(n, MENTION_CLASS))
}

/// Position stored on an overlay element
pub fn overlay_position(doc: &Document, overlay: NodeId) -> Option<usize> {
    doc.attr(overlay, INDEX_ATTR)?.parse().ok()
}

/// Text of an element with all UI chrome removed
pub fn text_without_ui(doc: &Document, node: NodeId) -> String {
    if let Some(t) = doc.text(node) {
        return t.to_string();
    }
    let mut out = String::new();
    let mut walk = doc.descendants(node);
    while let Some(n) = walk.next() {
        if is_ui_element(doc, n) {
            walk.skip_children_of(n);
        } else if let Some(t) = doc.text(n) {
            out.push_str(t);
        }
    }
    out
}

/// Label shown between the arrows, 1-based
pub fn nav_label(position: usize, total: usize) -> String {
    format!("{}/{}", position + 1, total)
}

/// Build the `← i/N →` navigation affordance
pub fn build_nav(doc: &mut Document, position: usize, total: usize) -> NodeId {
    let nav = doc.create_element("span");
    doc.add_class(nav, NAV_CLASS);

    let prev = doc.create_element("button");
    doc.add_class(prev, NAV_BUTTON_CLASS);
    doc.add_class(prev, NAV_PREV_CLASS);
    doc.set_attr(prev, "type", "button");
    doc.set_attr(prev, "title", "Previous mention");
    doc.set_text_content(prev, PREV_GLYPH);

    let label = doc.create_element("span");
    doc.add_class(label, NAV_INDEX_CLASS);
    doc.set_text_content(label, &nav_label(position, total));

    let next = doc.create_element("button");
    doc.add_class(next, NAV_BUTTON_CLASS);
    doc.add_class(next, NAV_NEXT_CLASS);
    doc.set_attr(next, "type", "button");
    doc.set_attr(next, "title", "Next mention");
    doc.set_text_content(next, NEXT_GLYPH);

    doc.append_child(nav, prev);
    doc.append_child(nav, label);
    doc.append_child(nav, next);
    nav
}

/// Create an empty overlay element for `position`
pub fn build_overlay(doc: &mut Document, position: usize, link_wrapper: bool) -> NodeId {
    let overlay = doc.create_element("span");
    doc.add_class(overlay, MENTION_CLASS);
    if link_wrapper {
        doc.add_class(overlay, LINK_WRAPPER_CLASS);
    }
    doc.set_attr(overlay, INDEX_ATTR, &position.to_string());
    overlay
}

/// All overlay elements currently attached, in document order
pub fn attached_overlays(doc: &Document) -> Vec<NodeId> {
    doc.descendants(doc.root())
        .filter(|n| doc.has_class(*n, MENTION_CLASS))
        .collect()
}

/// All attached elements with the given class, in document order
pub fn attached_with_class(doc: &Document, class: &str) -> Vec<NodeId> {
    doc.descendants(doc.root())
        .filter(|n| doc.has_class(*n, class))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_markup() {
        let mut doc = Document::new("about:blank");
        let nav = build_nav(&mut doc, 1, 3);
        doc.append_child(doc.root(), nav);
        assert_eq!(doc.text_content(nav), "\u{2190}2/3\u{2192}");
        assert!(is_ui_element(&doc, nav));
        let prev = doc.children(nav)[0];
        assert!(doc.has_class(prev, NAV_PREV_CLASS));
        assert!(is_inside_ui(&doc, doc.children(prev)[0]));
    }

    #[test]
    fn test_text_without_ui_drops_nav() {
        let mut doc = Document::new("about:blank");
        let overlay = build_overlay(&mut doc, 0, false);
        doc.append_child(doc.root(), overlay);
        let t = doc.create_text("@alice");
        doc.append_child(overlay, t);
        let nav = build_nav(&mut doc, 0, 1);
        doc.append_child(overlay, nav);

        assert_eq!(text_without_ui(&doc, overlay), "@alice");
        assert_eq!(overlay_position(&doc, overlay), Some(0));
        assert!(!is_ui_element(&doc, overlay));
        assert!(is_chrome_element(&doc, overlay));
    }
}
