//! HTML import/export for `Document`
//!
//! Parsing goes through `scraper` (html5ever), so the tree matches what a
//! browser would build, doctype and comments included. Fragments are parsed
//! on their own and deep-copied in. Serialization is a plain recursive writer
//! with attributes in name order, used for snapshots and insert patches.

use ego_tree::NodeRef;
use scraper::{Html, Node};

use super::node::{Document, NodeId};

/// Elements that never have children or a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

impl Document {
    /// Parse a full HTML document
    pub fn parse_html(html: &str, location: &str) -> Document {
        Document::from_tree(Html::parse_document(html).tree, location)
    }

    /// Parse an HTML fragment and append its nodes to `parent`.
    /// Returns the top-level nodes that were inserted.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        self.insert_html(parent, usize::MAX, html)
    }

    /// Parse an HTML fragment and insert its nodes as children of `parent`
    /// starting at child slot `index` (clamped to the end).
    pub fn insert_html(&mut self, parent: NodeId, index: usize, html: &str) -> Vec<NodeId> {
        if !self.is_element(parent) && parent != self.root() {
            return Vec::new();
        }
        let parsed = Html::parse_fragment(html);
        let mut inserted = Vec::new();
        for (i, child) in parsed.root_element().children().enumerate() {
            let id = self.import_node(child);
            self.insert_at(parent, id, index.saturating_add(i));
            inserted.push(id);
        }
        inserted
    }

    fn import_node(&mut self, source: NodeRef<'_, Node>) -> NodeId {
        let id = self.create_from(source.value());
        for child in source.children() {
            let child_id = self.import_node(child);
            self.append_child(id, child_id);
        }
        id
    }

    /// Serialize `node` and its subtree
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serialize only the children of `node`
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match self.value(node) {
            Some(Node::Document | Node::Fragment) => {
                for child in self.children(node) {
                    self.write_html(child, out);
                }
            }
            Some(Node::Doctype(doctype)) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(&doctype.name);
                out.push('>');
            }
            Some(Node::Comment(comment)) => {
                out.push_str("<!--");
                out.push_str(&comment.comment);
                out.push_str("-->");
            }
            Some(Node::Text(t)) => {
                let raw = self
                    .parent(node)
                    .and_then(|p| self.tag(p))
                    .is_some_and(|tag| matches!(tag, "script" | "style"));
                if raw {
                    out.push_str(t);
                } else {
                    escape_into(t, false, out);
                }
            }
            Some(Node::Element(el)) => {
                let tag = el.name();
                out.push('<');
                out.push_str(tag);
                let mut attrs: Vec<(&str, &str)> = el.attrs().collect();
                attrs.sort_unstable();
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag) {
                    return;
                }
                for child in self.children(node) {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Some(Node::ProcessingInstruction(_)) | None => {}
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
