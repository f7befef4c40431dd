//! Document: host document tree backed by `ego_tree`
//!
//! The tree stores `scraper::Node` values, so a parsed page keeps its doctype
//! and comments and selectors match through scraper directly. Engine code
//! addresses nodes with `NodeId`, a generation-checked slot. Once a detached
//! subtree is released its slots are reused and every old id reads as missing.

use std::cmp::Ordering;
use std::collections::HashMap;

use ego_tree::Tree;
use html5ever::{tendril::StrTendril, Attribute, LocalName, Namespace, QualName};
use scraper::node::{Element, Text};
use scraper::{CaseSensitivity, ElementRef, Node};
use serde::{Deserialize, Serialize};

use super::patch::Patch;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

// =============================================================================
// Types
// =============================================================================

/// Non-owning handle to a node in a `Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    slot: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Slot {
    node: ego_tree::NodeId,
    generation: u32,
    live: bool,
}

/// The host document. Owned by the embedder, borrowed by every engine call.
#[derive(Debug, Clone)]
pub struct Document {
    tree: Tree<Node>,
    slots: Vec<Slot>,
    lookup: HashMap<ego_tree::NodeId, u32>,
    free: Vec<u32>,
    location: String,
    pub(super) patches: Option<Vec<Patch>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new("about:blank")
    }
}

// =============================================================================
// Construction & slots
// =============================================================================

impl Document {
    /// Create an empty document whose root has no children
    pub fn new(location: &str) -> Self {
        Self::from_tree(Tree::new(Node::Document), location)
    }

    /// Adopt a parsed tree. Every node gets a slot in tree order.
    pub(super) fn from_tree(tree: Tree<Node>, location: &str) -> Self {
        let mut doc = Self {
            tree,
            slots: Vec::new(),
            lookup: HashMap::new(),
            free: Vec::new(),
            location: location.to_string(),
            patches: None,
        };
        let ids: Vec<ego_tree::NodeId> = doc.tree.nodes().map(|n| n.id()).collect();
        for id in ids {
            doc.register(id);
        }
        doc
    }

    pub fn root(&self) -> NodeId {
        NodeId { slot: 0, generation: 0 }
    }

    /// Current location (full URL) of the host page
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn set_location(&mut self, location: &str) {
        self.location = location.to_string();
    }

    /// Number of live nodes (attached or not). Released nodes are not counted.
    pub fn node_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn register(&mut self, node: ego_tree::NodeId) -> NodeId {
        let slot = self.slots.len() as u32;
        self.slots.push(Slot { node, generation: 0, live: true });
        self.lookup.insert(node, slot);
        NodeId { slot, generation: 0 }
    }

    /// Tree node behind `id`, if the id is live in this document
    pub(super) fn resolve(&self, id: NodeId) -> Option<ego_tree::NodeId> {
        self.slots
            .get(id.slot as usize)
            .filter(|s| s.live && s.generation == id.generation)
            .map(|s| s.node)
    }

    fn handle(&self, node: ego_tree::NodeId) -> Option<NodeId> {
        let slot = *self.lookup.get(&node)?;
        let entry = &self.slots[slot as usize];
        entry.live.then_some(NodeId { slot, generation: entry.generation })
    }

    fn alloc(&mut self, value: Node) -> NodeId {
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.live = true;
            let (node, generation) = (entry.node, entry.generation);
            if let Some(mut n) = self.tree.get_mut(node) {
                *n.value() = value;
            }
            return NodeId { slot, generation };
        }
        let node = self.tree.orphan(value).id();
        self.register(node)
    }

    /// Give the slots of a detached subtree back for reuse. Ids into the
    /// subtree go stale. Returns how many nodes were released.
    pub fn release(&mut self, node: NodeId) -> usize {
        if node == self.root() || self.resolve(node).is_none() || self.parent(node).is_some() {
            return 0;
        }
        let mut doomed = vec![node];
        doomed.extend(self.descendants(node));
        for id in doomed.iter().rev() {
            if let Some(mut n) = self.resolve(*id).and_then(|e| self.tree.get_mut(e)) {
                n.detach();
                *n.value() = Node::Fragment;
            }
        }
        for id in &doomed {
            let entry = &mut self.slots[id.slot as usize];
            entry.live = false;
            entry.generation = entry.generation.wrapping_add(1);
            self.free.push(id.slot);
        }
        doomed.len()
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let name = QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from(tag.to_ascii_lowercase()),
        );
        self.alloc(Node::Element(Element::new(name, Vec::new())))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(Node::Text(Text { text: text.into() }))
    }

    /// Allocate a detached copy of a node value (used when importing parsed
    /// fragments)
    pub(super) fn create_from(&mut self, value: &Node) -> NodeId {
        self.alloc(value.clone())
    }

    // =========================================================================
    // Tree mutation
    // =========================================================================

    /// Remove `node` from its parent. No-op for detached or unknown nodes.
    pub fn detach(&mut self, node: NodeId) {
        let Some(e) = self.resolve(node) else { return };
        if self.parent(node).is_none() {
            return;
        }
        let from = self.recording_path(node);
        if let Some(mut n) = self.tree.get_mut(e) {
            n.detach();
        }
        if let Some(path) = from {
            self.record(Patch::Remove { path });
        }
    }

    /// Append `child` as the last child of `parent`, moving it if attached elsewhere
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.place(parent, child, None);
    }

    /// Insert `child` before `reference` under `parent`. Appends when
    /// `reference` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        let reference = (reference != child && self.parent(reference) == Some(parent))
            .then_some(reference);
        self.place(parent, child, reference);
    }

    /// Insert `child` at a given child slot of `parent` (clamped to the end)
    pub fn insert_at(&mut self, parent: NodeId, child: NodeId, slot: usize) {
        let reference = self
            .children(parent)
            .into_iter()
            .filter(|c| *c != child)
            .nth(slot);
        self.place(parent, child, reference);
    }

    fn place(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let (Some(p), Some(c)) = (self.resolve(parent), self.resolve(child)) else {
            return;
        };
        if child == self.root() || self.contains(child, parent) {
            return;
        }
        let from = self.recording_path(child);
        if let Some(mut n) = self.tree.get_mut(c) {
            n.detach();
        }
        match reference.and_then(|r| self.resolve(r)) {
            Some(r) => {
                if let Some(mut n) = self.tree.get_mut(r) {
                    n.insert_id_before(c);
                }
            }
            None => {
                if let Some(mut n) = self.tree.get_mut(p) {
                    n.append_id(c);
                }
            }
        }
        self.record_placement(child, from);
    }

    /// Replace `old` with `replacements` at the same position. Returns the
    /// former parent and child slot, or `None` if `old` was detached.
    pub fn replace_with(&mut self, old: NodeId, replacements: &[NodeId]) -> Option<(NodeId, usize)> {
        let parent = self.parent(old)?;
        let slot = self.child_position(parent, old)?;
        for node in replacements {
            self.insert_before(parent, *node, old);
        }
        self.detach(old);
        Some((parent, slot))
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        let e = self.resolve(node)?;
        let parent = self.tree.get(e)?.parent()?;
        self.handle(parent.id())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        match self.resolve(node).and_then(|e| self.tree.get(e)) {
            Some(n) => n.children().filter_map(|c| self.handle(c.id())).collect(),
            None => Vec::new(),
        }
    }

    pub fn child_position(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    /// Ancestors of `node`, nearest first, including the root
    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(node),
        }
    }

    /// Descendants of `node` in pre-order (document order), excluding `node`
    pub fn descendants(&self, node: NodeId) -> Descendants<'_> {
        let mut stack = self.children(node);
        stack.reverse();
        Descendants { doc: self, stack }
    }

    /// True when `node` is reachable from the document root
    pub fn is_attached(&self, node: NodeId) -> bool {
        if node == self.root() {
            return true;
        }
        self.ancestors(node).any(|a| a == self.root())
    }

    /// True when `ancestor` is `node` or one of its ancestors
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Path of child slots from the root. Only meaningful for attached nodes.
    pub fn tree_path(&self, node: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            path.push(self.child_position(parent, current).unwrap_or(usize::MAX));
            current = parent;
        }
        path.reverse();
        path
    }

    /// Node at a path of child slots from the root
    pub fn node_at(&self, path: &[usize]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root(), |node, slot| self.children(node).get(*slot).copied())
    }

    /// Compare two nodes by document (pre-order) position. An ancestor sorts
    /// before its descendants.
    pub fn compare_document_order(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        self.tree_path(a).cmp(&self.tree_path(b))
    }

    // =========================================================================
    // Node payload
    // =========================================================================

    pub fn value(&self, node: NodeId) -> Option<&Node> {
        let e = self.resolve(node)?;
        self.tree.get(e).map(|n| n.value())
    }

    /// Element view used by selector matching
    pub fn element_ref(&self, node: NodeId) -> Option<ElementRef<'_>> {
        let e = self.resolve(node)?;
        ElementRef::wrap(self.tree.get(e)?)
    }

    fn element(&self, node: NodeId) -> Option<&Element> {
        self.value(node)?.as_element()
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        self.value(node).is_some_and(|v| v.is_text())
    }

    /// Lowercase tag name of an element
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.name())
    }

    /// Text of a text node
    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.value(node)?.as_text().map(|t| &**t)
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        let Some(e) = self.resolve(node) else { return };
        let mut changed = false;
        if let Some(mut n) = self.tree.get_mut(e) {
            if let Node::Text(t) = n.value() {
                t.text = text.into();
                changed = true;
            }
        }
        if changed {
            if let Some(path) = self.recording_path(node) {
                self.record(Patch::SetText { path, text: text.to_string() });
            }
        }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(t) = self.text(node) {
            return t.to_string();
        }
        self.descendants(node)
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Replace all children of `node` with a single text node. A lone text
    /// child is rewritten in place.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        let children = self.children(node);
        if let [only] = children.as_slice() {
            if self.is_text(*only) && !text.is_empty() {
                self.set_text(*only, text);
                return;
            }
        }
        for child in children {
            self.detach(child);
            self.release(child);
        }
        if !text.is_empty() {
            let t = self.create_text(text);
            self.append_child(node, t);
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attr(&name.to_ascii_lowercase())
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let changed = self.rewrite_attrs(node, |attrs| {
            attrs.retain(|a| *a.name.local != *name);
            attrs.push(Attribute {
                name: QualName::new(None, Namespace::from(""), LocalName::from(name.as_str())),
                value: StrTendril::from_slice(value),
            });
        });
        if changed {
            if let Some(path) = self.recording_path(node) {
                self.record(Patch::SetAttr { path, name, value: value.to_string() });
            }
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if self.attr(node, name).is_none() {
            return;
        }
        let name = name.to_ascii_lowercase();
        let changed = self.rewrite_attrs(node, |attrs| attrs.retain(|a| *a.name.local != *name));
        if changed {
            if let Some(path) = self.recording_path(node) {
                self.record(Patch::RemoveAttr { path, name });
            }
        }
    }

    /// Rebuild an element with edited attributes. scraper caches id and class
    /// lookups per element, so the value is replaced rather than patched.
    fn rewrite_attrs(&mut self, node: NodeId, edit: impl FnOnce(&mut Vec<Attribute>)) -> bool {
        let Some(el) = self.element(node) else { return false };
        let mut attrs: Vec<Attribute> = el
            .attrs
            .iter()
            .map(|(name, value)| Attribute {
                name: name.clone(),
                value: StrTendril::from_slice(value),
            })
            .collect();
        let name = el.name.clone();
        edit(&mut attrs);
        match self.resolve(node).and_then(|e| self.tree.get_mut(e)) {
            Some(mut n) => {
                *n.value() = Node::Element(Element::new(name, attrs));
                true
            }
            None => false,
        }
    }

    /// Whitespace-separated class tokens, in attribute order
    pub fn classes(&self, node: NodeId) -> impl Iterator<Item = &str> {
        self.attr(node, "class").unwrap_or("").split_ascii_whitespace()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node)
            .is_some_and(|e| e.has_class(class, CaseSensitivity::CaseSensitive))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if !self.is_element(node) || self.has_class(node, class) {
            return;
        }
        let joined = match self.attr(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr(node, "class", &joined);
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if !self.has_class(node, class) {
            return;
        }
        let kept: Vec<&str> = self.classes(node).filter(|c| *c != class).collect();
        let joined = kept.join(" ");
        self.set_attr(node, "class", &joined);
    }

    /// Nearest element at or above `node` for which `pred` holds
    pub fn closest(&self, node: NodeId, mut pred: impl FnMut(NodeId) -> bool) -> Option<NodeId> {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .find(|n| self.is_element(*n) && pred(*n))
    }
}

// =============================================================================
// Iterators
// =============================================================================

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Descendants<'_> {
    /// Do not descend into the children of the node most recently yielded
    pub fn skip_children_of(&mut self, node: NodeId) {
        let count = self.doc.children(node).len();
        let keep = self.stack.len().saturating_sub(count);
        if self.stack[keep..].iter().all(|n| self.doc.parent(*n) == Some(node)) {
            self.stack.truncate(keep);
        }
    }
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        for child in self.doc.children(node).into_iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

// =============================================================================
// Tests
// =============================================================================
