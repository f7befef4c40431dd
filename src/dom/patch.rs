//! Patch journal: keeps a host page in step with the engine's document
//!
//! While recording, each edit to an attached node is logged as a `Patch`
//! addressed by child-slot paths from the document root. A host that loaded
//! the same markup replays the list in order. Edits the host observes on its
//! own page travel the other way as `HostMutation`s.

use serde::{Deserialize, Serialize};

use super::node::{Document, NodeId};
use crate::error::{EngineError, Result};

/// One edit for the host to replay. Paths are resolved against the host
/// document as it stands after every earlier patch in the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Patch {
    /// Parse `html` and insert it as child `index` of `parent`
    Insert { parent: Vec<usize>, index: usize, html: String },
    /// Move the node at `from` so it becomes child `index` of `parent`
    Move { from: Vec<usize>, parent: Vec<usize>, index: usize },
    Remove { path: Vec<usize> },
    SetAttr { path: Vec<usize>, name: String, value: String },
    RemoveAttr { path: Vec<usize>, name: String },
    SetText { path: Vec<usize>, text: String },
    /// Navigation asked for the node to be scrolled into view
    Scroll { path: Vec<usize>, smooth: bool },
}

/// A change the host saw on its live page (from a MutationObserver record)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMutation {
    Insert { parent: Vec<usize>, index: usize, html: String },
    Remove { path: Vec<usize> },
    Text { path: Vec<usize>, text: String },
    Attr { path: Vec<usize>, name: String, value: Option<String> },
}

impl Document {
    /// Start logging patches. Already-logged patches are kept.
    pub fn start_recording(&mut self) {
        self.patches.get_or_insert_with(Vec::new);
    }

    /// Stop logging and return whatever was not yet taken
    pub fn stop_recording(&mut self) -> Vec<Patch> {
        self.patches.take().unwrap_or_default()
    }

    pub fn is_recording(&self) -> bool {
        self.patches.is_some()
    }

    /// Drain the patches logged so far; recording continues
    pub fn take_patches(&mut self) -> Vec<Patch> {
        self.patches.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Log a patch that did not come from a tree edit
    pub fn push_patch(&mut self, patch: Patch) {
        if let Some(patches) = self.patches.as_mut() {
            patches.push(patch);
        }
    }

    pub(super) fn record(&mut self, patch: Patch) {
        self.push_patch(patch);
    }

    /// Path of `node` when recording and the node is attached
    pub(super) fn recording_path(&self, node: NodeId) -> Option<Vec<usize>> {
        (self.is_recording() && self.is_attached(node)).then(|| self.tree_path(node))
    }

    /// Log the outcome of moving `child`, given its path before the move
    pub(super) fn record_placement(&mut self, child: NodeId, from: Option<Vec<usize>>) {
        if !self.is_recording() {
            return;
        }
        let attached = self.is_attached(child);
        let patch = match (from, attached) {
            (None, false) => return,
            (Some(path), false) => Patch::Remove { path },
            (from, true) => {
                let Some(parent) = self.parent(child) else { return };
                let index = self.child_position(parent, child).unwrap_or(0);
                let parent = self.tree_path(parent);
                match from {
                    Some(from) => Patch::Move { from, parent, index },
                    None => Patch::Insert { parent, index, html: self.outer_html(child) },
                }
            }
        };
        self.record(patch);
    }

    /// Replay one patch on this document, as a host holding a parsed copy
    /// of the same page would. Nothing is logged while replaying.
    pub fn apply_patch(&mut self, patch: &Patch) -> Result<()> {
        let saved = self.patches.take();
        let result = self.replay(patch);
        self.patches = saved;
        result
    }

    fn replay(&mut self, patch: &Patch) -> Result<()> {
        match patch {
            Patch::Insert { parent, index, html } => {
                let parent = self.locate(parent)?;
                self.insert_html(parent, *index, html);
            }
            Patch::Move { from, parent, index } => {
                let node = self.locate(from)?;
                self.detach(node);
                let parent = self.locate(parent)?;
                self.insert_at(parent, node, *index);
            }
            Patch::Remove { path } => {
                let node = self.locate(path)?;
                self.detach(node);
                self.release(node);
            }
            Patch::SetAttr { path, name, value } => {
                let node = self.locate(path)?;
                self.set_attr(node, name, value);
            }
            Patch::RemoveAttr { path, name } => {
                let node = self.locate(path)?;
                self.remove_attr(node, name);
            }
            Patch::SetText { path, text } => {
                let node = self.locate(path)?;
                self.set_text(node, text);
            }
            Patch::Scroll { path, .. } => {
                self.locate(path)?;
            }
        }
        Ok(())
    }

    fn locate(&self, path: &[usize]) -> Result<NodeId> {
        self.node_at(path)
            .ok_or_else(|| EngineError::NodeNotFound(format!("no node at path {path:?}")))
    }

    /// Mirror a host-side change. Nothing is logged while mirroring. Returns
    /// the nodes that were inserted.
    pub fn apply_host_mutation(&mut self, mutation: &HostMutation) -> Result<Vec<NodeId>> {
        let saved = self.patches.take();
        let result = self.mirror(mutation);
        self.patches = saved;
        result
    }

    fn mirror(&mut self, mutation: &HostMutation) -> Result<Vec<NodeId>> {
        match mutation {
            HostMutation::Insert { parent, index, html } => {
                let parent = self.locate(parent)?;
                Ok(self.insert_html(parent, *index, html))
            }
            HostMutation::Remove { path } => {
                let node = self.locate(path)?;
                if node == self.root() {
                    return Err(EngineError::NodeNotFound("the root cannot be removed".to_string()));
                }
                self.detach(node);
                self.release(node);
                Ok(Vec::new())
            }
            HostMutation::Text { path, text } => {
                let node = self.locate(path)?;
                if self.is_text(node) {
                    self.set_text(node, text);
                } else {
                    self.set_text_content(node, text);
                }
                Ok(Vec::new())
            }
            HostMutation::Attr { path, name, value } => {
                let node = self.locate(path)?;
                match value {
                    Some(value) => self.set_attr(node, name, value),
                    None => self.remove_attr(node, name),
                }
                Ok(Vec::new())
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
