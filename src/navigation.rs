//! Navigation Controller: wraparound movement between mentions
//!
//! Also routes keyboard shortcuts and clicks on engine chrome into
//! navigation commands. Nothing here returns an error: a failed scroll falls
//! back to an instant jump and is only logged.

use crate::dom::{Document, NodeId};
use crate::index::MentionIndex;
use crate::logging::{lens_debug, lens_warn};
use crate::render::chrome;
use crate::surface::{ScrollBehavior, Surface};

// =============================================================================
// Types
// =============================================================================

/// A navigation request independent of where it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Next,
    Previous,
    /// Absolute position, wrapped into range
    Goto(i64),
}

/// What a click on the document should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    Navigate(NavCommand),
    /// Badge clicked: show or hide the list
    ToggleSummary,
    /// List entry clicked: go there and close the list
    SelectEntry(usize),
    /// Click outside the summary
    Dismiss,
    /// Click inside engine chrome that has no action
    Ignore,
}

/// A key press as reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key: String,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    /// Focused element receiving the key, if any
    pub target: Option<NodeId>,
}

impl KeyInput {
    pub fn alt(key: &str) -> Self {
        Self {
            key: key.to_string(),
            alt: true,
            ctrl: false,
            meta: false,
            target: None,
        }
    }

    pub fn with_target(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }
}

// =============================================================================
// Position arithmetic
// =============================================================================

/// Wrap a requested position into `0..len`. `None` when there is nothing to
/// navigate.
pub fn resolve_target(len: usize, requested: i64) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if requested < 0 {
        Some(len - 1)
    } else if requested as u64 >= len as u64 {
        Some(0)
    } else {
        Some(requested as usize)
    }
}

/// Absolute target for a command given the current position (-1 when unset)
pub fn command_target(command: NavCommand, current: i64) -> i64 {
    match command {
        NavCommand::Next => current + 1,
        NavCommand::Previous => current - 1,
        NavCommand::Goto(position) => position,
    }
}

// =============================================================================
// Movement
// =============================================================================

/// Move to `requested`: set the cursor, move the active marker and scroll the
/// overlay into view.
pub fn goto(doc: &mut Document, index: &mut MentionIndex, surface: &mut dyn Surface, requested: i64) -> Option<usize> {
    let target = resolve_target(index.len(), requested)?;
    index.set_current(target);

    for overlay in chrome::attached_overlays(doc) {
        doc.remove_class(overlay, chrome::ACTIVE_CLASS);
    }

    let record = index.get(target)?;
    let overlay = record.overlay.filter(|o| doc.is_attached(*o));
    if let Some(overlay) = overlay {
        doc.add_class(overlay, chrome::ACTIVE_CLASS);
    }

    let scroll_to = overlay
        .or(record.link)
        .or_else(|| doc.parent(record.source_node))
        .filter(|n| doc.is_attached(*n));
    match scroll_to {
        Some(node) => scroll_with_fallback(surface, node),
        None => lens_warn!("mention #{} is no longer in the document", target),
    }

    lens_debug!("navigated to mention {}/{}", target + 1, index.len());
    Some(target)
}

pub fn next(doc: &mut Document, index: &mut MentionIndex, surface: &mut dyn Surface) -> Option<usize> {
    let target = command_target(NavCommand::Next, index.current_position());
    goto(doc, index, surface, target)
}

pub fn previous(doc: &mut Document, index: &mut MentionIndex, surface: &mut dyn Surface) -> Option<usize> {
    let target = command_target(NavCommand::Previous, index.current_position());
    goto(doc, index, surface, target)
}

fn scroll_with_fallback(surface: &mut dyn Surface, node: NodeId) {
    if let Err(e) = surface.scroll_into_view(node, ScrollBehavior::Smooth) {
        lens_debug!("smooth scroll failed ({}); jumping instead", e);
        if let Err(e) = surface.scroll_into_view(node, ScrollBehavior::Instant) {
            lens_warn!("scroll to mention failed: {}", e);
        }
    }
}

// =============================================================================
// Keyboard
// =============================================================================

/// True when key presses on `node` are text entry
pub fn is_editable_target(doc: &Document, node: NodeId) -> bool {
    if matches!(doc.tag(node), Some("input") | Some("textarea") | Some("select")) {
        return true;
    }
    doc.closest(node, |n| doc.attr(n, "contenteditable").is_some())
        .and_then(|n| doc.attr(n, "contenteditable"))
        .is_some_and(|v| !v.eq_ignore_ascii_case("false"))
}

/// Map Alt+N / Alt+P to a command. `None` means the key is not ours.
pub fn command_for_key(doc: &Document, input: &KeyInput, has_mentions: bool) -> Option<NavCommand> {
    if !input.alt || input.ctrl || input.meta || !has_mentions {
        return None;
    }
    if input.target.is_some_and(|t| is_editable_target(doc, t)) {
        return None;
    }
    match input.key.as_str() {
        "n" | "N" => Some(NavCommand::Next),
        "p" | "P" => Some(NavCommand::Previous),
        _ => None,
    }
}

// =============================================================================
// Clicks
// =============================================================================

/// Decide what a click on `target` means
pub fn route_click(doc: &Document, target: NodeId) -> ClickAction {
    let button = doc.closest(target, |n| doc.has_class(n, chrome::NAV_BUTTON_CLASS));
    if let Some(button) = button {
        let Some(position) = chrome::overlay_of(doc, button).and_then(|o| chrome::overlay_position(doc, o)) else {
            return ClickAction::Ignore;
        };
        let position = position as i64;
        return if doc.has_class(button, chrome::NAV_PREV_CLASS) {
            ClickAction::Navigate(NavCommand::Goto(position - 1))
        } else {
            ClickAction::Navigate(NavCommand::Goto(position + 1))
        };
    }

    if let Some(item) = doc.closest(target, |n| doc.has_class(n, chrome::DROPDOWN_ITEM_CLASS)) {
        return match doc.attr(item, chrome::INDEX_ATTR).and_then(|v| v.parse().ok()) {
            Some(position) => ClickAction::SelectEntry(position),
            None => ClickAction::Ignore,
        };
    }
    if doc.closest(target, |n| doc.has_class(n, chrome::DROPDOWN_CLASS)).is_some() {
        return ClickAction::Ignore;
    }
    if doc.closest(target, |n| doc.has_class(n, chrome::COUNTER_CLASS)).is_some() {
        return ClickAction::ToggleSummary;
    }
    ClickAction::Dismiss
}

// =============================================================================
// Tests
// =============================================================================
