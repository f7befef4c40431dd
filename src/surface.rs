//! Surface: layout, visibility and scrolling supplied by the embedder
//!
//! The engine never measures anything itself. Hosts implement `Surface`
//! over their real rendering; `HeadlessSurface` is the no-layout stand-in
//! used by the WASM facade's in-memory document and by tests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::dom::NodeId;

/// Scroll requests a `HeadlessSurface` remembers before dropping the oldest
pub const SCROLL_LOG_LIMIT: usize = 32;

// =============================================================================
// Geometry
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Viewport-relative rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollBehavior {
    /// Animated, centred on the target
    Smooth,
    /// Jump without animation
    Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrollError {
    #[error("smooth scrolling is not supported")]
    Unsupported,
    #[error("element is not scrollable: {0}")]
    Failed(String),
}

// =============================================================================
// Surface
// =============================================================================

pub trait Surface {
    fn viewport(&self) -> Size;

    /// Bounding box of an element, `None` when it has no layout
    fn rect(&self, node: NodeId) -> Option<Rect>;

    /// True when the element is rendered (non-zero box, not hidden)
    fn is_visible(&self, node: NodeId) -> bool;

    fn scroll_into_view(&mut self, node: NodeId, behavior: ScrollBehavior) -> std::result::Result<(), ScrollError>;
}

/// A surface with no layout: everything is visible, scrolling succeeds and
/// the most recent requests are kept (see `SCROLL_LOG_LIMIT`).
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    viewport: Size,
    rects: HashMap<NodeId, Rect>,
    hidden: Vec<NodeId>,
    scrolled: Vec<(NodeId, ScrollBehavior)>,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(Size { width: 1280.0, height: 800.0 })
    }
}

impl HeadlessSurface {
    pub fn new(viewport: Size) -> Self {
        Self {
            viewport,
            rects: HashMap::new(),
            hidden: Vec::new(),
            scrolled: Vec::new(),
        }
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.rects.insert(node, rect);
    }

    pub fn hide(&mut self, node: NodeId) {
        self.hidden.push(node);
    }

    /// Last element scrolled to
    pub fn last_scrolled(&self) -> Option<NodeId> {
        self.scrolled.last().map(|(n, _)| *n)
    }

    pub fn scroll_log(&self) -> &[(NodeId, ScrollBehavior)] {
        &self.scrolled
    }

    /// Drain the scroll log
    pub fn take_scrolls(&mut self) -> Vec<(NodeId, ScrollBehavior)> {
        std::mem::take(&mut self.scrolled)
    }
}

impl Surface for HeadlessSurface {
    fn viewport(&self) -> Size {
        self.viewport
    }

    fn rect(&self, node: NodeId) -> Option<Rect> {
        self.rects.get(&node).copied()
    }

    fn is_visible(&self, node: NodeId) -> bool {
        !self.hidden.contains(&node)
    }

    fn scroll_into_view(&mut self, node: NodeId, behavior: ScrollBehavior) -> std::result::Result<(), ScrollError> {
        if self.scrolled.len() >= SCROLL_LOG_LIMIT {
            self.scrolled.remove(0);
        }
        self.scrolled.push((node, behavior));
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
