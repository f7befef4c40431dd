//! MentionLens: @handle mention detection, indexing and overlay engine
//!
//! Finds every place the viewer is @mentioned in a live document, keeps an
//! ordered index of those mentions, and decorates them with a position
//! marker, previous/next controls and a summary badge. The engine keeps the
//! decorations consistent while the host page re-renders and navigates.
//!
//! # Architecture
//!
//! ## Document Model
//! - `dom/` - Document over scraper's node tree, HTML import/serialization,
//!   selectors, reversible overlay transactions, host patch journal
//!
//! ## Detection
//! - `scanner/handle.rs` - Handle grammar and the mention matcher
//! - `scanner/region.rs` - RegionClassifier: allow/deny rules for scanning
//! - `scanner/locator.rs` - MentionLocator: links + plain text, link repair
//! - `index.rs` - MentionIndex: document-ordered records and the cursor
//!
//! ## Presentation
//! - `render/` - HighlightRenderer: overlays, nav controls, cleanup
//! - `navigation.rs` - Position commands, keyboard and click routing
//! - `summary/` - Badge, dropdown, snippets and placement
//!
//! ## Runtime
//! - `reactivity/` - Timer slots and the pure reaction planner
//! - `engine/` - MentionEngine: owns state and executes passes
//! - `wasm.rs` - MentionLens: JavaScript facade
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { MentionLens } from 'mentionlens';
//!
//! await init();
//!
//! const lens = new MentionLens(JSON.stringify({ timing: { debounce_ms: 150 } }));
//! lens.setMirroring(true);
//! lens.loadHtml(new XMLSerializer().serializeToString(document), location.href);
//! applyPatches(lens.takePatches());  // overlays, as { op, ... } records
//!
//! console.log(lens.diagnostics().mention_count);
//! lens.next();                       // jump to the first mention
//! lens.keydown('p', true);           // Alt+P: previous
//! console.log(lens.summary().entries);
//! ```

pub mod error;
mod logging;

// Document model
pub mod dom;
pub mod config;

// Detection
pub mod scanner;
pub mod index;

// Presentation
pub mod render;
pub mod surface;
pub mod navigation;
pub mod summary;

// Runtime
pub mod reactivity;
pub mod identity;
pub mod engine;
pub mod wasm;

pub use config::{Catalog, EngineConfig, SummaryConfig, TimingConfig};
pub use dom::{Document, HostMutation, NodeId, Patch};
pub use engine::{DiagnosticSnapshot, EngineState, MentionEngine, PassReport};
pub use error::{EngineError, Result};
pub use identity::{AllowAll, PageGate, PathPatternGate};
pub use index::{MentionIndex, MentionKind, MentionRecord};
pub use scanner::{Handle, MentionLocator};
pub use surface::{HeadlessSurface, Surface};
pub use wasm::MentionLens;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Install the panic hook so panics reach the browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("mentionlens v{}", env!("CARGO_PKG_VERSION"))
}
