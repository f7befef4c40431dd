//! MentionLens: JavaScript-facing facade
//!
//! Owns a `Document` mirror of the host page and a `HeadlessSurface`. With
//! mirroring on, every overlay edit and scroll request is logged as a
//! `Patch` the host replays on its live DOM (`takePatches`), and the host's
//! MutationObserver records come back in through `applyMutations`. Paths are
//! child indexes from the document node, so the host should load the page
//! with its doctype (`XMLSerializer` output) to keep both trees aligned.
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { MentionLens } from 'mentionlens';
//!
//! await init();
//! const lens = new MentionLens();
//! lens.setMirroring(true);
//! lens.loadHtml(new XMLSerializer().serializeToString(document), location.href);
//! applyPatches(lens.takePatches());   // host-side replay
//!
//! new MutationObserver(records => {
//!   lens.applyMutations(toHostMutations(records), location.href, performance.now());
//!   applyPatches(lens.takePatches());
//! }).observe(document.body, { childList: true, subtree: true, characterData: true });
//! ```

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::config::EngineConfig;
use crate::dom::{Document, HostMutation, NodeId, Patch, SelectorList};
use crate::engine::{DiagnosticSnapshot, MentionEngine};
use crate::error::{EngineError, Result};
use crate::logging::lens_warn;
use crate::navigation::KeyInput;
use crate::reactivity::Trigger;
use crate::render::chrome;
use crate::scanner::Handle;
use crate::surface::{HeadlessSurface, ScrollBehavior, Size, Surface};

/// Badge and list contents as plain data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryView {
    pub badge: Option<String>,
    pub title: Option<String>,
    pub open: bool,
    pub entries: Vec<SummaryEntryView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntryView {
    pub position: usize,
    pub label: String,
    pub context: String,
    pub emphasized: Vec<String>,
}

// =============================================================================
// MentionLens
// =============================================================================

#[wasm_bindgen]
pub struct MentionLens {
    engine: MentionEngine,
    doc: Document,
    surface: HeadlessSurface,
    /// Log patches for the host
    mirroring: bool,
    /// Latest timestamp the host reported
    now_ms: f64,
}

impl MentionLens {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Ok(Self {
            engine: MentionEngine::new(config)?,
            doc: Document::default(),
            surface: HeadlessSurface::default(),
            mirroring: false,
            now_ms: 0.0,
        })
    }

    pub fn from_json(config_json: Option<&str>) -> Result<Self> {
        let config = match config_json {
            Some(json) if !json.trim().is_empty() => EngineConfig::from_json(json)?,
            _ => EngineConfig::default(),
        };
        Self::new(config)
    }

    pub fn engine(&self) -> &MentionEngine {
        &self.engine
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    fn advance(&mut self, now_ms: f64) -> f64 {
        self.now_ms = self.now_ms.max(now_ms);
        self.now_ms
    }

    /// Replace the document and run a full pass
    pub fn load_html(&mut self, html: &str, location: &str) {
        self.engine.teardown(&mut self.doc);
        self.doc = Document::parse_html(html, location);
        if self.mirroring {
            self.doc.start_recording();
        }
        let viewport = self.surface.viewport();
        self.surface = HeadlessSurface::new(viewport);
        let now = self.now_ms;
        self.engine.start(&mut self.doc, &mut self.surface, now);
        self.flush_scrolls();
    }

    /// Turn patch logging on or off. Turning it off drops untaken patches.
    pub fn set_mirroring(&mut self, enabled: bool) {
        self.mirroring = enabled;
        if enabled {
            self.doc.start_recording();
        } else {
            self.doc.stop_recording();
        }
    }

    /// Patches logged since the last call, oldest first
    pub fn take_patches(&mut self) -> Vec<Patch> {
        self.flush_scrolls();
        self.doc.take_patches()
    }

    /// Log scroll requests after the edits that preceded them
    fn flush_scrolls(&mut self) {
        for (node, behavior) in self.surface.take_scrolls() {
            if !self.doc.is_attached(node) {
                continue;
            }
            let path = self.doc.tree_path(node);
            self.doc.push_patch(Patch::Scroll {
                path,
                smooth: behavior == ScrollBehavior::Smooth,
            });
        }
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.surface.set_viewport(Size { width, height });
    }

    /// Mirror the host's own DOM changes and report them to the engine.
    /// Every record is applied even if an earlier one fails; the first
    /// failure is returned after the engine has seen the rest. Returns the
    /// number of nodes inserted or changed.
    pub fn apply_mutations(&mut self, records: &[HostMutation], location: Option<&str>, now_ms: f64) -> Result<usize> {
        let mut touched: Vec<NodeId> = Vec::new();
        let mut failure = None;
        for record in records {
            match self.doc.apply_host_mutation(record) {
                Ok(inserted) => touched.extend(inserted),
                Err(e) => {
                    lens_warn!("host mutation out of step with the mirror: {}", e);
                    failure.get_or_insert(e);
                    continue;
                }
            }
            if let HostMutation::Text { path, .. } = record {
                touched.extend(self.doc.node_at(path));
            }
        }

        let moved = location.filter(|href| *href != self.doc.location());
        if let Some(href) = moved {
            self.doc.set_location(href);
        }
        let now = self.advance(now_ms);
        let count = touched.len();
        if count > 0 {
            let trigger = Trigger::NodesInserted {
                relevant: touched,
                location: self.doc.location().to_string(),
            };
            self.engine.signal(&mut self.doc, &mut self.surface, trigger, now);
        } else if let Some(href) = moved {
            let trigger = Trigger::LocationChanged { location: href.to_string() };
            self.engine.signal(&mut self.doc, &mut self.surface, trigger, now);
        }
        self.flush_scrolls();
        match failure {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }

    pub fn set_identity(&mut self, handle: &str) -> Result<()> {
        let handle = if handle.is_empty() { None } else { Some(Handle::parse(handle)?) };
        self.engine.set_identity(handle);
        Ok(())
    }

    fn first_match(&self, selector: &str) -> Result<NodeId> {
        let list = SelectorList::parse(selector)?;
        list.query_first(&self.doc, self.doc.root())
            .ok_or_else(|| EngineError::NodeNotFound(selector.to_string()))
    }

    /// Append `html` to the first element matching `selector` and report the
    /// insertion. Returns the number of top-level nodes inserted.
    pub fn insert_html(&mut self, selector: &str, html: &str, now_ms: f64) -> Result<usize> {
        let parent = self.first_match(selector)?;
        let inserted = self.doc.append_html(parent, html);
        let count = inserted.len();
        let now = self.advance(now_ms);
        let trigger = Trigger::NodesInserted {
            relevant: inserted,
            location: self.doc.location().to_string(),
        };
        self.engine.signal(&mut self.doc, &mut self.surface, trigger, now);
        self.flush_scrolls();
        Ok(count)
    }

    /// Change the document location (single-page navigation)
    pub fn navigate(&mut self, href: &str, now_ms: f64) {
        self.doc.set_location(href);
        let now = self.advance(now_ms);
        let trigger = Trigger::LocationChanged { location: href.to_string() };
        self.engine.signal(&mut self.doc, &mut self.surface, trigger, now);
        self.flush_scrolls();
    }

    pub fn focus(&mut self, now_ms: f64) {
        let now = self.advance(now_ms);
        self.engine.signal(&mut self.doc, &mut self.surface, Trigger::WindowFocused, now);
        self.flush_scrolls();
    }

    pub fn tick(&mut self, now_ms: f64) -> usize {
        let now = self.advance(now_ms);
        let fired = self.engine.tick(&mut self.doc, &mut self.surface, now);
        self.flush_scrolls();
        fired
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.engine.next_deadline()
    }

    pub fn rescan(&mut self) -> usize {
        let now = self.now_ms;
        self.engine.signal(&mut self.doc, &mut self.surface, Trigger::ManualRescan, now);
        self.flush_scrolls();
        self.engine.index().len()
    }

    pub fn next(&mut self) -> Option<usize> {
        let position = self.engine.next(&mut self.doc, &mut self.surface);
        self.flush_scrolls();
        position
    }

    pub fn previous(&mut self) -> Option<usize> {
        let position = self.engine.previous(&mut self.doc, &mut self.surface);
        self.flush_scrolls();
        position
    }

    pub fn goto(&mut self, position: i64) -> Option<usize> {
        let position = self.engine.goto(&mut self.doc, &mut self.surface, position);
        self.flush_scrolls();
        position
    }

    pub fn keydown(&mut self, key: &str, alt: bool) -> bool {
        let input = KeyInput {
            key: key.to_string(),
            alt,
            ctrl: false,
            meta: false,
            target: None,
        };
        let consumed = self.engine.handle_key(&mut self.doc, &mut self.surface, &input);
        self.flush_scrolls();
        consumed
    }

    /// Click the first element matching `selector`
    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.first_match(selector)?;
        self.engine.handle_click(&mut self.doc, &mut self.surface, target);
        self.flush_scrolls();
        Ok(())
    }

    /// Click the node at a child-index path (as the host sees it)
    pub fn click_path(&mut self, path: &[usize]) -> Result<()> {
        let target = self
            .doc
            .node_at(path)
            .ok_or_else(|| EngineError::NodeNotFound(format!("no node at path {path:?}")))?;
        self.engine.handle_click(&mut self.doc, &mut self.surface, target);
        self.flush_scrolls();
        Ok(())
    }

    pub fn html(&self) -> String {
        self.doc.outer_html(self.doc.root())
    }

    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        self.engine.diagnostics(&self.doc)
    }

    pub fn summary_view(&self) -> SummaryView {
        let summary = self.engine.summary();
        let Some(badge) = summary.badge().filter(|b| self.doc.is_attached(*b)) else {
            return SummaryView {
                badge: None,
                title: None,
                open: false,
                entries: Vec::new(),
            };
        };

        let doc = &self.doc;
        let entries = chrome::attached_with_class(doc, chrome::DROPDOWN_ITEM_CLASS)
            .into_iter()
            .filter(|item| doc.contains(badge, *item))
            .map(|item| {
                let part = |class: &str| doc.descendants(item).find(|n| doc.has_class(*n, class));
                SummaryEntryView {
                    position: doc.attr(item, chrome::INDEX_ATTR).and_then(|v| v.parse().ok()).unwrap_or(0),
                    label: part(chrome::DROPDOWN_INDEX_CLASS).map(|n| doc.text_content(n)).unwrap_or_default(),
                    context: part(chrome::DROPDOWN_CONTEXT_CLASS).map(|n| doc.text_content(n)).unwrap_or_default(),
                    emphasized: doc
                        .descendants(item)
                        .filter(|n| doc.tag(*n) == Some("strong"))
                        .map(|n| doc.text_content(n))
                        .collect(),
                }
            })
            .collect();

        SummaryView {
            badge: doc.children(badge).first().and_then(|t| doc.text(*t)).map(str::to_string),
            title: doc.attr(badge, "title").map(str::to_string),
            open: summary.is_open(),
            entries,
        }
    }
}

// =============================================================================
// WASM Bindings
// =============================================================================

#[wasm_bindgen]
impl MentionLens {
    /// Create a lens (JS binding). `configJson` may be omitted for defaults.
    #[wasm_bindgen(constructor)]
    pub fn js_new(config_json: Option<String>) -> std::result::Result<MentionLens, JsValue> {
        Ok(Self::from_json(config_json.as_deref())?)
    }

    #[wasm_bindgen(js_name = "loadHtml")]
    pub fn js_load_html(&mut self, html: &str, location: &str) {
        self.load_html(html, location);
    }

    #[wasm_bindgen(js_name = "setIdentity")]
    pub fn js_set_identity(&mut self, handle: &str) -> std::result::Result<(), JsValue> {
        Ok(self.set_identity(handle)?)
    }

    #[wasm_bindgen(js_name = "insertHtml")]
    pub fn js_insert_html(&mut self, selector: &str, html: &str, now_ms: f64) -> std::result::Result<usize, JsValue> {
        Ok(self.insert_html(selector, html, now_ms)?)
    }

    #[wasm_bindgen(js_name = "navigate")]
    pub fn js_navigate(&mut self, href: &str, now_ms: f64) {
        self.navigate(href, now_ms);
    }

    #[wasm_bindgen(js_name = "focus")]
    pub fn js_focus(&mut self, now_ms: f64) {
        self.focus(now_ms);
    }

    /// Fire due timers; returns how many fired
    #[wasm_bindgen(js_name = "tick")]
    pub fn js_tick(&mut self, now_ms: f64) -> usize {
        self.tick(now_ms)
    }

    /// `tick` against the wall clock; pair with `Date.now()` timestamps
    #[wasm_bindgen(js_name = "tickNow")]
    pub fn js_tick_now(&mut self) -> usize {
        self.tick(js_sys::Date::now())
    }

    /// Earliest pending deadline, or undefined
    #[wasm_bindgen(js_name = "nextDeadline")]
    pub fn js_next_deadline(&self) -> Option<f64> {
        self.next_deadline()
    }

    /// Force a full rebuild; returns the mention count
    #[wasm_bindgen(js_name = "rescan")]
    pub fn js_rescan(&mut self) -> usize {
        self.rescan()
    }

    /// Returns the new position, or -1 when there are no mentions
    #[wasm_bindgen(js_name = "next")]
    pub fn js_next(&mut self) -> i32 {
        self.next().map_or(-1, |p| p as i32)
    }

    #[wasm_bindgen(js_name = "previous")]
    pub fn js_previous(&mut self) -> i32 {
        self.previous().map_or(-1, |p| p as i32)
    }

    #[wasm_bindgen(js_name = "goto")]
    pub fn js_goto(&mut self, position: i32) -> i32 {
        self.goto(position as i64).map_or(-1, |p| p as i32)
    }

    /// Returns true when the key was consumed
    #[wasm_bindgen(js_name = "keydown")]
    pub fn js_keydown(&mut self, key: &str, alt: bool) -> bool {
        self.keydown(key, alt)
    }

    #[wasm_bindgen(js_name = "click")]
    pub fn js_click(&mut self, selector: &str) -> std::result::Result<(), JsValue> {
        Ok(self.click(selector)?)
    }

    #[wasm_bindgen(js_name = "clickPath")]
    pub fn js_click_path(&mut self, path: Vec<u32>) -> std::result::Result<(), JsValue> {
        let path: Vec<usize> = path.into_iter().map(|i| i as usize).collect();
        Ok(self.click_path(&path)?)
    }

    #[wasm_bindgen(js_name = "setMirroring")]
    pub fn js_set_mirroring(&mut self, enabled: bool) {
        self.set_mirroring(enabled);
    }

    /// Drain logged patches as `{ op, ... }` objects for the host to replay
    #[wasm_bindgen(js_name = "takePatches")]
    pub fn js_take_patches(&mut self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.take_patches()).unwrap_or(JsValue::NULL)
    }

    /// Feed host mutation records (`{ type: "insert" | "remove" | "text" | "attr", ... }`)
    #[wasm_bindgen(js_name = "applyMutations")]
    pub fn js_apply_mutations(
        &mut self,
        records: JsValue,
        location: Option<String>,
        now_ms: f64,
    ) -> std::result::Result<usize, JsValue> {
        let records: Vec<HostMutation> = serde_wasm_bindgen::from_value(records)
            .map_err(|e| JsValue::from_str(&format!("Invalid mutation records: {}", e)))?;
        Ok(self.apply_mutations(&records, location.as_deref(), now_ms)?)
    }

    #[wasm_bindgen(js_name = "setViewport")]
    pub fn js_set_viewport(&mut self, width: f64, height: f64) {
        self.set_viewport(width, height);
    }

    #[wasm_bindgen(js_name = "html")]
    pub fn js_html(&self) -> String {
        self.html()
    }

    #[wasm_bindgen(js_name = "diagnostics")]
    pub fn js_diagnostics(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.diagnostics()).unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(js_name = "summary")]
    pub fn js_summary(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.summary_view()).unwrap_or(JsValue::NULL)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><meta name="user-login" content="alice"></head><body>
        <h1 class="gh-header-title">Title</h1>
        <div class="js-discussion"><div class="comment-body"><p>cc @alice please</p></div></div>
        </body></html>"#;
    const URL: &str = "https://github.com/o/r/issues/1";

    #[test]
    fn test_load_and_navigate() {
        let mut lens = MentionLens::from_json(None).unwrap();
        lens.load_html(PAGE, URL);
        assert_eq!(lens.diagnostics().mention_count, 1);
        assert_eq!(lens.next(), Some(0));
        assert!(lens.keydown("n", true));
        assert!(!lens.keydown("n", false));
    }

    #[test]
    fn test_insert_then_tick() {
        let mut lens = MentionLens::from_json(Some(r#"{ "timing": { "debounce_ms": 100 } }"#)).unwrap();
        lens.load_html(PAGE, URL);
        let inserted = lens
            .insert_html(".js-discussion", r#"<div class="comment-body">and @alice</div>"#, 10.0)
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(lens.next_deadline(), Some(110.0));
        lens.tick(110.0);

        let view = lens.summary_view();
        assert_eq!(view.badge.as_deref(), Some("@2"));
        assert_eq!(view.title.as_deref(), Some("2 mentions of @alice"));
        assert_eq!(view.entries.len(), 2);
        assert_eq!(view.entries[1].label, "#2");
        assert_eq!(view.entries[1].emphasized, vec!["@alice".to_string()]);
    }

    #[test]
    fn test_click_badge_opens_list() {
        let mut lens = MentionLens::from_json(None).unwrap();
        lens.load_html(PAGE, URL);
        lens.click(".mention-lens-counter").unwrap();
        assert!(lens.summary_view().open);
        assert!(matches!(lens.click(".missing"), Err(EngineError::NodeNotFound(_))));
    }

    fn mirrored() -> MentionLens {
        let mut lens = MentionLens::from_json(None).unwrap();
        lens.set_mirroring(true);
        lens.load_html(PAGE, URL);
        lens
    }

    #[test]
    fn test_host_copy_follows_patches() {
        let mut lens = mirrored();
        let patches = lens.take_patches();
        assert!(patches.iter().any(|p| matches!(
            p,
            Patch::Insert { html, .. } if html.contains(chrome::MENTION_CLASS)
        )));

        let mut host = Document::parse_html(PAGE, URL);
        for patch in &patches {
            host.apply_patch(patch).unwrap();
        }
        assert_eq!(host.outer_html(host.root()), lens.html());
        assert!(lens.take_patches().is_empty());
    }

    #[test]
    fn test_navigation_scrolls_become_patches() {
        let mut lens = mirrored();
        lens.take_patches();
        assert_eq!(lens.next(), Some(0));
        let patches = lens.take_patches();
        let overlay = lens.first_match(".mention-lens-mention").unwrap();
        let path = lens.doc.tree_path(overlay);
        assert!(patches.contains(&Patch::Scroll { path, smooth: true }));
    }

    #[test]
    fn test_host_mutations_reach_the_index() {
        let mut lens = mirrored();
        let discussion = lens.first_match(".js-discussion").unwrap();
        let parent = lens.doc.tree_path(discussion);
        let records = vec![HostMutation::Insert {
            parent,
            index: usize::MAX,
            html: r#"<div class="comment-body">ping @alice</div>"#.to_string(),
        }];
        assert_eq!(lens.apply_mutations(&records, Some(URL), 5.0).unwrap(), 1);

        let deadline = lens.next_deadline().unwrap();
        lens.tick(deadline);
        assert_eq!(lens.diagnostics().mention_count, 2);

        // The host's own insertion is not echoed back, only the overlays.
        let patches = lens.take_patches();
        assert!(!patches.iter().any(|p| matches!(p, Patch::Insert { html, .. } if html.starts_with(r#"<div class="comment-body">"#))));
    }

    #[test]
    fn test_bad_mutation_path_still_applies_the_rest() {
        let mut lens = mirrored();
        let discussion = lens.first_match(".js-discussion").unwrap();
        let records = vec![
            HostMutation::Remove { path: vec![4, 4, 4] },
            HostMutation::Attr {
                path: lens.doc.tree_path(discussion),
                name: "data-seen".to_string(),
                value: Some("1".to_string()),
            },
        ];
        let err = lens.apply_mutations(&records, None, 1.0).unwrap_err();
        assert!(matches!(err, EngineError::NodeNotFound(_)));
        assert_eq!(lens.doc.attr(discussion, "data-seen"), Some("1"));
    }

    #[test]
    fn test_bad_config_and_identity() {
        assert!(MentionLens::from_json(Some("{ not json")).is_err());
        let mut lens = MentionLens::from_json(None).unwrap();
        assert!(lens.set_identity("-bad").is_err());
        assert!(lens.set_identity("carol").is_ok());
    }
}
