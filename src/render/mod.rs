//! HighlightRenderer: non-destructive overlays for indexed mentions
//!
//! Every edit goes through an `OverlayTransaction` that is kept in a journal,
//! so `cleanup` can put the document back exactly as it was found by applying
//! the inverses newest-first. Anything the journal cannot undo (the host moved
//! or cloned our markup) is swept by class afterwards.

pub mod chrome;

use std::collections::BTreeMap;
use std::ops::Range;

use crate::dom::{Document, NodeId, OverlayTransaction};
use crate::index::{MentionIndex, MentionKind};
use crate::logging::{lens_debug, lens_warn};

// =============================================================================
// Types
// =============================================================================

/// Counts from one render call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub rendered: usize,
    /// Already had an attached overlay
    pub already_rendered: usize,
    /// Source text changed or node detached since detection
    pub stale: usize,
}

/// Counts from one cleanup call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub reverted: usize,
    pub failed_reverts: usize,
    pub swept: usize,
}

// =============================================================================
// HighlightRenderer
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct HighlightRenderer {
    journal: Vec<OverlayTransaction>,
}

impl HighlightRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions that cleanup would invert
    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Render overlays for the records in `range`. Idempotent: records whose
    /// overlay is still attached are left alone.
    pub fn render(&mut self, doc: &mut Document, index: &mut MentionIndex, range: Range<usize>) -> RenderReport {
        let mut report = RenderReport::default();
        let total = index.len();
        let range = range.start.min(total)..range.end.min(total);

        // Plain-text records grouped per source node, offsets ascending
        let mut text_groups: BTreeMap<NodeId, Vec<usize>> = BTreeMap::new();

        for position in range {
            let Some(record) = index.get(position) else {
                continue;
            };
            if record.overlay.is_some_and(|o| doc.is_attached(o)) {
                report.already_rendered += 1;
                continue;
            }
            match record.kind {
                MentionKind::NativeLink => {
                    let Some(link) = record.link else {
                        continue;
                    };
                    if !doc.is_attached(link) {
                        report.stale += 1;
                        lens_warn!("mention link #{} detached before render", position);
                        continue;
                    }
                    if let Some(wrapper) = self.wrap_link(doc, link, position, total) {
                        if let Some(r) = index.get_mut(position) {
                            r.overlay = Some(wrapper);
                        }
                        report.rendered += 1;
                    }
                }
                MentionKind::PlainText => {
                    let fresh = doc.is_attached(record.source_node)
                        && doc.text(record.source_node) == Some(record.source_text.as_str());
                    if !fresh {
                        report.stale += 1;
                        lens_warn!("text for mention #{} changed since detection; skipped", position);
                        continue;
                    }
                    text_groups.entry(record.source_node).or_default().push(position);
                }
            }
        }

        for (node, mut positions) in text_groups {
            positions.sort_by_key(|p| index.get(*p).map(|r| r.offset));
            report.rendered += self.split_text(doc, index, node, &positions, total);
        }

        lens_debug!(
            "render: {} rendered, {} already present, {} stale",
            report.rendered,
            report.already_rendered,
            report.stale
        );
        report
    }

    /// Wrap a native link in an overlay span; the link itself is moved, not altered
    fn wrap_link(&mut self, doc: &mut Document, link: NodeId, position: usize, total: usize) -> Option<NodeId> {
        let wrapper = chrome::build_overlay(doc, position, true);
        let tx = OverlayTransaction::replace(doc, link, vec![wrapper]).filter(|tx| tx.apply(doc));
        let Some(tx) = tx else {
            doc.release(wrapper);
            return None;
        };
        doc.append_child(wrapper, link);
        let nav = chrome::build_nav(doc, position, total);
        doc.append_child(wrapper, nav);
        self.journal.push(tx);
        Some(wrapper)
    }

    /// Replace one text node with `[prefix, overlay, middle, overlay, ..., suffix]`
    fn split_text(
        &mut self,
        doc: &mut Document,
        index: &mut MentionIndex,
        node: NodeId,
        positions: &[usize],
        total: usize,
    ) -> usize {
        let text = doc.text(node).unwrap_or_default().to_string();
        let mut pieces: Vec<NodeId> = Vec::new();
        let mut overlays: Vec<(usize, NodeId)> = Vec::new();
        let mut cursor = 0;

        for &position in positions {
            let Some(record) = index.get(position) else {
                continue;
            };
            let span = record.span();
            if span.start < cursor || text.get(span.clone()).is_none() {
                continue;
            }
            if span.start > cursor {
                pieces.push(doc.create_text(&text[cursor..span.start]));
            }

            let overlay = chrome::build_overlay(doc, position, false);
            let label = doc.create_text(&text[span.clone()]);
            doc.append_child(overlay, label);
            let nav = chrome::build_nav(doc, position, total);
            doc.append_child(overlay, nav);

            pieces.push(overlay);
            overlays.push((position, overlay));
            cursor = span.end;
        }
        if cursor < text.len() {
            pieces.push(doc.create_text(&text[cursor..]));
        }

        let tx = OverlayTransaction::replace(doc, node, pieces.clone()).filter(|tx| tx.apply(doc));
        let Some(tx) = tx else {
            for piece in pieces {
                doc.release(piece);
            }
            return 0;
        };
        self.journal.push(tx);

        for (position, overlay) in &overlays {
            if let Some(r) = index.get_mut(*position) {
                r.overlay = Some(*overlay);
            }
        }
        overlays.len()
    }

    /// Rewrite the `i/N` label of every rendered overlay. Overlay elements and
    /// their attributes are left untouched.
    pub fn refresh_labels(&self, doc: &mut Document, index: &MentionIndex) -> usize {
        let total = index.len();
        let mut refreshed = 0;
        for record in index.iter() {
            let Some(overlay) = record.overlay else {
                continue;
            };
            let label = doc
                .descendants(overlay)
                .find(|n| doc.has_class(*n, chrome::NAV_INDEX_CLASS));
            if let Some(label) = label {
                doc.set_text_content(label, &chrome::nav_label(record.position, total));
                refreshed += 1;
            }
        }
        refreshed
    }

    /// Remove every overlay and all summary chrome. Safe to call repeatedly.
    pub fn cleanup(&mut self, doc: &mut Document) -> CleanupReport {
        let mut report = CleanupReport::default();

        while let Some(tx) = self.journal.pop() {
            if tx.inverse().apply(doc) {
                report.reverted += 1;
                for node in &tx.inserted {
                    doc.release(*node);
                }
            } else {
                report.failed_reverts += 1;
            }
        }

        report.swept = sweep_overlays(doc);

        for class in [chrome::COUNTER_CLASS, chrome::DROPDOWN_CLASS, chrome::NAV_CLASS] {
            for node in chrome::attached_with_class(doc, class) {
                doc.detach(node);
                doc.release(node);
            }
        }

        if report.reverted + report.swept + report.failed_reverts > 0 {
            lens_debug!(
                "cleanup: {} reverted, {} swept, {} could not be reverted",
                report.reverted,
                report.swept,
                report.failed_reverts
            );
        }
        report
    }
}

// =============================================================================
// Sweep
// =============================================================================

/// Remove overlays the journal no longer knows about. Link wrappers give their
/// link back; plain overlays become a text node of their non-chrome text.
fn sweep_overlays(doc: &mut Document) -> usize {
    let mut swept = 0;
    // Innermost first so nested leftovers unwrap cleanly
    for overlay in chrome::attached_overlays(doc).into_iter().rev() {
        let Some(parent) = doc.parent(overlay) else {
            continue;
        };
        if doc.has_class(overlay, chrome::LINK_WRAPPER_CLASS) {
            let keep: Vec<NodeId> = doc
                .children(overlay)
                .into_iter()
                .filter(|c| !chrome::is_ui_element(doc, *c))
                .collect();
            doc.replace_with(overlay, &keep);
        } else {
            let text = chrome::text_without_ui(doc, overlay);
            let replacement = doc.create_text(&text);
            doc.replace_with(overlay, &[replacement]);
        }
        doc.release(overlay);
        merge_adjacent_text(doc, parent);
        swept += 1;
    }
    swept
}

/// Join runs of sibling text nodes under `parent`
fn merge_adjacent_text(doc: &mut Document, parent: NodeId) {
    let children: Vec<NodeId> = doc.children(parent);
    let mut run_head: Option<NodeId> = None;
    for child in children {
        let Some(text) = doc.text(child).map(str::to_string) else {
            run_head = None;
            continue;
        };
        match run_head {
            Some(head) => {
                let joined = format!("{}{}", doc.text(head).unwrap_or_default(), text);
                doc.set_text(head, &joined);
                doc.detach(child);
                doc.release(child);
            }
            None => run_head = Some(child),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MentionRecord;

    fn paragraph(content: &str) -> (Document, NodeId, NodeId) {
        let mut doc = Document::new("about:blank");
        let p = doc.create_element("p");
        doc.append_child(doc.root(), p);
        let t = doc.create_text(content);
        doc.append_child(p, t);
        (doc, p, t)
    }

    #[test]
    fn test_plain_text_split() {
        let (mut doc, p, t) = paragraph("cc @alice and @alice!");
        let mut index = MentionIndex::new();
        index.rebuild(
            &doc,
            vec![
                MentionRecord::plain_text(t, "cc @alice and @alice!", 3, 6),
                MentionRecord::plain_text(t, "cc @alice and @alice!", 14, 6),
            ],
        );
        let mut renderer = HighlightRenderer::new();
        let report = renderer.render(&mut doc, &mut index, 0..2);

        assert_eq!(report.rendered, 2);
        assert_eq!(doc.children(p).len(), 5);
        let first = index.get(0).unwrap().overlay.unwrap();
        assert_eq!(chrome::text_without_ui(&doc, first), "@alice");
        assert_eq!(doc.attr(first, chrome::INDEX_ATTR), Some("0"));
        assert_eq!(chrome::text_without_ui(&doc, p), "cc @alice and @alice!");
    }

    #[test]
    fn test_render_is_idempotent() {
        let (mut doc, p, t) = paragraph("@alice");
        let mut index = MentionIndex::new();
        index.rebuild(&doc, vec![MentionRecord::plain_text(t, "@alice", 0, 6)]);
        let mut renderer = HighlightRenderer::new();
        renderer.render(&mut doc, &mut index, 0..1);
        let html = doc.outer_html(p);

        let again = renderer.render(&mut doc, &mut index, 0..1);
        assert_eq!(again.rendered, 0);
        assert_eq!(again.already_rendered, 1);
        assert_eq!(doc.outer_html(p), html);
    }

    #[test]
    fn test_link_wrapper_keeps_link() {
        let mut doc = Document::parse_html(
            r#"<body><p>hi <a class="user-mention" href="/alice">@alice</a></p></body>"#,
            "https://github.com/",
        );
        let link = doc.descendants(doc.root()).find(|n| doc.tag(*n) == Some("a")).unwrap();
        let text = doc.children(link)[0];
        let original = doc.outer_html(link);
        let mut index = MentionIndex::new();
        index.rebuild(&doc, vec![MentionRecord::native_link(link, text, "@alice")]);

        let mut renderer = HighlightRenderer::new();
        renderer.render(&mut doc, &mut index, 0..1);
        let wrapper = index.get(0).unwrap().overlay.unwrap();
        assert_eq!(doc.parent(link), Some(wrapper));
        assert!(doc.has_class(wrapper, chrome::LINK_WRAPPER_CLASS));
        assert_eq!(doc.outer_html(link), original);
    }

    #[test]
    fn test_cleanup_restores_exact_markup() {
        let mut doc = Document::parse_html(
            r#"<body><div class="comment-body"><p>cc @alice and <a class="user-mention" href="/alice">@alice</a> ok</p></div></body>"#,
            "https://github.com/",
        );
        let before = doc.outer_html(doc.root());
        let link = doc.descendants(doc.root()).find(|n| doc.tag(*n) == Some("a")).unwrap();
        let p = doc.parent(link).unwrap();
        let t = doc.children(p)[0];
        let link_text = doc.children(link)[0];

        let mut index = MentionIndex::new();
        index.rebuild(
            &doc,
            vec![
                MentionRecord::plain_text(t, "cc @alice and ", 3, 6),
                MentionRecord::native_link(link, link_text, "@alice"),
            ],
        );
        let mut renderer = HighlightRenderer::new();
        renderer.render(&mut doc, &mut index, 0..2);
        assert_ne!(doc.outer_html(doc.root()), before);

        let report = renderer.cleanup(&mut doc);
        assert_eq!(report.reverted, 2);
        assert_eq!(doc.outer_html(doc.root()), before);

        let second = renderer.cleanup(&mut doc);
        assert_eq!(second, CleanupReport::default());
    }

    #[test]
    fn test_render_cleanup_cycles_do_not_grow_document() {
        let mut doc = Document::parse_html(
            r#"<body><p>cc @alice and <a class="user-mention" href="/alice">@alice</a> ok</p></body>"#,
            "https://github.com/",
        );
        let link = doc.descendants(doc.root()).find(|n| doc.tag(*n) == Some("a")).unwrap();
        let p = doc.parent(link).unwrap();
        let baseline = doc.node_count();
        let mut renderer = HighlightRenderer::new();

        for _ in 0..20 {
            let t = doc.children(p)[0];
            let link_text = doc.children(link)[0];
            let mut index = MentionIndex::new();
            index.rebuild(
                &doc,
                vec![
                    MentionRecord::plain_text(t, "cc @alice and ", 3, 6),
                    MentionRecord::native_link(link, link_text, "@alice"),
                ],
            );
            renderer.render(&mut doc, &mut index, 0..2);
            renderer.cleanup(&mut doc);
            assert_eq!(doc.node_count(), baseline);
        }
    }

    #[test]
    fn test_stale_text_is_skipped() {
        let (mut doc, _p, t) = paragraph("cc @alice");
        let mut index = MentionIndex::new();
        index.rebuild(&doc, vec![MentionRecord::plain_text(t, "cc @alice", 3, 6)]);
        doc.set_text(t, "edited by host");

        let mut renderer = HighlightRenderer::new();
        let report = renderer.render(&mut doc, &mut index, 0..1);
        assert_eq!(report.stale, 1);
        assert!(index.get(0).unwrap().overlay.is_none());
    }

    #[test]
    fn test_refresh_labels_keeps_identity() {
        let (mut doc, _p, t) = paragraph("@alice");
        let mut index = MentionIndex::new();
        index.rebuild(&doc, vec![MentionRecord::plain_text(t, "@alice", 0, 6)]);
        let mut renderer = HighlightRenderer::new();
        renderer.render(&mut doc, &mut index, 0..1);
        let overlay = index.get(0).unwrap().overlay.unwrap();
        assert!(doc.text_content(overlay).contains("1/1"));

        let q = doc.create_element("p");
        doc.append_child(doc.root(), q);
        let t2 = doc.create_text("@alice");
        doc.append_child(q, t2);
        let appended = index.merge_new(&doc, vec![MentionRecord::plain_text(t2, "@alice", 0, 6)]);
        renderer.render(&mut doc, &mut index, appended);
        renderer.refresh_labels(&mut doc, &index);

        assert_eq!(index.get(0).unwrap().overlay, Some(overlay));
        assert!(doc.text_content(overlay).contains("1/2"));
        let second = index.get(1).unwrap().overlay.unwrap();
        assert!(doc.text_content(second).contains("2/2"));
    }

    #[test]
    fn test_sweep_handles_foreign_overlays() {
        let mut doc = Document::parse_html(
            "<body><p>a <span class=\"mention-lens-mention\" data-mention-index=\"0\">@alice<span class=\"mention-lens-nav\">\u{2190}1/1\u{2192}</span></span> b</p></body>",
            "about:blank",
        );
        let mut renderer = HighlightRenderer::new();
        let report = renderer.cleanup(&mut doc);
        assert_eq!(report.swept, 1);
        let p = doc.descendants(doc.root()).find(|n| doc.tag(*n) == Some("p")).unwrap();
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(p), "a @alice b");
    }
}
