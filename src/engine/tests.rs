//! Scenario tests for MentionEngine: full passes, merges, timers, teardown

use super::*;
use crate::dom::Selector;
use crate::surface::{HeadlessSurface, Rect, ScrollBehavior, ScrollError, Size};

const ISSUE_URL: &str = "https://github.com/acme/widgets/issues/7";

const ISSUE_PAGE: &str = r#"<html><head><meta name="user-login" content="alice"></head><body>
<h1 class="gh-header-title">Widget breaks on resize</h1>
<div class="js-discussion">
<div class="comment-body"><p>cc @alice please</p></div>
<div class="comment-body"><p>ping <a class="user-mention" href="/alice">@alice</a> and @bob</p></div>
<div class="comment-body"><p>@alice2 mentioned @alice</p></div>
</div>
</body></html>"#;

fn engine() -> MentionEngine {
    MentionEngine::new(EngineConfig::default()).unwrap()
}

fn issue_doc() -> Document {
    Document::parse_html(ISSUE_PAGE, ISSUE_URL)
}

fn first_matching(doc: &Document, selector: &str) -> NodeId {
    let selector = Selector::parse(selector).unwrap();
    doc.descendants(doc.root())
        .find(|n| selector.matches(doc, *n))
        .unwrap()
}

fn overlays(engine: &MentionEngine) -> Vec<Option<NodeId>> {
    engine.index().iter().map(|r| r.overlay).collect()
}

/// Surface whose smooth scrolling always fails
#[derive(Default)]
struct NoSmoothScroll {
    inner: HeadlessSurface,
}

impl Surface for NoSmoothScroll {
    fn viewport(&self) -> Size {
        self.inner.viewport()
    }

    fn rect(&self, node: NodeId) -> Option<Rect> {
        self.inner.rect(node)
    }

    fn is_visible(&self, node: NodeId) -> bool {
        self.inner.is_visible(node)
    }

    fn scroll_into_view(&mut self, node: NodeId, behavior: ScrollBehavior) -> std::result::Result<(), ScrollError> {
        match behavior {
            ScrollBehavior::Smooth => Err(ScrollError::Unsupported),
            ScrollBehavior::Instant => self.inner.scroll_into_view(node, behavior),
        }
    }
}

// -----------------------------------------------------------------------------
// Full passes
// -----------------------------------------------------------------------------

#[test]
fn test_three_mentions_and_wraparound() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);

    assert!(engine.is_active());
    assert_eq!(engine.handle().unwrap().as_str(), "alice");
    let positions: Vec<usize> = engine.index().iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(engine.index().current(), Some(0));

    assert_eq!(engine.goto(&mut doc, &mut surface, 5), Some(0));
    assert_eq!(engine.goto(&mut doc, &mut surface, -1), Some(2));

    let diag = engine.diagnostics(&doc);
    assert_eq!(diag.mention_count, 3);
    assert_eq!(diag.overlays, 3);
    assert_eq!(diag.link_wrappers, 1);
    assert_eq!(diag.badges, 1);
    assert_eq!(diag.current_position, 2);
}

#[test]
fn test_badge_text_and_title() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);

    let badge = engine.summary().badge().unwrap();
    assert_eq!(doc.attr(badge, "title"), Some("3 mentions of @alice"));
    assert_eq!(doc.text(doc.children(badge)[0]), Some("@3"));
    let title = first_matching(&doc, "h1");
    assert_eq!(doc.parent(badge), Some(title));
}

#[test]
fn test_rescan_is_idempotent() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.rescan(&mut doc, &mut surface);
    assert!(!engine.is_active());

    engine.activate(&doc);
    engine.rescan(&mut doc, &mut surface);
    let html = doc.outer_html(doc.root());
    let report = engine.rescan(&mut doc, &mut surface);

    assert_eq!(report.total, 3);
    assert_eq!(doc.outer_html(doc.root()), html);
    assert_eq!(engine.diagnostics(&doc).overlays, 3);
    assert_eq!(engine.diagnostics(&doc).badges, 1);
}

#[test]
fn test_rescan_keeps_reading_position() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);
    engine.goto(&mut doc, &mut surface, 2);
    assert_eq!(engine.index().current(), Some(2));

    engine.rescan(&mut doc, &mut surface);
    assert_eq!(engine.index().current(), Some(2));

    // One comment disappears: the cursor is clamped, not reset
    let last = first_matching(&doc, ".js-discussion > .comment-body:last-child");
    doc.detach(last);
    engine.rescan(&mut doc, &mut surface);
    assert_eq!(engine.index().len(), 2);
    assert_eq!(engine.index().current(), Some(1));
}

#[test]
fn test_repeated_rescans_do_not_grow_document() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);
    let baseline = doc.node_count();

    for _ in 0..100 {
        engine.rescan(&mut doc, &mut surface);
    }
    assert_eq!(doc.node_count(), baseline);
    assert_eq!(engine.diagnostics(&doc).overlays, 3);
}

#[test]
fn test_teardown_restores_document() {
    let mut doc = issue_doc();
    let before = doc.outer_html(doc.root());
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);
    engine.goto(&mut doc, &mut surface, 1);
    assert_ne!(doc.outer_html(doc.root()), before);

    engine.teardown(&mut doc);
    assert_eq!(doc.outer_html(doc.root()), before);
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(engine.next_deadline(), None);

    engine.teardown(&mut doc);
    assert_eq!(doc.outer_html(doc.root()), before);
}

#[test]
fn test_idle_without_identity() {
    let mut doc = Document::parse_html(
        r#"<html><body><div class="comment-body">@alice</div></body></html>"#,
        ISSUE_URL,
    );
    let before = doc.outer_html(doc.root());
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);

    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(doc.outer_html(doc.root()), before);
    assert_eq!(engine.next(&mut doc, &mut surface), None);
}

#[test]
fn test_explicit_identity_and_custom_gate() {
    let mut doc = Document::parse_html(
        r#"<html><body><div class="comment-body">hey @carol</div></body></html>"#,
        "https://example.com/anything",
    );
    let mut surface = HeadlessSurface::default();
    let mut engine = engine().with_gate(Box::new(crate::identity::AllowAll));
    engine.set_identity(Some(Handle::parse("carol").unwrap()));
    engine.start(&mut doc, &mut surface, 0.0);
    assert_eq!(engine.index().len(), 1);
}

// -----------------------------------------------------------------------------
// Incremental merge
// -----------------------------------------------------------------------------

#[test]
fn test_debounced_merge_keeps_existing_overlays() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);
    let before = overlays(&engine);
    let badge = engine.summary().badge();

    let discussion = first_matching(&doc, ".js-discussion");
    let added = doc.append_html(discussion, r#"<div class="comment-body"><p>late reply @alice</p></div>"#);
    engine.signal(
        &mut doc,
        &mut surface,
        Trigger::NodesInserted { relevant: added, location: String::new() },
        100.0,
    );
    assert_eq!(engine.index().len(), 3);
    assert_eq!(engine.next_deadline(), Some(350.0));

    assert_eq!(engine.tick(&mut doc, &mut surface, 349.0), 0);
    assert_eq!(engine.tick(&mut doc, &mut surface, 350.0), 1);

    assert_eq!(engine.index().len(), 4);
    assert_eq!(&overlays(&engine)[..3], before.as_slice());
    assert_eq!(engine.summary().badge(), badge);
    let badge = badge.unwrap();
    assert_eq!(doc.text(doc.children(badge)[0]), Some("@4"));
    assert_eq!(engine.summary().entry_count(), 4);

    let first = before[0].unwrap();
    assert!(doc.text_content(first).contains("1/4"));
    assert_eq!(engine.last_pass().unwrap().kind, PassKind::Merge);
}

#[test]
fn test_burst_of_insertions_collapses_into_one_merge() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);
    let passes = engine.diagnostics(&doc).passes;
    let discussion = first_matching(&doc, ".js-discussion");

    for (i, now) in [10.0, 60.0, 110.0].into_iter().enumerate() {
        let html = format!(r#"<div class="comment-body"><p>reply {} @alice</p></div>"#, i);
        let added = doc.append_html(discussion, &html);
        engine.signal(&mut doc, &mut surface, Trigger::NodesInserted { relevant: added, location: String::new() }, now);
    }
    assert_eq!(engine.diagnostics(&doc).queued_subtrees, 3);
    engine.tick(&mut doc, &mut surface, 360.0);

    assert_eq!(engine.index().len(), 6);
    assert_eq!(engine.diagnostics(&doc).passes, passes + 1);
}

#[test]
fn test_engine_chrome_insertions_ignored() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);
    let overlay = engine.index().get(0).unwrap().overlay.unwrap();
    let body = first_matching(&doc, "body");
    let outside = doc.append_html(body, "<footer>@alice</footer>");

    let mut roots = doc.children(overlay);
    roots.extend(outside);
    assert!(engine.relevant_insertions(&doc, &roots).is_empty());
}

#[test]
fn test_insertions_outside_regions_ignored_on_regionless_page() {
    let mut doc = Document::parse_html(
        r#"<html><head><meta name="user-login" content="alice"></head><body><h1>t</h1><main>hello</main></body></html>"#,
        ISSUE_URL,
    );
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);
    let main = first_matching(&doc, "main");

    let stray = doc.append_html(main, "<p>@alice</p>");
    assert!(engine.relevant_insertions(&doc, &stray).is_empty());

    let comment = doc.append_html(main, r#"<div class="comment-body">@alice</div>"#);
    assert_eq!(engine.relevant_insertions(&doc, &comment), comment);
}

// -----------------------------------------------------------------------------
// Timers: settle, retry, health check
// -----------------------------------------------------------------------------

#[test]
fn test_zero_mentions_retry_until_content_arrives() {
    let mut doc = Document::parse_html(
        r#"<html><head><meta name="user-login" content="alice"></head><body><h1>t</h1><div class="comment-body" id="c">loading</div></body></html>"#,
        ISSUE_URL,
    );
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);
    assert_eq!(engine.index().len(), 0);
    assert_eq!(engine.diagnostics(&doc).retry_attempt, 1);
    assert_eq!(engine.next_deadline(), Some(500.0));

    let body = first_matching(&doc, "#c");
    doc.append_html(body, "<p>hi @alice</p>");
    engine.tick(&mut doc, &mut surface, 500.0);

    assert_eq!(engine.index().len(), 1);
    assert_eq!(engine.diagnostics(&doc).retry_attempt, 0);
}

#[test]
fn test_zero_mentions_retries_are_bounded() {
    let mut doc = Document::parse_html(
        r#"<html><head><meta name="user-login" content="alice"></head><body><div class="comment-body">nothing</div></body></html>"#,
        ISSUE_URL,
    );
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);

    let mut deadlines = Vec::new();
    while let Some(deadline) = engine.next_deadline() {
        deadlines.push(deadline);
        engine.tick(&mut doc, &mut surface, deadline);
    }
    assert_eq!(deadlines, vec![500.0, 1500.0, 3500.0, 7500.0]);
    assert_eq!(engine.diagnostics(&doc).passes, 5);
}

#[test]
fn test_location_change_settles_then_rebuilds() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);

    doc.set_location("https://github.com/acme/widgets");
    let location = doc.location().to_string();
    engine.signal(
        &mut doc,
        &mut surface,
        Trigger::LocationChanged { location },
        100.0,
    );
    assert_eq!(engine.next_deadline(), Some(1100.0));
    assert_eq!(engine.diagnostics(&doc).overlays, 3);

    engine.tick(&mut doc, &mut surface, 1100.0);
    assert_eq!(engine.state(), EngineState::Idle);
    let diag = engine.diagnostics(&doc);
    assert_eq!((diag.overlays, diag.badges, diag.mention_count), (0, 0, 0));

    doc.set_location("https://github.com/acme/widgets/pull/8");
    let location = doc.location().to_string();
    engine.signal(
        &mut doc,
        &mut surface,
        Trigger::LocationChanged { location },
        2000.0,
    );
    engine.tick(&mut doc, &mut surface, 3000.0);
    assert!(engine.is_active());
    assert_eq!(engine.index().len(), 3);
}

#[test]
fn test_insertions_revealing_new_location_settle_first() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);

    doc.set_location("https://github.com/acme/widgets/issues/8");
    let discussion = first_matching(&doc, ".js-discussion");
    let added = doc.append_html(discussion, r#"<div class="comment-body">@alice</div>"#);
    engine.signal(&mut doc, &mut surface, Trigger::NodesInserted { relevant: added, location: String::new() }, 50.0);

    let diag = engine.diagnostics(&doc);
    assert_eq!(diag.pending_timers, vec![TimerSlot::NavigationSettle]);
    assert_eq!(diag.queued_subtrees, 0);

    engine.tick(&mut doc, &mut surface, 1050.0);
    assert_eq!(engine.index().len(), 4);
}

#[test]
fn test_health_check_rebuilds_after_host_rerender() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);

    // Host throws away the discussion and renders it again from scratch
    let discussion = first_matching(&doc, ".js-discussion");
    for child in doc.children(discussion) {
        doc.detach(child);
    }
    doc.append_html(
        discussion,
        r#"<div class="comment-body"><p>cc @alice please</p></div><div class="comment-body"><p>again @alice</p></div>"#,
    );
    assert!(!engine.is_healthy(&doc, &surface));

    engine.signal(&mut doc, &mut surface, Trigger::WindowFocused, 1000.0);
    assert_eq!(engine.next_deadline(), Some(1750.0));
    engine.tick(&mut doc, &mut surface, 1750.0);

    assert!(engine.is_healthy(&doc, &surface));
    assert_eq!(engine.index().len(), 2);
    assert_eq!(engine.diagnostics(&doc).overlays, 2);
}

#[test]
fn test_healthy_page_is_not_rebuilt() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);
    let passes = engine.diagnostics(&doc).passes;

    engine.tick(&mut doc, &mut surface, 750.0);
    assert_eq!(engine.diagnostics(&doc).passes, passes);
}

// -----------------------------------------------------------------------------
// Keyboard and clicks
// -----------------------------------------------------------------------------

#[test]
fn test_keyboard_navigation() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);

    assert!(engine.handle_key(&mut doc, &mut surface, &KeyInput::alt("n")));
    assert_eq!(engine.index().current(), Some(1));
    assert!(engine.handle_key(&mut doc, &mut surface, &KeyInput::alt("p")));
    assert!(engine.handle_key(&mut doc, &mut surface, &KeyInput::alt("p")));
    assert_eq!(engine.index().current(), Some(2));

    let input = doc.create_element("input");
    let body = first_matching(&doc, "body");
    doc.append_child(body, input);
    assert!(!engine.handle_key(&mut doc, &mut surface, &KeyInput::alt("n").with_target(input)));
    assert_eq!(engine.index().current(), Some(2));
}

#[test]
fn test_keyboard_shortcuts_can_be_disabled() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let config = EngineConfig {
        keyboard_shortcuts: false,
        ..EngineConfig::default()
    };
    let mut engine = MentionEngine::new(config).unwrap();
    engine.start(&mut doc, &mut surface, 0.0);
    assert!(!engine.handle_key(&mut doc, &mut surface, &KeyInput::alt("n")));
}

#[test]
fn test_summary_clicks() {
    let mut doc = issue_doc();
    let mut surface = HeadlessSurface::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);
    let badge = engine.summary().badge().unwrap();

    assert_eq!(engine.handle_click(&mut doc, &mut surface, badge), ClickAction::ToggleSummary);
    assert!(engine.summary().is_open());

    let third = first_matching(&doc, r#"li[data-mention-index="2"]"#);
    assert_eq!(engine.handle_click(&mut doc, &mut surface, third), ClickAction::SelectEntry(2));
    assert_eq!(engine.index().current(), Some(2));
    assert!(!engine.summary().is_open());

    engine.handle_click(&mut doc, &mut surface, badge);
    let body = first_matching(&doc, "body");
    assert_eq!(engine.handle_click(&mut doc, &mut surface, body), ClickAction::Dismiss);
    assert!(!engine.summary().is_open());
}

#[test]
fn test_nav_button_click_wraps() {
    let mut doc = issue_doc();
    let mut surface = NoSmoothScroll::default();
    let mut engine = engine();
    engine.start(&mut doc, &mut surface, 0.0);

    let last = engine.index().get(2).unwrap().overlay.unwrap();
    let next_button = doc
        .descendants(last)
        .find(|n| doc.has_class(*n, chrome::NAV_NEXT_CLASS))
        .unwrap();
    engine.handle_click(&mut doc, &mut surface, next_button);

    assert_eq!(engine.index().current(), Some(0));
    let first = engine.index().get(0).unwrap().overlay.unwrap();
    assert!(doc.has_class(first, chrome::ACTIVE_CLASS));
    assert_eq!(surface.inner.scroll_log(), &[(first, ScrollBehavior::Instant)]);
}
