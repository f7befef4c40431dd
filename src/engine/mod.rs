//! MentionEngine: the explicit context object that owns all engine state
//!
//! # Lifecycle
//! 1. `new(config)` compiles the catalogs (the only fallible step)
//! 2. `activate(doc)` resolves identity and evaluates the page gate
//! 3. Passes run through `rescan` / `merge_subtrees`, or are scheduled by
//!    feeding `signal` and polling `tick`
//! 4. `teardown(doc)` restores the document
//!
//! Idle engines (no identity, or a page the gate rejects) accept every call
//! and do nothing.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::config::{Catalog, EngineConfig};
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::identity::{resolve_identity, PageGate, PathPatternGate};
use crate::index::MentionIndex;
use crate::logging::{lens_debug, lens_info, lens_warn};
use crate::navigation::{self, ClickAction, KeyInput, NavCommand};
use crate::reactivity::{plan, ControllerState, Directive, Scheduler, TimerSlot, Trigger};
use crate::render::{chrome, HighlightRenderer};
use crate::scanner::{Handle, MentionLocator, RegionRules};
use crate::summary::{SummaryContext, SummaryOverlay};
use crate::surface::Surface;

// =============================================================================
// State Machine
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// No identity, or the page gate rejected the location
    Idle,
    /// Identity resolved on an allowed page
    Active,
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassKind {
    Rebuild,
    Merge,
}

/// Per-phase timings in microseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassTimings {
    pub cleanup_us: u64,
    pub locate_us: u64,
    pub index_us: u64,
    pub render_us: u64,
    pub summary_us: u64,
    pub total_us: u64,
}

/// Outcome of one rebuild or merge pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub kind: PassKind,
    /// Records produced by the locator
    pub located: usize,
    /// Records added to the index by this pass
    pub added: usize,
    /// Index length after the pass
    pub total: usize,
    pub rendered: usize,
    pub stale: usize,
    pub skipped_links: usize,
    pub repaired_links: usize,
    pub badge: bool,
    pub timings: PassTimings,
}

impl PassReport {
    fn empty(kind: PassKind) -> Self {
        Self {
            kind,
            located: 0,
            added: 0,
            total: 0,
            rendered: 0,
            stale: 0,
            skipped_links: 0,
            repaired_links: 0,
            badge: false,
            timings: PassTimings::default(),
        }
    }
}

/// Read-only view of engine and overlay state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    pub state: EngineState,
    pub identity: Option<String>,
    pub location: String,
    pub mention_count: usize,
    pub current_position: i64,
    /// Overlay elements attached to the document
    pub overlays: usize,
    pub link_wrappers: usize,
    pub badges: usize,
    pub summary_open: bool,
    pub pending_timers: Vec<TimerSlot>,
    pub next_deadline: Option<f64>,
    pub queued_subtrees: usize,
    pub retry_attempt: u32,
    pub passes: u64,
    pub last_pass: Option<PassReport>,
}

// =============================================================================
// MentionEngine
// =============================================================================

pub struct MentionEngine {
    config: EngineConfig,
    catalog: Catalog,
    gate: Box<dyn PageGate>,
    explicit_identity: Option<Handle>,
    locator: Option<MentionLocator>,
    state: EngineState,
    index: MentionIndex,
    renderer: HighlightRenderer,
    summary: SummaryOverlay,
    scheduler: Scheduler,
    queue: Vec<NodeId>,
    location: String,
    retry_attempt: u32,
    passes: u64,
    last_pass: Option<PassReport>,
}

impl MentionEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let catalog = config.compile()?;
        let gate = Box::new(PathPatternGate::from_catalog(&catalog));
        Ok(Self {
            config,
            catalog,
            gate,
            explicit_identity: None,
            locator: None,
            state: EngineState::Idle,
            index: MentionIndex::new(),
            renderer: HighlightRenderer::new(),
            summary: SummaryOverlay::new(),
            scheduler: Scheduler::new(),
            queue: Vec::new(),
            location: String::new(),
            retry_attempt: 0,
            passes: 0,
            last_pass: None,
        })
    }

    /// Replace the default path-pattern gate
    pub fn with_gate(mut self, gate: Box<dyn PageGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Use `handle` instead of reading identity from page metadata
    pub fn set_identity(&mut self, handle: Option<Handle>) {
        self.explicit_identity = handle;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == EngineState::Active
    }

    pub fn handle(&self) -> Option<&Handle> {
        self.locator.as_ref().map(|l| l.handle())
    }

    pub fn index(&self) -> &MentionIndex {
        &self.index
    }

    pub fn summary(&self) -> &SummaryOverlay {
        &self.summary
    }

    pub fn last_pass(&self) -> Option<&PassReport> {
        self.last_pass.as_ref()
    }

    // =========================================================================
    // Activation
    // =========================================================================

    /// Resolve identity and evaluate the page gate. Returns true when active.
    pub fn activate(&mut self, doc: &Document) -> bool {
        self.location = doc.location().to_string();

        let handle = self
            .explicit_identity
            .clone()
            .or_else(|| resolve_identity(doc, &self.catalog));
        let Some(handle) = handle else {
            lens_info!("no viewer identity found; staying idle");
            return self.go_idle();
        };
        if !self.gate.allows(doc.location()) {
            lens_debug!("page gate rejected {}", doc.location());
            return self.go_idle();
        }

        let reuse = self.locator.as_ref().is_some_and(|l| l.handle() == &handle);
        if !reuse {
            match MentionLocator::new(handle.clone(), &self.catalog) {
                Ok(locator) => self.locator = Some(locator),
                Err(e) => {
                    lens_warn!("cannot build locator for @{}: {}", handle, e);
                    return self.go_idle();
                }
            }
        }
        if self.state != EngineState::Active {
            lens_info!("active for @{} on {}", handle, doc.location());
        }
        self.state = EngineState::Active;
        true
    }

    fn go_idle(&mut self) -> bool {
        self.locator = None;
        self.state = EngineState::Idle;
        false
    }

    // =========================================================================
    // Passes
    // =========================================================================

    /// Full pass: cleanup, locate everything, rebuild, render, summary
    pub fn rescan(&mut self, doc: &mut Document, surface: &mut dyn Surface) -> PassReport {
        let overall_start = instant::Instant::now();
        let mut report = PassReport::empty(PassKind::Rebuild);

        let cleanup_start = instant::Instant::now();
        self.renderer.cleanup(doc);
        self.summary.remove(doc);
        report.timings.cleanup_us = cleanup_start.elapsed().as_micros() as u64;

        // The cursor survives the rebuild; `rebuild` clamps it into range.
        let Some(locator) = self.locator.as_ref() else {
            self.index.clear();
            report.timings.total_us = overall_start.elapsed().as_micros() as u64;
            return self.finish_pass(report);
        };

        let locate_start = instant::Instant::now();
        let root = doc.root();
        let outcome = locator.locate(doc, root);
        report.timings.locate_us = locate_start.elapsed().as_micros() as u64;
        report.located = outcome.records.len();
        report.skipped_links = outcome.skipped_links;
        report.repaired_links = outcome.repaired_links;

        let index_start = instant::Instant::now();
        self.index.rebuild(doc, outcome.records);
        report.timings.index_us = index_start.elapsed().as_micros() as u64;
        report.added = self.index.len();
        report.total = self.index.len();

        let render_start = instant::Instant::now();
        let index_len = self.index.len();
        let rendered = self.renderer.render(doc, &mut self.index, 0..index_len);
        report.rendered = rendered.rendered;
        report.stale = rendered.stale;
        report.timings.render_us = render_start.elapsed().as_micros() as u64;

        let summary_start = instant::Instant::now();
        let ctx = SummaryContext {
            catalog: &self.catalog,
            config: &self.config.summary,
            handle: locator.handle(),
            pattern: locator.pattern(),
            rules: locator.rules(),
        };
        report.badge = self.summary.render(doc, &*surface, &self.index, &ctx);
        report.timings.summary_us = summary_start.elapsed().as_micros() as u64;

        report.timings.total_us = overall_start.elapsed().as_micros() as u64;
        lens_info!(
            "rebuild: {} mentions, {} rendered in {}us",
            report.total,
            report.rendered,
            report.timings.total_us
        );
        self.finish_pass(report)
    }

    /// Incremental pass over inserted subtrees. Existing records and overlays
    /// are left alone; only appended records are rendered.
    pub fn merge_subtrees(&mut self, doc: &mut Document, surface: &mut dyn Surface, roots: &[NodeId]) -> PassReport {
        let overall_start = instant::Instant::now();
        let mut report = PassReport::empty(PassKind::Merge);
        let Some(locator) = self.locator.as_ref() else {
            return self.finish_pass(report);
        };

        let locate_start = instant::Instant::now();
        let mut records = Vec::new();
        for root in roots {
            if !doc.is_attached(*root) || chrome::is_inside_chrome(doc, *root) {
                continue;
            }
            let outcome = locator.locate(doc, *root);
            report.skipped_links += outcome.skipped_links;
            report.repaired_links += outcome.repaired_links;
            records.extend(outcome.records);
        }
        report.located = records.len();
        report.timings.locate_us = locate_start.elapsed().as_micros() as u64;

        let index_start = instant::Instant::now();
        let appended = self.index.merge_new(doc, records);
        report.added = appended.len();
        report.total = self.index.len();
        report.timings.index_us = index_start.elapsed().as_micros() as u64;

        if !appended.is_empty() {
            let render_start = instant::Instant::now();
            let rendered = self.renderer.render(doc, &mut self.index, appended);
            self.renderer.refresh_labels(doc, &self.index);
            report.rendered = rendered.rendered;
            report.stale = rendered.stale;
            report.timings.render_us = render_start.elapsed().as_micros() as u64;

            let summary_start = instant::Instant::now();
            let ctx = SummaryContext {
                catalog: &self.catalog,
                config: &self.config.summary,
                handle: locator.handle(),
                pattern: locator.pattern(),
                rules: locator.rules(),
            };
            report.badge = self.summary.update(doc, &*surface, &self.index, &ctx);
            report.timings.summary_us = summary_start.elapsed().as_micros() as u64;
        } else {
            report.badge = self.summary.is_attached(doc);
        }

        report.timings.total_us = overall_start.elapsed().as_micros() as u64;
        lens_debug!("merge: {} located, {} added, {} total", report.located, report.added, report.total);
        self.finish_pass(report)
    }

    fn finish_pass(&mut self, report: PassReport) -> PassReport {
        self.passes += 1;
        self.last_pass = Some(report.clone());
        report
    }

    /// True when every record has an attached overlay and the badge is in
    /// place wherever an anchor is available
    pub fn is_healthy(&self, doc: &Document, surface: &dyn Surface) -> bool {
        if self.index.is_empty() {
            return true;
        }
        let overlays_ok = self
            .index
            .iter()
            .all(|r| r.overlay.is_some_and(|o| doc.is_attached(o)));
        let badge_ok = self.summary.is_attached(doc) || SummaryOverlay::find_anchor(doc, surface, &self.catalog).is_none();
        overlays_ok && badge_ok
    }

    // =========================================================================
    // Reactivity
    // =========================================================================

    /// Start from scratch on the current page: activate and run a full pass
    /// with zero-mention retries
    pub fn start(&mut self, doc: &mut Document, surface: &mut dyn Surface, now_ms: f64) {
        self.location = doc.location().to_string();
        self.signal(doc, surface, Trigger::ManualRescan, now_ms);
    }

    /// Inserted roots worth scanning: attached, not engine-owned, and inside,
    /// or containing, a content region.
    pub fn relevant_insertions(&self, doc: &Document, roots: &[NodeId]) -> Vec<NodeId> {
        let catalog_rules;
        let rules = match self.locator.as_ref() {
            Some(locator) => locator.rules(),
            None => {
                catalog_rules = RegionRules::from_catalog(&self.catalog);
                &catalog_rules
            }
        };

        roots
            .iter()
            .copied()
            .filter(|r| doc.is_attached(*r) && !chrome::is_inside_chrome(doc, *r))
            .filter(|r| rules.in_content_region(doc, *r) || rules.allow.query_first(doc, *r).is_some())
            .collect()
    }

    /// Feed one trigger through the planner and execute the directives
    pub fn signal(&mut self, doc: &mut Document, surface: &mut dyn Surface, trigger: Trigger, now_ms: f64) {
        let trigger = match trigger {
            Trigger::NodesInserted { relevant, .. } => Trigger::NodesInserted {
                relevant: self.relevant_insertions(doc, &relevant),
                location: doc.location().to_string(),
            },
            other => other,
        };

        let state = self.controller_state();
        let directives = plan(&trigger, &state, &self.config.timing);
        for directive in directives {
            self.execute(doc, surface, directive, now_ms);
        }
    }

    /// Fire every timer due at `now_ms`. Returns how many fired.
    pub fn tick(&mut self, doc: &mut Document, surface: &mut dyn Surface, now_ms: f64) -> usize {
        let due = self.scheduler.take_due(now_ms);
        let fired = due.len();
        for slot in due {
            self.signal(doc, surface, Trigger::TimerExpired(slot), now_ms);
        }
        fired
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.scheduler.next_deadline()
    }

    fn controller_state(&self) -> ControllerState {
        ControllerState {
            active: self.is_active(),
            location: self.location.clone(),
            settle_pending: self.scheduler.is_pending(TimerSlot::NavigationSettle),
            retry_attempt: self.retry_attempt,
        }
    }

    fn execute(&mut self, doc: &mut Document, surface: &mut dyn Surface, directive: Directive, now_ms: f64) {
        match directive {
            Directive::Arm { slot, delay_ms } => self.scheduler.arm(slot, now_ms, delay_ms),
            Directive::Cancel(slot) => self.scheduler.cancel(slot),
            Directive::QueueSubtrees(roots) => {
                for root in roots {
                    if !self.queue.contains(&root) {
                        self.queue.push(root);
                    }
                }
            }
            Directive::ClearQueue => self.queue.clear(),
            Directive::RecordLocation(location) => {
                lens_debug!("location changed to {}", location);
                self.location = location;
                self.index.reset_cursor();
            }
            Directive::FullRebuild => {
                self.activate(doc);
                let report = self.rescan(doc, surface);
                self.signal(doc, surface, Trigger::RebuildFinished { found: report.total }, now_ms);
            }
            Directive::MergeQueued => {
                let roots = std::mem::take(&mut self.queue);
                self.merge_subtrees(doc, surface, &roots);
            }
            Directive::VerifyOverlays => {
                if !self.is_healthy(doc, &*surface) {
                    lens_info!("overlays lost after host re-render; rebuilding");
                    self.rescan(doc, surface);
                }
            }
            Directive::BumpRetry => {
                self.retry_attempt += 1;
                lens_debug!("no mentions yet; retry {}/{}", self.retry_attempt, self.config.timing.max_retries);
            }
            Directive::ResetRetries => self.retry_attempt = 0,
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn goto(&mut self, doc: &mut Document, surface: &mut dyn Surface, position: i64) -> Option<usize> {
        navigation::goto(doc, &mut self.index, surface, position)
    }

    pub fn next(&mut self, doc: &mut Document, surface: &mut dyn Surface) -> Option<usize> {
        navigation::next(doc, &mut self.index, surface)
    }

    pub fn previous(&mut self, doc: &mut Document, surface: &mut dyn Surface) -> Option<usize> {
        navigation::previous(doc, &mut self.index, surface)
    }

    fn run_command(&mut self, doc: &mut Document, surface: &mut dyn Surface, command: NavCommand) -> Option<usize> {
        let target = navigation::command_target(command, self.index.current_position());
        self.goto(doc, surface, target)
    }

    /// Handle a key press. Returns true when the key was consumed.
    pub fn handle_key(&mut self, doc: &mut Document, surface: &mut dyn Surface, input: &KeyInput) -> bool {
        if !self.config.keyboard_shortcuts || !self.is_active() {
            return false;
        }
        match navigation::command_for_key(doc, input, !self.index.is_empty()) {
            Some(command) => self.run_command(doc, surface, command).is_some(),
            None => false,
        }
    }

    /// Handle a click on `target`. Returns what the click meant.
    pub fn handle_click(&mut self, doc: &mut Document, surface: &mut dyn Surface, target: NodeId) -> ClickAction {
        let action = navigation::route_click(doc, target);
        match action {
            ClickAction::Navigate(command) => {
                self.run_command(doc, surface, command);
            }
            ClickAction::SelectEntry(position) => {
                self.goto(doc, surface, position as i64);
                self.summary.dismiss(doc);
            }
            ClickAction::ToggleSummary => {
                self.summary.toggle(doc, &*surface, &self.config.summary);
            }
            ClickAction::Dismiss => {
                if self.summary.is_open() {
                    self.summary.dismiss(doc);
                }
            }
            ClickAction::Ignore => {}
        }
        action
    }

    // =========================================================================
    // Diagnostics & teardown
    // =========================================================================

    pub fn diagnostics(&self, doc: &Document) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            state: self.state,
            identity: self.handle().map(|h| h.to_string()),
            location: doc.location().to_string(),
            mention_count: self.index.len(),
            current_position: self.index.current_position(),
            overlays: chrome::attached_overlays(doc).len(),
            link_wrappers: chrome::attached_with_class(doc, chrome::LINK_WRAPPER_CLASS).len(),
            badges: chrome::attached_with_class(doc, chrome::COUNTER_CLASS).len(),
            summary_open: self.summary.is_open(),
            pending_timers: TimerSlot::ALL
                .iter()
                .copied()
                .filter(|s| self.scheduler.is_pending(*s))
                .collect(),
            next_deadline: self.scheduler.next_deadline(),
            queued_subtrees: self.queue.len(),
            retry_attempt: self.retry_attempt,
            passes: self.passes,
            last_pass: self.last_pass.clone(),
        }
    }

    /// Remove every overlay and all summary chrome, cancel timers, go idle
    pub fn teardown(&mut self, doc: &mut Document) {
        self.renderer.cleanup(doc);
        self.summary.remove(doc);
        self.index.clear();
        self.scheduler.cancel_all();
        self.queue.clear();
        self.retry_attempt = 0;
        self.go_idle();
        lens_debug!("torn down");
    }
}
