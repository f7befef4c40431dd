//! Configuration types and defaults for MentionLens
//!
//! `EngineConfig` is the serializable form (JSON from the host, or
//! `Default` for GitHub's markup). `Catalog` is the validated, compiled form
//! the engine works with.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dom::{Selector, SelectorList};
use crate::error::{EngineError, Result};
use crate::scanner::Handle;

/// Placeholder substituted with the viewer's handle inside link selectors
pub const HANDLE_PLACEHOLDER: &str = "{handle}";

// =============================================================================
// Catalog defaults (GitHub markup)
// =============================================================================

const DEFAULT_LINK_SELECTORS: &[&str] = &[
    "a.user-mention",
    r#"a[href*="/{handle}" i]"#,
    "a.mention",
    r#"a[data-hovercard-type="user"]"#,
];

const DEFAULT_CONTENT_SELECTORS: &[&str] = &[
    ".comment-body",
    ".js-comment-body",
    ".markdown-body",
    ".review-comment-contents",
    r#"[data-testid="markdown-body"]"#,
    r#"[data-testid="issue-body"]"#,
];

const DEFAULT_EXCLUDE_SELECTORS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6",
    "header",
    "nav",
    ".gh-header",
    ".gh-header-title",
    ".js-issue-title",
    ".timeline-comment-header",
    r#"[role="navigation"]"#,
    r#"[role="banner"]"#,
    r#"[role="menu"]"#,
    r#"[role="menubar"]"#,
    r#"[role="toolbar"]"#,
    r#"[id*="header" i]"#,
    r#"[id*="title" i]"#,
    r#"[id*="nav" i]"#,
    r#"[class*="header" i]"#,
    r#"[class*="title" i]"#,
    r#"[class*="navigation" i]"#,
    ".TimelineItem--condensed",
    ".notifications-list-item",
    ".js-news-feed-event",
];

const DEFAULT_ANCHOR_SELECTORS: &[&str] = &[
    "h1.gh-header-title",
    "h1.js-issue-title",
    r#"h1[data-testid="issue-title"]"#,
    ".gh-header-title",
    "bdi.js-issue-title",
    "span.js-issue-title",
    "h1",
];

const DEFAULT_PAGE_PATTERNS: &[&str] = &[
    r"^/[^/]+/[^/]+/(issues|pull|discussions)/\d+",
    r"^/[^/]+/[^/]+/commit/[0-9a-fA-F]+",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Serializable configuration
// =============================================================================

/// Where to read the viewer's handle from: `attribute` of the first element
/// matching `selector`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySource {
    pub selector: String,
    pub attribute: String,
}

/// Scheduler delays. All values are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after a location change before the full rebuild. Default: 1000
    pub settle_delay_ms: f64,
    /// Quiet window that collapses mutation bursts. Default: 250
    pub debounce_ms: f64,
    /// First retry delay when a rebuild finds nothing. Default: 500
    pub retry_base_ms: f64,
    /// Backoff multiplier between retries. Default: 2.0
    pub retry_factor: f64,
    /// Retry bound for zero-mention rebuilds. Default: 4
    pub max_retries: u32,
    /// Delay before verifying overlays after focus/visibility. Default: 750
    pub health_check_delay_ms: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1000.0,
            debounce_ms: 250.0,
            retry_base_ms: 500.0,
            retry_factor: 2.0,
            max_retries: 4,
            health_check_delay_ms: 750.0,
        }
    }
}

impl TimingConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn retry_delay(&self, attempt: u32) -> f64 {
        let exponent = attempt.saturating_sub(1) as i32;
        self.retry_base_ms * self.retry_factor.max(1.0).powi(exponent)
    }
}

/// Summary overlay tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Graphemes of context kept on each side of a match. Default: 30
    pub snippet_radius: usize,
    /// Marker added where a snippet was truncated. Default: "..."
    pub ellipsis: String,
    /// Minimum distance between the list and the viewport edge. Default: 8
    pub viewport_margin: f64,
    /// Gap between the badge and the list. Default: 4
    pub list_gap: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            snippet_radius: 30,
            ellipsis: "...".to_string(),
            viewport_margin: 8.0,
            list_gap: 4.0,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hyperlink shapes that may be native mentions; `{handle}` is substituted
    #[serde(default = "default_link_selectors")]
    pub link_selectors: Vec<String>,
    /// Content-body markers (allow rules, also the plain-text scan roots)
    #[serde(default = "default_content_selectors")]
    pub content_selectors: Vec<String>,
    /// Structural regions never scanned (deny rules)
    #[serde(default = "default_exclude_selectors")]
    pub exclude_selectors: Vec<String>,
    /// Badge anchor candidates, highest priority first
    #[serde(default = "default_anchor_selectors")]
    pub anchor_selectors: Vec<String>,
    #[serde(default = "default_identity_sources")]
    pub identity_sources: Vec<IdentitySource>,
    /// Regexes over the location path; the engine only runs on matching pages
    #[serde(default = "default_page_patterns")]
    pub page_patterns: Vec<String>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    /// Enable Alt+N / Alt+P navigation. Default: true
    #[serde(default = "default_true")]
    pub keyboard_shortcuts: bool,
}

fn default_true() -> bool { true }
fn default_link_selectors() -> Vec<String> { strings(DEFAULT_LINK_SELECTORS) }
fn default_content_selectors() -> Vec<String> { strings(DEFAULT_CONTENT_SELECTORS) }
fn default_exclude_selectors() -> Vec<String> { strings(DEFAULT_EXCLUDE_SELECTORS) }
fn default_anchor_selectors() -> Vec<String> { strings(DEFAULT_ANCHOR_SELECTORS) }
fn default_page_patterns() -> Vec<String> { strings(DEFAULT_PAGE_PATTERNS) }

fn default_identity_sources() -> Vec<IdentitySource> {
    vec![
        IdentitySource {
            selector: r#"meta[name="user-login"]"#.to_string(),
            attribute: "content".to_string(),
        },
        IdentitySource {
            selector: "[data-login]".to_string(),
            attribute: "data-login".to_string(),
        },
    ]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            link_selectors: default_link_selectors(),
            content_selectors: default_content_selectors(),
            exclude_selectors: default_exclude_selectors(),
            anchor_selectors: default_anchor_selectors(),
            identity_sources: default_identity_sources(),
            page_patterns: default_page_patterns(),
            timing: TimingConfig::default(),
            summary: SummaryConfig::default(),
            keyboard_shortcuts: true,
        }
    }
}

impl EngineConfig {
    /// Parse from JSON; missing fields fall back to defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate and compile every catalog
    pub fn compile(&self) -> Result<Catalog> {
        if self.timing.debounce_ms < 0.0 || self.timing.settle_delay_ms < 0.0 {
            return Err(EngineError::Config("timing values must be non-negative".to_string()));
        }

        // Link templates are compiled per handle; validate them up front.
        let sample = Handle::parse("octocat")?;
        substitute_links(&self.link_selectors, &sample)?;

        let anchors = self
            .anchor_selectors
            .iter()
            .map(|s| SelectorList::parse(s))
            .collect::<Result<Vec<_>>>()?;

        let identity = self
            .identity_sources
            .iter()
            .map(|src| -> Result<(Selector, String)> {
                Ok((Selector::parse(&src.selector)?, src.attribute.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let pages = self
            .page_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| EngineError::InvalidPagePattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Catalog {
            link_templates: self.link_selectors.clone(),
            content: SelectorList::from_sources(&self.content_selectors)?,
            exclude: SelectorList::from_sources(&self.exclude_selectors)?,
            anchors,
            identity,
            pages,
        })
    }
}

// =============================================================================
// Compiled catalog
// =============================================================================

/// Validated selector catalogs
#[derive(Debug, Clone)]
pub struct Catalog {
    link_templates: Vec<String>,
    pub content: SelectorList,
    pub exclude: SelectorList,
    /// Anchor candidates in priority order
    pub anchors: Vec<SelectorList>,
    pub identity: Vec<(Selector, String)>,
    pub pages: Vec<Regex>,
}

impl Catalog {
    /// Link selectors with the handle substituted
    pub fn link_selectors(&self, handle: &Handle) -> Result<SelectorList> {
        substitute_links(&self.link_templates, handle)
    }
}

fn substitute_links(templates: &[String], handle: &Handle) -> Result<SelectorList> {
    let resolved: Vec<String> = templates
        .iter()
        .map(|t| t.replace(HANDLE_PLACEHOLDER, handle.as_str()))
        .collect();
    SelectorList::from_sources(&resolved)
}

// =============================================================================
// Tests
// =============================================================================
