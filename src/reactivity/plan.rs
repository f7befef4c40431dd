//! Pure reaction planning: `plan(trigger, state, config) -> Vec<Directive>`
//!
//! The engine owns all side effects. It describes what happened as a
//! `Trigger`, snapshots its controller state, and executes the directives
//! this module returns in order.

use crate::config::TimingConfig;
use crate::dom::NodeId;
use crate::reactivity::TimerSlot;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// A mutation batch inserted nodes. `relevant` holds the inserted roots
    /// that are, contain, or sit inside a content region (engine-owned nodes
    /// already removed). `location` is the document location observed with
    /// the batch.
    NodesInserted { relevant: Vec<NodeId>, location: String },
    LocationChanged { location: String },
    VisibilityChanged { visible: bool },
    WindowFocused,
    TimerExpired(TimerSlot),
    /// A full rebuild finished with `found` mentions
    RebuildFinished { found: usize },
    ManualRescan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Arm { slot: TimerSlot, delay_ms: f64 },
    Cancel(TimerSlot),
    QueueSubtrees(Vec<NodeId>),
    ClearQueue,
    RecordLocation(String),
    /// Cleanup, re-evaluate identity and page gate, locate, rebuild, render
    FullRebuild,
    /// Locate within queued subtrees and merge
    MergeQueued,
    /// Rebuild if overlays or the badge went missing
    VerifyOverlays,
    /// Count one more zero-mention retry
    BumpRetry,
    ResetRetries,
}

/// Snapshot of what the planner needs to know about the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    /// Identity resolved and page gate passed
    pub active: bool,
    pub location: String,
    pub settle_pending: bool,
    pub retry_attempt: u32,
}

// =============================================================================
// Planning
// =============================================================================

pub fn plan(trigger: &Trigger, state: &ControllerState, timing: &TimingConfig) -> Vec<Directive> {
    match trigger {
        Trigger::LocationChanged { location } => plan_location_change(location, state, timing),

        Trigger::NodesInserted { relevant, location } => {
            if *location != state.location {
                return plan_location_change(location, state, timing);
            }
            if !state.active || state.settle_pending || relevant.is_empty() {
                return Vec::new();
            }
            vec![
                Directive::QueueSubtrees(relevant.clone()),
                Directive::Arm {
                    slot: TimerSlot::MutationDebounce,
                    delay_ms: timing.debounce_ms,
                },
            ]
        }

        Trigger::VisibilityChanged { visible: false } => Vec::new(),
        Trigger::VisibilityChanged { visible: true } | Trigger::WindowFocused => {
            if !state.active || state.settle_pending {
                return Vec::new();
            }
            vec![Directive::Arm {
                slot: TimerSlot::HealthCheck,
                delay_ms: timing.health_check_delay_ms,
            }]
        }

        Trigger::TimerExpired(TimerSlot::NavigationSettle) => vec![Directive::FullRebuild],
        Trigger::TimerExpired(TimerSlot::MutationDebounce) => {
            if state.active {
                vec![Directive::MergeQueued]
            } else {
                vec![Directive::ClearQueue]
            }
        }
        Trigger::TimerExpired(TimerSlot::HealthCheck) => {
            if state.active {
                vec![Directive::VerifyOverlays]
            } else {
                Vec::new()
            }
        }

        Trigger::RebuildFinished { found } => {
            if !state.active {
                return vec![Directive::ResetRetries];
            }
            if *found > 0 {
                // Verify once the host has finished its own rendering
                return vec![
                    Directive::ResetRetries,
                    Directive::Arm {
                        slot: TimerSlot::HealthCheck,
                        delay_ms: timing.health_check_delay_ms,
                    },
                ];
            }
            if state.retry_attempt >= timing.max_retries {
                return vec![Directive::ResetRetries];
            }
            let attempt = state.retry_attempt + 1;
            vec![
                Directive::BumpRetry,
                Directive::Arm {
                    slot: TimerSlot::NavigationSettle,
                    delay_ms: timing.retry_delay(attempt),
                },
            ]
        }

        Trigger::ManualRescan => vec![
            Directive::Cancel(TimerSlot::NavigationSettle),
            Directive::Cancel(TimerSlot::MutationDebounce),
            Directive::ClearQueue,
            Directive::ResetRetries,
            Directive::FullRebuild,
        ],
    }
}

fn plan_location_change(location: &str, state: &ControllerState, timing: &TimingConfig) -> Vec<Directive> {
    if location == state.location {
        return Vec::new();
    }
    vec![
        Directive::Cancel(TimerSlot::MutationDebounce),
        Directive::Cancel(TimerSlot::HealthCheck),
        Directive::ClearQueue,
        Directive::RecordLocation(location.to_string()),
        Directive::ResetRetries,
        Directive::Arm {
            slot: TimerSlot::NavigationSettle,
            delay_ms: timing.settle_delay_ms,
        },
    ]
}

// =============================================================================
// Tests
// =============================================================================
