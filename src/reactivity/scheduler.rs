//! Deadline scheduler with one pending timer per slot
//!
//! Time is supplied by the host as milliseconds (`now_ms`); nothing here
//! reads a clock. Arming a slot that is already pending replaces its
//! deadline, which is what debouncing needs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerSlot {
    /// Wait for a location change to settle before rebuilding
    NavigationSettle,
    /// Collapse bursts of insertions into one merge
    MutationDebounce,
    /// Verify overlays after focus or visibility changes
    HealthCheck,
}

impl TimerSlot {
    pub const ALL: [TimerSlot; 3] = [
        TimerSlot::NavigationSettle,
        TimerSlot::MutationDebounce,
        TimerSlot::HealthCheck,
    ];

    fn index(self) -> usize {
        match self {
            TimerSlot::NavigationSettle => 0,
            TimerSlot::MutationDebounce => 1,
            TimerSlot::HealthCheck => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scheduler {
    deadlines: [Option<f64>; 3],
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) `slot` to fire `delay_ms` after `now_ms`
    pub fn arm(&mut self, slot: TimerSlot, now_ms: f64, delay_ms: f64) {
        self.deadlines[slot.index()] = Some(now_ms + delay_ms.max(0.0));
    }

    pub fn cancel(&mut self, slot: TimerSlot) {
        self.deadlines[slot.index()] = None;
    }

    pub fn cancel_all(&mut self) {
        self.deadlines = [None; 3];
    }

    pub fn is_pending(&self, slot: TimerSlot) -> bool {
        self.deadlines[slot.index()].is_some()
    }

    pub fn deadline(&self, slot: TimerSlot) -> Option<f64> {
        self.deadlines[slot.index()]
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<f64> {
        self.deadlines.iter().flatten().copied().reduce(f64::min)
    }

    /// Remove and return every slot due at `now_ms`, earliest first
    pub fn take_due(&mut self, now_ms: f64) -> Vec<TimerSlot> {
        let mut due: Vec<(f64, TimerSlot)> = TimerSlot::ALL
            .iter()
            .filter_map(|slot| {
                self.deadline(*slot)
                    .filter(|d| *d <= now_ms)
                    .map(|d| (d, *slot))
            })
            .collect();
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.index().cmp(&b.1.index())));
        for (_, slot) in &due {
            self.cancel(*slot);
        }
        due.into_iter().map(|(_, slot)| slot).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
