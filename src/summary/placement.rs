//! Viewport-aware placement of the summary list
//!
//! Pure geometry: the list opens below the badge, left edges aligned. It
//! flips above when there is not enough room below (and more room above),
//! flips to end at the badge's right edge when it would overflow on the
//! right, and is finally clamped inside the viewport margins.

use serde::{Deserialize, Serialize};

use crate::surface::{Rect, Size};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub above: bool,
    pub flipped_left: bool,
}

pub fn place(badge: Rect, list: Size, viewport: Size, margin: f64, gap: f64) -> Placement {
    let space_below = viewport.height - margin - (badge.bottom() + gap);
    let space_above = badge.y - gap - margin;
    let above = list.height > space_below && space_above > space_below;
    let y = if above {
        badge.y - gap - list.height
    } else {
        badge.bottom() + gap
    };

    let flipped_left = badge.x + list.width > viewport.width - margin && badge.right() - list.width >= margin;
    let x = if flipped_left {
        badge.right() - list.width
    } else {
        badge.x
    };

    Placement {
        x: clamp_axis(x, list.width, viewport.width, margin),
        y: clamp_axis(y, list.height, viewport.height, margin),
        above,
        flipped_left,
    }
}

/// Keep `[pos, pos + extent]` inside `[margin, limit - margin]`, preferring
/// the leading edge when the extent does not fit at all
fn clamp_axis(pos: f64, extent: f64, limit: f64, margin: f64) -> f64 {
    let max = limit - margin - extent;
    if max < margin {
        margin
    } else {
        pos.clamp(margin, max)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Size = Size { width: 800.0, height: 600.0 };

    fn list() -> Size {
        Size { width: 300.0, height: 200.0 }
    }

    #[test]
    fn test_default_below_right() {
        let p = place(Rect::new(100.0, 50.0, 40.0, 20.0), list(), VIEWPORT, 8.0, 4.0);
        assert_eq!((p.x, p.y), (100.0, 74.0));
        assert!(!p.above && !p.flipped_left);
    }

    #[test]
    fn test_flips_above_near_bottom() {
        let p = place(Rect::new(100.0, 500.0, 40.0, 20.0), list(), VIEWPORT, 8.0, 4.0);
        assert!(p.above);
        assert_eq!(p.y, 296.0);
    }

    #[test]
    fn test_flips_left_near_right_edge() {
        let p = place(Rect::new(700.0, 50.0, 40.0, 20.0), list(), VIEWPORT, 8.0, 4.0);
        assert!(p.flipped_left);
        assert_eq!(p.x, 440.0);
    }

    #[test]
    fn test_clamped_inside_viewport() {
        let tall = Size { width: 300.0, height: 1000.0 };
        let p = place(Rect::new(780.0, 300.0, 10.0, 10.0), tall, VIEWPORT, 8.0, 4.0);
        assert!(p.x >= 8.0 && p.x + 300.0 <= 792.0);
        assert_eq!(p.y, 8.0);
    }
}
