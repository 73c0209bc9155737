//! Horizontal swipe detection for page turns.
//!
//! Touch input arrives as press / drag / release of the right mouse button,
//! converted to px-equivalents by the configured cell size. A swipe only
//! turns the page when no text selection owns the gesture.

use std::time::{Duration, Instant};

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeThresholds {
    pub min_distance: f32,
    pub horizontal_ratio: f32,
    pub max_duration: Duration,
    pub max_scroll: f32,
}

impl Default for SwipeThresholds {
    fn default() -> Self {
        Self {
            min_distance: 50.0,
            horizontal_ratio: 1.5,
            max_duration: Duration::from_millis(500),
            max_scroll: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    None,
    NextPage,
    PreviousPage,
    /// A selection owns the touch; show its tooltip.
    Selection,
    /// Released without movement.
    Tap,
    Cancelled,
}

/// Pure swipe test on already measured deltas.
pub fn classify_swipe(
    dx: f32,
    dy: f32,
    elapsed: Duration,
    scroll_delta: f32,
    thresholds: &SwipeThresholds,
) -> Option<SwipeDirection> {
    let horizontal = dx.abs() > dy.abs() * thresholds.horizontal_ratio;
    if dx.abs() >= thresholds.min_distance
        && horizontal
        && elapsed <= thresholds.max_duration
        && scroll_delta.abs() < thresholds.max_scroll
    {
        Some(if dx < 0.0 {
            SwipeDirection::Left
        } else {
            SwipeDirection::Right
        })
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct TouchStart {
    point: TouchPoint,
    at: Instant,
    scroll_top: f32,
}

#[derive(Debug, Default)]
pub struct SwipeRecognizer {
    thresholds: SwipeThresholds,
    start: Option<TouchStart>,
    last: Option<TouchPoint>,
    touch_selecting: bool,
    suppress: bool,
}

impl SwipeRecognizer {
    pub fn new(thresholds: SwipeThresholds) -> Self {
        Self {
            thresholds,
            ..Self::default()
        }
    }

    pub fn is_armed(&self) -> bool {
        self.start.is_some()
    }

    pub fn touch_start(
        &mut self,
        point: TouchPoint,
        now: Instant,
        scroll_top: f32,
        selection_active: bool,
    ) {
        self.reset();
        if selection_active {
            self.touch_selecting = true;
            return;
        }
        self.start = Some(TouchStart {
            point,
            at: now,
            scroll_top,
        });
    }

    pub fn touch_move(&mut self, point: TouchPoint) {
        if self.start.is_some() {
            self.last = Some(point);
        }
    }

    /// The selection changed while a touch was down.
    pub fn on_selection_changed(&mut self) {
        if self.start.is_some() || self.touch_selecting {
            self.touch_selecting = true;
            self.suppress = true;
        }
    }

    pub fn touch_end(
        &mut self,
        now: Instant,
        scroll_top: f32,
        selection_active: bool,
        current_page: usize,
        total_pages: usize,
    ) -> GestureOutcome {
        if selection_active {
            self.reset();
            return GestureOutcome::Selection;
        }

        let (Some(start), Some(last)) = (self.start, self.last) else {
            self.reset();
            return GestureOutcome::Tap;
        };

        let suppressed = self.suppress;
        self.reset();
        if suppressed {
            return GestureOutcome::None;
        }

        let direction = classify_swipe(
            last.x - start.point.x,
            last.y - start.point.y,
            now.saturating_duration_since(start.at),
            scroll_top - start.scroll_top,
            &self.thresholds,
        );
        debug!("Swipe {direction:?} on page {current_page}/{total_pages}");

        match direction {
            Some(SwipeDirection::Left) if current_page < total_pages => GestureOutcome::NextPage,
            Some(SwipeDirection::Right) if current_page > 1 => GestureOutcome::PreviousPage,
            _ => GestureOutcome::None,
        }
    }

    pub fn touch_cancel(&mut self) -> GestureOutcome {
        self.reset();
        GestureOutcome::Cancelled
    }

    fn reset(&mut self) {
        self.start = None;
        self.last = None;
        self.touch_selecting = false;
        self.suppress = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swipe(dx: f32, dy: f32, ms: u64, page: usize, total: usize) -> GestureOutcome {
        let mut recognizer = SwipeRecognizer::default();
        let t0 = Instant::now();
        recognizer.touch_start(TouchPoint::new(200.0, 100.0), t0, 0.0, false);
        recognizer.touch_move(TouchPoint::new(200.0 + dx, 100.0 + dy));
        recognizer.touch_end(t0 + Duration::from_millis(ms), 0.0, false, page, total)
    }

    #[test]
    fn left_swipe_turns_to_next_page() {
        assert_eq!(swipe(-60.0, 5.0, 200, 2, 10), GestureOutcome::NextPage);
    }

    #[test]
    fn steep_swipe_is_not_a_page_turn() {
        assert_eq!(swipe(-60.0, 50.0, 200, 2, 10), GestureOutcome::None);
    }

    #[test]
    fn right_swipe_stops_at_first_page() {
        assert_eq!(swipe(80.0, 0.0, 100, 2, 10), GestureOutcome::PreviousPage);
        assert_eq!(swipe(80.0, 0.0, 100, 1, 10), GestureOutcome::None);
        assert_eq!(swipe(-80.0, 0.0, 100, 10, 10), GestureOutcome::None);
    }

    #[test]
    fn slow_or_short_swipes_are_ignored() {
        assert_eq!(swipe(-60.0, 0.0, 600, 2, 10), GestureOutcome::None);
        assert_eq!(swipe(-40.0, 0.0, 100, 2, 10), GestureOutcome::None);
    }

    #[test]
    fn scrolled_gesture_is_not_a_swipe() {
        let thresholds = SwipeThresholds::default();
        assert!(classify_swipe(-60.0, 0.0, Duration::from_millis(100), 12.0, &thresholds).is_none());
        assert_eq!(
            classify_swipe(-60.0, 0.0, Duration::from_millis(100), 9.0, &thresholds),
            Some(SwipeDirection::Left)
        );
    }

    #[test]
    fn existing_selection_owns_the_touch() {
        let mut recognizer = SwipeRecognizer::default();
        let t0 = Instant::now();
        recognizer.touch_start(TouchPoint::new(0.0, 0.0), t0, 0.0, true);
        assert!(!recognizer.is_armed());
        assert_eq!(
            recognizer.touch_end(t0, 0.0, true, 2, 10),
            GestureOutcome::Selection
        );
    }

    #[test]
    fn selection_during_touch_suppresses_swipe() {
        let mut recognizer = SwipeRecognizer::default();
        let t0 = Instant::now();
        recognizer.touch_start(TouchPoint::new(200.0, 0.0), t0, 0.0, false);
        recognizer.touch_move(TouchPoint::new(100.0, 0.0));
        recognizer.on_selection_changed();
        assert_eq!(
            recognizer.touch_end(t0, 0.0, false, 2, 10),
            GestureOutcome::None
        );
    }

    #[test]
    fn tap_and_cancel_reset_state() {
        let mut recognizer = SwipeRecognizer::default();
        let t0 = Instant::now();
        recognizer.touch_start(TouchPoint::new(0.0, 0.0), t0, 0.0, false);
        assert_eq!(recognizer.touch_end(t0, 0.0, false, 1, 10), GestureOutcome::Tap);

        recognizer.touch_start(TouchPoint::new(0.0, 0.0), t0, 0.0, false);
        assert_eq!(recognizer.touch_cancel(), GestureOutcome::Cancelled);
        assert!(!recognizer.is_armed());
    }
}
