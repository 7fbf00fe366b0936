//! Power button edge detection.
//!
//! The button is debounced in software and classified by hold duration: a
//! short press toggles SBC power, a long press forces the rail off without
//! the graceful handshake.

/// Debounce window in milliseconds.
pub const DEBOUNCE_MS: u64 = 50;

/// Minimum hold for a valid short press.
pub const SHORT_PRESS_MIN_MS: u64 = 50;

/// Maximum hold still counted as a short press.
pub const SHORT_PRESS_MAX_MS: u64 = 2_000;

/// Minimum hold for a forced power-off.
pub const LONG_PRESS_MIN_MS: u64 = 3_000;

/// Classified button gesture.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PressKind {
    /// Short press: toggle SBC power.
    Toggle,
    /// Long press: force the rail off.
    ForceOff,
}

/// Debouncing press classifier. Feed it the sampled (active-high) pressed
/// level each tick; it reports a gesture on release.
#[derive(Debug, Default)]
pub struct ButtonTracker {
    stable_pressed: bool,
    last_edge_ms: u64,
    press_started_ms: Option<u64>,
}

impl ButtonTracker {
    /// Tracker with the button released.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stable_pressed: false,
            last_edge_ms: 0,
            press_started_ms: None,
        }
    }

    /// Returns `true` while a (debounced) press is in progress.
    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        self.stable_pressed
    }

    /// Feeds one sample; returns a gesture when a press completes.
    pub fn update(&mut self, pressed: bool, now_ms: u64) -> Option<PressKind> {
        if pressed == self.stable_pressed {
            return None;
        }
        if now_ms.saturating_sub(self.last_edge_ms) <= DEBOUNCE_MS {
            return None;
        }

        self.stable_pressed = pressed;
        self.last_edge_ms = now_ms;

        if pressed {
            self.press_started_ms = Some(now_ms);
            return None;
        }

        let started = self.press_started_ms.take()?;
        let held = now_ms.saturating_sub(started);
        if (SHORT_PRESS_MIN_MS..=SHORT_PRESS_MAX_MS).contains(&held) {
            Some(PressKind::Toggle)
        } else if held >= LONG_PRESS_MIN_MS {
            Some(PressKind::ForceOff)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_press_toggles() {
        let mut tracker = ButtonTracker::new();
        assert_eq!(tracker.update(true, 1_000), None);
        assert_eq!(tracker.update(false, 1_300), Some(PressKind::Toggle));
    }

    #[test]
    fn long_press_forces_off() {
        let mut tracker = ButtonTracker::new();
        tracker.update(true, 1_000);
        assert_eq!(tracker.update(false, 4_500), Some(PressKind::ForceOff));
    }

    #[test]
    fn mid_range_hold_is_ignored() {
        // Between the short maximum and long minimum nothing fires.
        let mut tracker = ButtonTracker::new();
        tracker.update(true, 1_000);
        assert_eq!(tracker.update(false, 3_500), None);
    }

    #[test]
    fn bounces_inside_the_debounce_window_are_ignored() {
        let mut tracker = ButtonTracker::new();
        tracker.update(true, 1_000);
        // Contact bounce 10 ms after the edge.
        assert_eq!(tracker.update(false, 1_010), None);
        assert!(tracker.is_pressed());
        // Real release later still classifies from the original press.
        assert_eq!(tracker.update(false, 1_500), Some(PressKind::Toggle));
    }

    #[test]
    fn too_short_taps_are_ignored() {
        let mut tracker = ButtonTracker::new();
        tracker.update(true, 1_000);
        // A 40 ms tap never clears the debounce window.
        assert_eq!(tracker.update(false, 1_040), None);
    }
}
