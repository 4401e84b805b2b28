//! Scroll-direction inference from viewport offset samples.

use std::time::{Duration, Instant};

use crate::reader::PagingDirection;

/// Offset samples arriving faster than this are dropped; raw scroll events
/// fire far more often than direction can meaningfully change.
pub const SCROLL_SAMPLE_DEBOUNCE: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
    pub direction: PagingDirection,
    /// The offset did not move since the last sample; a programmatic
    /// scroll animation has come to rest.
    pub settled: bool,
}

pub struct ScrollTracker {
    prev_offset: f64,
    last_sample: Option<Instant>,
    direction: PagingDirection,
}

impl Default for ScrollTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollTracker {
    pub fn new() -> Self {
        Self {
            prev_offset: 0.0,
            last_sample: None,
            direction: PagingDirection::Forward,
        }
    }

    pub fn observe(&mut self, offset: f64) -> Option<ScrollSample> {
        self.observe_at(offset, Instant::now())
    }

    /// Classify a viewport offset sample. Returns `None` when the sample
    /// falls inside the debounce interval.
    pub fn observe_at(&mut self, offset: f64, at: Instant) -> Option<ScrollSample> {
        if let Some(last) = self.last_sample {
            if at.saturating_duration_since(last) < SCROLL_SAMPLE_DEBOUNCE {
                return None;
            }
        }
        self.last_sample = Some(at);

        let settled = offset == self.prev_offset;
        if offset > self.prev_offset {
            self.direction = PagingDirection::Forward;
        } else if offset < self.prev_offset {
            self.direction = PagingDirection::Backward;
        }
        self.prev_offset = offset;
        Some(ScrollSample {
            direction: self.direction,
            settled,
        })
    }

    pub fn direction(&self) -> PagingDirection {
        self.direction
    }

    pub fn offset(&self) -> f64 {
        self.prev_offset
    }

    /// Re-baseline after a programmatic jump so the next sample computes
    /// direction against the landing position, not the departure one.
    pub fn rebase(&mut self, offset: f64) {
        self.prev_offset = offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spaced(n: u64) -> Instant {
        // Well past the debounce interval between consecutive samples.
        Instant::now() + Duration::from_millis(n * 100)
    }

    #[test]
    fn growing_offset_reads_forward() {
        let mut tracker = ScrollTracker::new();
        let sample = tracker.observe_at(120.0, spaced(1)).unwrap();
        assert_eq!(sample.direction, PagingDirection::Forward);
        assert!(!sample.settled);
    }

    #[test]
    fn shrinking_offset_reads_backward() {
        let mut tracker = ScrollTracker::new();
        tracker.observe_at(500.0, spaced(1));
        let sample = tracker.observe_at(340.0, spaced(2)).unwrap();
        assert_eq!(sample.direction, PagingDirection::Backward);
    }

    #[test]
    fn unchanged_offset_settles_and_keeps_direction() {
        let mut tracker = ScrollTracker::new();
        tracker.observe_at(500.0, spaced(1));
        tracker.observe_at(340.0, spaced(2));
        let sample = tracker.observe_at(340.0, spaced(3)).unwrap();
        assert!(sample.settled);
        assert_eq!(sample.direction, PagingDirection::Backward);
    }

    #[test]
    fn samples_inside_debounce_window_are_dropped() {
        let mut tracker = ScrollTracker::new();
        let t0 = spaced(1);
        assert!(tracker.observe_at(10.0, t0).is_some());
        assert!(
            tracker
                .observe_at(20.0, t0 + Duration::from_millis(5))
                .is_none()
        );
        assert!(
            tracker
                .observe_at(20.0, t0 + Duration::from_millis(50))
                .is_some()
        );
    }

    #[test]
    fn rebase_prevents_false_direction_after_jump() {
        let mut tracker = ScrollTracker::new();
        tracker.observe_at(2000.0, spaced(1));
        tracker.rebase(100.0);
        let sample = tracker.observe_at(150.0, spaced(2)).unwrap();
        assert_eq!(sample.direction, PagingDirection::Forward);
    }
}
