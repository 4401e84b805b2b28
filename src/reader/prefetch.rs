//! Prefetch window bookkeeping for continuous (webtoon) mode.
//!
//! The window tracks which page indices have an outstanding or completed
//! load. All bookkeeping happens synchronously when a decision is made, so
//! scroll events racing against slow loads still observe a consistent
//! window.

use std::collections::BTreeSet;

use log::debug;

use crate::reader::PagingDirection;

/// A page jump larger than this resets the window instead of extending it.
pub const JUMP_RESET_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchPlan {
    pub fetch: Vec<usize>,
    pub evict: Vec<usize>,
}

impl PrefetchPlan {
    pub fn is_empty(&self) -> bool {
        self.fetch.is_empty() && self.evict.is_empty()
    }
}

pub struct PrefetchWindow {
    buffer_pages: usize,
    total_pages: usize,
    resident: BTreeSet<usize>,
}

impl PrefetchWindow {
    pub fn new(buffer_pages: usize, total_pages: usize) -> Self {
        Self {
            buffer_pages: buffer_pages.max(1),
            total_pages,
            resident: BTreeSet::new(),
        }
    }

    pub fn buffer_pages(&self) -> usize {
        self.buffer_pages
    }

    pub fn min_loaded(&self) -> Option<usize> {
        self.resident.first().copied()
    }

    pub fn max_loaded(&self) -> Option<usize> {
        self.resident.last().copied()
    }

    pub fn is_resident(&self, page: usize) -> bool {
        self.resident.contains(&page)
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn resident_pages(&self) -> Vec<usize> {
        self.resident.iter().copied().collect()
    }

    /// Reset the window around `page`: everything currently resident is
    /// evicted and `[page - buffer, page + buffer)` clamped to the chapter
    /// is fetched. Used at init and after a go-to-page jump.
    pub fn seed(&mut self, page: usize) -> PrefetchPlan {
        let start = page.saturating_sub(self.buffer_pages);
        let end = (page + self.buffer_pages).min(self.total_pages);
        let target: BTreeSet<usize> = (start..end).collect();

        let evict: Vec<usize> = self.resident.difference(&target).copied().collect();
        let fetch: Vec<usize> = target.difference(&self.resident).copied().collect();
        self.resident = target;
        debug!("window seeded around page {page}: [{start},{end})");
        PrefetchPlan { fetch, evict }
    }

    /// Extend the window after an accepted advance to `current`, in the
    /// travel direction, and evict pages that fell too far behind. The
    /// trailing side keeps one page of slack beyond the buffer, mirroring
    /// the decline threshold, so residency stays below
    /// `2 * buffer_pages + 2`.
    pub fn extend_for(&mut self, current: usize, direction: PagingDirection) -> PrefetchPlan {
        if self.resident.is_empty() {
            return self.seed(current);
        }

        let mut fetch = Vec::new();
        match direction {
            PagingDirection::Forward => {
                let max = self.max_loaded().unwrap_or(current);
                if max > current + self.buffer_pages + 1 {
                    debug!("prefetch past page {current} declined, window already at {max}");
                    return PrefetchPlan::default();
                }
                let end = (current + self.buffer_pages).min(self.total_pages);
                for page in (max + 1)..end {
                    fetch.push(page);
                }
            }
            PagingDirection::Backward => {
                let min = self.min_loaded().unwrap_or(current);
                if min + self.buffer_pages + 1 < current {
                    debug!("prefetch before page {current} declined, window already at {min}");
                    return PrefetchPlan::default();
                }
                let start = current.saturating_sub(self.buffer_pages);
                for page in start..min {
                    fetch.push(page);
                }
            }
        }

        for &page in &fetch {
            self.resident.insert(page);
        }

        let slack = self.buffer_pages + 1;
        let evict: Vec<usize> = self
            .resident
            .iter()
            .copied()
            .filter(|&page| page.abs_diff(current) > slack)
            .collect();
        for page in &evict {
            self.resident.remove(page);
        }
        if !evict.is_empty() {
            debug!("evicting {} pages outside window around {current}", evict.len());
        }
        PrefetchPlan { fetch, evict }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::PagingDirection::{Backward, Forward};

    #[test]
    fn seed_clamps_at_chapter_start() {
        let mut window = PrefetchWindow::new(3, 10);
        let plan = window.seed(0);
        assert_eq!(plan.fetch, vec![0, 1, 2]);
        assert!(plan.evict.is_empty());
        assert_eq!(window.min_loaded(), Some(0));
        assert_eq!(window.max_loaded(), Some(2));
    }

    #[test]
    fn seed_clamps_at_chapter_end() {
        let mut window = PrefetchWindow::new(5, 100);
        let plan = window.seed(98);
        assert_eq!(plan.fetch, (93..100).collect::<Vec<_>>());
    }

    #[test]
    fn forward_advance_extends_by_one_page() {
        // totalPages=100, pageNum=50, bufferPages=5: window [45,55); the
        // advance to 51 grows it to [45,56).
        let mut window = PrefetchWindow::new(5, 100);
        window.seed(50);
        assert_eq!(window.min_loaded(), Some(45));
        assert_eq!(window.max_loaded(), Some(54));

        let plan = window.extend_for(51, Forward);
        assert_eq!(plan.fetch, vec![55]);
        assert!(plan.evict.is_empty());
        assert_eq!(window.min_loaded(), Some(45));
        assert_eq!(window.max_loaded(), Some(55));
    }

    #[test]
    fn trailing_pages_evict_with_one_page_of_slack() {
        let mut window = PrefetchWindow::new(5, 100);
        window.seed(50);
        window.extend_for(51, Forward);
        let plan = window.extend_for(52, Forward);
        assert_eq!(plan.fetch, vec![56]);
        assert_eq!(plan.evict, vec![45]);
        assert_eq!(window.min_loaded(), Some(46));
    }

    #[test]
    fn residency_stays_bounded_over_long_scrolls() {
        let mut window = PrefetchWindow::new(5, 500);
        window.seed(0);
        for page in 1..400 {
            window.extend_for(page, Forward);
            assert!(window.resident_count() <= 2 * 5 + 2);
        }
        for page in (5..395).rev() {
            window.extend_for(page, Backward);
            assert!(window.resident_count() <= 2 * 5 + 2);
        }
    }

    #[test]
    fn bounds_move_monotonically_in_travel_direction() {
        let mut window = PrefetchWindow::new(4, 200);
        window.seed(20);
        let mut prev_min = window.min_loaded().unwrap();
        let mut prev_max = window.max_loaded().unwrap();
        for page in 21..60 {
            window.extend_for(page, Forward);
            let min = window.min_loaded().unwrap();
            let max = window.max_loaded().unwrap();
            assert!(min >= prev_min && max >= prev_max);
            prev_min = min;
            prev_max = max;
        }
    }

    #[test]
    fn runaway_extension_is_declined() {
        let mut window = PrefetchWindow::new(5, 100);
        window.seed(50);
        // Window max is 54; pretend the reader is far behind at page 40.
        let plan = window.extend_for(40, Forward);
        assert!(plan.fetch.is_empty());
    }

    #[test]
    fn direction_reversal_refills_behind() {
        let mut window = PrefetchWindow::new(5, 100);
        window.seed(50);
        window.extend_for(51, Forward);
        let plan = window.extend_for(50, Backward);
        assert!(plan.fetch.is_empty());
        let plan = window.extend_for(44, Backward);
        assert_eq!(plan.fetch, vec![39, 40, 41, 42, 43, 44]);
    }

    #[test]
    fn current_page_stays_inside_bounds() {
        let mut window = PrefetchWindow::new(5, 100);
        window.seed(50);
        for page in 51..90 {
            window.extend_for(page, Forward);
            assert!(window.min_loaded().unwrap() <= page);
            assert!(window.max_loaded().unwrap() >= page);
        }
    }
}
