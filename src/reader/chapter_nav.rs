//! Neighbor-chapter resolution and the visited-chapter trail.
//!
//! Next/prev chapter ids are resolved lazily off the UI thread and
//! memoized for the chapter session; series may have non-linear numbering
//! (specials, point-releases), so "previous chapter" from the first page
//! follows the trail of chapters actually visited, not id arithmetic.

use log::debug;

use crate::api::{ChapterId, ChapterLink, SeriesId, VolumeId};
use crate::reader::ChapterDirection;

pub struct ChapterNavigator {
    series_id: SeriesId,
    volume_id: VolumeId,
    chapter_id: ChapterId,
    next: ChapterLink,
    prev: ChapterLink,
    next_disabled: bool,
    prev_disabled: bool,
    /// Chronological chain of chapters reached by reading through
    /// boundaries, newest on top.
    visited: Vec<ChapterId>,
}

impl ChapterNavigator {
    pub fn new(series_id: SeriesId) -> Self {
        Self {
            series_id,
            volume_id: 0,
            chapter_id: 0,
            next: ChapterLink::NotFetched,
            prev: ChapterLink::NotFetched,
            next_disabled: false,
            prev_disabled: false,
            visited: Vec::new(),
        }
    }

    pub fn series_id(&self) -> SeriesId {
        self.series_id
    }

    pub fn volume_id(&self) -> VolumeId {
        self.volume_id
    }

    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }

    /// Enter a chapter: memoized links are invalidated and the directional
    /// controls re-enabled.
    pub fn set_context(&mut self, volume_id: VolumeId, chapter_id: ChapterId) {
        self.volume_id = volume_id;
        self.chapter_id = chapter_id;
        self.next = ChapterLink::NotFetched;
        self.prev = ChapterLink::NotFetched;
        self.next_disabled = false;
        self.prev_disabled = false;
    }

    pub fn link(&self, direction: ChapterDirection) -> ChapterLink {
        match direction {
            ChapterDirection::Next => self.next,
            ChapterDirection::Previous => self.prev,
        }
    }

    pub fn note_resolved(&mut self, direction: ChapterDirection, link: ChapterLink) {
        debug!("{direction:?} chapter resolved to {link:?}");
        match direction {
            ChapterDirection::Next => self.next = link,
            ChapterDirection::Previous => self.prev = link,
        }
    }

    pub fn is_disabled(&self, direction: ChapterDirection) -> bool {
        match direction {
            ChapterDirection::Next => self.next_disabled,
            ChapterDirection::Previous => self.prev_disabled,
        }
    }

    /// Permanently disable a direction for this chapter session. Returns
    /// false if it was already disabled, so callers can keep the boundary
    /// notice one-time.
    pub fn disable(&mut self, direction: ChapterDirection) -> bool {
        let flag = match direction {
            ChapterDirection::Next => &mut self.next_disabled,
            ChapterDirection::Previous => &mut self.prev_disabled,
        };
        let newly = !*flag;
        *flag = true;
        newly
    }

    pub fn push_visited(&mut self, chapter: ChapterId) {
        self.visited.push(chapter);
    }

    /// Leave `current` backwards: drop it from the trail and report the
    /// chapter that was actually read before it, if any.
    pub fn previous_visited(&mut self, current: ChapterId) -> Option<ChapterId> {
        if self.visited.last() == Some(&current) {
            self.visited.pop();
        }
        self.visited.last().copied()
    }

    /// Undo `previous_visited` when the backward transition dead-ends.
    pub fn restore_visited(&mut self, current: ChapterId) {
        if self.visited.last() != Some(&current) {
            self.visited.push(current);
        }
    }

    pub fn visited_top(&self) -> Option<ChapterId> {
        self.visited.last().copied()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_reset_on_chapter_change() {
        let mut nav = ChapterNavigator::new(1);
        nav.set_context(10, 100);
        nav.note_resolved(ChapterDirection::Next, ChapterLink::Id(101));
        nav.disable(ChapterDirection::Previous);

        nav.set_context(10, 101);
        assert_eq!(nav.link(ChapterDirection::Next), ChapterLink::NotFetched);
        assert!(!nav.is_disabled(ChapterDirection::Previous));
    }

    #[test]
    fn disable_reports_first_call_only() {
        let mut nav = ChapterNavigator::new(1);
        nav.set_context(10, 100);
        assert!(nav.disable(ChapterDirection::Next));
        assert!(!nav.disable(ChapterDirection::Next));
        assert!(nav.is_disabled(ChapterDirection::Next));
    }

    #[test]
    fn trail_returns_actual_previous_chapter() {
        let mut nav = ChapterNavigator::new(1);
        // Read a special (id 300) between chapters 100 and 101.
        nav.push_visited(100);
        nav.push_visited(300);
        nav.push_visited(101);
        assert_eq!(nav.previous_visited(101), Some(300));
        assert_eq!(nav.previous_visited(300), Some(100));
    }

    #[test]
    fn dead_end_restores_the_trail() {
        let mut nav = ChapterNavigator::new(1);
        nav.push_visited(100);
        assert_eq!(nav.previous_visited(100), None);
        nav.restore_visited(100);
        assert_eq!(nav.visited_top(), Some(100));
    }
}
