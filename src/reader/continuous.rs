//! Continuous (webtoon) reading mode.
//!
//! The strip is a vertical run of page images. Which page is "current"
//! follows from visibility callbacks, but only when they agree with the
//! tracked scroll direction: intersection events fired mid-animation or
//! during fast programmatic scrolling would otherwise feed back into the
//! scroller and fight it. Prefetch and eviction decisions go through the
//! window bookkeeping so residency stays bounded.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use log::{debug, info, warn};

use crate::api::client::{ApiCompletion, ApiRequest, Connector, Envelope};
use crate::api::{ChapterId, PageImage, SeriesId, VolumeId};
use crate::error::ApiError;
use crate::reader::jump_history::{JumpHistory, JumpPoint};
use crate::reader::position::PositionSync;
use crate::reader::prefetch::{JUMP_RESET_THRESHOLD, PrefetchWindow};
use crate::reader::scroll::ScrollTracker;
use crate::reader::{PagingDirection, ReaderEvent};

pub const DEFAULT_BUFFER_PAGES: usize = 5;

/// Minimum intersection ratio for a visibility callback to count.
pub const VISIBILITY_THRESHOLD: f32 = 0.25;

#[derive(Debug)]
enum SlabState {
    Loading,
    Ready(PageImage),
    Failed,
}

pub struct WebtoonReader {
    connector: Box<dyn Connector>,
    chapter_id: ChapterId,
    total_pages: usize,
    page_num: usize,
    generation: u64,

    window: PrefetchWindow,
    tracker: ScrollTracker,
    slabs: BTreeMap<usize, SlabState>,
    outstanding: BTreeSet<usize>,

    /// Gate: visibility callbacks are ignored until every mounted image
    /// has finished loading.
    all_images_loaded: bool,
    /// Gate: visibility callbacks are ignored while a programmatic
    /// scroll-to-page animation is running.
    is_scrolling: bool,
    /// Scroll to the current page once its image arrives after a reset.
    initial_scroll_pending: bool,

    position: PositionSync,
    jump_history: JumpHistory,
    events: Vec<ReaderEvent>,
}

impl WebtoonReader {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        connector: Box<dyn Connector>,
        series_id: SeriesId,
        volume_id: VolumeId,
        chapter_id: ChapterId,
        page_num: usize,
        total_pages: usize,
        buffer_pages: usize,
    ) -> Self {
        let total_pages = total_pages.max(1);
        let page_num = page_num.min(total_pages - 1);
        let mut reader = Self {
            connector,
            chapter_id,
            total_pages,
            page_num,
            generation: 0,
            window: PrefetchWindow::new(buffer_pages, total_pages),
            tracker: ScrollTracker::new(),
            slabs: BTreeMap::new(),
            outstanding: BTreeSet::new(),
            all_images_loaded: false,
            is_scrolling: false,
            initial_scroll_pending: false,
            position: PositionSync::new(series_id, volume_id, chapter_id),
            jump_history: JumpHistory::new(),
            events: Vec::new(),
        };
        reader.reseed();
        reader
    }

    /// Rebuild the strip around the current page: everything mounted is
    /// discarded (in-flight loads become stale via the generation bump)
    /// and the window is reseeded.
    fn reseed(&mut self) {
        self.generation += 1;
        info!(
            "reseeding webtoon window around page {} of {}",
            self.page_num, self.total_pages
        );
        for page in std::mem::take(&mut self.slabs).into_keys() {
            self.events.push(ReaderEvent::PageEvicted(page));
        }
        self.outstanding.clear();
        self.window = PrefetchWindow::new(self.window.buffer_pages(), self.total_pages);
        let plan = self.window.seed(self.page_num);
        self.initial_scroll_pending = true;
        self.apply_fetches(plan.fetch);
    }

    fn apply_fetches(&mut self, pages: Vec<usize>) {
        for page in pages {
            self.slabs.insert(page, SlabState::Loading);
            self.outstanding.insert(page);
            self.all_images_loaded = false;
            self.events.push(ReaderEvent::PageMounted(page));
            self.connector.submit(
                self.generation,
                ApiRequest::FetchPage {
                    chapter: self.chapter_id,
                    page,
                },
            );
        }
    }

    fn apply_evictions(&mut self, pages: Vec<usize>) {
        for page in pages {
            self.slabs.remove(&page);
            self.outstanding.remove(&page);
            self.events.push(ReaderEvent::PageEvicted(page));
        }
        if self.outstanding.is_empty() {
            self.all_images_loaded = true;
        }
    }

    /// Drain backend completions. Call from the host event loop tick.
    pub fn pump(&mut self) {
        for Envelope {
            generation,
            completion,
        } in self.connector.drain()
        {
            if generation != self.generation {
                debug!("dropping completion from stale generation {generation}");
                continue;
            }
            match completion {
                ApiCompletion::PageLoaded { page, result } => self.on_page_loaded(page, result),
                ApiCompletion::ProgressPersisted(result) => {
                    if let Err(e) = result {
                        debug!("bookmark write failed (ignored): {e}");
                    }
                }
                other => debug!("unexpected completion in webtoon mode: {other:?}"),
            }
        }
    }

    fn on_page_loaded(&mut self, page: usize, result: Result<PageImage, ApiError>) {
        if !self.slabs.contains_key(&page) {
            debug!("discarding load for page {page}, no longer mounted");
            return;
        }
        self.outstanding.remove(&page);
        match result {
            Ok(image) => {
                self.slabs.insert(page, SlabState::Ready(image));
                if page == self.page_num && self.initial_scroll_pending {
                    self.initial_scroll_pending = false;
                    self.is_scrolling = true;
                    self.events.push(ReaderEvent::ScrollToPage(page));
                }
            }
            Err(e) => {
                // The slab stays unfilled; a later prefetch pass retries it.
                warn!("page {page} failed to load: {e}");
                self.slabs.insert(page, SlabState::Failed);
                self.events.push(ReaderEvent::LoadFailed {
                    page: Some(page),
                    reason: e.to_string(),
                });
            }
        }
        if self.outstanding.is_empty() {
            debug!("all mounted images finished loading");
            self.all_images_loaded = true;
        }
    }

    pub fn on_scroll(&mut self, offset: f64) {
        self.on_scroll_at(offset, Instant::now());
    }

    /// Feed a debounced viewport offset sample.
    pub fn on_scroll_at(&mut self, offset: f64, at: Instant) {
        let Some(sample) = self.tracker.observe_at(offset, at) else {
            return;
        };
        if sample.settled && self.is_scrolling {
            debug!("programmatic scroll settled");
            self.is_scrolling = false;
        }
    }

    /// The host finished a programmatic scroll-to-page; re-baseline the
    /// tracker so the next user scroll classifies against the landing
    /// offset.
    pub fn note_scrolled_to(&mut self, offset: f64) {
        self.tracker.rebase(offset);
    }

    /// A page element crossed into view with the given intersection ratio.
    pub fn on_page_visible(&mut self, page: usize, ratio: f32) {
        if ratio < VISIBILITY_THRESHOLD {
            return;
        }
        if !self.all_images_loaded || self.is_scrolling {
            debug!("visibility of page {page} gated (images loading or scrolling)");
            return;
        }

        let direction = self.tracker.direction();
        let buffer = self.window.buffer_pages();
        let accepted = match direction {
            PagingDirection::Forward => {
                if page == self.page_num + 1 {
                    true
                } else if page > self.page_num + 1 && page <= self.page_num + buffer + 1 {
                    // Fast scrolling got ahead of the bookkeeping; resync.
                    debug!("out of sync with viewport, forcing page {page}");
                    true
                } else {
                    false
                }
            }
            PagingDirection::Backward => {
                if page + 1 == self.page_num {
                    true
                } else if page + 1 < self.page_num && page + buffer + 1 >= self.page_num {
                    debug!("out of sync with viewport, forcing page {page}");
                    true
                } else {
                    false
                }
            }
        };
        if !accepted {
            debug!("visibility of page {page} declined ({direction:?} from {})", self.page_num);
            return;
        }

        self.commit_page(page);
        let plan = self.window.extend_for(self.page_num, direction);
        self.apply_evictions(plan.evict);
        self.apply_fetches(plan.fetch);
        self.retry_failed_in_range();
    }

    fn commit_page(&mut self, page: usize) {
        debug!("page {page} is now current");
        self.page_num = page;
        self.events.push(ReaderEvent::PageChanged(page));
        self.position.persist(
            self.connector.as_mut(),
            self.generation,
            page,
            self.total_pages,
        );
    }

    fn retry_failed_in_range(&mut self) {
        let buffer = self.window.buffer_pages();
        let lo = self.page_num.saturating_sub(buffer);
        let hi = (self.page_num + buffer).min(self.total_pages - 1);
        let retry: Vec<usize> = self
            .slabs
            .range(lo..=hi)
            .filter(|(_, state)| matches!(state, SlabState::Failed))
            .map(|(page, _)| *page)
            .collect();
        for page in retry {
            debug!("retrying failed page {page}");
            self.slabs.insert(page, SlabState::Loading);
            self.outstanding.insert(page);
            self.all_images_loaded = false;
            self.connector.submit(
                self.generation,
                ApiRequest::FetchPage {
                    chapter: self.chapter_id,
                    page,
                },
            );
        }
    }

    /// Host-driven page change (slider scrub, restored position). Small
    /// moves keep the window; anything farther than the jump threshold
    /// rebuilds it.
    pub fn set_page(&mut self, page: usize) {
        let page = page.min(self.total_pages - 1);
        if page == self.page_num {
            return;
        }
        let jump = page.abs_diff(self.page_num) > JUMP_RESET_THRESHOLD;
        self.page_num = page;
        if jump {
            self.reseed();
        }
    }

    /// Follow an in-content link, remembering the departure point.
    pub fn follow_link(&mut self, target: usize) {
        let target = target.min(self.total_pages - 1);
        if target == self.page_num {
            return;
        }
        self.jump_history.push(self.page_num, self.tracker.offset());
        self.jump_to(target);
    }

    pub fn jump_back(&mut self) -> Option<JumpPoint> {
        let point = self.jump_history.pop()?;
        self.jump_to(point.page);
        Some(point)
    }

    fn jump_to(&mut self, target: usize) {
        let delta = target.abs_diff(self.page_num);
        self.page_num = target;
        self.events.push(ReaderEvent::PageChanged(target));
        self.position.persist(
            self.connector.as_mut(),
            self.generation,
            target,
            self.total_pages,
        );
        if delta > JUMP_RESET_THRESHOLD {
            self.reseed();
        } else {
            self.is_scrolling = true;
            self.events.push(ReaderEvent::ScrollToPage(target));
        }
    }

    pub fn take_events(&mut self) -> Vec<ReaderEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn is_scrolling(&self) -> bool {
        self.is_scrolling
    }

    pub fn all_images_loaded(&self) -> bool {
        self.all_images_loaded
    }

    pub fn window_bounds(&self) -> (Option<usize>, Option<usize>) {
        (self.window.min_loaded(), self.window.max_loaded())
    }

    pub fn resident_pages(&self) -> Vec<usize> {
        self.slabs.keys().copied().collect()
    }

    pub fn image(&self, page: usize) -> Option<&PageImage> {
        match self.slabs.get(&page) {
            Some(SlabState::Ready(image)) => Some(image),
            _ => None,
        }
    }
}
