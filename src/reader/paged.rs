//! Discrete page-flip reading mode.
//!
//! The controller serializes navigation against the in-flight load of the
//! current page: while a load is outstanding, step navigation is rejected
//! outright, which guarantees at most one in-flight "current page" render
//! and keeps renders in order. Neighbor pages are prefetched into a fixed
//! slot ring so memory stays bounded regardless of chapter length.

use log::{debug, error, info, warn};

use crate::api::client::{ApiCompletion, ApiRequest, Connector, Envelope};
use crate::api::{
    BookmarkDto, ChapterDto, ChapterId, ChapterInfoDto, ChapterLink, PageImage, SeriesId,
};
use crate::error::ApiError;
use crate::reader::chapter_nav::ChapterNavigator;
use crate::reader::jump_history::{JumpHistory, JumpPoint};
use crate::reader::page_ring::{PageRing, SlotState};
use crate::reader::position::PositionSync;
use crate::reader::split::{self, CropRect, SplitPart, SplitPreference};
use crate::reader::{
    Chapter, ChapterDirection, PREFETCH_PAGES, PagingDirection, ReaderEvent,
};

/// Within this many pages of the end, the next chapter's info is requested
/// once so the server warms its cache before the boundary is reached.
const NEXT_CHAPTER_WARM_THRESHOLD: usize = 10;

#[derive(Default)]
struct PendingInit {
    chapter: Option<ChapterDto>,
    bookmark: Option<BookmarkDto>,
    info: Option<ChapterInfoDto>,
}

impl PendingInit {
    fn complete(&self) -> bool {
        self.chapter.is_some() && self.bookmark.is_some() && self.info.is_some()
    }
}

/// How the last committed navigation moved the ring, so a failed load can
/// be unwound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavKind {
    StepForward,
    StepBackward,
    Jump,
}

/// What the host should draw for the current page.
pub struct PageView<'a> {
    pub page: usize,
    pub part: SplitPart,
    pub crop: CropRect,
    pub image: &'a PageImage,
}

pub struct PagedReader {
    connector: Box<dyn Connector>,
    chapter_id: ChapterId,
    chapter: Option<Chapter>,
    info: Option<ChapterInfoDto>,
    page_num: usize,
    prev_committed_page: usize,
    max_pages: usize,

    paging_direction: PagingDirection,
    split_pref: SplitPreference,
    split_part: SplitPart,

    /// Hard gate: navigation is rejected while the current page's image
    /// load is outstanding.
    is_loading: bool,
    /// Bumped on every (re)initialization; completions carrying an older
    /// generation belong to a discarded chapter and are dropped.
    generation: u64,
    pending_init: Option<PendingInit>,
    /// A boundary crossing waiting on neighbor-id resolution.
    pending_boundary: Option<ChapterDirection>,
    /// Direction the chapter being initialized was entered from.
    pending_entry: Option<ChapterDirection>,
    in_flight: Option<NavKind>,
    next_info_warmed: bool,

    ring: PageRing,
    navigator: ChapterNavigator,
    position: Option<PositionSync>,
    jump_history: JumpHistory,
    events: Vec<ReaderEvent>,
}

impl PagedReader {
    /// Open a reading session for `chapter_id` and start initialization.
    /// The host pumps completions until the first page renders.
    pub fn open(
        connector: Box<dyn Connector>,
        series_id: SeriesId,
        chapter_id: ChapterId,
        split_pref: SplitPreference,
    ) -> Self {
        let mut navigator = ChapterNavigator::new(series_id);
        navigator.push_visited(chapter_id);
        let mut reader = Self {
            connector,
            chapter_id,
            chapter: None,
            info: None,
            page_num: 0,
            prev_committed_page: 0,
            max_pages: 1,
            paging_direction: PagingDirection::Forward,
            split_pref,
            split_part: SplitPart::Whole,
            is_loading: true,
            generation: 0,
            pending_init: None,
            pending_boundary: None,
            pending_entry: None,
            in_flight: None,
            next_info_warmed: false,
            ring: PageRing::new(),
            navigator,
            position: None,
            jump_history: JumpHistory::new(),
            events: Vec::new(),
        };
        reader.init();
        reader
    }

    fn init(&mut self) {
        self.generation += 1;
        self.is_loading = true;
        self.pending_init = Some(PendingInit::default());
        self.pending_boundary = None;
        self.in_flight = None;
        self.next_info_warmed = false;
        self.split_part = SplitPart::Whole;
        self.chapter = None;
        self.info = None;
        self.position = None;
        self.ring = PageRing::new();

        info!("initializing chapter {}", self.chapter_id);
        let chapter = self.chapter_id;
        self.connector
            .submit(self.generation, ApiRequest::FetchChapter(chapter));
        self.connector
            .submit(self.generation, ApiRequest::FetchBookmark(chapter));
        self.connector
            .submit(self.generation, ApiRequest::FetchChapterInfo(chapter));
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
            self.handle_completion(completion);
        }
    }

    fn handle_completion(&mut self, completion: ApiCompletion) {
        match completion {
            ApiCompletion::Chapter(result) => match result {
                Ok(dto) => {
                    if let Some(pending) = &mut self.pending_init {
                        pending.chapter = Some(dto);
                        self.try_finish_init();
                    }
                }
                Err(e) => self.fail_init(e),
            },
            ApiCompletion::Bookmark(result) => match result {
                Ok(dto) => {
                    if let Some(pending) = &mut self.pending_init {
                        pending.bookmark = Some(dto);
                        self.try_finish_init();
                    }
                }
                Err(e) => self.fail_init(e),
            },
            ApiCompletion::ChapterInfo(chapter, result) => {
                if self.pending_init.is_some() && chapter == self.chapter_id {
                    match result {
                        Ok(info) => {
                            if let Some(pending) = &mut self.pending_init {
                                pending.info = Some(info);
                            }
                            self.try_finish_init();
                        }
                        Err(e) => self.fail_init(e),
                    }
                } else {
                    match result {
                        Ok(_) => debug!("chapter {chapter} info warmed"),
                        Err(e) => warn!("warming chapter {chapter} info failed: {e}"),
                    }
                }
            }
            ApiCompletion::NextChapter(result) => {
                self.handle_resolution(ChapterDirection::Next, result);
            }
            ApiCompletion::PrevChapter(result) => {
                self.handle_resolution(ChapterDirection::Previous, result);
            }
            ApiCompletion::ProgressPersisted(result) => {
                if let Err(e) = result {
                    debug!("bookmark write failed (ignored): {e}");
                }
            }
            ApiCompletion::PageLoaded { page, result } => self.on_page_loaded(page, result),
        }
    }

    fn handle_resolution(
        &mut self,
        direction: ChapterDirection,
        result: Result<ChapterLink, ApiError>,
    ) {
        let was_pending = self.pending_boundary == Some(direction);
        if was_pending {
            self.pending_boundary = None;
        }
        match result {
            Ok(link) => {
                self.navigator.note_resolved(direction, link);
                match link {
                    ChapterLink::DoesNotExist => {
                        if was_pending && direction == ChapterDirection::Previous {
                            self.navigator.restore_visited(self.chapter_id);
                        }
                        self.notice_boundary(direction);
                        if was_pending {
                            self.is_loading = false;
                        }
                    }
                    ChapterLink::Id(id) => {
                        if was_pending {
                            self.enter_chapter(id, direction);
                        }
                    }
                    ChapterLink::NotFetched => {}
                }
            }
            Err(e) => {
                warn!("resolving {direction:?} chapter failed: {e}");
                if was_pending {
                    if direction == ChapterDirection::Previous {
                        self.navigator.restore_visited(self.chapter_id);
                    }
                    self.is_loading = false;
                }
            }
        }
    }

    fn try_finish_init(&mut self) {
        if !self.pending_init.as_ref().is_some_and(PendingInit::complete) {
            return;
        }
        let pending = self.pending_init.take().unwrap_or_default();
        let (Some(chapter_dto), Some(bookmark), Some(info)) =
            (pending.chapter, pending.bookmark, pending.info)
        else {
            return;
        };

        let chapter = Chapter::from(chapter_dto);
        self.max_pages = chapter.pages;
        self.navigator.set_context(chapter.volume_id, chapter.id);
        self.position = Some(PositionSync::new(
            self.navigator.series_id(),
            chapter.volume_id,
            chapter.id,
        ));
        self.info = Some(info);
        self.chapter = Some(chapter);

        let page = match self.pending_entry.take() {
            // Entering backwards lands on the last page of the new chapter.
            Some(ChapterDirection::Previous) => self.max_pages - 1,
            _ => {
                let restored = bookmark.page_num;
                // A finished chapter is bookmarked one past the last index.
                restored.min(self.max_pages - 1)
            }
        };

        self.events.push(ReaderEvent::ChapterChanged(self.chapter_id));
        self.set_page_num(page);

        // Resolve neighbors eagerly but without blocking anything.
        let series = self.navigator.series_id();
        let volume = self.navigator.volume_id();
        let chapter_id = self.chapter_id;
        self.connector.submit(
            self.generation,
            ApiRequest::ResolveNextChapter {
                series,
                volume,
                chapter: chapter_id,
            },
        );
        self.connector.submit(
            self.generation,
            ApiRequest::ResolvePrevChapter {
                series,
                volume,
                chapter: chapter_id,
            },
        );

        self.load_page();
    }

    fn fail_init(&mut self, reason: ApiError) {
        if self.pending_init.take().is_none() {
            debug!("late initialization failure ignored: {reason}");
            return;
        }
        error!("reader initialization failed: {reason}");
        self.is_loading = false;
        self.events.push(ReaderEvent::LoadFailed {
            page: None,
            reason: reason.to_string(),
        });
        self.events.push(ReaderEvent::CloseReader);
    }

    /// Mid-split going forward: the current part is the first half, so the
    /// next flip shows the other half of the same physical page.
    fn mid_split_forward(&self) -> bool {
        self.split_pref != SplitPreference::NoSplit
            && self.split_part == split::forward_entry_part(self.split_pref)
    }

    fn mid_split_backward(&self) -> bool {
        self.split_pref != SplitPreference::NoSplit
            && self.split_part == split::backward_entry_part(self.split_pref)
    }

    pub fn next_page(&mut self) {
        if self.is_loading {
            debug!("next page ignored while a load is in flight");
            return;
        }
        if self.chapter.is_none() {
            return;
        }
        let not_in_split = !self.mid_split_forward();
        if self.page_num + 1 >= self.max_pages && not_in_split {
            if !self.navigator.is_disabled(ChapterDirection::Next) {
                self.is_loading = true;
                self.advance_chapter(ChapterDirection::Next);
            }
            return;
        }

        self.paging_direction = PagingDirection::Forward;
        if self.split_pref == SplitPreference::NoSplit || not_in_split {
            self.commit_step(self.page_num + 1, NavKind::StepForward);
        }
        self.load_page();
    }

    pub fn prev_page(&mut self) {
        if self.is_loading {
            debug!("prev page ignored while a load is in flight");
            return;
        }
        if self.chapter.is_none() {
            return;
        }
        let not_in_split = !self.mid_split_backward();
        if self.page_num == 0 && not_in_split {
            if !self.navigator.is_disabled(ChapterDirection::Previous) {
                self.is_loading = true;
                match self.navigator.previous_visited(self.chapter_id) {
                    Some(prev) if prev != self.chapter_id => {
                        info!("returning to previously visited chapter {prev}");
                        self.chapter_id = prev;
                        self.pending_entry = Some(ChapterDirection::Previous);
                        self.init();
                    }
                    _ => self.advance_chapter(ChapterDirection::Previous),
                }
            }
            return;
        }

        self.paging_direction = PagingDirection::Backward;
        if self.split_pref == SplitPreference::NoSplit || not_in_split {
            self.commit_step(self.page_num - 1, NavKind::StepBackward);
        }
        self.load_page();
    }

    /// Jump to an absolute page, clamped to the chapter. Not gated by the
    /// in-flight flag: a stale completion for the abandoned target merely
    /// fills its slot.
    pub fn go_to_page(&mut self, page: usize) {
        if self.chapter.is_none() {
            return;
        }
        let page = page.min(self.max_pages - 1);
        if page == self.page_num {
            return;
        }
        self.paging_direction = if page > self.page_num {
            PagingDirection::Forward
        } else {
            PagingDirection::Backward
        };
        self.commit_step(page, NavKind::Jump);
        self.load_page();
    }

    /// Follow an in-content link, remembering the departure point for
    /// `jump_back`.
    pub fn follow_link(&mut self, target: usize) {
        if self.chapter.is_none() {
            return;
        }
        let target = target.min(self.max_pages - 1);
        if target == self.page_num {
            return;
        }
        self.jump_history.push(self.page_num, 0.0);
        self.go_to_page(target);
    }

    pub fn jump_back(&mut self) -> Option<JumpPoint> {
        let point = self.jump_history.pop()?;
        self.go_to_page(point.page);
        Some(point)
    }

    pub fn set_split_preference(&mut self, preference: SplitPreference) {
        self.split_pref = preference;
        // Re-enter the current image under the new preference; no page
        // change and no bookmark.
        if let Some(image) = self.ring.current().image() {
            if split::needs_split(image.width, image.height) {
                self.split_part = match self.paging_direction {
                    PagingDirection::Forward => split::forward_entry_part(preference),
                    PagingDirection::Backward => split::backward_entry_part(preference),
                };
            } else {
                self.split_part = SplitPart::Whole;
            }
        }
    }

    fn commit_step(&mut self, page: usize, kind: NavKind) {
        self.in_flight = Some(kind);
        match kind {
            NavKind::StepForward => self.ring.advance(),
            NavKind::StepBackward => self.ring.retreat(),
            NavKind::Jump => {}
        }
        self.set_page_num(page);
    }

    fn set_page_num(&mut self, page: usize) {
        self.prev_committed_page = self.page_num;
        self.page_num = page;
        self.events.push(ReaderEvent::PageChanged(page));
        if let Some(position) = &self.position {
            position.persist(
                self.connector.as_mut(),
                self.generation,
                page,
                self.max_pages,
            );
        }
        self.maybe_warm_next_chapter();
    }

    fn maybe_warm_next_chapter(&mut self) {
        if self.next_info_warmed
            || self.page_num + NEXT_CHAPTER_WARM_THRESHOLD < self.max_pages
        {
            return;
        }
        if let ChapterLink::Id(next) = self.navigator.link(ChapterDirection::Next) {
            self.next_info_warmed = true;
            debug!("warming next chapter {next}");
            self.connector
                .submit(self.generation, ApiRequest::FetchChapterInfo(next));
        }
    }

    fn load_page(&mut self) {
        self.is_loading = true;
        let page = self.page_num;
        let chapter = self.chapter_id;

        let ready = {
            let slot = self.ring.current();
            slot.holds(page) && slot.is_ready()
        };
        if ready {
            self.render_current();
        } else {
            let slot = self.ring.current_mut();
            if !slot.holds(page) {
                slot.retarget(page);
            } else {
                slot.state = SlotState::Loading;
            }
            self.connector
                .submit(self.generation, ApiRequest::FetchPage { chapter, page });
        }
        self.prefetch();
    }

    fn render_current(&mut self) {
        let Some((width, height)) = self
            .ring
            .current()
            .image()
            .map(|image| (image.width, image.height))
        else {
            return;
        };
        let needs = split::needs_split(width, height);
        self.split_part = split::advance(
            self.split_part,
            self.paging_direction,
            self.split_pref,
            needs,
        );
        self.is_loading = false;
        self.in_flight = None;
        debug!("rendered page {} as {:?}", self.page_num, self.split_part);
    }

    /// Refill the slots ahead of the current page. Slots already holding
    /// the right page are left alone; the slot behind the base keeps the
    /// page just left.
    fn prefetch(&mut self) {
        let page = self.page_num;
        let max = self.max_pages;
        let mut to_fetch = Vec::new();
        self.ring.apply_ahead(PREFETCH_PAGES, |offset, slot| {
            let desired = page + offset;
            if desired >= max {
                return;
            }
            if slot.holds(desired) && !matches!(slot.state, SlotState::Failed) {
                return;
            }
            slot.retarget(desired);
            to_fetch.push(desired);
        });
        let chapter = self.chapter_id;
        for page in to_fetch {
            self.connector
                .submit(self.generation, ApiRequest::FetchPage { chapter, page });
        }
    }

    fn on_page_loaded(&mut self, page: usize, result: Result<PageImage, ApiError>) {
        match result {
            Ok(image) => {
                if let Some(slot) = self.ring.slot_for_page_mut(page) {
                    slot.state = SlotState::Ready(image);
                } else {
                    debug!("discarding load for page {page}, no longer resident");
                    return;
                }
                if page == self.page_num && self.is_loading {
                    self.render_current();
                }
            }
            Err(e) => {
                warn!("page {page} failed to load: {e}");
                if let Some(slot) = self.ring.slot_for_page_mut(page) {
                    slot.state = SlotState::Failed;
                }
                if page == self.page_num && self.is_loading {
                    self.events.push(ReaderEvent::LoadFailed {
                        page: Some(page),
                        reason: e.to_string(),
                    });
                    self.rollback();
                }
            }
        }
    }

    /// Unwind a navigation whose image never arrived, restoring the last
    /// page that rendered instead of leaving a blank view.
    fn rollback(&mut self) {
        let kind = self.in_flight.take();
        self.is_loading = false;
        if self.page_num == self.prev_committed_page {
            // Nothing to return to (failure on the entry page).
            return;
        }
        match kind {
            Some(NavKind::StepForward) => self.ring.retreat(),
            Some(NavKind::StepBackward) => self.ring.advance(),
            Some(NavKind::Jump) | None => {}
        }
        info!("rolling back to page {}", self.prev_committed_page);
        self.page_num = self.prev_committed_page;
        self.events.push(ReaderEvent::PageChanged(self.page_num));

        let page = self.page_num;
        let chapter = self.chapter_id;
        let ready = {
            let slot = self.ring.current();
            slot.holds(page) && slot.is_ready()
        };
        if !ready {
            // The slot was retargeted by the jump; bring the image back
            // without re-persisting the position.
            self.is_loading = true;
            let slot = self.ring.current_mut();
            if !slot.holds(page) {
                slot.retarget(page);
            } else {
                slot.state = SlotState::Loading;
            }
            self.connector
                .submit(self.generation, ApiRequest::FetchPage { chapter, page });
        }
    }

    fn advance_chapter(&mut self, direction: ChapterDirection) {
        match self.navigator.link(direction) {
            ChapterLink::NotFetched => {
                self.pending_boundary = Some(direction);
                let series = self.navigator.series_id();
                let volume = self.navigator.volume_id();
                let chapter = self.chapter_id;
                let request = match direction {
                    ChapterDirection::Next => ApiRequest::ResolveNextChapter {
                        series,
                        volume,
                        chapter,
                    },
                    ChapterDirection::Previous => ApiRequest::ResolvePrevChapter {
                        series,
                        volume,
                        chapter,
                    },
                };
                self.connector.submit(self.generation, request);
            }
            ChapterLink::DoesNotExist => {
                if direction == ChapterDirection::Previous {
                    self.navigator.restore_visited(self.chapter_id);
                }
                self.is_loading = false;
                self.notice_boundary(direction);
            }
            ChapterLink::Id(id) => self.enter_chapter(id, direction),
        }
    }

    fn enter_chapter(&mut self, id: ChapterId, direction: ChapterDirection) {
        info!("moving to {direction:?} chapter {id}");
        self.chapter_id = id;
        self.navigator.push_visited(id);
        self.pending_entry = Some(direction);
        self.init();
    }

    fn notice_boundary(&mut self, direction: ChapterDirection) {
        if self.navigator.disable(direction) {
            warn!("no {direction:?} chapter exists, disabling that direction");
            self.events
                .push(ReaderEvent::ChapterBoundaryReached(direction));
        }
    }

    pub fn take_events(&mut self) -> Vec<ReaderEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn chapter(&self) -> Option<&Chapter> {
        self.chapter.as_ref()
    }

    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }

    pub fn chapter_info(&self) -> Option<&ChapterInfoDto> {
        self.info.as_ref()
    }

    pub fn split_part(&self) -> SplitPart {
        self.split_part
    }

    pub fn chapter_link(&self, direction: ChapterDirection) -> ChapterLink {
        self.navigator.link(direction)
    }

    pub fn is_direction_disabled(&self, direction: ChapterDirection) -> bool {
        self.navigator.is_disabled(direction)
    }

    pub fn visited_top(&self) -> Option<ChapterId> {
        self.navigator.visited_top()
    }

    pub fn resident_pages(&self) -> Vec<usize> {
        self.ring.resident_pages()
    }

    pub fn current_view(&self) -> Option<PageView<'_>> {
        let slot = self.ring.current();
        if !slot.holds(self.page_num) {
            return None;
        }
        let image = slot.image()?;
        Some(PageView {
            page: self.page_num,
            part: self.split_part,
            crop: split::crop_for(self.split_part, image.width, image.height),
            image,
        })
    }
}
