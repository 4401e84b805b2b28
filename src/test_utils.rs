//! Deterministic fake backend for controller tests.
//!
//! The fake records every submitted request and, in auto-respond mode,
//! immediately queues the scripted completion for the next `drain`. Tests
//! that need to interleave completions against user input switch auto
//! mode off and release responses one by one.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::api::client::{ApiCompletion, ApiRequest, Connector, Envelope};
use crate::api::{
    BookmarkDto, ChapterDto, ChapterId, ChapterInfoDto, ChapterLink, PageImage, VolumeId,
};
use crate::error::ApiError;

pub struct FakeWorld {
    pub chapters: HashMap<ChapterId, ChapterDto>,
    pub bookmarks: HashMap<ChapterId, usize>,
    pub next_of: HashMap<ChapterId, ChapterId>,
    pub prev_of: HashMap<ChapterId, ChapterId>,
    pub wide_pages: HashSet<(ChapterId, usize)>,
    pub failing_pages: HashSet<(ChapterId, usize)>,
    pub failing_metadata: HashSet<ChapterId>,
    pub submitted: Vec<(u64, ApiRequest)>,
    pub auto_respond: bool,
    deferred: VecDeque<(u64, ApiRequest)>,
    queue: VecDeque<Envelope>,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeWorld {
    pub fn new() -> Self {
        Self {
            chapters: HashMap::new(),
            bookmarks: HashMap::new(),
            next_of: HashMap::new(),
            prev_of: HashMap::new(),
            wide_pages: HashSet::new(),
            failing_pages: HashSet::new(),
            failing_metadata: HashSet::new(),
            submitted: Vec::new(),
            auto_respond: true,
            deferred: VecDeque::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn add_chapter(&mut self, id: ChapterId, volume_id: VolumeId, pages: usize) -> &mut Self {
        self.chapters.insert(
            id,
            ChapterDto {
                id,
                volume_id,
                pages,
            },
        );
        self
    }

    /// Wire chapters into a reading order; neighbors resolve along it.
    pub fn chain(&mut self, order: &[ChapterId]) -> &mut Self {
        for pair in order.windows(2) {
            self.next_of.insert(pair[0], pair[1]);
            self.prev_of.insert(pair[1], pair[0]);
        }
        self
    }

    fn info_for(&self, chapter: ChapterId) -> ChapterInfoDto {
        ChapterInfoDto {
            series_name: "Test Series".to_string(),
            chapter_number: chapter.to_string(),
            volume_number: "1".to_string(),
            chapter_title: String::new(),
            file_name: format!("chapter-{chapter}.cbz"),
            is_special: false,
        }
    }

    fn page_image(&self, chapter: ChapterId, page: usize) -> PageImage {
        let (width, height) = if self.wide_pages.contains(&(chapter, page)) {
            (2400, 1200)
        } else {
            (800, 1200)
        };
        PageImage {
            page,
            width,
            height,
            bytes: vec![0u8; 8],
        }
    }

    fn respond(&mut self, generation: u64, request: ApiRequest) -> Envelope {
        let completion = match request {
            ApiRequest::FetchChapter(chapter) => {
                if self.failing_metadata.contains(&chapter) {
                    ApiCompletion::Chapter(Err(ApiError::Status(500)))
                } else {
                    match self.chapters.get(&chapter) {
                        Some(dto) => ApiCompletion::Chapter(Ok(dto.clone())),
                        None => ApiCompletion::Chapter(Err(ApiError::Status(404))),
                    }
                }
            }
            ApiRequest::FetchBookmark(chapter) => ApiCompletion::Bookmark(Ok(BookmarkDto {
                page_num: self.bookmarks.get(&chapter).copied().unwrap_or(0),
            })),
            ApiRequest::FetchChapterInfo(chapter) => {
                if self.failing_metadata.contains(&chapter) {
                    ApiCompletion::ChapterInfo(chapter, Err(ApiError::Status(500)))
                } else {
                    ApiCompletion::ChapterInfo(chapter, Ok(self.info_for(chapter)))
                }
            }
            ApiRequest::ResolveNextChapter { chapter, .. } => ApiCompletion::NextChapter(Ok(self
                .next_of
                .get(&chapter)
                .copied()
                .map_or(ChapterLink::DoesNotExist, ChapterLink::Id))),
            ApiRequest::ResolvePrevChapter { chapter, .. } => ApiCompletion::PrevChapter(Ok(self
                .prev_of
                .get(&chapter)
                .copied()
                .map_or(ChapterLink::DoesNotExist, ChapterLink::Id))),
            ApiRequest::PersistProgress { .. } => ApiCompletion::ProgressPersisted(Ok(())),
            ApiRequest::FetchPage { chapter, page } => {
                if self.failing_pages.contains(&(chapter, page)) {
                    ApiCompletion::PageLoaded {
                        page,
                        result: Err(ApiError::Status(502)),
                    }
                } else {
                    ApiCompletion::PageLoaded {
                        page,
                        result: Ok(self.page_image(chapter, page)),
                    }
                }
            }
        };
        Envelope {
            generation,
            completion,
        }
    }
}

#[derive(Clone)]
pub struct FakeConnector {
    world: Rc<RefCell<FakeWorld>>,
}

impl FakeConnector {
    pub fn new(world: FakeWorld) -> Self {
        Self {
            world: Rc::new(RefCell::new(world)),
        }
    }

    pub fn world(&self) -> Rc<RefCell<FakeWorld>> {
        Rc::clone(&self.world)
    }

    pub fn set_auto_respond(&self, auto: bool) {
        self.world.borrow_mut().auto_respond = auto;
    }

    /// Respond to the oldest deferred request. Returns false when nothing
    /// is pending.
    pub fn release_next(&self) -> bool {
        let mut world = self.world.borrow_mut();
        match world.deferred.pop_front() {
            Some((generation, request)) => {
                let envelope = world.respond(generation, request);
                world.queue.push_back(envelope);
                true
            }
            None => false,
        }
    }

    pub fn release_all(&self) {
        while self.release_next() {}
    }

    pub fn pending_count(&self) -> usize {
        self.world.borrow().deferred.len()
    }

    /// Pages written by fire-and-forget progress persists, in order.
    pub fn bookmark_writes(&self) -> Vec<usize> {
        self.world
            .borrow()
            .submitted
            .iter()
            .filter_map(|(_, request)| match request {
                ApiRequest::PersistProgress { page, .. } => Some(*page),
                _ => None,
            })
            .collect()
    }

    /// Pages requested from the image endpoint, in order.
    pub fn fetched_pages(&self) -> Vec<usize> {
        self.world
            .borrow()
            .submitted
            .iter()
            .filter_map(|(_, request)| match request {
                ApiRequest::FetchPage { page, .. } => Some(*page),
                _ => None,
            })
            .collect()
    }

    pub fn clear_submitted(&self) {
        self.world.borrow_mut().submitted.clear();
    }
}

impl Connector for FakeConnector {
    fn submit(&mut self, generation: u64, request: ApiRequest) {
        let mut world = self.world.borrow_mut();
        world.submitted.push((generation, request.clone()));
        if world.auto_respond {
            let envelope = world.respond(generation, request);
            world.queue.push_back(envelope);
        } else {
            world.deferred.push_back((generation, request));
        }
    }

    fn drain(&mut self) -> Vec<Envelope> {
        self.world.borrow_mut().queue.drain(..).collect()
    }
}
