pub mod chapter_nav;
pub mod continuous;
pub mod jump_history;
pub mod page_ring;
pub mod paged;
pub mod position;
pub mod prefetch;
pub mod scroll;
pub mod split;

use serde::{Deserialize, Serialize};

use crate::api::{ChapterDto, ChapterId, VolumeId};

/// Pages fetched ahead of the current one in paged mode. The slot ring
/// holds this many plus the current page plus one behind.
pub const PREFETCH_PAGES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingDirection {
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingDirection {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterDirection {
    Next,
    Previous,
}

/// Chapter metadata owned by the active controller; replaced wholesale on
/// chapter transitions.
#[derive(Debug, Clone)]
pub struct Chapter {
    pub id: ChapterId,
    pub volume_id: VolumeId,
    pub pages: usize,
}

impl From<ChapterDto> for Chapter {
    fn from(dto: ChapterDto) -> Self {
        Self {
            id: dto.id,
            volume_id: dto.volume_id,
            // A zero-page chapter would make every clamp degenerate.
            pages: dto.pages.max(1),
        }
    }
}

/// Events the engine produces for the host UI. Drained via `take_events`
/// after each call into a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// A page change was committed.
    PageChanged(usize),
    /// A chapter transition finished initializing.
    ChapterChanged(ChapterId),
    /// No chapter exists in this direction; the control is now disabled.
    ChapterBoundaryReached(ChapterDirection),
    /// A fetch failed. `page` is absent for metadata failures.
    LoadFailed {
        page: Option<usize>,
        reason: String,
    },
    /// The host should scroll the strip so `page` is at the viewport top.
    ScrollToPage(usize),
    /// A page entered the strip and its image is loading.
    PageMounted(usize),
    /// A page left the resident window and should be unmounted.
    PageEvicted(usize),
    /// Initialization failed; the host should close the reader view.
    CloseReader,
}
