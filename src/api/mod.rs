pub mod client;
pub mod http;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

use crate::error::ApiError;

pub type SeriesId = i32;
pub type VolumeId = i32;
pub type ChapterId = i32;

/// Wire sentinel for "no such chapter" in next/prev resolution responses.
pub const CHAPTER_DOESNT_EXIST: ChapterId = -1;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterDto {
    pub id: ChapterId,
    pub volume_id: VolumeId,
    pub pages: usize,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkDto {
    /// May equal the chapter's page count: a finished chapter is recorded
    /// one past the last index so progress reads 100%.
    pub page_num: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterInfoDto {
    pub series_name: String,
    pub chapter_number: String,
    pub volume_number: String,
    pub chapter_title: String,
    pub file_name: String,
    pub is_special: bool,
}

impl ChapterInfoDto {
    pub fn title(&self) -> String {
        if self.chapter_title.is_empty() {
            self.series_name.clone()
        } else {
            format!("{} - {}", self.series_name, self.chapter_title)
        }
    }

    /// Volume/chapter line under the title. Specials in volume 0 show the
    /// file name instead of a synthetic chapter number.
    pub fn subtitle(&self) -> String {
        if self.is_special && self.volume_number == "0" {
            return self.file_name.clone();
        }
        if self.volume_number == "0" {
            return format!("Chapter {}", self.chapter_number);
        }
        let mut subtitle = format!("Volume {}", self.volume_number);
        if self.chapter_number != "0" {
            subtitle.push_str(&format!(" Chapter {}", self.chapter_number));
        }
        subtitle
    }
}

/// Resolution state of a neighboring chapter id. Resolved lazily and
/// memoized for the chapter session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChapterLink {
    #[default]
    NotFetched,
    DoesNotExist,
    Id(ChapterId),
}

impl ChapterLink {
    pub fn from_wire(id: ChapterId) -> Self {
        if id < 0 {
            ChapterLink::DoesNotExist
        } else {
            ChapterLink::Id(id)
        }
    }
}

/// A fetched page image: raw encoded bytes plus header-probed dimensions.
/// Decoding is the host renderer's job.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page: usize,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Builds the resource locator for a page. The page index is the final
/// query parameter so a completed load maps back to its page.
pub fn page_url(base_url: &str, api_key: &str, chapter: ChapterId, page: usize) -> String {
    let key = utf8_percent_encode(api_key, NON_ALPHANUMERIC);
    format!(
        "{}/api/reader/image?chapterId={chapter}&apiKey={key}&page={page}",
        base_url.trim_end_matches('/')
    )
}

pub fn page_num_from_url(url: &str) -> Option<usize> {
    let (_, tail) = url.split_once("&page=")?;
    tail.split('&').next()?.parse().ok()
}

/// Blocking backend transport. One implementation speaks HTTP; tests
/// script their own.
pub trait ApiTransport: Send {
    fn get_chapter(&self, chapter: ChapterId) -> Result<ChapterDto, ApiError>;
    fn get_bookmark(&self, chapter: ChapterId) -> Result<BookmarkDto, ApiError>;
    fn get_chapter_info(&self, chapter: ChapterId) -> Result<ChapterInfoDto, ApiError>;
    fn get_next_chapter(
        &self,
        series: SeriesId,
        volume: VolumeId,
        chapter: ChapterId,
    ) -> Result<ChapterId, ApiError>;
    fn get_prev_chapter(
        &self,
        series: SeriesId,
        volume: VolumeId,
        chapter: ChapterId,
    ) -> Result<ChapterId, ApiError>;
    fn bookmark(
        &self,
        series: SeriesId,
        volume: VolumeId,
        chapter: ChapterId,
        page: usize,
    ) -> Result<(), ApiError>;
    fn fetch_page(&self, chapter: ChapterId, page: usize) -> Result<PageImage, ApiError>;
}
