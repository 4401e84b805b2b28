use log::debug;
use serde::de::DeserializeOwned;
use ureq::Agent;

use crate::api::{
    ApiTransport, BookmarkDto, ChapterDto, ChapterId, ChapterInfoDto, PageImage, SeriesId, VolumeId,
};
use crate::error::ApiError;

/// HTTP implementation of the backend boundary. All calls are blocking;
/// the background client runs them off the UI thread.
pub struct HttpTransport {
    agent: Agent,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            agent: Agent::new_with_defaults(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url}");
        let mut response = self
            .agent
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .call()
            .map_err(Box::new)?;
        let body = response.body_mut().read_to_string().map_err(Box::new)?;
        Ok(serde_json::from_str(&body)?)
    }

    fn post_json(&self, path: &str, payload: &str) -> Result<(), ApiError> {
        let url = format!("{}{path}", self.base_url);
        debug!("POST {url}");
        self.agent
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .send(payload)
            .map_err(Box::new)?;
        Ok(())
    }
}

impl ApiTransport for HttpTransport {
    fn get_chapter(&self, chapter: ChapterId) -> Result<ChapterDto, ApiError> {
        self.get_json(&format!("/api/series/chapter?chapterId={chapter}"))
    }

    fn get_bookmark(&self, chapter: ChapterId) -> Result<BookmarkDto, ApiError> {
        self.get_json(&format!("/api/reader/get-bookmark?chapterId={chapter}"))
    }

    fn get_chapter_info(&self, chapter: ChapterId) -> Result<ChapterInfoDto, ApiError> {
        self.get_json(&format!("/api/reader/chapter-info?chapterId={chapter}"))
    }

    fn get_next_chapter(
        &self,
        series: SeriesId,
        volume: VolumeId,
        chapter: ChapterId,
    ) -> Result<ChapterId, ApiError> {
        self.get_json(&format!(
            "/api/reader/next-chapter?seriesId={series}&volumeId={volume}&currentChapterId={chapter}"
        ))
    }

    fn get_prev_chapter(
        &self,
        series: SeriesId,
        volume: VolumeId,
        chapter: ChapterId,
    ) -> Result<ChapterId, ApiError> {
        self.get_json(&format!(
            "/api/reader/prev-chapter?seriesId={series}&volumeId={volume}&currentChapterId={chapter}"
        ))
    }

    fn bookmark(
        &self,
        series: SeriesId,
        volume: VolumeId,
        chapter: ChapterId,
        page: usize,
    ) -> Result<(), ApiError> {
        let payload = format!(
            "{{\"seriesId\":{series},\"volumeId\":{volume},\"chapterId\":{chapter},\"pageNum\":{page}}}"
        );
        self.post_json("/api/reader/bookmark", &payload)
    }

    fn fetch_page(&self, chapter: ChapterId, page: usize) -> Result<PageImage, ApiError> {
        let url = crate::api::page_url(&self.base_url, &self.api_key, chapter, page);
        debug!("GET {url}");
        let mut response = self.agent.get(&url).call().map_err(Box::new)?;
        let bytes = response.body_mut().read_to_vec().map_err(Box::new)?;
        let dims = imagesize::blob_size(&bytes).map_err(|e| ApiError::BadImage {
            page,
            reason: e.to_string(),
        })?;
        Ok(PageImage {
            page,
            width: dims.width as u32,
            height: dims.height as u32,
            bytes,
        })
    }
}
