//! Fire-and-forget persistence of the reading position.

use log::debug;

use crate::api::client::{ApiRequest, Connector};
use crate::api::{ChapterId, SeriesId, VolumeId};

/// Persists the current page on every committed change. Calls are not
/// ordered relative to each other; the backend keeps whichever write lands
/// last, and nothing here ever reads the position back except the initial
/// restore.
pub struct PositionSync {
    series_id: SeriesId,
    volume_id: VolumeId,
    chapter_id: ChapterId,
}

impl PositionSync {
    pub fn new(series_id: SeriesId, volume_id: VolumeId, chapter_id: ChapterId) -> Self {
        Self {
            series_id,
            volume_id,
            chapter_id,
        }
    }

    /// Submit a bookmark write for `page`. The final page is recorded one
    /// past the last index so completion reads as 100% elsewhere.
    pub fn persist(
        &self,
        connector: &mut dyn Connector,
        generation: u64,
        page: usize,
        page_count: usize,
    ) {
        let recorded = if page + 1 == page_count {
            page_count
        } else {
            page
        };
        debug!(
            "bookmark chapter {} page {recorded} (reading page {page})",
            self.chapter_id
        );
        connector.submit(
            generation,
            ApiRequest::PersistProgress {
                series: self.series_id,
                volume: self.volume_id,
                chapter: self.chapter_id,
                page: recorded,
            },
        );
    }
}
