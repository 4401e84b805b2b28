// Export modules for use in tests
pub mod api;
pub mod backdrop;
pub mod error;
pub mod reader;
pub mod settings;
// Test utilities - only available when test-utils feature is enabled or during tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use api::client::{ApiRequest, BackgroundClient, Connector};
pub use api::http::HttpTransport;
pub use api::{ChapterLink, PageImage, page_num_from_url, page_url};
pub use error::ApiError;
pub use reader::continuous::WebtoonReader;
pub use reader::paged::PagedReader;
pub use reader::split::{SplitPart, SplitPreference};
pub use reader::{Chapter, ChapterDirection, PagingDirection, ReaderEvent, ReadingDirection};
