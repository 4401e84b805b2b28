//! Background execution of backend calls.
//!
//! Controllers never block on the network: they submit requests tagged with
//! their current generation and drain completions from their event loop.
//! A chapter transition bumps the generation, which implicitly cancels
//! everything in flight: stale completions are dropped at the drain site.

use std::sync::mpsc;
use std::thread;

use log::{debug, warn};

use crate::api::{
    ApiTransport, BookmarkDto, ChapterDto, ChapterId, ChapterInfoDto, ChapterLink, PageImage,
    SeriesId, VolumeId,
};
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub enum ApiRequest {
    FetchChapter(ChapterId),
    FetchBookmark(ChapterId),
    FetchChapterInfo(ChapterId),
    ResolveNextChapter {
        series: SeriesId,
        volume: VolumeId,
        chapter: ChapterId,
    },
    ResolvePrevChapter {
        series: SeriesId,
        volume: VolumeId,
        chapter: ChapterId,
    },
    PersistProgress {
        series: SeriesId,
        volume: VolumeId,
        chapter: ChapterId,
        page: usize,
    },
    FetchPage {
        chapter: ChapterId,
        page: usize,
    },
}

#[derive(Debug)]
pub enum ApiCompletion {
    Chapter(Result<ChapterDto, ApiError>),
    Bookmark(Result<BookmarkDto, ApiError>),
    ChapterInfo(ChapterId, Result<ChapterInfoDto, ApiError>),
    NextChapter(Result<ChapterLink, ApiError>),
    PrevChapter(Result<ChapterLink, ApiError>),
    ProgressPersisted(Result<(), ApiError>),
    PageLoaded {
        page: usize,
        result: Result<PageImage, ApiError>,
    },
}

#[derive(Debug)]
pub struct Envelope {
    pub generation: u64,
    pub completion: ApiCompletion,
}

/// Submit/drain seam between a controller and the backend. The production
/// implementation is [`BackgroundClient`]; tests drive completions by hand.
pub trait Connector {
    fn submit(&mut self, generation: u64, request: ApiRequest);
    fn drain(&mut self) -> Vec<Envelope>;
}

struct Job {
    generation: u64,
    request: ApiRequest,
}

/// Runs an [`ApiTransport`] on a worker thread. Requests are executed in
/// submission order; completion order across independent calls is still an
/// accident of the network and nothing here depends on it.
pub struct BackgroundClient {
    job_tx: Option<mpsc::Sender<Job>>,
    done_rx: mpsc::Receiver<Envelope>,
    worker: Option<thread::JoinHandle<()>>,
}

impl BackgroundClient {
    pub fn new(transport: Box<dyn ApiTransport>) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (done_tx, done_rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            while let Ok(job) = job_rx.recv() {
                let completion = execute(transport.as_ref(), job.request);
                let envelope = Envelope {
                    generation: job.generation,
                    completion,
                };
                if done_tx.send(envelope).is_err() {
                    break;
                }
            }
        });
        Self {
            job_tx: Some(job_tx),
            done_rx,
            worker: Some(worker),
        }
    }
}

impl Connector for BackgroundClient {
    fn submit(&mut self, generation: u64, request: ApiRequest) {
        debug!("submit gen={generation} {request:?}");
        if let Some(tx) = &self.job_tx {
            if tx.send(Job {
                generation,
                request,
            })
            .is_err()
            {
                warn!("api worker is gone, dropping request");
            }
        }
    }

    fn drain(&mut self) -> Vec<Envelope> {
        self.done_rx.try_iter().collect()
    }
}

impl Drop for BackgroundClient {
    fn drop(&mut self) {
        // Closing the job channel lets the worker run down and exit.
        self.job_tx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn execute(transport: &dyn ApiTransport, request: ApiRequest) -> ApiCompletion {
    match request {
        ApiRequest::FetchChapter(chapter) => ApiCompletion::Chapter(transport.get_chapter(chapter)),
        ApiRequest::FetchBookmark(chapter) => {
            ApiCompletion::Bookmark(transport.get_bookmark(chapter))
        }
        ApiRequest::FetchChapterInfo(chapter) => {
            ApiCompletion::ChapterInfo(chapter, transport.get_chapter_info(chapter))
        }
        ApiRequest::ResolveNextChapter {
            series,
            volume,
            chapter,
        } => ApiCompletion::NextChapter(
            transport
                .get_next_chapter(series, volume, chapter)
                .map(ChapterLink::from_wire),
        ),
        ApiRequest::ResolvePrevChapter {
            series,
            volume,
            chapter,
        } => ApiCompletion::PrevChapter(
            transport
                .get_prev_chapter(series, volume, chapter)
                .map(ChapterLink::from_wire),
        ),
        ApiRequest::PersistProgress {
            series,
            volume,
            chapter,
            page,
        } => ApiCompletion::ProgressPersisted(transport.bookmark(series, volume, chapter, page)),
        ApiRequest::FetchPage { chapter, page } => ApiCompletion::PageLoaded {
            page,
            result: transport.fetch_page(chapter, page),
        },
    }
}
