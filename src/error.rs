use thiserror::Error;

/// Failures crossing the backend boundary. Everything above this layer
/// recovers locally (previous page, unfilled slab) or reports an event;
/// only initialization failures end the reading session.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http transport error: {0}")]
    Http(#[from] Box<ureq::Error>),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("unreadable image for page {page}: {reason}")]
    BadImage { page: usize, reason: String },
}
