//! Source adapters. Each adapter owns its credentials, rate limiting, and
//! quota accounting; the pipeline only requires that `fetch` respects the
//! window and is idempotent (same inputs produce the same item ids).

pub mod gdelt;
pub mod quota;
pub mod reddit;
pub mod youtube;

use async_trait::async_trait;
use limelight_common::{DailyWindow, SourceItem};
use thiserror::Error;

pub use gdelt::GdeltAdapter;
pub use quota::QuotaLedger;
pub use reddit::RedditAdapter;
pub use youtube::YoutubeAdapter;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Malformed payload: {0}")]
    Parse(String),
}

impl IngestError {
    /// Auth/quota problems are unrecoverable for the rest of the window;
    /// the pipeline records them and moves on to the next source.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, IngestError::Auth(_) | IngestError::QuotaExhausted(_))
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Default per-request timeout for all adapters.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short tag used in logs and run metrics.
    fn name(&self) -> &'static str;

    /// All items published within the window, posts and comments alike.
    async fn fetch(&self, window: &DailyWindow) -> Result<Vec<SourceItem>>;
}

pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?)
}
