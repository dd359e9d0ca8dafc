//! Remote video platform clients.
//!
//! [`VideoPlatform`] is the raw, single-attempt surface of the remote API.
//! Retry, batching, timeouts and caching are layered on top of it in
//! [`crate::services`], so implementations only translate HTTP to domain types.

pub mod youtube;

pub use youtube::YouTubeClient;

use crate::domain::{VideoDetails, VideoId};
use thiserror::Error;

/// Failure of a single remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Transient(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("API quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Rate limited by remote API: {0}")]
    RateLimited(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Network failures, timeouts and 5xx responses are worth another attempt.
    /// Everything else would fail the same way again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient",
            Self::Timeout(_) => "timeout",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::RateLimited(_) => "rate_limited",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

/// Raw remote API operations, one HTTP call each.
///
/// # Examples
///
/// ```rust,ignore
/// use topicscout::clients::{FetchError, VideoPlatform};
///
/// async fn top_ids(platform: &dyn VideoPlatform) -> Result<usize, FetchError> {
///     let ids = platform.search("rust async", 10).await?;
///     Ok(ids.len())
/// }
/// ```
#[async_trait::async_trait]
pub trait VideoPlatform: Send + Sync {
    /// Ranked candidate ids for a query.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::QuotaExceeded`] when the daily quota is spent and
    /// [`FetchError::Transient`] on network or server failures.
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<VideoId>, FetchError>;

    /// Details for at most one API batch of ids. Unknown ids are omitted from
    /// the result rather than reported as errors.
    async fn video_details(&self, ids: &[VideoId]) -> Result<Vec<VideoDetails>, FetchError>;

    /// Plain transcript text, or an empty string when the video has none.
    async fn transcript(&self, id: &VideoId) -> Result<String, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_failures_are_retryable() {
        assert!(FetchError::Transient("reset".into()).is_retryable());
        assert!(FetchError::Timeout(15).is_retryable());
        assert!(!FetchError::QuotaExceeded("daily".into()).is_retryable());
        assert!(!FetchError::RateLimited("slow down".into()).is_retryable());
        assert!(!FetchError::InvalidRequest("bad key".into()).is_retryable());
        assert!(!FetchError::Decode("eof".into()).is_retryable());
    }
}
