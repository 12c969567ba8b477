//! Provider types and traits

use crate::area::ChunkCoord;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching a chunk from the remote source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Request could not be sent or the body could not be read
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Server answered 429. `retry_after` is the server hint, if any.
    #[error("Rate limited by {url} (retry after {retry_after:?})")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    /// Any other non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Provider misconfiguration (bad URL template, client build failure)
    #[error("Provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Whether the request should be repeated after a pause.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// Source of raw chunk bytes.
///
/// Implementors return the encoded image for one native-zoom chunk. Retry
/// policy lives in [`crate::download::Downloader`], not here: a single call is
/// a single request.
pub trait ChunkSource: Send + Sync {
    /// Fetches the encoded bytes of one chunk.
    fn fetch_chunk(
        &self,
        coord: ChunkCoord,
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;

    /// Returns the provider's name for logging and identification.
    fn name(&self) -> &str;
}
