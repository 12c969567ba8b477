//! Remote chunk source abstraction
//!
//! This module provides the traits and the HTTP implementation used to fetch
//! raw chunk images from a remote tile server.
//!
//! ```ignore
//! use tilesnap::provider::{AsyncReqwestClient, TileServerProvider};
//!
//! let client = AsyncReqwestClient::new()?;
//! let provider = TileServerProvider::wplace(client);
//! let bytes = provider.fetch_chunk(ChunkCoord::new(1130, 655)).await?;
//! ```

mod http;
#[cfg(test)]
mod mock;
mod tile_server;
mod types;

pub use http::{parse_retry_after, AsyncHttpClient, AsyncReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use tile_server::{TileServerProvider, DEFAULT_URL_TEMPLATE};
pub use types::{ChunkSource, ProviderError};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
#[cfg(test)]
pub use mock::MockChunkSource;
