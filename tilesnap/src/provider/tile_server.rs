//! Provider for XYZ-style chunk servers addressed by a URL template.

use super::http::AsyncHttpClient;
use super::types::{ChunkSource, ProviderError};
use crate::area::ChunkCoord;

/// Default chunk URL: the public wplace tile backend.
pub const DEFAULT_URL_TEMPLATE: &str = "https://backend.wplace.live/files/s0/tiles/{x}/{y}.png";

/// Fetches chunks from a URL template containing `{x}` and `{y}`.
pub struct TileServerProvider<C: AsyncHttpClient> {
    http_client: C,
    url_template: String,
    name: String,
}

impl<C: AsyncHttpClient> TileServerProvider<C> {
    /// Creates a provider for the given template.
    ///
    /// Fails when the template lacks either placeholder, since every chunk
    /// would then resolve to the same URL.
    pub fn new(http_client: C, url_template: impl Into<String>) -> Result<Self, ProviderError> {
        let url_template = url_template.into();
        if !url_template.contains("{x}") || !url_template.contains("{y}") {
            return Err(ProviderError::Config(format!(
                "URL template '{}' must contain {{x}} and {{y}}",
                url_template
            )));
        }

        let name = reqwest::Url::parse(&url_template.replace(['{', '}'], ""))
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "tile-server".to_string());

        Ok(Self {
            http_client,
            url_template,
            name,
        })
    }

    /// Creates a provider for the default wplace backend.
    pub fn wplace(http_client: C) -> Self {
        Self {
            http_client,
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            name: "backend.wplace.live".to_string(),
        }
    }

    /// Builds the URL for a chunk.
    pub fn chunk_url(&self, coord: ChunkCoord) -> String {
        self.url_template
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }
}

impl<C: AsyncHttpClient> ChunkSource for TileServerProvider<C> {
    async fn fetch_chunk(&self, coord: ChunkCoord) -> Result<Vec<u8>, ProviderError> {
        let url = self.chunk_url(coord);
        self.http_client.get(&url).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
