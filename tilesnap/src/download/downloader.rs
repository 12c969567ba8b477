//! Rate-limit aware chunk fetching in fixed-size batches.

use super::sleeper::{Sleeper, TokioSleeper};
use crate::area::ChunkCoord;
use crate::provider::{ChunkSource, ProviderError};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Wait applied after a 429 that carried no usable `Retry-After`.
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_millis(5000);

/// Default number of chunks fetched at once.
pub const DEFAULT_CONCURRENCY: usize = 32;

/// Default pause between two batches.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(400);

/// Outcome of fetching one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFetch {
    pub coord: ChunkCoord,
    pub result: Result<Vec<u8>, ProviderError>,
}

impl ChunkFetch {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fetches chunks from a [`ChunkSource`], waiting out rate limits.
///
/// A rate-limited request is retried after the server's `Retry-After`
/// (or [`DEFAULT_RETRY_WAIT`]) with no attempt ceiling. Any other failure
/// is returned to the caller as-is.
pub struct Downloader<P: ChunkSource, S: Sleeper = TokioSleeper> {
    source: Arc<P>,
    sleeper: S,
    default_retry_wait: Duration,
}

impl<P: ChunkSource> Downloader<P, TokioSleeper> {
    pub fn new(source: Arc<P>) -> Self {
        Self::with_sleeper(source, TokioSleeper)
    }
}

impl<P: ChunkSource, S: Sleeper> Downloader<P, S> {
    pub fn with_sleeper(source: Arc<P>, sleeper: S) -> Self {
        Self {
            source,
            sleeper,
            default_retry_wait: DEFAULT_RETRY_WAIT,
        }
    }

    /// Overrides the wait used when a 429 has no `Retry-After`.
    pub fn with_default_retry_wait(mut self, wait: Duration) -> Self {
        self.default_retry_wait = wait;
        self
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Fetches one chunk, retrying for as long as the server rate-limits.
    pub async fn fetch_chunk(&self, coord: ChunkCoord) -> Result<Vec<u8>, ProviderError> {
        let mut attempt: u32 = 1;
        loop {
            match self.source.fetch_chunk(coord).await {
                Ok(bytes) => {
                    debug!(
                        x = coord.x,
                        y = coord.y,
                        bytes = bytes.len(),
                        attempt = attempt,
                        "Chunk downloaded"
                    );
                    return Ok(bytes);
                }
                Err(ProviderError::RateLimited { retry_after, .. }) => {
                    let wait = retry_after.unwrap_or(self.default_retry_wait);
                    warn!(
                        x = coord.x,
                        y = coord.y,
                        attempt = attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited, waiting before retry"
                    );
                    self.sleeper.sleep(wait).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetches `coords` in batches of `concurrency`, handing each finished
    /// batch to `on_batch` before the next one starts.
    ///
    /// Batches run one after another with `cooldown` between them; chunks
    /// within a batch are fetched concurrently. Results of a batch keep the
    /// order of `coords`. Returns the values produced by `on_batch`.
    pub async fn fetch_batches<F, Fut, T>(
        &self,
        coords: &[ChunkCoord],
        concurrency: usize,
        cooldown: Duration,
        mut on_batch: F,
    ) -> Vec<T>
    where
        F: FnMut(Vec<ChunkFetch>) -> Fut,
        Fut: Future<Output = T>,
    {
        let batch_size = concurrency.max(1);
        let total_batches = coords.len().div_ceil(batch_size);
        let mut outputs = Vec::with_capacity(total_batches);

        for (index, batch) in coords.chunks(batch_size).enumerate() {
            if index > 0 && !cooldown.is_zero() {
                self.sleeper.sleep(cooldown).await;
            }

            let results = join_all(batch.iter().map(|&coord| async move {
                ChunkFetch {
                    coord,
                    result: self.fetch_chunk(coord).await,
                }
            }))
            .await;

            let failed = results.iter().filter(|r| !r.is_ok()).count();
            for fetch in results.iter() {
                if let Err(e) = &fetch.result {
                    warn!(x = fetch.coord.x, y = fetch.coord.y, error = %e, "Chunk download failed");
                }
            }
            info!(
                batch = index + 1,
                batches = total_batches,
                chunks = results.len(),
                failed = failed,
                "Batch complete"
            );

            outputs.push(on_batch(results).await);
        }

        outputs
    }

    /// Fetches every coordinate and returns the results in input order.
    pub async fn fetch_batch(
        &self,
        coords: &[ChunkCoord],
        concurrency: usize,
        cooldown: Duration,
    ) -> Vec<ChunkFetch> {
        self.fetch_batches(coords, concurrency, cooldown, |results| async move { results })
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::sleeper::tests::RecordingSleeper;
    use crate::provider::MockChunkSource;

    fn downloader(source: MockChunkSource) -> Downloader<MockChunkSource, RecordingSleeper> {
        Downloader::with_sleeper(Arc::new(source), RecordingSleeper::new())
    }

    fn coords(n: i32) -> Vec<ChunkCoord> {
        (0..n).map(|x| ChunkCoord::new(x, 0)).collect()
    }

    #[tokio::test]
    async fn test_fetch_chunk_success() {
        let source = MockChunkSource::new();
        source.respond(ChunkCoord::new(1, 2), Ok(vec![1, 2, 3]));
        let dl = downloader(source);

        let bytes = dl.fetch_chunk(ChunkCoord::new(1, 2)).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert!(dl.sleeper().waits().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_honors_retry_after() {
        let coord = ChunkCoord::new(5, 5);
        let source = MockChunkSource::new();
        source.rate_limit(coord, Some(Duration::from_secs(2)));
        source.respond(coord, Ok(vec![7]));
        let dl = downloader(source);

        assert_eq!(dl.fetch_chunk(coord).await.unwrap(), vec![7]);
        assert_eq!(dl.sleeper().waits(), vec![Duration::from_secs(2)]);
        assert_eq!(dl.source().calls().len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_without_hint_waits_default() {
        let coord = ChunkCoord::new(0, 0);
        let source = MockChunkSource::new();
        source.rate_limit(coord, None);
        source.rate_limit(coord, None);
        source.respond(coord, Ok(vec![1]));
        let dl = downloader(source);

        assert!(dl.fetch_chunk(coord).await.is_ok());
        assert_eq!(dl.sleeper().waits(), vec![DEFAULT_RETRY_WAIT, DEFAULT_RETRY_WAIT]);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let coord = ChunkCoord::new(3, 3);
        let source = MockChunkSource::new();
        source.respond(
            coord,
            Err(ProviderError::Status {
                status: 500,
                url: "u".into(),
            }),
        );
        let dl = downloader(source);

        let err = dl.fetch_chunk(coord).await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 500, .. }));
        assert_eq!(dl.source().calls().len(), 1);
        assert!(dl.sleeper().waits().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_batch_keeps_order_and_reports_failures() {
        let source = MockChunkSource::new();
        for c in coords(5) {
            if c.x != 2 {
                source.respond(c, Ok(vec![c.x as u8]));
            }
        }
        let dl = downloader(source);

        let results = dl
            .fetch_batch(&coords(5), 2, Duration::from_millis(400))
            .await;

        let order: Vec<i32> = results.iter().map(|r| r.coord.x).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert!(!results[2].is_ok());
        assert_eq!(results[4].result, Ok(vec![4]));
    }

    #[tokio::test]
    async fn test_cooldown_only_between_batches() {
        let source = MockChunkSource::new();
        for c in coords(5) {
            source.respond(c, Ok(vec![0]));
        }
        let dl = downloader(source);

        dl.fetch_batch(&coords(5), 2, Duration::from_millis(400))
            .await;

        // 3 batches -> 2 cooldowns
        assert_eq!(dl.sleeper().waits(), vec![Duration::from_millis(400); 2]);
    }

    #[tokio::test]
    async fn test_concurrency_bounds_in_flight() {
        let source = MockChunkSource::new();
        for c in coords(10) {
            source.respond(c, Ok(vec![0]));
        }
        let dl = downloader(source);

        dl.fetch_batch(&coords(10), 3, Duration::ZERO).await;

        assert!(dl.source().peak_in_flight() <= 3);
        assert_eq!(dl.source().calls().len(), 10);
    }

    #[tokio::test]
    async fn test_fetch_batches_hands_over_each_batch() {
        let source = MockChunkSource::new();
        for c in coords(7) {
            source.respond(c, Ok(vec![0]));
        }
        let dl = downloader(source);

        let sizes = dl
            .fetch_batches(&coords(7), 3, Duration::ZERO, |batch| async move {
                batch.len()
            })
            .await;

        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_zero_concurrency_treated_as_one() {
        let source = MockChunkSource::new();
        for c in coords(2) {
            source.respond(c, Ok(vec![0]));
        }
        let dl = downloader(source);

        let sizes = dl
            .fetch_batches(&coords(2), 0, Duration::ZERO, |batch| async move {
                batch.len()
            })
            .await;
        assert_eq!(sizes, vec![1, 1]);
    }

    #[tokio::test]
    async fn test_empty_input_fetches_nothing() {
        let dl = downloader(MockChunkSource::new());
        let results = dl.fetch_batch(&[], 4, Duration::from_millis(400)).await;
        assert!(results.is_empty());
        assert!(dl.sleeper().waits().is_empty());
    }
}
