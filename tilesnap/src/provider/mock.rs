//! Scripted chunk source for tests.

use super::types::{ChunkSource, ProviderError};
use crate::area::ChunkCoord;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Chunk source answering from per-coordinate response queues.
///
/// The last queued response for a coordinate is repeated. Coordinates with
/// nothing queued answer 404. Tracks peak concurrency of in-flight fetches.
#[derive(Default)]
pub struct MockChunkSource {
    responses: Mutex<HashMap<ChunkCoord, VecDeque<Result<Vec<u8>, ProviderError>>>>,
    calls: Mutex<Vec<ChunkCoord>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockChunkSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, coord: ChunkCoord, response: Result<Vec<u8>, ProviderError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(coord)
            .or_default()
            .push_back(response);
    }

    /// Queues a 429 answer with an optional `Retry-After` hint.
    pub fn rate_limit(&self, coord: ChunkCoord, retry_after: Option<std::time::Duration>) {
        self.respond(
            coord,
            Err(ProviderError::RateLimited {
                url: format!("mock://{}/{}", coord.x, coord.y),
                retry_after,
            }),
        );
    }

    pub fn calls(&self) -> Vec<ChunkCoord> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, coord: ChunkCoord) -> Result<Vec<u8>, ProviderError> {
        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(&coord) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Err(ProviderError::Status {
                status: 404,
                url: format!("mock://{}/{}", coord.x, coord.y),
            }),
        }
    }
}

impl ChunkSource for MockChunkSource {
    async fn fetch_chunk(&self, coord: ChunkCoord) -> Result<Vec<u8>, ProviderError> {
        self.calls.lock().unwrap().push(coord);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        // Give sibling fetches a chance to start so peak concurrency is observable
        tokio::task::yield_now().await;

        let response = self.next_response(coord);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }

    fn name(&self) -> &str {
        "mock"
    }
}
