//! Batched chunk downloading.
//!
//! [`Downloader`] wraps a [`crate::provider::ChunkSource`] with the retry
//! policy for rate limits and splits large coordinate lists into batches of
//! bounded concurrency separated by a cooldown.

mod downloader;
mod sleeper;

pub use downloader::{
    ChunkFetch, Downloader, DEFAULT_CONCURRENCY, DEFAULT_COOLDOWN, DEFAULT_RETRY_WAIT,
};
pub use sleeper::{Sleeper, TokioSleeper};

#[cfg(test)]
pub use sleeper::tests::RecordingSleeper;
