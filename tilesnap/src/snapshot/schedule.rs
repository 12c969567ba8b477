//! Periodic slice capture.
//!
//! ```ignore
//! let cancel = CancellationToken::new();
//! let every = parse_interval("30m")?;
//! run_schedule(every, cancel.clone(), || store.create_slice(&dl, "city", &area, options)).await;
//! ```

use super::error::StoreError;
use super::store::SliceReport;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Error parsing an interval string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid interval '{input}' - expected format like '500ms', '30s', '5m' or '2h'")]
pub struct IntervalParseError {
    input: String,
}

impl IntervalParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parses an interval such as `500ms`, `30s`, `5m` or `2h`.
///
/// A bare number is taken as milliseconds. Zero is rejected.
pub fn parse_interval(s: &str) -> Result<Duration, IntervalParseError> {
    let trimmed = s.trim();
    let lower = trimmed.to_lowercase();
    let split = lower
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(lower.len());
    let (digits, unit) = lower.split_at(split);

    let value: u64 = digits.parse().map_err(|_| IntervalParseError::new(trimmed))?;
    let millis_per_unit: u64 = match unit.trim() {
        "" | "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        _ => return Err(IntervalParseError::new(trimmed)),
    };

    let millis = value
        .checked_mul(millis_per_unit)
        .ok_or_else(|| IntervalParseError::new(trimmed))?;
    if millis == 0 {
        return Err(IntervalParseError::new(trimmed));
    }
    Ok(Duration::from_millis(millis))
}

/// Runs `job` every `interval` until `cancellation` fires.
///
/// The first run happens one interval after the call. A failed run is logged
/// and does not stop the schedule. Returns the number of successful runs.
pub async fn run_schedule<F, Fut>(
    interval: Duration,
    cancellation: CancellationToken,
    mut job: F,
) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<SliceReport, StoreError>>,
{
    info!(interval_ms = interval.as_millis() as u64, "Snapshot schedule started");

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut completed = 0;
    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                info!(completed = completed, "Snapshot schedule stopped");
                break;
            }
            _ = ticker.tick() => {
                match job().await {
                    Ok(report) => {
                        completed += 1;
                        info!(
                            snapshot = %report.name,
                            date = %report.date,
                            written = report.written,
                            failed = report.failed,
                            "Scheduled slice saved"
                        );
                    }
                    Err(e) => warn!(error = %e, "Scheduled slice failed"),
                }
            }
        }
    }
    completed
}
