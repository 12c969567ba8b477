//! Snapshot storage and retention.
//!
//! A snapshot is a named directory of time-slices. Each slice is an
//! immutable set of chunk images captured at one minute, stored below a
//! `year/month/day/hour/minute` path. The store measures slice sizes
//! (memoized in `metadata.json`), plans quota evictions oldest first, and
//! deletes whole slices only.

mod date;
mod error;
mod lister;
mod metadata;
mod quota;
pub mod schedule;
mod store;

pub use date::SliceDate;
pub use error::StoreError;
pub use lister::{DirectoryLister, FsLister};
pub use metadata::{SnapshotMetadata, METADATA_FILE};
pub use quota::{AppliedQuota, QuotaPlan};
pub use schedule::{parse_interval, run_schedule, IntervalParseError};
pub use store::{ChangeOrder, SliceOptions, SliceReport, SnapshotStore};
