//! Per-snapshot `metadata.json`.

use super::date::SliceDate;
use crate::area::Area;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File name of the metadata document at the snapshot root.
pub const METADATA_FILE: &str = "metadata.json";

/// Persisted state of one snapshot. Missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotMetadata {
    /// Path form of the most recent slice, empty until the first fetch.
    pub latest_date: String,
    /// Area used for the most recent slice.
    pub area: Area,
    /// Disk quota in bytes, 0 disables eviction.
    pub quota_bytes: u64,
    /// Memoized slice sizes keyed by the slice path form.
    pub size_cache: BTreeMap<String, u64>,
}

impl SnapshotMetadata {
    /// Latest slice date, if one has been recorded and parses.
    pub fn latest(&self) -> Option<SliceDate> {
        SliceDate::parse(&self.latest_date).ok()
    }

    pub fn quota_enabled(&self) -> bool {
        self.quota_bytes > 0
    }
}
