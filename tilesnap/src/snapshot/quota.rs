//! Quota planning: which slices must go to bring a snapshot under its limit.

use super::date::SliceDate;
use super::error::StoreError;

/// Slices selected for deletion to bring a snapshot under its quota.
///
/// Produced by [`super::SnapshotStore::enforce_quota`]; nothing is deleted
/// until the plan is handed to [`super::SnapshotStore::apply_quota_plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPlan {
    pub name: String,
    /// Quota in bytes, 0 when the snapshot has no quota.
    pub quota_bytes: u64,
    /// Current size plus the bytes about to be added.
    pub projected_bytes: u64,
    /// Victims, oldest first, with their sizes.
    pub victims: Vec<(SliceDate, u64)>,
}

impl QuotaPlan {
    pub(crate) fn disabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            quota_bytes: 0,
            projected_bytes: 0,
            victims: Vec::new(),
        }
    }

    /// Whether the plan deletes anything.
    pub fn is_empty(&self) -> bool {
        self.victims.is_empty()
    }

    pub fn freed_bytes(&self) -> u64 {
        self.victims.iter().map(|(_, size)| size).sum()
    }

    /// Size once the victims are gone.
    pub fn remaining_bytes(&self) -> u64 {
        self.projected_bytes.saturating_sub(self.freed_bytes())
    }
}

/// What [`super::SnapshotStore::apply_quota_plan`] actually removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedQuota {
    pub deleted: usize,
    pub freed_bytes: u64,
}

/// Walks `ascending` oldest first, picking slices until `total` fits `quota`.
///
/// Sizes are asked for lazily so slices past the cut are never measured.
pub(crate) fn select_victims<F>(
    total: u64,
    quota: u64,
    ascending: &[SliceDate],
    mut size_of: F,
) -> Result<Vec<(SliceDate, u64)>, StoreError>
where
    F: FnMut(SliceDate) -> Result<u64, StoreError>,
{
    let mut remaining = total;
    let mut victims = Vec::new();
    for &date in ascending {
        if remaining <= quota {
            break;
        }
        let size = size_of(date)?;
        remaining = remaining.saturating_sub(size);
        victims.push((date, size));
    }
    Ok(victims)
}
