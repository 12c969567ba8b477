//! Snapshot store errors.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by [`super::SnapshotStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Snapshot or slice does not exist. Callers report this as information.
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// A slice was requested without any selected area.
    #[error("No area selected")]
    NoArea,

    #[error("Invalid snapshot name '{0}'")]
    InvalidName(String),

    #[error("Invalid slice date '{0}'")]
    InvalidDate(String),

    /// A slice with this date is already stored. Slices are never rewritten.
    #[error("Change already exists: {0}")]
    SliceExists(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse metadata {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
