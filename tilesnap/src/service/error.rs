//! Service error types.

use crate::compositor::RenderError;
use crate::snapshot::{SliceDate, StoreError};
use thiserror::Error;

/// Errors from tile service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// The snapshot exists but holds no slices.
    #[error("Snapshot '{0}' has no changes")]
    NoChanges(String),

    /// No slice at or after the requested date.
    #[error("Snapshot '{name}' has no change at or after {after}")]
    NoChangeAfter { name: String, after: SliceDate },
}

impl ServiceError {
    /// True when the failure is a missing snapshot, slice or area rather than
    /// an internal fault.
    pub fn is_not_found(&self) -> bool {
        match self {
            ServiceError::Store(e) => e.is_not_found() || matches!(e, StoreError::NoArea),
            ServiceError::Render(RenderError::NoSnapshot) => true,
            ServiceError::NoChanges(_) | ServiceError::NoChangeAfter { .. } => true,
            ServiceError::Render(_) => false,
        }
    }
}
