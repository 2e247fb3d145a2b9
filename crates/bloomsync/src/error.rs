//! Error types for the bloomsync facade.

use bloomsync_filter::FilterError;
use bloomsync_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during replica operations.
#[derive(Debug, Error)]
pub enum BloomsyncError {
    /// Filter construction or decoding error.
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// Reconciliation error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Invalid replica configuration.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, BloomsyncError>;
