//! Error types for the sync module.

use bloomsync_filter::FilterError;
use thiserror::Error;

/// Errors that abort a reconciliation session.
///
/// Running out of rounds is not an error; see
/// [`ReconciliationStatus::PartialConvergence`](crate::ReconciliationStatus).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad configuration or filter parameters.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Peer sent a filter or frame that could not be decoded.
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Peer sent a well-formed message that is wrong for the current round.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Timeout waiting for peer.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Peer gave up on the session.
    #[error("peer aborted: {0}")]
    PeerAborted(String),
}

impl From<FilterError> for SyncError {
    fn from(e: FilterError) -> Self {
        match e {
            FilterError::InvalidParameter(msg) => SyncError::InvalidParameter(msg),
            FilterError::CorruptData(msg) => SyncError::CorruptData(msg),
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
