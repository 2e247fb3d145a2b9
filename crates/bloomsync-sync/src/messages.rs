//! Reconciliation message types.
//!
//! Each round both peers send one `Filter` frame followed by one or more
//! `Elements` frames (the last one has `done = true`). Frames are encoded
//! as CBOR for transports that move raw bytes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Message size limits.
pub mod limits {
    /// Max elements in a single `Elements` frame.
    pub const MAX_ELEMENTS_PER_MESSAGE: usize = 10_000;
    /// Max encoded filter size (64 MiB, about 55 million elements at 1%).
    pub const MAX_FILTER_BYTES: usize = 64 * 1024 * 1024;
    /// Max length of a single element.
    pub const MAX_ELEMENT_LEN: usize = 4096;
    /// Max size of an encoded frame, checked before decoding.
    pub const MAX_FRAME_BYTES: usize = MAX_FILTER_BYTES + 64 * 1024;
}

/// Reconciliation protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// The sender's filter for a round.
    Filter {
        /// Round number, starting at 1.
        round: u32,
        /// Size of the sender's set when the filter was built.
        set_size: u64,
        /// Encoded [`bloomsync_filter::BloomFilter`].
        filter: Bytes,
    },

    /// Elements the sender determined the receiver is missing.
    Elements {
        /// Round number.
        round: u32,
        /// A batch of missing elements.
        elements: Vec<String>,
        /// True on the final batch of this round.
        done: bool,
    },

    /// The sender is abandoning the session.
    Abort {
        /// Human-readable reason.
        reason: String,
    },
}

impl SyncMessage {
    /// Encode to CBOR.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| SyncError::TransportError(format!("encoding failed: {e}")))?;
        Ok(Bytes::from(buf))
    }

    /// Decode from CBOR and check limits.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > limits::MAX_FRAME_BYTES {
            return Err(SyncError::CorruptData(format!(
                "frame of {} bytes exceeds {}",
                bytes.len(),
                limits::MAX_FRAME_BYTES
            )));
        }
        let msg: SyncMessage =
            ciborium::from_reader(bytes).map_err(|e| SyncError::CorruptData(e.to_string()))?;
        msg.validate_limits()
            .map_err(|e| SyncError::CorruptData(e.to_string()))?;
        Ok(msg)
    }

    /// Round this message belongs to, if any.
    pub fn round(&self) -> Option<u32> {
        match self {
            SyncMessage::Filter { round, .. } | SyncMessage::Elements { round, .. } => {
                Some(*round)
            }
            SyncMessage::Abort { .. } => None,
        }
    }

    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        match self {
            SyncMessage::Filter { round, filter, .. } => {
                if *round == 0 {
                    return Err("round numbers start at 1");
                }
                if filter.len() > limits::MAX_FILTER_BYTES {
                    return Err("filter too large");
                }
            }
            SyncMessage::Elements {
                round, elements, ..
            } => {
                if *round == 0 {
                    return Err("round numbers start at 1");
                }
                if elements.len() > limits::MAX_ELEMENTS_PER_MESSAGE {
                    return Err("too many elements");
                }
                if elements.iter().any(|e| e.len() > limits::MAX_ELEMENT_LEN) {
                    return Err("element too long");
                }
            }
            SyncMessage::Abort { .. } => {}
        }
        Ok(())
    }

    /// Short name for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::Filter { .. } => "Filter",
            SyncMessage::Elements { .. } => "Elements",
            SyncMessage::Abort { .. } => "Abort",
        }
    }
}
