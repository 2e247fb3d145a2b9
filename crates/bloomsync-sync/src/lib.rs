//! # bloomsync sync
//!
//! Round-based set reconciliation between two peers.
//!
//! ## Overview
//!
//! Each peer holds a set of opaque string identifiers. Every round both
//! peers exchange a Bloom filter of their current set, send each other the
//! elements the other's filter reports absent, and add what they receive.
//! A false positive can hide a missing element for one round, but rounds use
//! independent filters, so the chance an element stays hidden shrinks
//! geometrically with the number of rounds.
//!
//! ## Key Properties
//!
//! - **Monotonic**: sets only grow; nothing is ever removed
//! - **Atomic rounds**: a failed round leaves the local set untouched
//! - **Bandwidth-efficient**: only filters and genuinely missing elements move
//! - **Bounded**: the default round budget comes from [`expected_cycles`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::collections::HashSet;
//! use bloomsync_sync::{reconcile, MemoryTransport, SyncConfig};
//!
//! async fn example() {
//!     let (local_end, _remote_end) = MemoryTransport::pair();
//!     let mut docs: HashSet<String> = ["doc-1".to_string()].into_iter().collect();
//!
//!     // The peer runs the same call on `_remote_end`.
//!     let result = reconcile(&mut docs, &local_end, SyncConfig::with_rate(0.05))
//!         .await
//!         .unwrap();
//!     println!("{:?} after {} rounds", result.status, result.rounds_run);
//! }
//! ```

pub mod convergence;
pub mod error;
pub mod messages;
pub mod protocol;
pub mod replica;
pub mod transport;

pub use convergence::{
    cycles_for_confidence, estimate, expected_cycles, residual_miss_probability, CycleEstimate,
};
pub use error::{Result, SyncError};
pub use messages::{limits, SyncMessage};
pub use protocol::{
    reconcile, ReconciliationResult, ReconciliationSession, ReconciliationStatus, RoundStats,
    SessionState, SyncConfig,
};
pub use replica::ReplicaSet;
pub use transport::{memory::MemoryTransport, Transport};
