//! # bloomsync
//!
//! Probabilistic set reconciliation: two peers holding sets of opaque
//! string identifiers converge to their union by exchanging Bloom filters
//! instead of the sets themselves.
//!
//! ## Overview
//!
//! bloomsync provides:
//!
//! - **Filters**: A seeded Bloom filter with a stable, versioned wire format
//! - **Sessions**: A round-based protocol that converges two sets over any transport
//! - **Estimates**: How many rounds a pair of sets needs at a given false-positive rate
//! - **Replicas**: Repeated sessions until the sets reach a fixed point
//!
//! ## Key Concepts
//!
//! - **Round**: One filter exchange followed by one exchange of missing elements.
//! - **False positive**: An element the peer lacks but its filter claims. It is
//!   hidden for one round only, since every round uses a fresh hash seed.
//! - **Quiet round**: A round in which nothing moved in either direction.
//! - **Monotonic**: Sets only grow. Deletions are not propagated.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::collections::BTreeSet;
//! use bloomsync::{MemoryTransport, Replica, ReplicaConfig};
//!
//! async fn example() {
//!     let (local_end, _remote_end) = MemoryTransport::pair();
//!
//!     let mut replica = Replica::new(BTreeSet::<String>::new(), ReplicaConfig::default());
//!     replica.insert("doc-1");
//!     replica.insert("doc-2");
//!
//!     // The peer runs the same loop on `_remote_end`.
//!     let report = replica.sync_until_converged(&local_end).await.unwrap();
//!     println!("converged: {} after {} sessions", report.converged, report.sessions);
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `bloomsync::filter` - Bloom filter and wire codec
//! - `bloomsync::sync` - Reconciliation protocol, transports and estimates

pub mod error;
pub mod replica;

// Re-export component crates
pub use bloomsync_filter as filter;
pub use bloomsync_sync as sync;

// Re-export main types for convenience
pub use error::{BloomsyncError, Result};
pub use replica::{AntiEntropyReport, Replica, ReplicaConfig};

// Re-export commonly used component types
pub use bloomsync_filter::{BloomFilter, FilterError, FilterParams};
pub use bloomsync_sync::{
    expected_cycles, reconcile, MemoryTransport, ReconciliationResult, ReconciliationSession,
    ReconciliationStatus, ReplicaSet, SyncConfig, SyncError, Transport,
};
