//! # bloomsync testkit
//!
//! Testing utilities for bloomsync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Generators**: Proptest strategies for identifier sets and replica pairs
//! - **Fixtures**: Seeded random sets, a two-peer harness and fault injection
//! - **Vectors**: Golden encodings of the filter wire format
//!
//! ## Two-peer harness
//!
//! ```rust
//! use bloomsync_testkit::fixtures::{harness_config, run_pair, seeded_rng, SetPair};
//!
//! # async fn example() {
//! let mut rng = seeded_rng(7);
//! let mut pair = SetPair::disjoint(&mut rng, 20, 20);
//! let outcome = run_pair(&mut pair.left, &mut pair.right, harness_config(0.05)).await;
//! let (left, right) = outcome.unwrap_both();
//! assert_eq!(left.rounds_run, right.rounds_run);
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use bloomsync_testkit::generators::SetPairParams;
//!
//! proptest! {
//!     #[test]
//!     fn pairs_are_well_formed(params: SetPairParams) {
//!         let pair = params.build();
//!         prop_assert!(params.shared.is_subset(&pair.left));
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    fixed_rounds_config, harness_config, init_tracing, random_id, random_id_set, run_pair,
    run_pair_over, seeded_rng, FaultPoint, FaultyTransport, PairOutcome, SetPair,
};
pub use generators::{element, false_positive_rate, id_set, SetPairParams};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
