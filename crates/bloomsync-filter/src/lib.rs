//! # bloomsync filter
//!
//! A Bloom filter over byte strings and its wire codec.
//!
//! This crate contains no I/O and no async code. It is pure computation over
//! a bit array.
//!
//! ## Key Types
//!
//! - [`BloomFilter`] - fixed-size, insert-only membership structure
//! - [`FilterParams`] - sizing, hash cap and seed
//! - [`FilterHasher`] - pluggable `(h1, h2)` source for double hashing
//!
//! ## Example
//!
//! ```rust
//! use bloomsync_filter::BloomFilter;
//!
//! let mut filter = BloomFilter::new(100, 0.01).unwrap();
//! filter.insert("doc-1");
//! assert!(filter.possibly_contains("doc-1"));
//!
//! let bytes = filter.serialize();
//! let decoded = BloomFilter::deserialize(&bytes).unwrap();
//! assert!(decoded.possibly_contains("doc-1"));
//! ```

pub mod codec;
pub mod error;
pub mod filter;
pub mod hash;

pub use codec::{FORMAT_V1, FORMAT_V2};
pub use error::{FilterError, Result};
pub use filter::{BloomFilter, FilterParams, MAX_BIT_LEN};
pub use hash::{BitPositions, Blake3Hasher, FilterHasher};
