//! The Bloom filter itself.
//!
//! A filter is a fixed-length bit array plus the number of hash positions
//! each item occupies. Dimensions are derived once from the expected number
//! of entries and the target false-positive rate:
//!
//! ```text
//! m = ceil(-(n * ln p) / (ln 2)^2)
//! k = max(1, round((m / n) * ln 2))
//! ```
//!
//! After construction the only mutation is setting bits. There is no
//! removal, so an inserted item is reported as present forever.

use std::f64::consts::LN_2;
use std::fmt;

use bytes::Bytes;

use crate::codec;
use crate::error::{FilterError, Result};
use crate::hash::{BitPositions, Blake3Hasher, FilterHasher};

/// Upper bound on the bit-array length: 2^34 bits, which is 2 GiB of storage.
///
/// Guards both construction with absurd parameters and decoding of
/// hostile length prefixes.
pub const MAX_BIT_LEN: u64 = 1 << 34;

/// Construction parameters for a [`BloomFilter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Number of items the filter is sized for.
    pub expected_entries: u64,
    /// Target false-positive rate, strictly between 0 and 1.
    pub false_positive_rate: f64,
    /// Optional cap on the derived hash count.
    pub max_hashes: Option<u32>,
    /// Hash seed. Filters with different seeds place items on unrelated bits.
    pub seed: u64,
}

impl FilterParams {
    /// Parameters with no hash cap and seed 0.
    pub fn new(expected_entries: u64, false_positive_rate: f64) -> Self {
        Self {
            expected_entries,
            false_positive_rate,
            max_hashes: None,
            seed: 0,
        }
    }

    /// Cap the number of hash positions per item.
    pub fn max_hashes(mut self, max_hashes: u32) -> Self {
        self.max_hashes = Some(max_hashes);
        self
    }

    /// Set the hash seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Compute `(m, k)` for these parameters.
    pub fn dimensions(&self) -> Result<(u64, u32)> {
        let n = self.expected_entries;
        let p = self.false_positive_rate;

        if n == 0 {
            return Err(FilterError::InvalidParameter(
                "expected_entries must be positive".into(),
            ));
        }
        // Written this way so NaN fails the check too.
        if !(p > 0.0 && p < 1.0) {
            return Err(FilterError::InvalidParameter(format!(
                "false_positive_rate must be in (0, 1), got {p}"
            )));
        }
        if self.max_hashes == Some(0) {
            return Err(FilterError::InvalidParameter(
                "max_hashes must be positive".into(),
            ));
        }

        let n_f = n as f64;
        let m_f = (-(n_f * p.ln()) / (LN_2 * LN_2)).ceil();
        if !m_f.is_finite() || m_f > MAX_BIT_LEN as f64 {
            return Err(FilterError::InvalidParameter(format!(
                "filter for {n} entries at rate {p} exceeds {MAX_BIT_LEN} bits"
            )));
        }
        let m = (m_f as u64).max(1);

        let k_f = ((m as f64 / n_f) * LN_2).round();
        let mut k = (k_f as u32).max(1);
        if let Some(cap) = self.max_hashes {
            k = k.min(cap);
        }

        Ok((m, k))
    }
}

/// A fixed-size probabilistic membership structure over byte strings.
///
/// Guarantees no false negatives. The false-positive rate approaches the
/// configured target as the inserted count approaches `expected_entries`
/// and rises beyond it, so callers must not over-fill a filter.
#[derive(Clone)]
pub struct BloomFilter<H = Blake3Hasher> {
    bits: Vec<u8>,
    bit_len: u64,
    hash_count: u32,
    seed: u64,
    hasher: H,
}

impl BloomFilter<Blake3Hasher> {
    /// Create an empty filter sized for `expected_entries` at `false_positive_rate`.
    pub fn new(expected_entries: u64, false_positive_rate: f64) -> Result<Self> {
        Self::with_params(FilterParams::new(expected_entries, false_positive_rate))
    }

    /// Create an empty filter from explicit parameters.
    pub fn with_params(params: FilterParams) -> Result<Self> {
        Self::with_hasher(params, Blake3Hasher)
    }

    /// Decode a filter produced by [`BloomFilter::serialize`].
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes)
    }
}

impl<H: FilterHasher> BloomFilter<H> {
    /// Create an empty filter that derives bit positions with `hasher`.
    pub fn with_hasher(params: FilterParams, hasher: H) -> Result<Self> {
        let (bit_len, hash_count) = params.dimensions()?;
        Ok(Self {
            bits: vec![0u8; byte_len_for(bit_len)],
            bit_len,
            hash_count,
            seed: params.seed,
            hasher,
        })
    }

    /// Rebuild a filter from decoded parts.
    ///
    /// Rejects dimensions that could not have come from a valid filter.
    pub fn from_parts(
        bit_len: u64,
        hash_count: u32,
        seed: u64,
        bits: Vec<u8>,
        hasher: H,
    ) -> Result<Self> {
        if bit_len == 0 || bit_len > MAX_BIT_LEN {
            return Err(FilterError::CorruptData(format!(
                "bit length {bit_len} out of range"
            )));
        }
        if hash_count == 0 {
            return Err(FilterError::CorruptData("hash count is zero".into()));
        }
        let expected = byte_len_for(bit_len);
        if bits.len() != expected {
            return Err(FilterError::CorruptData(format!(
                "bit array is {} bytes, expected {expected} for {bit_len} bits",
                bits.len()
            )));
        }
        let used = (bit_len % 8) as u32;
        if used != 0 {
            let padding_mask = !((1u8 << used) - 1);
            if bits[expected - 1] & padding_mask != 0 {
                return Err(FilterError::CorruptData(
                    "padding bits beyond bit length are set".into(),
                ));
            }
        }

        Ok(Self {
            bits,
            bit_len,
            hash_count,
            seed,
            hasher,
        })
    }

    /// Insert an item. Re-inserting is a no-op.
    pub fn insert(&mut self, item: impl AsRef<[u8]>) {
        for pos in self.positions(item.as_ref()) {
            self.bits[(pos >> 3) as usize] |= 1 << (pos & 7);
        }
    }

    /// True if every bit for `item` is set.
    ///
    /// Never false for an inserted item.
    pub fn possibly_contains(&self, item: impl AsRef<[u8]>) -> bool {
        self.positions(item.as_ref())
            .all(|pos| self.bits[(pos >> 3) as usize] & (1 << (pos & 7)) != 0)
    }

    fn positions(&self, item: &[u8]) -> BitPositions {
        let pair = self.hasher.hash_pair(self.seed, item);
        BitPositions::new(pair, self.bit_len, self.hash_count)
    }

    /// Encode this filter in the versioned wire format.
    pub fn serialize(&self) -> Bytes {
        codec::encode(self)
    }

    /// Length of the bit array (`m`).
    pub fn bit_len(&self) -> u64 {
        self.bit_len
    }

    /// Hash positions per item (`k`).
    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Hash seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Size of the bit array in bytes.
    pub fn byte_len(&self) -> usize {
        self.bits.len()
    }

    /// Raw bit array, little-endian bit order within each byte.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// True if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|b| *b == 0)
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> u64 {
        self.bits.iter().map(|b| u64::from(b.count_ones())).sum()
    }

    /// Fraction of bits that are set.
    pub fn fill_rate(&self) -> f64 {
        self.count_ones() as f64 / self.bit_len as f64
    }

    /// Estimate how many distinct items were inserted.
    ///
    /// Uses `-(m / k) * ln(1 - X / m)` with `X` set bits. Returns infinity
    /// for a saturated filter.
    pub fn estimated_len(&self) -> f64 {
        let m = self.bit_len as f64;
        let x = self.count_ones() as f64;
        if x >= m {
            return f64::INFINITY;
        }
        -(m / f64::from(self.hash_count)) * (1.0 - x / m).ln()
    }
}

impl<H> fmt::Debug for BloomFilter<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomFilter")
            .field("bit_len", &self.bit_len)
            .field("hash_count", &self.hash_count)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl<H> PartialEq for BloomFilter<H> {
    fn eq(&self, other: &Self) -> bool {
        self.bit_len == other.bit_len
            && self.hash_count == other.hash_count
            && self.seed == other.seed
            && self.bits == other.bits
    }
}

impl<H> Eq for BloomFilter<H> {}

/// Bytes needed to hold `bit_len` bits.
pub(crate) fn byte_len_for(bit_len: u64) -> usize {
    bit_len.div_ceil(8) as usize
}
