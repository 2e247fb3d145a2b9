//! Hashing for bit-position derivation.
//!
//! A filter needs `k` bit positions per item. Rather than running `k`
//! independent hash functions, we compute one 128-bit digest, split it into
//! two 64-bit halves `h1` and `h2`, and derive the positions with the
//! Kirsch-Mitzenmacher double-hashing scheme:
//!
//! ```text
//! h_i(x) = (h1(x) + i * h2(x)) mod m      for i in 0..k
//! ```
//!
//! This keeps the asymptotic false-positive rate of `k` independent hashes.

/// Domain separation prefix for the default hasher.
const HASH_DOMAIN: &[u8] = b"bloomsync-filter-v1:";

/// Produces the `(h1, h2)` pair that seeds double hashing.
///
/// Implementations must be deterministic: the same `(seed, item)` has to
/// yield the same pair on every platform, otherwise two peers disagree about
/// which bits an element occupies.
pub trait FilterHasher {
    /// Hash `item` under `seed`.
    fn hash_pair(&self, seed: u64, item: &[u8]) -> (u64, u64);
}

/// Default hasher: Blake3 over `domain || seed_le || item`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blake3Hasher;

impl FilterHasher for Blake3Hasher {
    fn hash_pair(&self, seed: u64, item: &[u8]) -> (u64, u64) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(HASH_DOMAIN);
        hasher.update(&seed.to_le_bytes());
        hasher.update(item);
        let digest = hasher.finalize();
        let bytes = digest.as_bytes();

        let mut lo = [0u8; 8];
        let mut hi = [0u8; 8];
        lo.copy_from_slice(&bytes[0..8]);
        hi.copy_from_slice(&bytes[8..16]);
        (u64::from_le_bytes(lo), u64::from_le_bytes(hi))
    }
}

/// Iterator over the `k` bit positions of an item in a filter of `m` bits.
#[derive(Debug, Clone)]
pub struct BitPositions {
    h1: u128,
    h2: u128,
    m: u128,
    i: u32,
    k: u32,
}

impl BitPositions {
    /// Positions for a precomputed hash pair.
    ///
    /// `m` must be non-zero.
    pub fn new((h1, h2): (u64, u64), m: u64, k: u32) -> Self {
        let m = u128::from(m.max(1));
        Self {
            h1: u128::from(h1) % m,
            h2: u128::from(h2) % m,
            m,
            i: 0,
            k,
        }
    }
}

impl Iterator for BitPositions {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.i >= self.k {
            return None;
        }
        // Both terms are already reduced mod m, so this stays far below u128::MAX.
        let pos = (self.h1 + u128::from(self.i) * self.h2) % self.m;
        self.i += 1;
        Some(pos as u64)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.k - self.i) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BitPositions {}
