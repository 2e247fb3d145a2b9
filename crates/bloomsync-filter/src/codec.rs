//! Versioned binary encoding of a [`BloomFilter`].
//!
//! ```text
//! byte    version      1 = unseeded, 2 = seeded
//! varint  bit_len      m (LEB128)
//! varint  hash_count   k
//! varint  seed         version 2 only
//! bytes   bits         ceil(m / 8) bytes, little-endian bit order
//! ```
//!
//! A filter with seed 0 is always written as version 1, so unseeded filters
//! stay byte-compatible with decoders that only know the base format. The
//! encoding is self-describing: no external context is needed to recover
//! `(m, k, seed)`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FilterError, Result};
use crate::filter::{byte_len_for, BloomFilter, MAX_BIT_LEN};
use crate::hash::{Blake3Hasher, FilterHasher};

/// Base format: no seed on the wire.
pub const FORMAT_V1: u8 = 1;
/// Seeded format: a varint seed follows the hash count.
pub const FORMAT_V2: u8 = 2;

/// Longest LEB128 encoding of a u64.
const MAX_VARINT_LEN: usize = 10;

/// Encode a filter.
pub fn encode<H>(filter: &BloomFilter<H>) -> Bytes
where
    H: FilterHasher,
{
    let bits = filter.as_bytes();
    let mut buf = BytesMut::with_capacity(1 + 3 * MAX_VARINT_LEN + bits.len());

    if filter.seed() == 0 {
        buf.put_u8(FORMAT_V1);
        put_varint(&mut buf, filter.bit_len());
        put_varint(&mut buf, u64::from(filter.hash_count()));
    } else {
        buf.put_u8(FORMAT_V2);
        put_varint(&mut buf, filter.bit_len());
        put_varint(&mut buf, u64::from(filter.hash_count()));
        put_varint(&mut buf, filter.seed());
    }
    buf.put_slice(bits);
    buf.freeze()
}

/// Decode a filter that uses the default hasher.
pub fn decode(bytes: &[u8]) -> Result<BloomFilter<Blake3Hasher>> {
    decode_with_hasher(bytes, Blake3Hasher)
}

/// Decode a filter, attaching `hasher` for subsequent queries.
///
/// The hasher is not part of the encoding; both peers must agree on it.
pub fn decode_with_hasher<H: FilterHasher>(bytes: &[u8], hasher: H) -> Result<BloomFilter<H>> {
    let mut buf = bytes;

    if !buf.has_remaining() {
        return Err(FilterError::CorruptData("empty input".into()));
    }
    let version = buf.get_u8();
    if version != FORMAT_V1 && version != FORMAT_V2 {
        return Err(FilterError::CorruptData(format!(
            "unknown format version {version}"
        )));
    }

    let bit_len = get_varint(&mut buf, "bit length")?;
    let hash_count = get_varint(&mut buf, "hash count")?;
    let seed = if version == FORMAT_V2 {
        get_varint(&mut buf, "seed")?
    } else {
        0
    };

    if bit_len == 0 || bit_len > MAX_BIT_LEN {
        return Err(FilterError::CorruptData(format!(
            "bit length {bit_len} out of range"
        )));
    }
    let hash_count = u32::try_from(hash_count)
        .map_err(|_| FilterError::CorruptData(format!("hash count {hash_count} too large")))?;

    let expected = byte_len_for(bit_len);
    if buf.remaining() != expected {
        return Err(FilterError::CorruptData(format!(
            "payload is {} bytes, bit length {bit_len} requires {expected}",
            buf.remaining()
        )));
    }

    BloomFilter::from_parts(bit_len, hash_count, seed, buf.to_vec(), hasher)
}

/// Append `value` as unsigned LEB128.
pub fn put_varint(buf: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Read an unsigned LEB128 value, advancing `buf`.
pub fn get_varint(buf: &mut impl Buf, field: &str) -> Result<u64> {
    let mut value: u64 = 0;
    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(FilterError::CorruptData(format!("truncated {field}")));
        }
        let byte = buf.get_u8();
        let shift = 7 * i as u32;
        let chunk = u64::from(byte & 0x7f);
        // The tenth byte may only carry the top bit of a u64.
        if i == MAX_VARINT_LEN - 1 && chunk > 1 {
            return Err(FilterError::CorruptData(format!("{field} overflows u64")));
        }
        value |= chunk << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(FilterError::CorruptData(format!("{field} overflows u64")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterParams;
    use proptest::prelude::*;

    fn filled(n: u64, p: f64, seed: u64) -> BloomFilter {
        let mut filter = BloomFilter::with_params(FilterParams::new(n, p).seed(seed)).unwrap();
        for i in 0..n {
            filter.insert(format!("element-{i}"));
        }
        filter
    }

    #[test]
    fn test_v1_layout() {
        // n = 1, p = 0.5: m = ceil(1.44...) = 2, k = round(1.38...) = 1
        let filter = BloomFilter::new(1, 0.5).unwrap();
        let encoded = filter.serialize();
        assert_eq!(&encoded[..], &[FORMAT_V1, 2, 1, 0]);
    }

    #[test]
    fn test_v2_carries_seed() {
        let filter = BloomFilter::with_params(FilterParams::new(1, 0.5).seed(300)).unwrap();
        let encoded = filter.serialize();
        assert_eq!(&encoded[..], &[FORMAT_V2, 2, 1, 0xac, 0x02, 0]);
    }

    #[test]
    fn test_decode_recovers_dimensions() {
        let filter = filled(100, 0.01, 9);
        let decoded = BloomFilter::deserialize(&filter.serialize()).unwrap();
        assert_eq!(decoded.bit_len(), filter.bit_len());
        assert_eq!(decoded.hash_count(), filter.hash_count());
        assert_eq!(decoded.seed(), 9);
        assert_eq!(decoded, filter);
    }

    #[test]
    fn test_unknown_version_is_corrupt() {
        let mut encoded = filled(10, 0.1, 0).serialize().to_vec();
        for version in [0u8, 3, 0xff] {
            encoded[0] = version;
            let err = BloomFilter::deserialize(&encoded).unwrap_err();
            assert!(matches!(err, FilterError::CorruptData(_)));
        }
    }

    #[test]
    fn test_truncated_input_is_corrupt() {
        let encoded = filled(10, 0.1, 0).serialize();
        for len in 0..encoded.len() {
            let err = BloomFilter::deserialize(&encoded[..len]).unwrap_err();
            assert!(matches!(err, FilterError::CorruptData(_)), "len={len}");
        }
    }

    #[test]
    fn test_trailing_bytes_are_corrupt() {
        let mut encoded = filled(10, 0.1, 0).serialize().to_vec();
        encoded.push(0);
        assert!(BloomFilter::deserialize(&encoded).is_err());
    }

    #[test]
    fn test_length_mismatch_is_corrupt() {
        // Declares 64 bits but ships a single byte.
        let err = BloomFilter::deserialize(&[FORMAT_V1, 64, 1, 0xff]).unwrap_err();
        assert!(matches!(err, FilterError::CorruptData(_)));
    }

    #[test]
    fn test_zero_dimensions_are_corrupt() {
        assert!(BloomFilter::deserialize(&[FORMAT_V1, 0, 1]).is_err());
        assert!(BloomFilter::deserialize(&[FORMAT_V1, 8, 0, 0]).is_err());
    }

    #[test]
    fn test_padding_bits_are_corrupt() {
        // 4-bit filter with bit 6 set.
        let err = BloomFilter::deserialize(&[FORMAT_V1, 4, 1, 0b0100_0000]).unwrap_err();
        assert!(matches!(err, FilterError::CorruptData(_)));
    }

    #[test]
    fn test_varint_overflow_is_corrupt() {
        let mut bytes = vec![FORMAT_V1];
        bytes.extend_from_slice(&[0xff; 11]);
        assert!(BloomFilter::deserialize(&bytes).is_err());
    }

    #[test]
    fn test_varint_boundaries() {
        for value in [0u64, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut buf = BytesMut::new();
            put_varint(&mut buf, value);
            let mut slice = &buf[..];
            assert_eq!(get_varint(&mut slice, "value").unwrap(), value);
            assert!(slice.is_empty());
        }
    }

    proptest! {
        #[test]
        fn test_round_trip_answers_identically(
            members in prop::collection::vec(".{1,16}", 1..100),
            queries in prop::collection::vec(".{1,16}", 0..100),
            seed in any::<u64>(),
        ) {
            let params = FilterParams::new(members.len() as u64, 0.05).seed(seed);
            let mut filter = BloomFilter::with_params(params).unwrap();
            for m in &members {
                filter.insert(m);
            }
            let decoded = BloomFilter::deserialize(&filter.serialize()).unwrap();
            for item in members.iter().chain(queries.iter()) {
                prop_assert_eq!(decoded.possibly_contains(item), filter.possibly_contains(item));
            }
        }
    }
}
