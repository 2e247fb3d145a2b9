//! Golden test vectors for the filter wire format.
//!
//! These vectors pin the exact bytes an encoder must produce, so a peer
//! written against the same format can check itself against this one.

use bloomsync_filter::{BloomFilter, FilterParams, Result};

/// A golden filter encoding.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Entries the filter is sized for.
    pub expected_entries: u64,
    /// Target false-positive rate.
    pub false_positive_rate: f64,
    /// Optional hash-count cap.
    pub max_hashes: Option<u32>,
    /// Hash seed.
    pub seed: u64,
    /// Inserted items.
    pub items: Vec<String>,
    /// Expected bit array length.
    pub bit_len: u64,
    /// Expected hash count.
    pub hash_count: u32,
    /// Expected encoding (hex).
    pub expected_hex: &'static str,
}

impl GoldenVector {
    /// Build the filter this vector describes.
    pub fn build(&self) -> Result<BloomFilter> {
        let mut params = FilterParams::new(self.expected_entries, self.false_positive_rate)
            .seed(self.seed);
        if let Some(k) = self.max_hashes {
            params = params.max_hashes(k);
        }
        let mut filter = BloomFilter::with_params(params)?;
        for item in &self.items {
            filter.insert(item);
        }
        Ok(filter)
    }
}

fn items(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn docs(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("doc-{i}")).collect()
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "empty single-entry filter",
            expected_entries: 1,
            false_positive_rate: 0.5,
            max_hashes: None,
            seed: 0,
            items: Vec::new(),
            bit_len: 2,
            hash_count: 1,
            expected_hex: "01020100",
        },
        GoldenVector {
            name: "three letters, unseeded",
            expected_entries: 3,
            false_positive_rate: 0.1,
            max_hashes: None,
            seed: 0,
            items: items(&["a", "b", "c"]),
            bit_len: 15,
            hash_count: 3,
            expected_hex: "010f038538",
        },
        GoldenVector {
            name: "three letters, seed 7",
            expected_entries: 3,
            false_positive_rate: 0.1,
            max_hashes: None,
            seed: 7,
            items: items(&["a", "b", "c"]),
            bit_len: 15,
            hash_count: 3,
            expected_hex: "020f03078e10",
        },
        GoldenVector {
            name: "ten documents, seed 42",
            expected_entries: 10,
            false_positive_rate: 0.01,
            max_hashes: None,
            seed: 42,
            items: docs(10),
            bit_len: 96,
            hash_count: 7,
            expected_hex: "0260072a4e007965cb674e7a3e48a994",
        },
        GoldenVector {
            name: "ten documents, capped at three hashes",
            expected_entries: 10,
            false_positive_rate: 0.01,
            max_hashes: Some(3),
            seed: 42,
            items: docs(10),
            bit_len: 96,
            hash_count: 3,
            expected_hex: "0260032a42007120ca020e180a480014",
        },
    ]
}

/// Check every vector. Returns `(name, passed, detail)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .into_iter()
        .map(|vector| {
            let name = vector.name.to_string();
            match vector.build() {
                Ok(filter) => {
                    let actual = hex::encode(filter.serialize());
                    let passed = actual == vector.expected_hex;
                    (name, passed, actual)
                }
                Err(e) => (name, false, e.to_string()),
            }
        })
        .collect()
}
