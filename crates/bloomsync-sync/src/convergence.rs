//! Round-count estimation for filter reconciliation.
//!
//! A differing element goes unnoticed in a round only if the receiving
//! filter reports a false positive for it. Each round uses a fresh filter
//! with a fresh seed, so those events are independent and a specific element
//! survives `r` rounds with probability about `p^r`. With up to `n` differing
//! elements, the union bound gives `n * p^r` for any element surviving.
//!
//! The default budget solves `n * p^r <= 1 / n`:
//!
//! ```text
//! r = ceil(2 * ln(n) / ln(1 / p))
//! ```
//!
//! All functions here are pure. They expect `p` in `(0, 1)`; the recommended
//! operating range is `[0.01, 0.5]`. As `p` approaches 1 the round count
//! diverges and results saturate at `u32::MAX`.

/// Failure budget used for [`CycleEstimate::upper_bound`].
pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.01;

/// Expected and conservative round counts for a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleEstimate {
    /// `expected_cycles(p, n)`.
    pub expected: u32,
    /// Rounds after which the union-bound miss probability is at most
    /// [`DEFAULT_FAILURE_PROBABILITY`]. Never below `expected`.
    pub upper_bound: u32,
}

/// Rounds needed to converge sets of at most `max_entries` elements.
///
/// Returns 0 when `max_entries <= 1`.
pub fn expected_cycles(false_positive_rate: f64, max_entries: usize) -> u32 {
    if max_entries <= 1 {
        return 0;
    }
    let n = max_entries as f64;
    saturating_rounds((2.0 * n.ln()) / (1.0 / false_positive_rate).ln())
}

/// Union bound on the probability that any of `max_entries` differing
/// elements survives `rounds` rounds undetected.
pub fn residual_miss_probability(false_positive_rate: f64, max_entries: usize, rounds: u32) -> f64 {
    let bound = max_entries as f64 * false_positive_rate.powf(f64::from(rounds));
    bound.min(1.0)
}

/// Smallest round count whose residual miss probability is at most `failure`.
pub fn cycles_for_confidence(false_positive_rate: f64, max_entries: usize, failure: f64) -> u32 {
    let n = max_entries as f64;
    if n <= failure {
        return 0;
    }
    saturating_rounds((n / failure).ln() / (1.0 / false_positive_rate).ln())
}

/// Both estimates at once.
pub fn estimate(false_positive_rate: f64, max_entries: usize) -> CycleEstimate {
    let expected = expected_cycles(false_positive_rate, max_entries);
    let confident =
        cycles_for_confidence(false_positive_rate, max_entries, DEFAULT_FAILURE_PROBABILITY);
    CycleEstimate {
        expected,
        upper_bound: expected.max(confident),
    }
}

fn saturating_rounds(rounds: f64) -> u32 {
    if rounds.is_nan() || rounds >= u32::MAX as f64 {
        return u32::MAX;
    }
    if rounds <= 0.0 {
        return 0;
    }
    rounds.ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_cycles_trivial_sets() {
        assert_eq!(expected_cycles(0.1, 0), 0);
        assert_eq!(expected_cycles(0.1, 1), 0);
    }

    #[test]
    fn test_expected_cycles_known_values() {
        // ceil(2 * ln 3 / ln 25) = ceil(0.68) = 1
        assert_eq!(expected_cycles(0.04, 3), 1);
        // ceil(2 * ln 100 / ln 2.5) = ceil(10.05) = 11
        assert_eq!(expected_cycles(0.4, 100), 11);
        // ceil(2 * ln 50 / ln 10) = ceil(3.40) = 4
        assert_eq!(expected_cycles(0.1, 50), 4);
        // ceil(2 * ln 1000 / ln 2) = ceil(19.93) = 20
        assert_eq!(expected_cycles(0.5, 1000), 20);
    }

    #[test]
    fn test_expected_cycles_grows_with_rate() {
        let low = expected_cycles(0.05, 500);
        let high = expected_cycles(0.45, 500);
        assert!(low < high);
    }

    #[test]
    fn test_expected_cycles_saturates_near_one() {
        assert_eq!(expected_cycles(1.0, 100), u32::MAX);
        assert!(expected_cycles(0.999_999, 100) > 1_000_000);
    }

    #[test]
    fn test_residual_probability_at_expected_cycles() {
        let n = 100;
        let rounds = expected_cycles(0.4, n);
        let residual = residual_miss_probability(0.4, n, rounds);
        assert!(residual <= 1.0 / n as f64);
    }

    #[test]
    fn test_residual_probability_clamped() {
        assert_eq!(residual_miss_probability(0.5, 1000, 0), 1.0);
    }

    #[test]
    fn test_cycles_for_confidence() {
        // ceil(ln(100 / 0.01) / ln 2.5) = ceil(10.05) = 11
        assert_eq!(cycles_for_confidence(0.4, 100, 0.01), 11);
        assert_eq!(cycles_for_confidence(0.4, 0, 0.01), 0);
    }

    #[test]
    fn test_estimate_upper_bound_not_below_expected() {
        for n in [2, 3, 10, 100, 10_000] {
            for p in [0.01, 0.1, 0.3, 0.5] {
                let est = estimate(p, n);
                assert!(est.upper_bound >= est.expected, "p={p} n={n}");
            }
        }
        // ceil(ln(3 / 0.01) / ln 25) = ceil(1.77) = 2
        assert_eq!(estimate(0.04, 3), CycleEstimate { expected: 1, upper_bound: 2 });
    }
}
