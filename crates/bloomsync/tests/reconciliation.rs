//! End-to-end reconciliation scenarios.
//!
//! Every run here is two real sessions talking over an in-memory transport.
//! Hash seeds are fixed per round and sets come from seeded generators, so
//! each test is reproducible; tests that depend on false positives assert
//! over many independent trials.

use std::collections::BTreeSet;
use std::time::Duration;

use bloomsync::filter::BloomFilter;
use bloomsync::sync::{
    expected_cycles, ReconciliationStatus, SyncConfig, SyncError, SyncMessage,
};
use bloomsync::{FilterError, FilterParams, MemoryTransport, Transport};
use bloomsync_testkit::{
    fixed_rounds_config, harness_config, init_tracing, random_id_set, run_pair, run_pair_over,
    seeded_rng, FaultPoint, FaultyTransport, SetPair, SetPairParams,
};
use proptest::prelude::*;
use rand::Rng;

fn ids(prefix: &str, count: usize) -> BTreeSet<String> {
    (0..count).map(|i| format!("{prefix}-{i}")).collect()
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[tokio::test]
async fn test_one_sided_sets() {
    init_tracing();

    let original: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let mut n = original.clone();
    let mut m: BTreeSet<String> = BTreeSet::new();

    let rounds = expected_cycles(0.04, 3);
    assert_eq!(rounds, 1);

    let (ln, lm) = run_pair(&mut n, &mut m, fixed_rounds_config(0.04, rounds))
        .await
        .unwrap_both();

    assert_eq!(ln.rounds_run, 1);
    assert_eq!(lm.rounds_run, 1);
    assert!(original.is_subset(&m));
    assert_eq!(n, m);
    assert_eq!(lm.elements_added, 3);
}

#[tokio::test]
async fn test_one_sided_sets_default_budget_confirms_fixed_point() {
    let mut n: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let mut m: BTreeSet<String> = BTreeSet::new();

    let (ln, lm) = run_pair(&mut n, &mut m, harness_config(0.04))
        .await
        .unwrap_both();

    assert_eq!(ln.status, ReconciliationStatus::Converged);
    assert_eq!(lm.status, ReconciliationStatus::Converged);
    assert_eq!(ln.rounds_run, 2);
    assert!(ln.rounds[1].is_quiet());
    assert_eq!(n, m);
}

#[tokio::test]
async fn test_identical_sets_converge_immediately() {
    init_tracing();

    let mut rng = seeded_rng(1000);
    let mut pair = SetPair::identical(&mut rng, 1000);
    let before = pair.clone();

    let (l, r) = run_pair(&mut pair.left, &mut pair.right, harness_config(0.44))
        .await
        .unwrap_both();

    for result in [&l, &r] {
        assert_eq!(result.status, ReconciliationStatus::Converged);
        assert_eq!(result.rounds_run, 1);
        assert_eq!(result.elements_added, 0);
        assert_eq!(result.elements_sent, 0);
    }
    assert_eq!(pair, before);
}

#[tokio::test]
async fn test_disjoint_sets_at_high_rate() {
    init_tracing();

    let rounds = expected_cycles(0.4, 100);
    assert_eq!(rounds, 11);

    let trials = 10;
    let mut converged = 0;
    for trial in 0..trials {
        let mut n = ids(&format!("trial{trial}-left"), 100);
        let mut m = ids(&format!("trial{trial}-right"), 100);

        let (ln, lm) = run_pair(&mut n, &mut m, fixed_rounds_config(0.4, rounds))
            .await
            .unwrap_both();
        assert_eq!(ln.rounds_run, rounds);
        assert_eq!(lm.rounds_run, rounds);

        if n == m && n.len() == 200 {
            converged += 1;
        }
    }

    // Each trial misses with probability around 1%.
    assert!(
        converged >= trials - 1,
        "only {converged}/{trials} trials converged"
    );
}

#[test]
fn test_unknown_version_byte_is_corrupt() {
    let mut encoded = BloomFilter::new(10, 0.1).unwrap().serialize().to_vec();
    encoded[0] = 0x7f;

    let err = BloomFilter::deserialize(&encoded).unwrap_err();
    assert!(matches!(err, FilterError::CorruptData(_)));

    let err = bloomsync::BloomsyncError::from(err);
    assert!(err.to_string().starts_with("filter error"));
}

#[tokio::test]
async fn test_almost_identical_sets() {
    // The single extra element may hide behind false positives for a few
    // rounds; running the full estimate finds it.
    let shared = ids("shared", 1000);
    let mut n = shared.clone();
    n.insert("extra".to_string());
    let mut m = shared;

    let rounds = expected_cycles(0.4, 1001);
    let (ln, lm) = run_pair(&mut n, &mut m, fixed_rounds_config(0.4, rounds))
        .await
        .unwrap_both();

    assert_eq!(n, m);
    assert_eq!(ln.elements_sent, 1);
    assert_eq!(lm.elements_added, 1);
}

#[tokio::test]
async fn test_lopsided_sets() {
    let mut rng = seeded_rng(77);
    let mut pair = SetPair::disjoint(&mut rng, 100, 10_000);
    let union = pair.union();

    let rounds = expected_cycles(0.2, pair.max_len());
    let (l, _) = run_pair(
        &mut pair.left,
        &mut pair.right,
        fixed_rounds_config(0.2, rounds),
    )
    .await
    .unwrap_both();

    assert_eq!(l.rounds_run, rounds);
    assert_eq!(pair.left, union);
    assert_eq!(pair.right, union);

    // Round 1 filters are far smaller than the element lists they replace.
    let first = &l.rounds[0];
    assert_eq!(first.local_size, 100);
    assert_eq!(first.peer_size, 10_000);
    assert!(first.filter_bytes < 100);
}

// =============================================================================
// PROPERTIES
// =============================================================================

#[tokio::test]
async fn test_full_budget_converges_with_high_probability() {
    let mut rng = seeded_rng(2024);
    let trials = 40;
    let mut converged = 0;

    for _ in 0..trials {
        let p = rng.gen_range(0.05..0.5);
        let shared = rng.gen_range(100..200);
        let only_left = rng.gen_range(0..50);
        let only_right = rng.gen_range(0..50);
        let mut pair = SetPair::overlapping(&mut rng, shared, only_left, only_right);
        let union = pair.union();

        let rounds = expected_cycles(p, pair.max_len());
        run_pair(
            &mut pair.left,
            &mut pair.right,
            fixed_rounds_config(p, rounds),
        )
        .await
        .unwrap_both();

        if pair.left == union && pair.right == union {
            converged += 1;
        }
    }

    assert!(
        converged >= trials - 4,
        "only {converged}/{trials} trials converged"
    );
}

#[tokio::test]
async fn test_rerun_after_convergence_is_a_no_op() {
    let mut rng = seeded_rng(5);
    let mut pair = SetPair::overlapping(&mut rng, 200, 40, 40);

    let config = SyncConfig {
        settle_rounds: 3,
        ..harness_config(0.1)
    };
    run_pair(&mut pair.left, &mut pair.right, config)
        .await
        .unwrap_both();
    assert!(pair.is_converged());
    let settled = pair.clone();

    let (l, r) = run_pair(&mut pair.left, &mut pair.right, harness_config(0.1))
        .await
        .unwrap_both();

    assert_eq!(l.rounds_run, 1);
    assert_eq!(l.elements_added + r.elements_added, 0);
    assert_eq!(pair, settled);
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_sets_only_grow(
        params in any::<SetPairParams>(),
        p in 0.05f64..0.5,
        rounds in 1u32..4,
    ) {
        let mut pair = params.build();
        let before = pair.clone();
        let union = before.union();

        let outcome = block_on(run_pair(
            &mut pair.left,
            &mut pair.right,
            fixed_rounds_config(p, rounds),
        ));
        let (l, r) = outcome.unwrap_both();

        prop_assert!(before.left.is_subset(&pair.left));
        prop_assert!(before.right.is_subset(&pair.right));
        prop_assert!(pair.left.is_subset(&union));
        prop_assert!(pair.right.is_subset(&union));

        for result in [&l, &r] {
            for window in result.rounds.windows(2) {
                prop_assert!(window[0].local_size <= window[1].local_size);
            }
        }
        prop_assert_eq!(l.elements_added, pair.left.len() - before.left.len());
        prop_assert_eq!(r.elements_added, pair.right.len() - before.right.len());
    }
}

// =============================================================================
// FAILURES
// =============================================================================

fn short_timeout(rate: f64) -> SyncConfig {
    SyncConfig {
        message_timeout: Duration::from_millis(200),
        ..SyncConfig::with_rate(rate)
    }
}

#[tokio::test]
async fn test_failed_round_leaves_set_untouched() {
    init_tracing();

    let left_original = ids("left", 10);
    let right_original = ids("right", 10);
    let mut left = left_original.clone();
    let mut right = right_original.clone();

    // The second receive is the peer's round-1 element list.
    let (left_end, right_end) = MemoryTransport::pair();
    let faulty = FaultyTransport::new(left_end, FaultPoint::Recv(1));

    let outcome = run_pair_over(
        &mut left,
        &faulty,
        &mut right,
        &right_end,
        short_timeout(0.1),
    )
    .await;

    assert!(matches!(outcome.left, Err(SyncError::TransportError(_))));
    assert_eq!(left, left_original);

    // The peer finished round 1 and then waited in vain for round 2.
    assert!(matches!(outcome.right, Err(SyncError::Timeout(_))));
    assert!(right_original.is_subset(&right));
    assert!(right.len() > right_original.len());
}

#[tokio::test]
async fn test_completed_rounds_survive_later_failure() {
    let left_original = ids("left", 10);
    let right_original = ids("right", 10);
    let union: BTreeSet<String> = left_original.union(&right_original).cloned().collect();
    let mut left = left_original.clone();
    let mut right = right_original.clone();

    // Fail on the round-2 element list.
    let (left_end, right_end) = MemoryTransport::pair();
    let faulty = FaultyTransport::new(left_end, FaultPoint::Recv(3));

    let outcome = run_pair_over(
        &mut left,
        &faulty,
        &mut right,
        &right_end,
        short_timeout(0.1),
    )
    .await;

    assert!(matches!(outcome.left, Err(SyncError::TransportError(_))));
    assert!(left_original.is_subset(&left));
    assert!(left.is_subset(&union));
    assert!(left.len() > left_original.len());
    assert!(outcome.right.is_err());
}

#[tokio::test]
async fn test_dropped_session_leaves_set_untouched() {
    let original = ids("local", 10);
    let mut set = original.clone();

    // The peer answers with its filter and a first, unfinished batch of
    // elements, then goes silent.
    let (local_end, peer_end) = MemoryTransport::pair();
    let peer_filter = BloomFilter::with_params(FilterParams::new(1, 0.1).seed(1)).unwrap();
    peer_end
        .send(SyncMessage::Filter {
            round: 1,
            set_size: 1,
            filter: peer_filter.serialize(),
        })
        .await
        .unwrap();
    peer_end
        .send(SyncMessage::Elements {
            round: 1,
            elements: vec!["remote-0".to_string()],
            done: false,
        })
        .await
        .unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_millis(100),
        bloomsync::reconcile(&mut set, &local_end, harness_config(0.1)),
    )
    .await;

    assert!(outcome.is_err(), "session should still be waiting");
    assert_eq!(set, original);
    assert!(!set.contains("remote-0"));

    // The session did get as far as sending its own filter.
    assert!(matches!(
        peer_end.recv().await.unwrap(),
        SyncMessage::Filter { round: 1, .. }
    ));
}

#[tokio::test]
async fn test_abort_reaches_peer() {
    let mut left = ids("left", 5);
    let mut right = ids("right", 5);

    // An invalid config fails before any filter goes out; the Abort frame
    // is the only thing the peer ever sees.
    let (left_end, right_end) = MemoryTransport::pair();
    let (l, r) = tokio::join!(
        bloomsync::reconcile(&mut left, &left_end, SyncConfig::with_rate(2.0)),
        bloomsync::reconcile(&mut right, &right_end, short_timeout(0.1)),
    );

    assert!(matches!(l, Err(SyncError::InvalidParameter(_))));
    assert!(matches!(r, Err(SyncError::PeerAborted(_))));
    assert_eq!(right, ids("right", 5));
}

#[tokio::test]
async fn test_random_sets_through_facade() {
    let mut rng = seeded_rng(31);
    let left_ids = random_id_set(&mut rng, 50);
    let right_ids = random_id_set(&mut rng, 50);
    let union: BTreeSet<String> = left_ids.union(&right_ids).cloned().collect();

    let config = bloomsync::ReplicaConfig {
        sync: fixed_rounds_config(0.05, expected_cycles(0.05, 100)),
        max_sessions: 1,
    };

    let (a, b) = MemoryTransport::pair();
    let mut left = bloomsync::Replica::new(left_ids, config.clone());
    let mut right = bloomsync::Replica::new(right_ids, config);

    let (l, r) = tokio::join!(
        left.sync_until_converged(&a),
        right.sync_until_converged(&b)
    );
    let (l, r) = (l.unwrap(), r.unwrap());

    assert_eq!(l.sessions, 1);
    assert_eq!(r.sessions, 1);
    assert_eq!(left.set(), &union);
    assert_eq!(right.set(), &union);
}
