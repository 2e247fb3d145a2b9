//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: random identifier sets, a
//! harness that runs both peers of a reconciliation concurrently, and a
//! transport wrapper that fails on demand.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::{distributions::Alphanumeric, rngs::StdRng, Rng, SeedableRng};

use bloomsync_sync::{
    reconcile, MemoryTransport, ReconciliationResult, ReplicaSet, SyncConfig, SyncError,
    SyncMessage, Transport,
};

/// Length of generated identifiers.
pub const ID_LEN: usize = 13;

/// Generate a random identifier.
pub fn random_id(rng: &mut impl Rng) -> String {
    (0..ID_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
        .collect()
}

/// Generate a set of exactly `size` random identifiers.
pub fn random_id_set(rng: &mut impl Rng, size: usize) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    while set.len() < size {
        set.insert(random_id(rng));
    }
    set
}

/// Deterministic RNG for reproducible fixtures.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Two replicas about to be reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPair {
    pub left: BTreeSet<String>,
    pub right: BTreeSet<String>,
}

impl SetPair {
    /// `shared` common elements plus private elements on each side.
    pub fn overlapping(
        rng: &mut impl Rng,
        shared: usize,
        only_left: usize,
        only_right: usize,
    ) -> Self {
        let all = random_id_set(rng, shared + only_left + only_right);
        let mut iter = all.into_iter();

        let common: Vec<String> = iter.by_ref().take(shared).collect();
        let left_only: Vec<String> = iter.by_ref().take(only_left).collect();
        let right_only: Vec<String> = iter.collect();

        let mut left: BTreeSet<String> = common.iter().cloned().collect();
        left.extend(left_only);
        let mut right: BTreeSet<String> = common.into_iter().collect();
        right.extend(right_only);

        Self { left, right }
    }

    /// Two sets with no common element.
    pub fn disjoint(rng: &mut impl Rng, left: usize, right: usize) -> Self {
        Self::overlapping(rng, 0, left, right)
    }

    /// Two copies of the same set.
    pub fn identical(rng: &mut impl Rng, size: usize) -> Self {
        Self::overlapping(rng, size, 0, 0)
    }

    /// The set both sides should end up with.
    pub fn union(&self) -> BTreeSet<String> {
        self.left.union(&self.right).cloned().collect()
    }

    /// Size of the larger side.
    pub fn max_len(&self) -> usize {
        self.left.len().max(self.right.len())
    }

    /// True once both sides hold the same elements.
    pub fn is_converged(&self) -> bool {
        self.left == self.right
    }
}

/// Results from both sides of a harnessed reconciliation.
#[derive(Debug)]
pub struct PairOutcome {
    pub left: Result<ReconciliationResult, SyncError>,
    pub right: Result<ReconciliationResult, SyncError>,
}

impl PairOutcome {
    /// Both sides finished without error.
    pub fn unwrap_both(self) -> (ReconciliationResult, ReconciliationResult) {
        match (self.left, self.right) {
            (Ok(l), Ok(r)) => (l, r),
            (l, r) => panic!("reconciliation failed: left={l:?} right={r:?}"),
        }
    }
}

/// Reconcile two sets over an in-memory transport, both peers concurrently.
pub async fn run_pair<L, R>(left: L, right: R, config: SyncConfig) -> PairOutcome
where
    L: ReplicaSet,
    R: ReplicaSet,
{
    let (left_end, right_end) = MemoryTransport::pair();
    run_pair_over(left, &left_end, right, &right_end, config).await
}

/// Reconcile two sets over caller-supplied transports.
pub async fn run_pair_over<L, R, TL, TR>(
    left: L,
    left_transport: TL,
    right: R,
    right_transport: TR,
    config: SyncConfig,
) -> PairOutcome
where
    L: ReplicaSet,
    R: ReplicaSet,
    TL: Transport,
    TR: Transport,
{
    let (left, right) = tokio::join!(
        reconcile(left, left_transport, config.clone()),
        reconcile(right, right_transport, config),
    );
    PairOutcome { left, right }
}

/// Config for harness runs: short timeout so a stuck peer fails fast.
pub fn harness_config(false_positive_rate: f64) -> SyncConfig {
    SyncConfig {
        message_timeout: Duration::from_secs(5),
        ..SyncConfig::with_rate(false_positive_rate)
    }
}

/// Config that runs exactly `rounds` rounds unless every one of them is quiet.
pub fn fixed_rounds_config(false_positive_rate: f64, rounds: u32) -> SyncConfig {
    SyncConfig {
        max_cycles: Some(rounds),
        settle_rounds: rounds,
        ..harness_config(false_positive_rate)
    }
}

/// Which transport operation a [`FaultyTransport`] breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Fail the n-th send (0-based).
    Send(usize),
    /// Fail the n-th receive (0-based).
    Recv(usize),
}

/// Wraps a transport and injects a single failure.
pub struct FaultyTransport<T> {
    inner: T,
    fault: FaultPoint,
    sends: AtomicUsize,
    recvs: AtomicUsize,
}

impl<T: Transport> FaultyTransport<T> {
    /// Wrap `inner`, failing at `fault`.
    pub fn new(inner: T, fault: FaultPoint) -> Self {
        Self {
            inner,
            fault,
            sends: AtomicUsize::new(0),
            recvs: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for FaultyTransport<T> {
    async fn send(&self, message: SyncMessage) -> bloomsync_sync::Result<()> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst);
        if self.fault == FaultPoint::Send(n) {
            return Err(SyncError::TransportError(format!("injected send fault #{n}")));
        }
        self.inner.send(message).await
    }

    async fn recv(&self) -> bloomsync_sync::Result<SyncMessage> {
        let n = self.recvs.fetch_add(1, Ordering::SeqCst);
        if self.fault == FaultPoint::Recv(n) {
            return Err(SyncError::TransportError(format!("injected recv fault #{n}")));
        }
        self.inner.recv().await
    }
}

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
