//! Reconciliation protocol state machine.
//!
//! Implements round-based anti-entropy over Bloom filters.
//!
//! ```text
//! Peer A                                  Peer B
//!   |-------- Filter(r, |A|) ------------->|
//!   |<------- Filter(r, |B|) --------------|
//!   |-------- Elements(r, A \ F_B) ------->|
//!   |<------- Elements(r, B \ F_A) --------|
//!   (both commit what they received, then r += 1)
//! ```
//!
//! Both filters of a round are built from pre-round snapshots, so the
//! exchange is simultaneous: neither side's round-`r` additions influence
//! the filter the other side checks against in round `r`.
//!
//! A differing element is missed in a round only when the receiving filter
//! has a false positive for it. Every round uses a freshly sized filter with
//! the round number as hash seed, so misses are independent across rounds.

use std::cmp::max;
use std::time::Duration;

use bloomsync_filter::{BloomFilter, FilterParams};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::convergence::expected_cycles;
use crate::error::{Result, SyncError};
use crate::messages::{limits, SyncMessage};
use crate::replica::ReplicaSet;
use crate::transport::Transport;

/// Configuration for reconciliation behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Target false-positive rate of each round's filter, in (0, 1).
    pub false_positive_rate: f64,
    /// Round budget. `None` derives it from [`expected_cycles`].
    pub max_cycles: Option<u32>,
    /// Consecutive quiet rounds required before declaring convergence.
    ///
    /// A quiet round can hide a remaining difference behind false
    /// positives; each extra quiet round multiplies that chance by the
    /// false-positive rate.
    pub settle_rounds: u32,
    /// Optional cap on hash positions per element.
    pub max_hashes: Option<u32>,
    /// Maximum elements per `Elements` frame.
    pub max_batch_size: usize,
    /// Timeout for waiting for peer messages.
    pub message_timeout: Duration,
    /// Added to the round number to form each filter's hash seed. The seed
    /// travels inside the encoded filter, so peers may use different offsets.
    pub seed_offset: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            false_positive_rate: 0.01,
            max_cycles: None,
            settle_rounds: 1,
            max_hashes: None,
            max_batch_size: 1000,
            message_timeout: Duration::from_secs(30),
            seed_offset: 0,
        }
    }
}

impl SyncConfig {
    /// Config with the given false-positive rate and defaults otherwise.
    pub fn with_rate(false_positive_rate: f64) -> Self {
        Self {
            false_positive_rate,
            ..Self::default()
        }
    }

    /// Check every field is in range.
    pub fn validate(&self) -> Result<()> {
        let p = self.false_positive_rate;
        if !(p > 0.0 && p < 1.0) {
            return Err(SyncError::InvalidParameter(format!(
                "false_positive_rate must be in (0, 1), got {p}"
            )));
        }
        if self.max_cycles == Some(0) {
            return Err(SyncError::InvalidParameter(
                "max_cycles must be positive".into(),
            ));
        }
        if self.settle_rounds == 0 {
            return Err(SyncError::InvalidParameter(
                "settle_rounds must be positive".into(),
            ));
        }
        if self.max_hashes == Some(0) {
            return Err(SyncError::InvalidParameter(
                "max_hashes must be positive".into(),
            ));
        }
        if self.max_batch_size == 0 || self.max_batch_size > limits::MAX_ELEMENTS_PER_MESSAGE {
            return Err(SyncError::InvalidParameter(format!(
                "max_batch_size must be in 1..={}",
                limits::MAX_ELEMENTS_PER_MESSAGE
            )));
        }
        Ok(())
    }

    /// Round budget for sets of at most `max_entries` elements.
    ///
    /// An explicit `max_cycles` wins. Otherwise `expected_cycles` rounds
    /// (at least one) to move elements, plus `settle_rounds` quiet rounds to
    /// confirm the fixed point.
    pub fn budget_for(&self, max_entries: usize) -> u32 {
        self.max_cycles.unwrap_or_else(|| {
            expected_cycles(self.false_positive_rate, max_entries)
                .max(1)
                .saturating_add(self.settle_rounds)
        })
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not started.
    Idle,
    /// Exchanging filters or elements for a round.
    RoundInProgress {
        /// Current round, starting at 1.
        round: u32,
    },
    /// Finished at a fixed point.
    Converged,
    /// Finished because the round budget ran out.
    PartialConvergence,
    /// Stopped by an error.
    Aborted,
}

/// How a completed session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationStatus {
    /// The required number of consecutive rounds exchanged nothing.
    Converged,
    /// The round budget ran out while elements were still moving.
    ///
    /// The union accumulated so far is valid and safe to keep; schedule
    /// another session later to finish.
    PartialConvergence,
}

/// Per-round bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStats {
    /// Round number, starting at 1.
    pub round: u32,
    /// Local set size when the round's filter was built.
    pub local_size: usize,
    /// Peer set size reported with its filter.
    pub peer_size: u64,
    /// Encoded size of the local filter.
    pub filter_bytes: usize,
    /// Elements sent to the peer.
    pub sent: usize,
    /// Elements received from the peer.
    pub received: usize,
    /// Received elements that were new locally.
    pub added: usize,
}

impl RoundStats {
    /// Nothing moved in either direction.
    pub fn is_quiet(&self) -> bool {
        self.sent == 0 && self.received == 0
    }
}

/// Result of a reconciliation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// How the session ended.
    pub status: ReconciliationStatus,
    /// Rounds executed.
    pub rounds_run: u32,
    /// Round budget in effect.
    pub budget: u32,
    /// Total elements added to the local set.
    pub elements_added: usize,
    /// Total elements sent to the peer.
    pub elements_sent: usize,
    /// Details for every round.
    pub rounds: Vec<RoundStats>,
}

impl ReconciliationResult {
    /// Check if the session reached a fixed point.
    pub fn is_converged(&self) -> bool {
        self.status == ReconciliationStatus::Converged
    }
}

/// Session-scoped progress, discarded when the session ends.
#[derive(Debug, Default)]
struct ReconciliationState {
    round: u32,
    budget: Option<u32>,
    quiet_streak: u32,
    rounds: Vec<RoundStats>,
}

/// A reconciliation session against one peer.
///
/// Sessions are single-use: build a new one for every reconciliation.
pub struct ReconciliationSession<R: ReplicaSet, T: Transport> {
    /// The local set.
    replica: R,
    /// The transport layer.
    transport: T,
    /// Configuration.
    config: SyncConfig,
    /// Lifecycle state.
    state: SessionState,
}

impl<R: ReplicaSet, T: Transport> ReconciliationSession<R, T> {
    /// Create a new session.
    pub fn new(replica: R, transport: T, config: SyncConfig) -> Self {
        Self {
            replica,
            transport,
            config,
            state: SessionState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The local set.
    pub fn replica(&self) -> &R {
        &self.replica
    }

    /// Give back the set and transport.
    pub fn into_parts(self) -> (R, T) {
        (self.replica, self.transport)
    }

    /// Run rounds until convergence or the budget runs out.
    ///
    /// On error the session is `Aborted` and the local set holds exactly
    /// the additions of the rounds that completed.
    pub async fn run(&mut self) -> Result<ReconciliationResult> {
        if self.state != SessionState::Idle {
            return Err(SyncError::InvalidParameter(
                "session has already run".into(),
            ));
        }

        let outcome = match self.config.validate() {
            Ok(()) => self.run_rounds().await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                self.state = match result.status {
                    ReconciliationStatus::Converged => SessionState::Converged,
                    ReconciliationStatus::PartialConvergence => SessionState::PartialConvergence,
                };
                tracing::info!(
                    status = ?result.status,
                    rounds = result.rounds_run,
                    budget = result.budget,
                    added = result.elements_added,
                    sent = result.elements_sent,
                    "reconciliation finished"
                );
                Ok(result)
            }
            Err(e) => {
                self.state = SessionState::Aborted;
                tracing::warn!("reconciliation aborted: {}", e);
                if !matches!(e, SyncError::TransportError(_) | SyncError::PeerAborted(_)) {
                    // Best effort: let the peer stop waiting for us.
                    let _ = self
                        .send(SyncMessage::Abort {
                            reason: e.to_string(),
                        })
                        .await;
                }
                Err(e)
            }
        }
    }

    async fn run_rounds(&mut self) -> Result<ReconciliationResult> {
        let mut progress = ReconciliationState::default();

        let status = loop {
            progress.round += 1;
            let round = progress.round;
            self.state = SessionState::RoundInProgress { round };

            let stats = self.run_round(round).await?;

            // Fixed from round 1 so both peers derive the same budget.
            let budget = *progress.budget.get_or_insert_with(|| {
                let peer_size = usize::try_from(stats.peer_size).unwrap_or(usize::MAX);
                self.config.budget_for(max(stats.local_size, peer_size))
            });

            progress.quiet_streak = if stats.is_quiet() {
                progress.quiet_streak + 1
            } else {
                0
            };
            progress.rounds.push(stats);

            if progress.quiet_streak >= self.config.settle_rounds {
                break ReconciliationStatus::Converged;
            }
            if round >= budget {
                break ReconciliationStatus::PartialConvergence;
            }
        };

        Ok(ReconciliationResult {
            status,
            rounds_run: progress.round,
            budget: progress.budget.unwrap_or(0),
            elements_added: progress.rounds.iter().map(|r| r.added).sum(),
            elements_sent: progress.rounds.iter().map(|r| r.sent).sum(),
            rounds: progress.rounds,
        })
    }

    /// One filter exchange plus element exchange.
    ///
    /// Additions are applied only after every message of the round has been
    /// exchanged.
    async fn run_round(&mut self, round: u32) -> Result<RoundStats> {
        let snapshot = self.replica.snapshot();
        let local_filter = self.build_filter(&snapshot, round)?;
        let filter_bytes = local_filter.len();

        self.send(SyncMessage::Filter {
            round,
            set_size: snapshot.len() as u64,
            filter: local_filter,
        })
        .await?;

        let (peer_size, peer_filter) = self.receive_filter(round).await?;
        let peer_filter = BloomFilter::deserialize(&peer_filter)?;

        let local_size = snapshot.len();
        let missing: Vec<String> = snapshot
            .into_iter()
            .filter(|element| !peer_filter.possibly_contains(element))
            .collect();
        let sent = missing.len();

        // Both directions at once: a peer blocked on a full buffer is only
        // released when this side drains it.
        let ((), incoming) = tokio::try_join!(
            self.send_elements(round, missing),
            self.receive_elements(round)
        )?;

        let received = incoming.len();
        let mut added = 0;
        for element in incoming {
            if self.replica.insert(element) {
                added += 1;
            }
        }

        tracing::debug!(
            round,
            local_size,
            peer_size,
            filter_bytes,
            sent,
            received,
            added,
            "round complete"
        );

        Ok(RoundStats {
            round,
            local_size,
            peer_size,
            filter_bytes,
            sent,
            received,
            added,
        })
    }

    /// Fresh filter sized to the snapshot, seeded with the round number.
    fn build_filter(&self, snapshot: &[String], round: u32) -> Result<Bytes> {
        // An empty set still needs a valid filter; it simply has no bits set.
        let expected = max(snapshot.len(), 1) as u64;
        let seed = self.config.seed_offset.wrapping_add(u64::from(round));
        let mut params = FilterParams::new(expected, self.config.false_positive_rate).seed(seed);
        if let Some(cap) = self.config.max_hashes {
            params = params.max_hashes(cap);
        }

        let mut filter = BloomFilter::with_params(params)?;
        for element in snapshot {
            filter.insert(element);
        }
        Ok(filter.serialize())
    }

    async fn send_elements(&self, round: u32, elements: Vec<String>) -> Result<()> {
        if elements.is_empty() {
            return self
                .send(SyncMessage::Elements {
                    round,
                    elements,
                    done: true,
                })
                .await;
        }

        let batches = elements.len().div_ceil(self.config.max_batch_size);
        for (i, chunk) in elements.chunks(self.config.max_batch_size).enumerate() {
            self.send(SyncMessage::Elements {
                round,
                elements: chunk.to_vec(),
                done: i + 1 == batches,
            })
            .await?;
        }
        Ok(())
    }

    /// Send under `message_timeout`; a peer that stops reading fails the send.
    async fn send(&self, message: SyncMessage) -> Result<()> {
        let kind = message.kind();
        match tokio::time::timeout(self.config.message_timeout, self.transport.send(message)).await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(format!("sending {kind}"))),
        }
    }

    async fn receive(&self, waiting_for: &str, round: u32) -> Result<SyncMessage> {
        let timeout = self.config.message_timeout;
        match self.transport.recv_timeout(timeout).await? {
            Some(SyncMessage::Abort { reason }) => Err(SyncError::PeerAborted(reason)),
            Some(msg) => match msg.round() {
                Some(r) if r != round => Err(SyncError::InvalidMessage(format!(
                    "expected {waiting_for} for round {round}, got {} for round {r}",
                    msg.kind()
                ))),
                _ => Ok(msg),
            },
            None => Err(SyncError::Timeout(format!(
                "waiting for {waiting_for} in round {round}"
            ))),
        }
    }

    async fn receive_filter(&self, round: u32) -> Result<(u64, Bytes)> {
        match self.receive("Filter", round).await? {
            SyncMessage::Filter {
                set_size, filter, ..
            } => Ok((set_size, filter)),
            msg => Err(SyncError::InvalidMessage(format!(
                "expected Filter, got {}",
                msg.kind()
            ))),
        }
    }

    async fn receive_elements(&self, round: u32) -> Result<Vec<String>> {
        let mut incoming = Vec::new();
        loop {
            match self.receive("Elements", round).await? {
                SyncMessage::Elements { elements, done, .. } => {
                    incoming.extend(elements);
                    if done {
                        return Ok(incoming);
                    }
                }
                msg => {
                    return Err(SyncError::InvalidMessage(format!(
                        "expected Elements, got {}",
                        msg.kind()
                    )))
                }
            }
        }
    }
}

/// Reconcile `replica` with the peer behind `transport`.
///
/// Pass `&mut set` and `&transport` to keep ownership of both.
pub async fn reconcile<R, T>(
    replica: R,
    transport: T,
    config: SyncConfig,
) -> Result<ReconciliationResult>
where
    R: ReplicaSet,
    T: Transport,
{
    ReconciliationSession::new(replica, transport, config)
        .run()
        .await
}
