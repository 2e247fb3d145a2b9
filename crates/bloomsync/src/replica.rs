//! The Replica: a reconcilable set with anti-entropy retries.
//!
//! A single session may run out of rounds before the two sets meet. The
//! union it accumulated is still valid, so the replica simply runs another
//! session, with fresh hash seeds, until one ends at a fixed point.

use bloomsync_filter::{BloomFilter, FilterParams};
use bloomsync_sync::{reconcile, ReconciliationResult, ReplicaSet, SyncConfig, Transport};

use crate::error::{BloomsyncError, Result};

/// Configuration for a replica.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaConfig {
    /// Per-session configuration.
    pub sync: SyncConfig,
    /// Sessions [`Replica::sync_until_converged`] may run before giving up.
    pub max_sessions: u32,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            max_sessions: 4,
        }
    }
}

/// Outcome of [`Replica::sync_until_converged`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AntiEntropyReport {
    /// Sessions run.
    pub sessions: u32,
    /// Rounds run across all sessions.
    pub rounds_run: u32,
    /// Elements added across all sessions.
    pub elements_added: usize,
    /// Whether the last session reached a fixed point.
    pub converged: bool,
}

/// A local set plus the reconciliation history that grew it.
pub struct Replica<R: ReplicaSet> {
    set: R,
    config: ReplicaConfig,
    sessions: u64,
    history: Vec<ReconciliationResult>,
}

impl<R: ReplicaSet> Replica<R> {
    /// Wrap a set.
    pub fn new(set: R, config: ReplicaConfig) -> Self {
        Self {
            set,
            config,
            sessions: 0,
            history: Vec::new(),
        }
    }

    /// The local set.
    pub fn set(&self) -> &R {
        &self.set
    }

    /// Give back the set.
    pub fn into_inner(self) -> R {
        self.set
    }

    /// Configuration in effect.
    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    /// Add a local element. Returns true if it was new.
    pub fn insert(&mut self, element: impl Into<String>) -> bool {
        self.set.insert(element.into())
    }

    pub fn contains(&self, element: &str) -> bool {
        self.set.contains(element)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Results of every completed session, oldest first.
    pub fn history(&self) -> &[ReconciliationResult] {
        &self.history
    }

    /// Bloom filter of the current set at the configured rate.
    pub fn filter(&self) -> Result<BloomFilter> {
        let snapshot = self.set.snapshot();
        let expected = snapshot.len().max(1) as u64;

        let mut params = FilterParams::new(expected, self.config.sync.false_positive_rate);
        if let Some(k) = self.config.sync.max_hashes {
            params = params.max_hashes(k);
        }

        let mut filter = BloomFilter::with_params(params)?;
        for element in &snapshot {
            filter.insert(element);
        }
        Ok(filter)
    }

    /// Run one reconciliation session against the peer behind `transport`.
    pub async fn sync_with<T>(&mut self, transport: &T) -> Result<ReconciliationResult>
    where
        T: Transport + ?Sized,
    {
        // Every session gets its own seed range so a retry never repeats
        // the previous session's false positives.
        let config = SyncConfig {
            seed_offset: self
                .config
                .sync
                .seed_offset
                .wrapping_add(self.sessions << 32),
            ..self.config.sync.clone()
        };
        self.sessions += 1;

        let result = reconcile(&mut self.set, transport, config).await?;
        self.history.push(result.clone());
        Ok(result)
    }

    /// Run sessions until one converges or `max_sessions` is reached.
    ///
    /// The peer must run the same loop with the same `max_sessions`. Both
    /// sides observe the same status each session, so both stop together.
    pub async fn sync_until_converged<T>(&mut self, transport: &T) -> Result<AntiEntropyReport>
    where
        T: Transport + ?Sized,
    {
        if self.config.max_sessions == 0 {
            return Err(BloomsyncError::InvalidParameter(
                "max_sessions must be positive".into(),
            ));
        }
        self.config.sync.validate()?;

        let mut report = AntiEntropyReport::default();
        while report.sessions < self.config.max_sessions {
            let result = self.sync_with(transport).await?;
            report.sessions += 1;
            report.rounds_run = report.rounds_run.saturating_add(result.rounds_run);
            report.elements_added += result.elements_added;

            if result.is_converged() {
                report.converged = true;
                break;
            }
            tracing::debug!(
                session = report.sessions,
                added = result.elements_added,
                "session ended before a fixed point, retrying"
            );
        }

        if !report.converged {
            tracing::warn!(
                sessions = report.sessions,
                "anti-entropy gave up before convergence"
            );
        }
        Ok(report)
    }
}
