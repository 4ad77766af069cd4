//! Per-client admission control.
//!
//! Each client identity owns a token bucket: `capacity` tokens, refilled
//! continuously at `refill_per_second`. A request is admitted when at least one
//! token is available and consumes it. Identities are spread over independently
//! locked shards so unrelated clients never contend on one lock, and a periodic
//! reclaimer forgets visitors that have been idle for longer than the retention
//! window.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex` per shard because:
//! 1. Admission is a map lookup plus a few float operations
//! 2. Lock is never held across `.await` points
//! 3. Reclamation locks one shard at a time

use crate::lifecycle::ShutdownSignal;
use heisei_core::{Clock, ForumError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Float slack so a bucket refilled to exactly one token is not refused.
const TOKEN_EPSILON: f64 = 1e-9;

/// Token bucket and reclamation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Bucket size (burst)
    pub capacity: u32,
    /// Sustained rate in tokens per second
    pub refill_per_second: f64,
    /// Visitors idle for longer than this are forgotten
    pub retention_secs: u64,
    /// How often the reclaimer runs
    pub reclaim_interval_secs: u64,
    /// Number of independently locked shards
    pub shards: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_per_second: 5.0,
            retention_secs: 3600,
            reclaim_interval_secs: 60,
            shards: 16,
        }
    }
}

impl LimiterConfig {
    /// Idle retention window
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Reclaimer period
    pub fn reclaim_interval(&self) -> Duration {
        Duration::from_secs(self.reclaim_interval_secs)
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdmissionDecision {
    /// Request admitted; one token consumed
    Allowed,
    /// Request refused
    Denied {
        /// Time until one token will be available
        retry_after: Duration,
    },
}

impl AdmissionDecision {
    /// Whether the request was admitted
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Token bucket state for one client identity
#[derive(Debug, Clone, PartialEq)]
pub struct VisitorState {
    tokens: f64,
    last_seen: Instant,
}

impl VisitorState {
    fn fresh(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_seen: now,
        }
    }

    /// Tokens currently held, as of the last check
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Time of the last admission check; doubles as the refill reference point
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    fn refill(&mut self, now: Instant, capacity: f64, rate: f64) {
        let elapsed = now.saturating_duration_since(self.last_seen);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate).min(capacity);
        self.last_seen = self.last_seen.max(now);
    }

    fn try_take(&mut self, rate: f64) -> AdmissionDecision {
        if self.tokens + TOKEN_EPSILON >= 1.0 {
            self.tokens = (self.tokens - 1.0).max(0.0);
            return AdmissionDecision::Allowed;
        }
        let missing = 1.0 - self.tokens;
        let retry_after = if rate > 0.0 {
            Duration::try_from_secs_f64(missing / rate).unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        };
        AdmissionDecision::Denied { retry_after }
    }
}

/// Counters for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStatistics {
    /// Requests admitted
    pub admitted: u64,
    /// Requests refused
    pub rejected: u64,
    /// Visitor entries removed by reclamation
    pub reclaimed: u64,
}

/// Running idle-visitor sweep; aborted when dropped
#[derive(Debug)]
pub struct ReclaimerHandle {
    task: JoinHandle<()>,
}

impl ReclaimerHandle {
    /// Whether the sweep is still scheduled
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the sweep and wait for it to exit.
    pub async fn stop(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for ReclaimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Default)]
struct Counters {
    admitted: AtomicU64,
    rejected: AtomicU64,
    reclaimed: AtomicU64,
}

/// Sharded per-identity token bucket limiter
#[derive(Debug)]
pub struct VisitorLimiter {
    config: LimiterConfig,
    shards: Box<[Mutex<HashMap<String, VisitorState>>]>,
    hasher: RandomState,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl VisitorLimiter {
    /// Create a limiter; a shard count of zero is treated as one.
    pub fn new(config: LimiterConfig, clock: Arc<dyn Clock>) -> Self {
        let shards = (0..config.shards.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            config,
            shards,
            hasher: RandomState::new(),
            clock,
            counters: Counters::default(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    fn shard(&self, identity: &str) -> &Mutex<HashMap<String, VisitorState>> {
        let index = self.hasher.hash_one(identity) as usize % self.shards.len();
        &self.shards[index]
    }

    /// Run the admission check for `identity`, consuming a token when admitted.
    ///
    /// A never-seen identity starts with a full bucket.
    pub fn check(&self, identity: &str) -> AdmissionDecision {
        let capacity = f64::from(self.config.capacity);
        let rate = self.config.refill_per_second;
        let now = self.clock.now_instant();

        let decision = {
            let mut visitors = self.shard(identity).lock();
            match visitors.get_mut(identity) {
                Some(state) => {
                    state.refill(now, capacity, rate);
                    state.try_take(rate)
                }
                None => {
                    let mut state = VisitorState::fresh(capacity, now);
                    let decision = state.try_take(rate);
                    visitors.insert(identity.to_string(), state);
                    decision
                }
            }
        };

        match decision {
            AdmissionDecision::Allowed => {
                self.counters.admitted.fetch_add(1, Ordering::Relaxed);
            }
            AdmissionDecision::Denied { .. } => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
        decision
    }

    /// `true` when the request may proceed.
    pub fn admit(&self, identity: &str) -> bool {
        self.check(identity).is_allowed()
    }

    /// Admission check that reports refusal as [`ForumError::RateLimited`].
    pub fn admit_or_reject(&self, identity: &str) -> Result<()> {
        match self.check(identity) {
            AdmissionDecision::Allowed => Ok(()),
            AdmissionDecision::Denied { retry_after } => {
                warn!(
                    identity,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Rate limit exceeded"
                );
                Err(ForumError::RateLimited {
                    identity: identity.to_string(),
                    retry_after,
                })
            }
        }
    }

    /// Remove visitors whose last check is older than the retention window.
    ///
    /// Returns the number of entries removed.
    pub fn reclaim_idle(&self) -> usize {
        let now = self.clock.now_instant();
        let retention = self.config.retention();
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut visitors = shard.lock();
            let before = visitors.len();
            visitors.retain(|_, state| now.saturating_duration_since(state.last_seen) <= retention);
            removed += before - visitors.len();
        }
        if removed > 0 {
            self.counters
                .reclaimed
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, remaining = self.tracked_visitors(), "Reclaimed idle visitors");
        }
        removed
    }

    /// Start the periodic reclaimer.
    ///
    /// The sweep holds only a weak reference and exits once the limiter is
    /// dropped, once `shutdown` fires, or when the returned handle is stopped
    /// or dropped. The first sweep runs one period after the call.
    pub fn spawn_reclaimer(self: &Arc<Self>, shutdown: &ShutdownSignal) -> ReclaimerHandle {
        let limiter = Arc::downgrade(self);
        let period = self.config.reclaim_interval().max(Duration::from_secs(1));
        let draining = shutdown.token();
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    _ = draining.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(limiter) = limiter.upgrade() else {
                            break;
                        };
                        limiter.reclaim_idle();
                    }
                }
            }
            debug!("Visitor reclaimer stopped");
        });
        ReclaimerHandle { task }
    }

    /// Number of identities currently tracked
    pub fn tracked_visitors(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    /// Snapshot of one visitor's bucket
    pub fn visitor(&self, identity: &str) -> Option<VisitorState> {
        self.shard(identity).lock().get(identity).cloned()
    }

    /// Counter snapshot
    pub fn statistics(&self) -> LimiterStatistics {
        LimiterStatistics {
            admitted: self.counters.admitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            reclaimed: self.counters.reclaimed.load(Ordering::Relaxed),
        }
    }
}
