//! Pending Request Registry - async-to-sync bridge.
//!
//! Maps correlation IDs to callers blocked in `execute`.
//!
//! Flow:
//! 1. `execute` stamps a fresh CorrelationId and calls `insert()` to get a receiver
//! 2. `execute` sends the message and awaits the receiver (bounded)
//! 3. The reader loop calls `remove_and_complete()` with the matching reply
//! 4. Errors, timeouts and disconnects remove the entry exactly once
//!
//! Insertion and removal always happen on different actors (caller vs reader),
//! so every operation is a single atomic map operation.

use crate::errors::TransportError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gn_01_query_protocol::{CorrelationId, MessageKind, QueryMessage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What a blocked caller eventually receives.
pub type Completion = Result<QueryMessage, TransportError>;

/// A caller waiting for its reply.
struct PendingEntry {
    sender: oneshot::Sender<Completion>,
    created_at: Instant,
    kind: MessageKind,
    timeout: Duration,
}

/// Registry counters.
#[derive(Debug, Default)]
pub struct RegistryStats {
    pub total_registered: AtomicU64,
    pub total_completed: AtomicU64,
    pub total_timeouts: AtomicU64,
    pub total_cancelled: AtomicU64,
    pub total_failed: AtomicU64,
    /// Replies whose correlation id matched nothing.
    pub total_unknown: AtomicU64,
}

/// Point-in-time copy of [`RegistryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub registered: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub failed: u64,
    pub unknown: u64,
}

#[derive(Default)]
pub struct PendingRequestRegistry {
    pending: DashMap<CorrelationId, PendingEntry>,
    stats: RegistryStats,
}

impl PendingRequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-flight request. Never overwrites an existing entry.
    pub fn insert(
        &self,
        correlation_id: CorrelationId,
        kind: MessageKind,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<Completion>, TransportError> {
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(correlation_id) {
            Entry::Occupied(_) => Err(TransportError::DuplicateCorrelation(correlation_id)),
            Entry::Vacant(slot) => {
                slot.insert(PendingEntry {
                    sender: tx,
                    created_at: Instant::now(),
                    kind,
                    timeout,
                });
                self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
                debug!(correlation_id = %correlation_id, kind = %kind, "Registered pending request");
                Ok(rx)
            }
        }
    }

    /// Hand a reply to the caller that owns its correlation id.
    ///
    /// Returns false if the id is unknown (late reply after timeout, or a
    /// stray message) or the caller has gone away.
    pub fn remove_and_complete(&self, response: QueryMessage) -> bool {
        let Some(correlation_id) = response.correlation_id() else {
            warn!(kind = %response.kind(), "Reply without correlation id");
            self.stats.total_unknown.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        let Some((_, entry)) = self.pending.remove(&correlation_id) else {
            warn!(correlation_id = %correlation_id, "Response for unknown or expired correlation ID");
            self.stats.total_unknown.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        let response_time = entry.created_at.elapsed();
        if entry.sender.send(Ok(response)).is_ok() {
            self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %correlation_id,
                kind = %entry.kind,
                response_time_ms = response_time.as_millis(),
                "Completed pending request"
            );
            true
        } else {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %correlation_id, "Pending request receiver dropped");
            false
        }
    }

    /// Fail one in-flight request.
    pub fn remove_on_error(&self, correlation_id: CorrelationId, error: TransportError) -> bool {
        let Some((_, entry)) = self.pending.remove(&correlation_id) else {
            return false;
        };
        self.count_failure(&error);
        let _ = entry.sender.send(Err(error));
        true
    }

    /// Drop an entry without signalling (the caller stopped waiting).
    pub fn abandon(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Record that the caller gave up after its timeout.
    pub fn expire(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Fail every in-flight request. Returns how many were failed.
    pub fn drain_with(&self, error: impl Fn() -> TransportError) -> usize {
        let ids: Vec<CorrelationId> = self.pending.iter().map(|e| *e.key()).collect();
        ids.into_iter()
            .filter(|id| self.remove_on_error(*id, error()))
            .count()
    }

    /// Fail entries older than their own timeout. Bounds orphan leaks.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(CorrelationId, Duration)> = self
            .pending
            .iter()
            .filter_map(|e| {
                let elapsed = now.duration_since(e.created_at);
                (elapsed > e.timeout).then_some((*e.key(), e.timeout))
            })
            .collect();

        let mut removed = 0;
        for (id, timeout) in expired {
            // remove_if: the reply may have landed since the scan.
            if let Some((_, entry)) = self.pending.remove_if(&id, |_, e| e.created_at.elapsed() > e.timeout) {
                warn!(
                    correlation_id = %id,
                    kind = %entry.kind,
                    timeout_ms = timeout.as_millis(),
                    "Removing expired pending request"
                );
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                let _ = entry.sender.send(Err(TransportError::TimedOut(timeout)));
                removed += 1;
            }
        }
        removed
    }

    /// Number of requests currently in flight.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            registered: self.stats.total_registered.load(Ordering::Relaxed),
            completed: self.stats.total_completed.load(Ordering::Relaxed),
            timeouts: self.stats.total_timeouts.load(Ordering::Relaxed),
            cancelled: self.stats.total_cancelled.load(Ordering::Relaxed),
            failed: self.stats.total_failed.load(Ordering::Relaxed),
            unknown: self.stats.total_unknown.load(Ordering::Relaxed),
        }
    }

    fn count_failure(&self, error: &TransportError) {
        let counter = match error {
            TransportError::Cancelled => &self.stats.total_cancelled,
            TransportError::TimedOut(_) => &self.stats.total_timeouts,
            _ => &self.stats.total_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
