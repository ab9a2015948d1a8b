//! # Pending Request Table
//!
//! Maps each in-flight [`CorrelationId`] to the oneshot sender that will
//! wake its caller.
//!
//! ## Exactly-once completion
//!
//! An entry can be finished four ways: a matching response, its own
//! deadline, the periodic sweep, or cancellation. Each of those starts by
//! *removing* the entry from the `DashMap`, and removal of one key is atomic.
//! Whoever gets the entry out of the map delivers the outcome. Everyone else
//! finds nothing and does nothing. A late response therefore can't revive
//! an entry, and a timed-out caller can't be completed twice.
//!
//! `DashMap` shards its locks, so registering or completing one id never
//! contends with unrelated ids.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::metrics::ClientMetrics;
use super::ClientError;
use crate::wire::{CorrelationId, MessageBody};

/// What a waiting caller eventually receives.
pub type Completion = Result<MessageBody, ClientError>;

struct PendingEntry {
    sender: oneshot::Sender<Completion>,
    registered_at: Instant,
    deadline: Instant,
    timeout: Duration,
}

/// The pending table. Owned by one [`super::CorrelationClient`]; never
/// global.
pub struct PendingRequests {
    entries: DashMap<CorrelationId, PendingEntry>,
    metrics: ClientMetrics,
}

impl PendingRequests {
    pub fn new(metrics: ClientMetrics) -> Self {
        Self {
            entries: DashMap::new(),
            metrics,
        }
    }

    /// Adds an entry that expires `timeout` from now. Fails if `id` is
    /// already pending.
    pub fn register(
        &self,
        id: CorrelationId,
        timeout: Duration,
    ) -> Result<(oneshot::Receiver<Completion>, Instant), ClientError> {
        let now = Instant::now();
        let deadline = now + timeout;
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(ClientError::DuplicateCorrelationId(id)),
            Entry::Vacant(slot) => {
                let (sender, receiver) = oneshot::channel();
                slot.insert(PendingEntry {
                    sender,
                    registered_at: now,
                    deadline,
                    timeout,
                });
                self.metrics.pending_requests.inc();
                debug!(correlation_id = %id, timeout_ms = timeout.as_millis() as u64, "request registered");
                Ok((receiver, deadline))
            }
        }
    }

    /// Delivers a response. Returns `false`, after logging, when nothing is
    /// waiting for `id`.
    pub fn complete(&self, id: CorrelationId, body: MessageBody) -> bool {
        let Some((_, entry)) = self.entries.remove(&id) else {
            warn!(correlation_id = %id, kind = body.kind(), "dropping response with no pending request");
            self.metrics.responses_dropped_total.inc();
            return false;
        };
        self.metrics.pending_requests.dec();
        self.metrics.responses_matched_total.inc();
        self.metrics
            .response_latency_seconds
            .observe(entry.registered_at.elapsed().as_secs_f64());
        if entry.sender.send(Ok(body)).is_err() {
            debug!(correlation_id = %id, "caller went away before its response arrived");
        }
        true
    }

    /// Times out `id` now, regardless of its deadline. Returns `false` if the
    /// entry was already gone.
    pub fn expire(&self, id: CorrelationId) -> bool {
        let Some((_, entry)) = self.entries.remove(&id) else {
            return false;
        };
        self.finish_timed_out(id, entry);
        true
    }

    /// Times out every entry whose deadline is at or before `now`.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        // Collect ids first so no shard lock is held while removing.
        let overdue: Vec<CorrelationId> = self
            .entries
            .iter()
            .filter(|entry| entry.value().deadline <= now)
            .map(|entry| *entry.key())
            .collect();

        let mut count = 0;
        for id in overdue {
            if let Some((_, entry)) = self.entries.remove_if(&id, |_, e| e.deadline <= now) {
                self.finish_timed_out(id, entry);
                count += 1;
            }
        }
        if count > 0 {
            debug!(count, "swept expired requests");
        }
        count
    }

    /// Cancels `id`. Returns `false` if the entry was already gone.
    pub fn cancel(&self, id: CorrelationId) -> bool {
        let Some((_, entry)) = self.entries.remove(&id) else {
            return false;
        };
        self.metrics.pending_requests.dec();
        self.metrics.cancellations_total.inc();
        let _ = entry
            .sender
            .send(Err(ClientError::Cancelled { correlation_id: id }));
        debug!(correlation_id = %id, "request cancelled");
        true
    }

    /// Cancels everything. Used on shutdown.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<CorrelationId> = self.entries.iter().map(|e| *e.key()).collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    /// Fails everything with [`ClientError::Disconnected`]. Used when the
    /// connection drops under waiting callers.
    pub fn fail_all_disconnected(&self) -> usize {
        let ids: Vec<CorrelationId> = self.entries.iter().map(|e| *e.key()).collect();
        let mut count = 0;
        for id in ids {
            if let Some((_, entry)) = self.entries.remove(&id) {
                self.metrics.pending_requests.dec();
                let _ = entry.sender.send(Err(ClientError::Disconnected));
                count += 1;
            }
        }
        count
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn finish_timed_out(&self, id: CorrelationId, entry: PendingEntry) {
        self.metrics.pending_requests.dec();
        self.metrics.timeouts_total.inc();
        let timeout_ms = entry.timeout.as_millis() as u64;
        warn!(correlation_id = %id, timeout_ms, "timed out waiting for response from node");
        let _ = entry.sender.send(Err(ClientError::Timeout {
            correlation_id: id,
            timeout_ms,
        }));
    }
}
