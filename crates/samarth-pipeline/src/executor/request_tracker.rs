use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::PipelineError;

/// Final result of one logical request.
pub type Outcome = Result<Value, PipelineError>;

struct PendingRequest {
    created_at: Instant,
    deadline: Instant,
    responder: oneshot::Sender<Outcome>,
}

/// Tracks pending requests and their response channels
///
/// Used to implement request-response over the Event Bus:
/// 1. Executor publishes the entry event with a unique correlation id
/// 2. Calls track_request() to get a receiver
/// 3. Waits on the receiver (with timeout)
/// 4. Terminal-topic handlers call complete_request() with the outcome
///
/// Methods are synchronous because bus handlers are. The first completion for
/// an id removes it, so later events for the same id are unroutable.
#[derive(Default)]
pub struct RequestTracker {
    pending: Mutex<HashMap<Uuid, PendingRequest>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new request and return a receiver for its outcome
    pub fn track_request(
        &self,
        correlation_id: Uuid,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<Outcome>, PipelineError> {
        let mut pending = self.pending.lock();
        if pending.contains_key(&correlation_id) {
            return Err(PipelineError::DuplicateCorrelation(correlation_id));
        }

        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        pending.insert(
            correlation_id,
            PendingRequest {
                created_at: now,
                deadline: now + timeout,
                responder: tx,
            },
        );
        Ok(rx)
    }

    /// Resolve a tracked request
    ///
    /// Returns false when the id is unknown (already resolved, expired or
    /// never tracked); the outcome is dropped in that case.
    pub fn complete_request(&self, correlation_id: Uuid, outcome: Outcome) -> bool {
        let Some(request) = self.pending.lock().remove(&correlation_id) else {
            return false;
        };

        tracing::debug!(
            correlation_id = %correlation_id,
            elapsed_ms = request.created_at.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "request resolved"
        );
        if Instant::now() > request.deadline {
            tracing::debug!(correlation_id = %correlation_id, "request resolved after its deadline");
        }

        // Ignore send errors (receiver may have been dropped)
        let _ = request.responder.send(outcome);
        true
    }

    /// Stop tracking a request. Returns false if it already resolved.
    pub fn cancel_request(&self, correlation_id: Uuid) -> bool {
        self.pending.lock().remove(&correlation_id).is_some()
    }

    /// Drop every request whose deadline has passed, returning their ids.
    pub fn expire_overdue(&self, now: Instant) -> Vec<Uuid> {
        let mut pending = self.pending.lock();
        let overdue: Vec<Uuid> = pending
            .iter()
            .filter(|(_, request)| request.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &overdue {
            pending.remove(id);
        }
        overdue
    }

    pub fn is_pending(&self, correlation_id: Uuid) -> bool {
        self.pending.lock().contains_key(&correlation_id)
    }

    /// Get the number of pending requests (for monitoring)
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl std::fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTracker")
            .field("pending", &self.pending_count())
            .finish()
    }
}
