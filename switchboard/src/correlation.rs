//! Request-response correlation for asynchronous sends.
//!
//! The bus registers a pending reply *before* enqueueing a request, so a
//! worker finishing first can never miss the waiter. The caller suspends on
//! a [`ReplyHandle`] until the worker resolves the correlation, the deadline
//! elapses, or the caller cancels.
//!
//! ```text
//! Request flow:
//!   1. Stamp correlation id on the envelope
//!   2. register() an entry in the pending table (oneshot sender)
//!   3. Enqueue the envelope
//!   4. ReplyHandle::wait() with the destination's reply timeout
//!
//! Reply flow:
//!   5. Worker runs handlers, calls complete() with the result
//!   6. oneshot fires, waiter resumes
//!
//! Timeout / cancellation:
//!   5'. wait() deadline elapses (or cancel() is called)
//!   6'. Entry is abandoned; a late complete() finds nothing and the
//!       worker discards the reply with a debug log
//! ```

use crate::envelope::CorrelationId;
use crate::error::DispatchError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// Result a worker delivers for a correlated request.
pub type ReplyResult = Result<Option<Vec<u8>>, DispatchError>;

/// Factory for correlation ids, monotonically increasing from 1.
#[derive(Debug)]
pub(crate) struct CorrelationIdFactory {
    next_id: AtomicU64,
}

impl CorrelationIdFactory {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn next(&self) -> CorrelationId {
        CorrelationId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Table of pending correlated requests, keyed by correlation id.
///
/// Shared between the bus (registration, abandonment) and destination
/// workers (completion). This is the only mutable structure shared across
/// the send and delivery sides.
#[derive(Debug, Default)]
pub(crate) struct PendingReplies {
    inner: Mutex<HashMap<CorrelationId, oneshot::Sender<ReplyResult>>>,
}

impl PendingReplies {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a pending reply, returning the receiver the caller waits on.
    pub(crate) fn register(&self, id: CorrelationId) -> oneshot::Receiver<ReplyResult> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        rx
    }

    /// Resolve a pending reply.
    ///
    /// Returns `false` when no entry exists for `id` (the wait was abandoned
    /// or timed out); the reply is then the worker's to discard.
    pub(crate) fn complete(&self, id: CorrelationId, result: ReplyResult) -> bool {
        let sender = self.lock().remove(&id);
        match sender {
            Some(tx) => {
                if tx.send(result).is_err() {
                    tracing::debug!(correlation_id = %id, "reply receiver dropped before completion");
                }
                true
            }
            None => false,
        }
    }

    /// Drop the entry for `id`, marking the correlation as abandoned.
    ///
    /// Returns `false` if the entry was already resolved or never existed.
    pub(crate) fn abandon(&self, id: CorrelationId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Number of requests currently awaiting replies.
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CorrelationId, oneshot::Sender<ReplyResult>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Caller-side handle for one correlated request.
///
/// Obtained from [`MessageBus::begin_call`] when the effective mode is
/// asynchronous. Consume it with [`wait`](ReplyHandle::wait) or
/// [`cancel`](ReplyHandle::cancel).
///
/// [`MessageBus::begin_call`]: crate::dispatch::MessageBus::begin_call
#[derive(Debug)]
pub struct ReplyHandle {
    id: CorrelationId,
    rx: oneshot::Receiver<ReplyResult>,
    pending: Arc<PendingReplies>,
}

impl ReplyHandle {
    pub(crate) fn register(pending: Arc<PendingReplies>, id: CorrelationId) -> Self {
        let rx = pending.register(id);
        Self { id, rx, pending }
    }

    /// The correlation id this handle waits on.
    pub fn correlation_id(&self) -> CorrelationId {
        self.id
    }

    /// Suspend until the reply arrives or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::CorrelationTimeout`] when the deadline elapses;
    ///   the correlation is abandoned and a late reply will be discarded.
    /// - [`DispatchError::ReplyAbandoned`] when the reply channel closed
    ///   without a result (worker gone or bus shut down mid-flight).
    /// - Any error the handler produced, delivered as the reply.
    pub async fn wait(self, timeout: Duration) -> ReplyResult {
        let Self { id, rx, pending } = self;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_closed)) => Err(DispatchError::ReplyAbandoned(id)),
            Err(_elapsed) => {
                pending.abandon(id);
                Err(DispatchError::CorrelationTimeout(id))
            }
        }
    }

    /// Cancel the wait, releasing the caller and abandoning the correlation.
    ///
    /// A reply arriving after cancellation is discarded by the worker.
    pub fn cancel(self) {
        if self.pending.abandon(self.id) {
            tracing::debug!(correlation_id = %self.id, "correlated wait cancelled");
        }
    }
}
