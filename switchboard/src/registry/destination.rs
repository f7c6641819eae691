//! Destination: a named endpoint owning handlers and (when asynchronous)
//! a bounded work queue.

use crate::envelope::{DeliveryMode, Envelope};
use crate::error::{DispatchError, HandlerError};
use crate::handler::MessageHandler;
use crate::registry::{BackpressurePolicy, DestinationConfig, DestinationStats};
use crate::dispatch::FailurePolicy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};

/// Handle identifying one registered handler, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// A named logical endpoint to which messages are sent for handling.
///
/// Identity and configuration are immutable after registration; only the
/// handler list changes at runtime. Asynchronous destinations additionally
/// own the sending half of their bounded work queue — the receiving half is
/// drained by the worker pool the bus spawns at registration.
pub struct Destination {
    name: String,
    mode: DeliveryMode,
    backpressure: BackpressurePolicy,
    failure_policy: FailurePolicy,
    reply_timeout: Duration,
    handlers: RwLock<Vec<(HandlerId, Arc<dyn MessageHandler>)>>,
    next_handler_id: AtomicU64,
    queue: Mutex<Option<mpsc::Sender<Envelope>>>,
    stats: DestinationStats,
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("handlers", &self.handler_count())
            .finish_non_exhaustive()
    }
}

impl Destination {
    pub(crate) fn from_config(config: &DestinationConfig) -> Self {
        Self {
            name: config.name.clone(),
            mode: config.mode,
            backpressure: config.backpressure,
            failure_policy: config.failure_policy.clone(),
            reply_timeout: config.reply_timeout,
            handlers: RwLock::new(Vec::new()),
            next_handler_id: AtomicU64::new(1),
            queue: Mutex::new(None),
            stats: DestinationStats::default(),
        }
    }

    /// The destination's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured delivery mode.
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Default deadline for correlated replies to this destination.
    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// Delivery counters for this destination.
    pub fn stats(&self) -> &DestinationStats {
        &self.stats
    }

    /// Number of currently registered handlers.
    pub fn handler_count(&self) -> usize {
        self.read_handlers().len()
    }

    /// Register a handler. Every handler observes each delivered envelope.
    pub fn add_handler(&self, handler: Arc<dyn MessageHandler>) -> HandlerId {
        let id = HandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed));
        self.write_handlers().push((id, handler));
        id
    }

    /// Remove a handler by id. Returns `false` if it was already gone.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.write_handlers();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    pub(crate) fn failure_policy(&self) -> &FailurePolicy {
        &self.failure_policy
    }

    pub(crate) fn install_queue(&self, sender: mpsc::Sender<Envelope>) {
        *self.lock_queue() = Some(sender);
    }

    /// Close the work queue. Workers drain what is already enqueued and
    /// exit; subsequent asynchronous sends fail with `BusClosed`.
    pub(crate) fn close(&self) {
        if self.lock_queue().take().is_some() {
            tracing::debug!(destination = %self.name, "destination queue closed");
        }
    }

    /// Run every registered handler inline, returning the first reply.
    ///
    /// The first handler failure aborts the run and propagates; handlers
    /// registered after it do not observe the envelope.
    pub(crate) async fn run_handlers(
        &self,
        envelope: &Envelope,
    ) -> Result<Option<Vec<u8>>, HandlerError> {
        // Snapshot under the lock; handler futures must not hold the guard.
        let handlers: Vec<Arc<dyn MessageHandler>> = self
            .read_handlers()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        if handlers.is_empty() {
            tracing::debug!(destination = %self.name, "no handlers registered");
            return Ok(None);
        }

        let mut reply = None;
        for handler in handlers {
            let outcome = handler.handle(envelope).await?;
            if reply.is_none() {
                reply = outcome;
            }
        }
        Ok(reply)
    }

    /// Enqueue an envelope for worker delivery, honoring backpressure.
    pub(crate) async fn enqueue(&self, envelope: Envelope) -> Result<(), DispatchError> {
        let sender = self
            .lock_queue()
            .as_ref()
            .cloned()
            .ok_or(DispatchError::BusClosed)?;

        match self.backpressure {
            BackpressurePolicy::Block { timeout } => sender
                .send_timeout(envelope, timeout)
                .await
                .map_err(|err| match err {
                    SendTimeoutError::Timeout(_) => DispatchError::QueueFull(self.name.clone()),
                    SendTimeoutError::Closed(_) => DispatchError::BusClosed,
                }),
            BackpressurePolicy::Fail => sender.try_send(envelope).map_err(|err| match err {
                TrySendError::Full(_) => DispatchError::QueueFull(self.name.clone()),
                TrySendError::Closed(_) => DispatchError::BusClosed,
            }),
        }
    }

    fn read_handlers(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, Vec<(HandlerId, Arc<dyn MessageHandler>)>> {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_handlers(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, Vec<(HandlerId, Arc<dyn MessageHandler>)>> {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<Envelope>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
