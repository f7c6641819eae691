//! Message bus: destination resolution and mode-aware delivery.
//!
//! The bus owns the destination registry, the correlation table, and the
//! correlation id factory. Every send resolves the destination, computes
//! the effective delivery mode (the proxy mode context overrides the
//! destination default), and either runs handlers inline or enqueues to
//! the destination's worker pool.
//!
//! ```text
//! send(ctx, envelope)
//!   │
//!   ├─ registry.lookup ──────────── UnknownDestination
//!   │
//!   ├─ effective mode
//!   │    ctx.force_sync → SYNCHRONOUS (always)
//!   │    otherwise      → destination default
//!   │
//!   ├─ SYNCHRONOUS: run handlers inline, caller observes result/failure
//!   └─ ASYNCHRONOUS: enqueue (backpressure), ack immediately;
//!        correlated callers registered a pending reply first
//! ```

use crate::correlation::{CorrelationIdFactory, PendingReplies, ReplyHandle};
use crate::envelope::{CorrelationId, DeliveryMode, Envelope, EnvelopeFlags};
use crate::error::{DispatchError, RegistryError};
use crate::handler::MessageHandler;
use crate::proxy::ProxyMode;
use crate::registry::{Destination, DestinationConfig, DestinationRegistry, HandlerId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::worker::spawn_workers;

/// What the send path did with an envelope.
#[derive(Debug)]
pub enum SendOutcome {
    /// The effective mode was synchronous: handlers already ran on the
    /// caller's task and this is their reply, if any produced one.
    Delivered {
        /// Reply payload from the first responding handler.
        reply: Option<Vec<u8>>,
    },

    /// The envelope was enqueued for worker delivery; this is only an
    /// acknowledgment, not a handler result.
    Enqueued {
        /// Correlation id stamped on the enqueued envelope.
        correlation_id: CorrelationId,
    },
}

/// State of a request/response send after [`MessageBus::begin_call`].
#[derive(Debug)]
pub enum RoundTrip {
    /// The effective mode was synchronous; the reply is already here.
    Completed(Option<Vec<u8>>),

    /// The envelope was enqueued; wait on (or cancel) the handle.
    Pending(ReplyHandle),
}

/// Destination-based message dispatcher.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```rust,ignore
/// let bus = Arc::new(MessageBus::new());
/// bus.register(DestinationConfig::asynchronous("search.suggest"))?;
/// bus.add_handler("search.suggest", Arc::new(SuggestHandler))?;
///
/// let ctx = ProxyMode::new();
/// let outcome = bus.send(&ctx, Envelope::new("search.suggest", payload)).await?;
/// ```
#[derive(Debug)]
pub struct MessageBus {
    registry: DestinationRegistry,
    pending: Arc<PendingReplies>,
    correlation_ids: CorrelationIdFactory,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    /// Create a bus with an empty registry.
    pub fn new() -> Self {
        Self {
            registry: DestinationRegistry::new(),
            pending: Arc::new(PendingReplies::new()),
            correlation_ids: CorrelationIdFactory::new(),
        }
    }

    /// The destination registry.
    pub fn registry(&self) -> &DestinationRegistry {
        &self.registry
    }

    /// Register a destination from its configuration.
    ///
    /// Asynchronous destinations get their bounded queue and worker pool
    /// here, so registration must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateDestination`] if the name is taken.
    pub fn register(&self, config: DestinationConfig) -> Result<Arc<Destination>, RegistryError> {
        let destination = Arc::new(Destination::from_config(&config));
        match destination.mode() {
            DeliveryMode::Synchronous => {
                self.registry.register(Arc::clone(&destination))?;
            }
            DeliveryMode::Asynchronous => {
                let (sender, receiver) = mpsc::channel(config.queue_capacity);
                destination.install_queue(sender);
                if let Err(err) = self.registry.register(Arc::clone(&destination)) {
                    destination.close();
                    return Err(err);
                }
                spawn_workers(
                    Arc::clone(&destination),
                    Arc::clone(&self.pending),
                    receiver,
                    config.workers,
                );
            }
        }
        Ok(destination)
    }

    /// Register a handler on a destination.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownDestination`] if the destination is absent.
    pub fn add_handler(
        &self,
        destination: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<HandlerId, RegistryError> {
        Ok(self.registry.lookup(destination)?.add_handler(handler))
    }

    /// Remove a handler from a destination.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownDestination`] if the destination is absent.
    pub fn remove_handler(
        &self,
        destination: &str,
        id: HandlerId,
    ) -> Result<bool, RegistryError> {
        Ok(self.registry.lookup(destination)?.remove_handler(id))
    }

    /// Send an envelope without waiting for a reply.
    ///
    /// With a forcing context, or to a synchronous destination, handlers
    /// run inline and the outcome carries their reply; otherwise the
    /// envelope is enqueued and the outcome is an acknowledgment.
    ///
    /// # Errors
    ///
    /// Unknown destination, queue backpressure (`QueueFull`), closed bus,
    /// or — on the synchronous path only — the handler's own failure.
    pub async fn send(
        &self,
        ctx: &ProxyMode,
        envelope: Envelope,
    ) -> Result<SendOutcome, DispatchError> {
        let destination = self.registry.lookup(&envelope.destination)?;
        let mut envelope = envelope;
        envelope.correlation_id = self.correlation_ids.next();

        match effective_mode(ctx, &destination, &mut envelope) {
            DeliveryMode::Synchronous => {
                let reply = self.deliver_inline(&destination, &envelope).await?;
                Ok(SendOutcome::Delivered { reply })
            }
            DeliveryMode::Asynchronous => {
                let correlation_id = envelope.correlation_id;
                tracing::debug!(
                    destination = %destination.name(),
                    correlation_id = %correlation_id,
                    "enqueueing one-way envelope"
                );
                destination.enqueue(envelope).await?;
                destination.stats().record_sent();
                Ok(SendOutcome::Enqueued { correlation_id })
            }
        }
    }

    /// Send a request and wait for the correlated reply, using the
    /// destination's configured reply timeout.
    ///
    /// # Errors
    ///
    /// Everything [`send`](Self::send) can raise, plus
    /// [`DispatchError::CorrelationTimeout`] and the handler's failure
    /// delivered as the reply.
    pub async fn call(
        &self,
        ctx: &ProxyMode,
        envelope: Envelope,
    ) -> Result<Option<Vec<u8>>, DispatchError> {
        let timeout = self.registry.lookup(&envelope.destination)?.reply_timeout();
        self.call_with_timeout(ctx, envelope, timeout).await
    }

    /// Send a request and wait for the correlated reply with an explicit
    /// deadline.
    pub async fn call_with_timeout(
        &self,
        ctx: &ProxyMode,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, DispatchError> {
        match self.begin_call(ctx, envelope).await? {
            RoundTrip::Completed(reply) => Ok(reply),
            RoundTrip::Pending(handle) => handle.wait(timeout).await,
        }
    }

    /// Start a request/response send, returning either the inline reply or
    /// a [`ReplyHandle`] the caller may wait on or cancel.
    ///
    /// The pending reply is registered *before* the envelope is enqueued,
    /// so a fast worker can never complete into the void.
    pub async fn begin_call(
        &self,
        ctx: &ProxyMode,
        envelope: Envelope,
    ) -> Result<RoundTrip, DispatchError> {
        let destination = self.registry.lookup(&envelope.destination)?;
        let mut envelope = envelope;
        envelope.correlation_id = self.correlation_ids.next();
        envelope.flags |= EnvelopeFlags::EXPECTS_REPLY;

        match effective_mode(ctx, &destination, &mut envelope) {
            DeliveryMode::Synchronous => {
                let reply = self.deliver_inline(&destination, &envelope).await?;
                Ok(RoundTrip::Completed(reply))
            }
            DeliveryMode::Asynchronous => {
                let correlation_id = envelope.correlation_id;
                let handle = ReplyHandle::register(Arc::clone(&self.pending), correlation_id);
                tracing::debug!(
                    destination = %destination.name(),
                    correlation_id = %correlation_id,
                    "enqueueing correlated request"
                );
                if let Err(err) = destination.enqueue(envelope).await {
                    handle.cancel();
                    return Err(err);
                }
                destination.stats().record_sent();
                Ok(RoundTrip::Pending(handle))
            }
        }
    }

    /// Number of requests currently awaiting correlated replies.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Close every destination queue. Workers drain what is already
    /// enqueued and exit; later asynchronous sends fail with `BusClosed`.
    pub fn shutdown(&self) {
        tracing::debug!("message bus shutting down");
        self.registry.shutdown();
    }

    async fn deliver_inline(
        &self,
        destination: &Destination,
        envelope: &Envelope,
    ) -> Result<Option<Vec<u8>>, DispatchError> {
        destination.stats().record_sent();
        tracing::debug!(
            destination = %destination.name(),
            correlation_id = %envelope.correlation_id,
            forced = envelope.forced_sync(),
            "delivering inline"
        );
        match destination.run_handlers(envelope).await {
            Ok(reply) => {
                destination.stats().record_delivered();
                Ok(reply)
            }
            Err(err) => {
                destination.stats().record_failed();
                Err(DispatchError::HandlerExecution(err))
            }
        }
    }
}

/// Resolve the delivery mode for one send: a forcing proxy mode context
/// wins over the destination default, and the override is stamped on the
/// envelope for observability.
fn effective_mode(
    ctx: &ProxyMode,
    destination: &Destination,
    envelope: &mut Envelope,
) -> DeliveryMode {
    if ctx.is_force_sync() {
        envelope.flags |= EnvelopeFlags::FORCED_SYNC;
        DeliveryMode::Synchronous
    } else {
        destination.mode()
    }
}
