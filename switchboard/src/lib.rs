//! # Switchboard
//!
//! Destination-based message dispatch with a per-caller synchronous-mode
//! override.
//!
//! Service calls are routed to named destinations either synchronously
//! (inline on the caller's task) or asynchronously (bounded queue drained
//! by a worker pool, with correlated replies for request/response). A
//! per-caller [`ProxyMode`] context can force synchronous delivery for a
//! bounded scope — the mechanism test infrastructure uses to make
//! asynchronous destinations deterministic.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ ServiceProxy (proxy)                                     │
//! │   typed invoke/notify → binding table → envelope         │
//! ├──────────────────────────────────────────────────────────┤
//! │ MessageBus (dispatch)                                    │
//! │   registry lookup → effective mode (ProxyMode override)  │
//! │   SYNC: handlers inline   ASYNC: queue → worker pool     │
//! │   correlation table for request/response                 │
//! ├────────────────────────────┬─────────────────────────────┤
//! │ DestinationRegistry        │ SyncScopeController (scope)  │
//! │   name → Destination       │   directive lookup,          │
//! │   handlers, queue, stats   │   capture/force/restore      │
//! └────────────────────────────┴─────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use switchboard::prelude::*;
//!
//! let bus = Arc::new(MessageBus::new());
//! bus.register(DestinationConfig::asynchronous("search.suggest"))?;
//! bus.add_handler("search.suggest", Arc::new(SuggestHandler))?;
//!
//! // Production: enqueued, ack only.
//! let ctx = ProxyMode::new();
//! bus.send(&ctx, Envelope::new("search.suggest", payload)).await?;
//!
//! // Test scope: forced synchronous, handler result inline.
//! ctx.set_force_sync(true);
//! let reply = bus.call(&ctx, Envelope::new("search.suggest", payload)).await?;
//! ```

#![deny(missing_docs)]

pub mod codec;
pub mod correlation;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod prelude;
pub mod proxy;
pub mod registry;
pub mod scope;

pub use codec::{CodecError, JsonCodec, MessageCodec};
pub use correlation::ReplyHandle;
pub use dispatch::{
    DeadLetterSink, FailurePolicy, LoggingDeadLetterSink, MessageBus, RoundTrip, SendOutcome,
};
pub use envelope::{CorrelationId, DeliveryMode, Envelope, EnvelopeFlags};
pub use error::{DispatchError, HandlerError, ProxyError, RegistryError};
pub use handler::MessageHandler;
pub use proxy::{MethodBinding, ProxyBindings, ProxyCallMode, ProxyMode, ServiceProxy};
pub use registry::{
    BackpressurePolicy, Destination, DestinationConfig, DestinationRegistry, DestinationStats,
    HandlerId, StatsSnapshot,
};
pub use scope::{
    DirectiveLocator, DirectiveTable, ScopeTarget, SyncDirective, SyncHandler, SyncScope,
    SyncScopeController,
};
