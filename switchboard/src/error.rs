//! Error types for the switchboard dispatch core.

use crate::codec::CodecError;
use crate::envelope::CorrelationId;
use thiserror::Error;

/// Errors raised by the destination registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A destination with this name is already registered.
    #[error("duplicate destination: {0}")]
    DuplicateDestination(String),

    /// No destination is registered under this name.
    #[error("unknown destination: {0}")]
    UnknownDestination(String),
}

/// Failure raised by handler code.
///
/// Wraps whatever the handler reported so the dispatcher can propagate it
/// synchronously or route it to the failure policy asynchronously.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a handler error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message reported by the handler.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CodecError> for HandlerError {
    fn from(err: CodecError) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors raised on the send path of the message dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The envelope named a destination the registry does not know.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The destination's queue is full and the backpressure policy rejected
    /// the enqueue. Retryable by caller policy.
    #[error("queue full for destination: {0}")]
    QueueFull(String),

    /// No correlated reply arrived within the deadline.
    #[error("timed out waiting for reply (correlation id {0})")]
    CorrelationTimeout(CorrelationId),

    /// The reply channel was dropped before a reply was produced
    /// (worker gone or bus shut down mid-flight).
    #[error("reply abandoned (correlation id {0})")]
    ReplyAbandoned(CorrelationId),

    /// Handler code failed. On the synchronous path this is the caller's
    /// error; on the asynchronous path it is delivered as the reply when a
    /// caller is waiting.
    #[error("handler execution failed: {0}")]
    HandlerExecution(#[from] HandlerError),

    /// Payload encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The destination's queue has been closed by shutdown.
    #[error("message bus is closed")]
    BusClosed,
}

/// Errors raised by the proxy invocation adapter.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No binding registered for this service method.
    #[error("no binding for {service}.{method}")]
    UnboundMethod {
        /// Service name the caller used.
        service: String,
        /// Method name the caller used.
        method: String,
    },

    /// The method's declared proxy mode does not allow this call shape
    /// (e.g. `invoke` on a fire-and-forget binding).
    #[error("{service}.{method} is bound {bound:?}, not {expected:?}")]
    ModeMismatch {
        /// Service name the caller used.
        service: String,
        /// Method name the caller used.
        method: String,
        /// The mode the binding declares.
        bound: crate::proxy::ProxyCallMode,
        /// The mode this call shape requires.
        expected: crate::proxy::ProxyCallMode,
    },

    /// A blocking invocation completed without a reply payload.
    #[error("no reply payload from {service}.{method}")]
    EmptyReply {
        /// Service name the caller used.
        service: String,
        /// Method name the caller used.
        method: String,
    },

    /// The underlying send failed.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Request or reply payload conversion failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}
