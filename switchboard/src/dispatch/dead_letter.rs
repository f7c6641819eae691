//! Failure policy for asynchronous handler errors.
//!
//! An asynchronous handler failure never crashes the worker pool and is
//! never silently discarded: when no caller is waiting on a correlated
//! reply, the destination's [`FailurePolicy`] decides whether the envelope
//! is logged and dropped or handed to a dead-letter sink.

use crate::envelope::Envelope;
use crate::error::HandlerError;
use std::fmt;
use std::sync::Arc;

/// Sink receiving envelopes whose asynchronous handling failed.
pub trait DeadLetterSink: Send + Sync {
    /// Consume a failed envelope together with the handler failure.
    fn consume(&self, envelope: Envelope, error: HandlerError);
}

/// Dead-letter sink that records failures through `tracing` only.
#[derive(Debug, Default)]
pub struct LoggingDeadLetterSink;

impl DeadLetterSink for LoggingDeadLetterSink {
    fn consume(&self, envelope: Envelope, error: HandlerError) {
        tracing::error!(
            destination = %envelope.destination,
            correlation_id = %envelope.correlation_id,
            error = %error,
            "dead-lettered envelope"
        );
    }
}

/// What a destination does with an uncorrelated asynchronous failure.
#[derive(Clone, Default)]
pub enum FailurePolicy {
    /// Log the failure and drop the envelope.
    #[default]
    LogAndDrop,

    /// Hand the envelope and failure to a dead-letter sink.
    DeadLetter(Arc<dyn DeadLetterSink>),
}

impl fmt::Debug for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::LogAndDrop => f.write_str("LogAndDrop"),
            FailurePolicy::DeadLetter(_) => f.write_str("DeadLetter(..)"),
        }
    }
}

impl FailurePolicy {
    /// Apply the policy to a failed envelope.
    pub(crate) fn apply(&self, envelope: Envelope, error: HandlerError) {
        match self {
            FailurePolicy::LogAndDrop => {
                tracing::error!(
                    destination = %envelope.destination,
                    correlation_id = %envelope.correlation_id,
                    error = %error,
                    "handler failed, dropping envelope"
                );
            }
            FailurePolicy::DeadLetter(sink) => sink.consume(envelope, error),
        }
    }
}
