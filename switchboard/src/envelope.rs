//! Message envelope and delivery mode types.

use bitflags::bitflags;
use std::fmt;

/// How a destination delivers messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Handlers run inline on the caller's task; the caller blocks until
    /// they complete and observes their result or failure directly.
    Synchronous,

    /// Envelopes are enqueued to the destination's worker pool; the caller
    /// gets an acknowledgment, or waits on a correlated reply.
    Asynchronous,
}

/// Identifier matching an asynchronous reply to its originating request.
///
/// Unique per bus instance (monotonically increasing), not globally unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Sentinel for envelopes the bus has not yet stamped.
    pub const UNASSIGNED: CorrelationId = CorrelationId(0);

    /// Create a correlation id from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Control flags stamped on an envelope by the send path.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EnvelopeFlags: u8 {
        /// A caller is waiting on the correlated reply.
        const EXPECTS_REPLY = 1 << 0;

        /// The proxy mode context forced synchronous delivery for this send,
        /// overriding the destination's configured mode.
        const FORCED_SYNC = 1 << 1;
    }
}

/// Unit of dispatch: payload plus destination name plus correlation id.
///
/// Created per call, discarded after delivery completes or times out. The
/// payload is opaque to the dispatcher; the proxy invocation adapter and
/// handler code agree on its format through a [`MessageCodec`].
///
/// [`MessageCodec`]: crate::codec::MessageCodec
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Name of the destination this envelope is addressed to.
    pub destination: String,

    /// Stamped by the bus on send; [`CorrelationId::UNASSIGNED`] before that.
    pub correlation_id: CorrelationId,

    /// Opaque application payload.
    pub payload: Vec<u8>,

    /// Control flags stamped by the send path.
    pub flags: EnvelopeFlags,
}

impl Envelope {
    /// Create an envelope addressed to `destination`.
    pub fn new(destination: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            destination: destination.into(),
            correlation_id: CorrelationId::UNASSIGNED,
            payload,
            flags: EnvelopeFlags::empty(),
        }
    }

    /// Whether a caller is waiting on the correlated reply.
    pub fn expects_reply(&self) -> bool {
        self.flags.contains(EnvelopeFlags::EXPECTS_REPLY)
    }

    /// Whether the proxy mode context forced synchronous delivery.
    pub fn forced_sync(&self) -> bool {
        self.flags.contains(EnvelopeFlags::FORCED_SYNC)
    }
}
