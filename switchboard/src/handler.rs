//! Handler trait for destination message delivery.

use crate::envelope::Envelope;
use crate::error::HandlerError;
use async_trait::async_trait;

/// Handler registered on a destination.
///
/// Every handler registered on a destination observes each envelope. A
/// handler that produces a reply returns `Ok(Some(payload))`; most handlers
/// consume without responding and return `Ok(None)`. For request/response
/// sends, the first `Some` reply wins.
///
/// Handlers on a parallel destination run concurrently across envelopes and
/// must not assume exclusive access to destination-level state.
///
/// # Example
///
/// ```rust,ignore
/// struct SuggestHandler;
///
/// #[async_trait]
/// impl MessageHandler for SuggestHandler {
///     async fn handle(&self, envelope: &Envelope) -> Result<Option<Vec<u8>>, HandlerError> {
///         let query: String = JsonCodec.decode(&envelope.payload)?;
///         let suggestions = vec![format!("{query} portal")];
///         Ok(Some(JsonCodec.encode(&suggestions)?))
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one envelope, optionally producing a reply payload.
    ///
    /// # Errors
    ///
    /// A failure propagates to the caller unchanged on the synchronous path;
    /// on the asynchronous path it is delivered as the correlated reply when
    /// a caller is waiting, and otherwise routed to the destination's
    /// failure policy.
    async fn handle(&self, envelope: &Envelope) -> Result<Option<Vec<u8>>, HandlerError>;
}
