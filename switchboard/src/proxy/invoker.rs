//! Service proxy: route a plain interface call through the dispatcher.
//!
//! The caller-side half of the proxy invocation adapter. An invocation is
//! encoded into an envelope, sent to the destination its binding names, and
//! — for blocking methods — decoded from the correlated reply. Caller code
//! stays a plain typed call; only the binding table knows the method runs
//! over messaging.

use crate::codec::{JsonCodec, MessageCodec};
use crate::dispatch::MessageBus;
use crate::envelope::Envelope;
use crate::error::ProxyError;
use crate::proxy::{MethodBinding, ProxyBindings, ProxyCallMode, ProxyMode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Typed proxy for one service whose methods are bound to destinations.
///
/// # Example
///
/// ```rust,ignore
/// let proxy = ServiceProxy::new("SuggestService", bus, bindings);
/// let ctx = ProxyMode::new();
///
/// // Blocking round trip (Sync binding):
/// let suggestions: Vec<String> = proxy.invoke(&ctx, "suggest", &"lifer".to_string()).await?;
///
/// // Fire-and-forget (Async binding):
/// proxy.notify(&ctx, "index", &document).await?;
/// ```
pub struct ServiceProxy<C: MessageCodec = JsonCodec> {
    service: String,
    bus: Arc<MessageBus>,
    bindings: Arc<ProxyBindings>,
    codec: C,
}

impl ServiceProxy<JsonCodec> {
    /// A proxy using the default JSON codec.
    pub fn new(
        service: impl Into<String>,
        bus: Arc<MessageBus>,
        bindings: Arc<ProxyBindings>,
    ) -> Self {
        Self::with_codec(service, bus, bindings, JsonCodec)
    }
}

impl<C: MessageCodec> ServiceProxy<C> {
    /// A proxy using a custom payload codec.
    pub fn with_codec(
        service: impl Into<String>,
        bus: Arc<MessageBus>,
        bindings: Arc<ProxyBindings>,
        codec: C,
    ) -> Self {
        Self {
            service: service.into(),
            bus,
            bindings,
            codec,
        }
    }

    /// The service name this proxy routes for.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Invoke a blocking method and decode its reply.
    ///
    /// The binding must be declared [`ProxyCallMode::Sync`]. The caller
    /// suspends until the correlated reply arrives (which is inline when
    /// the effective delivery mode is synchronous).
    ///
    /// # Errors
    ///
    /// [`ProxyError::UnboundMethod`], [`ProxyError::ModeMismatch`],
    /// [`ProxyError::EmptyReply`], codec failures, and any dispatch error.
    pub async fn invoke<Req, Resp>(
        &self,
        ctx: &ProxyMode,
        method: &str,
        request: &Req,
    ) -> Result<Resp, ProxyError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let binding = self.binding(method, ProxyCallMode::Sync)?;
        let envelope = self.encode(&binding, request)?;

        let reply = match binding.reply_timeout {
            Some(timeout) => self.bus.call_with_timeout(ctx, envelope, timeout).await?,
            None => self.bus.call(ctx, envelope).await?,
        };

        let payload = reply.ok_or_else(|| ProxyError::EmptyReply {
            service: self.service.clone(),
            method: method.to_string(),
        })?;
        Ok(self.codec.decode(&payload)?)
    }

    /// Invoke a fire-and-forget method.
    ///
    /// The binding must be declared [`ProxyCallMode::Async`]. Under a
    /// forcing proxy mode context the delivery still happens inline, but no
    /// reply is surfaced either way.
    ///
    /// # Errors
    ///
    /// [`ProxyError::UnboundMethod`], [`ProxyError::ModeMismatch`], codec
    /// failures, and any dispatch error.
    pub async fn notify<Req>(
        &self,
        ctx: &ProxyMode,
        method: &str,
        request: &Req,
    ) -> Result<(), ProxyError>
    where
        Req: Serialize + Sync,
    {
        let binding = self.binding(method, ProxyCallMode::Async)?;
        let envelope = self.encode(&binding, request)?;
        self.bus.send(ctx, envelope).await?;
        Ok(())
    }

    fn binding(&self, method: &str, expected: ProxyCallMode) -> Result<MethodBinding, ProxyError> {
        let binding = self
            .bindings
            .lookup(&self.service, method)
            .ok_or_else(|| ProxyError::UnboundMethod {
                service: self.service.clone(),
                method: method.to_string(),
            })?;
        if binding.call_mode != expected {
            return Err(ProxyError::ModeMismatch {
                service: self.service.clone(),
                method: method.to_string(),
                bound: binding.call_mode,
                expected,
            });
        }
        Ok(binding.clone())
    }

    fn encode<Req: Serialize>(
        &self,
        binding: &MethodBinding,
        request: &Req,
    ) -> Result<Envelope, ProxyError> {
        let payload = self.codec.encode(request)?;
        Ok(Envelope::new(binding.destination.clone(), payload))
    }
}
