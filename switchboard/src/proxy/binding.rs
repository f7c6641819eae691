//! Startup-time binding table for proxied service methods.
//!
//! Maps `(service, method)` identity to a destination name and a declared
//! call mode, resolved through an explicit table built at configuration
//! time — there is no runtime reflection or class-name lookup.

use std::collections::HashMap;
use std::time::Duration;

/// Declared mode of a proxied method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyCallMode {
    /// The call round-trips: the caller blocks on the correlated reply.
    Sync,

    /// Fire-and-forget: the caller gets an acknowledgment only.
    Async,
}

/// Binding of one service method to a destination.
#[derive(Debug, Clone)]
pub struct MethodBinding {
    /// Destination the method's envelopes are sent to.
    pub destination: String,

    /// Declared call mode.
    pub call_mode: ProxyCallMode,

    /// Per-method reply deadline; `None` uses the destination's default.
    pub reply_timeout: Option<Duration>,
}

impl MethodBinding {
    /// A blocking round-trip binding.
    pub fn synchronous(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            call_mode: ProxyCallMode::Sync,
            reply_timeout: None,
        }
    }

    /// A fire-and-forget binding.
    pub fn asynchronous(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            call_mode: ProxyCallMode::Async,
            reply_timeout: None,
        }
    }

    /// Set a per-method reply deadline.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }
}

/// Table of method bindings, built once at startup.
///
/// # Example
///
/// ```rust,ignore
/// let bindings = ProxyBindings::new()
///     .bind("SuggestService", "suggest", MethodBinding::synchronous("search.suggest"))
///     .bind("SuggestService", "index", MethodBinding::asynchronous("search.index"));
/// ```
#[derive(Debug, Default)]
pub struct ProxyBindings {
    bindings: HashMap<(String, String), MethodBinding>,
}

impl ProxyBindings {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a service method. Later bindings for the same method replace
    /// earlier ones.
    pub fn bind(
        mut self,
        service: impl Into<String>,
        method: impl Into<String>,
        binding: MethodBinding,
    ) -> Self {
        self.bindings
            .insert((service.into(), method.into()), binding);
        self
    }

    /// Look up the binding for a service method.
    pub fn lookup(&self, service: &str, method: &str) -> Option<&MethodBinding> {
        self.bindings
            .get(&(service.to_string(), method.to_string()))
    }

    /// Number of bound methods.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
