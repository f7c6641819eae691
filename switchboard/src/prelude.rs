//! Convenience re-exports for common usage.
//!
//! ```rust,ignore
//! use switchboard::prelude::*;
//! ```

pub use crate::codec::{JsonCodec, MessageCodec};
pub use crate::dispatch::{FailurePolicy, MessageBus, RoundTrip, SendOutcome};
pub use crate::envelope::{DeliveryMode, Envelope};
pub use crate::error::{DispatchError, HandlerError, ProxyError, RegistryError};
pub use crate::handler::MessageHandler;
pub use crate::proxy::{MethodBinding, ProxyBindings, ProxyMode, ServiceProxy};
pub use crate::registry::{BackpressurePolicy, DestinationConfig};
pub use crate::scope::{DirectiveTable, ScopeTarget, SyncScope, SyncScopeController};

pub use async_trait::async_trait;
pub use std::sync::Arc;
