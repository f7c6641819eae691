//! Proxy layer: the per-caller mode context and the invocation adapter
//! that routes service-interface calls through the dispatcher.

mod binding;
mod invoker;
mod mode;

pub use binding::{MethodBinding, ProxyBindings, ProxyCallMode};
pub use invoker::ServiceProxy;
pub use mode::ProxyMode;
