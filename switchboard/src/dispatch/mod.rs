//! Message dispatching: the bus, per-destination worker pools, and the
//! failure policy for asynchronous handler errors.

mod bus;
mod dead_letter;
mod worker;

pub use bus::{MessageBus, RoundTrip, SendOutcome};
pub use dead_letter::{DeadLetterSink, FailurePolicy, LoggingDeadLetterSink};
