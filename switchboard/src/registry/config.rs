//! Destination configuration.

use crate::dispatch::FailurePolicy;
use crate::envelope::DeliveryMode;
use std::time::Duration;

/// What an asynchronous send does when the destination queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Wait for queue space up to `timeout`, then fail with `QueueFull`.
    Block {
        /// How long the producer may wait for space.
        timeout: Duration,
    },

    /// Fail immediately with `QueueFull`.
    Fail,
}

impl Default for BackpressurePolicy {
    fn default() -> Self {
        BackpressurePolicy::Block {
            timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for one destination, fixed at registration time.
///
/// `workers = 1` gives strictly ordered serial delivery; larger pools
/// deliver concurrently.
#[derive(Debug, Clone)]
pub struct DestinationConfig {
    /// Unique destination name.
    pub name: String,

    /// Configured delivery mode. Per-call overrides (a forcing proxy mode
    /// context) never mutate this.
    pub mode: DeliveryMode,

    /// Bounded queue capacity for asynchronous destinations.
    pub queue_capacity: usize,

    /// Worker tasks draining the queue (asynchronous destinations only).
    pub workers: usize,

    /// Producer behavior when the queue is full.
    pub backpressure: BackpressurePolicy,

    /// What to do with uncorrelated asynchronous handler failures.
    pub failure_policy: FailurePolicy,

    /// Default deadline for correlated replies.
    pub reply_timeout: Duration,
}

impl DestinationConfig {
    /// A synchronous destination with default settings.
    pub fn synchronous(name: impl Into<String>) -> Self {
        Self::new(name, DeliveryMode::Synchronous)
    }

    /// An asynchronous destination with default settings.
    pub fn asynchronous(name: impl Into<String>) -> Self {
        Self::new(name, DeliveryMode::Asynchronous)
    }

    fn new(name: impl Into<String>, mode: DeliveryMode) -> Self {
        Self {
            name: name.into(),
            mode,
            queue_capacity: 64,
            workers: 1,
            backpressure: BackpressurePolicy::default(),
            failure_policy: FailurePolicy::default(),
            reply_timeout: Duration::from_secs(30),
        }
    }

    /// Set the worker pool size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the bounded queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the backpressure policy.
    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the default reply deadline.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }
}
