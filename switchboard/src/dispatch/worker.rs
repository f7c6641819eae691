//! Worker pool draining a destination's bounded queue.
//!
//! Each asynchronous destination gets `workers` tasks sharing one receiver.
//! A worker dequeues an envelope, runs the destination's handlers, then
//! resolves the correlation (when a caller waits) or applies the failure
//! policy. One worker preserves enqueue order; larger pools trade ordering
//! for throughput.
//!
//! Handler failures are isolated per envelope — they never take a worker
//! down.

use crate::correlation::PendingReplies;
use crate::envelope::Envelope;
use crate::error::DispatchError;
use crate::registry::Destination;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

pub(crate) fn spawn_workers(
    destination: Arc<Destination>,
    pending: Arc<PendingReplies>,
    receiver: mpsc::Receiver<Envelope>,
    workers: usize,
) {
    let receiver = Arc::new(Mutex::new(receiver));
    for worker_index in 0..workers {
        let destination = Arc::clone(&destination);
        let pending = Arc::clone(&pending);
        let receiver = Arc::clone(&receiver);
        tokio::spawn(async move {
            loop {
                // Hold the receiver lock only while dequeuing so other
                // workers can pick up the next envelope concurrently.
                let envelope = { receiver.lock().await.recv().await };
                let Some(envelope) = envelope else {
                    break;
                };
                process(&destination, &pending, envelope).await;
            }
            tracing::debug!(
                destination = %destination.name(),
                worker = worker_index,
                "worker exiting, queue closed"
            );
        });
    }
}

async fn process(destination: &Destination, pending: &PendingReplies, envelope: Envelope) {
    let correlation_id = envelope.correlation_id;
    let expects_reply = envelope.expects_reply();

    match destination.run_handlers(&envelope).await {
        Ok(reply) => {
            destination.stats().record_delivered();
            if expects_reply && !pending.complete(correlation_id, Ok(reply)) {
                tracing::debug!(
                    destination = %destination.name(),
                    correlation_id = %correlation_id,
                    "late reply discarded, correlation abandoned"
                );
            }
        }
        Err(error) => {
            destination.stats().record_failed();
            let delivered_to_waiter = expects_reply
                && pending.complete(
                    correlation_id,
                    Err(DispatchError::HandlerExecution(error.clone())),
                );
            if !delivered_to_waiter {
                destination.stats().record_dropped();
                destination.failure_policy().apply(envelope, error);
            }
        }
    }
}
