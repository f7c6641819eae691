//! Integration tests for message bus dispatch semantics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use switchboard::prelude::*;
use switchboard::{CorrelationId, DeadLetterSink, SendOutcome};
use tokio::sync::{mpsc, Notify};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Replies with its envelope payload after an optional delay.
struct EchoHandler {
    delay: Duration,
    done: Arc<AtomicBool>,
}

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&self, envelope: &Envelope) -> Result<Option<Vec<u8>>, HandlerError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.done.store(true, Ordering::SeqCst);
        Ok(Some(envelope.payload.clone()))
    }
}

/// Signals entry, then parks until released.
struct GatedHandler {
    started: mpsc::UnboundedSender<()>,
    gate: Arc<Notify>,
}

#[async_trait]
impl MessageHandler for GatedHandler {
    async fn handle(&self, envelope: &Envelope) -> Result<Option<Vec<u8>>, HandlerError> {
        let _ = self.started.send(());
        self.gate.notified().await;
        Ok(Some(envelope.payload.clone()))
    }
}

struct FailingHandler;

#[async_trait]
impl MessageHandler for FailingHandler {
    async fn handle(&self, _envelope: &Envelope) -> Result<Option<Vec<u8>>, HandlerError> {
        Err(HandlerError::new("suggestion backend unavailable"))
    }
}

#[tokio::test(start_paused = true)]
async fn sync_send_blocks_until_handler_completes() {
    init_tracing();
    let bus = MessageBus::new();
    bus.register(DestinationConfig::synchronous("mail.send"))
        .expect("register");

    let done = Arc::new(AtomicBool::new(false));
    bus.add_handler(
        "mail.send",
        Arc::new(EchoHandler {
            delay: Duration::from_millis(200),
            done: done.clone(),
        }),
    )
    .expect("add handler");

    let ctx = ProxyMode::new();
    let outcome = bus
        .send(&ctx, Envelope::new("mail.send", b"hello".to_vec()))
        .await
        .expect("send");

    // The handler finished before send returned.
    assert!(done.load(Ordering::SeqCst));
    match outcome {
        SendOutcome::Delivered { reply } => assert_eq!(reply, Some(b"hello".to_vec())),
        SendOutcome::Enqueued { .. } => panic!("synchronous destination must deliver inline"),
    }
}

#[tokio::test]
async fn sync_handler_failure_is_the_callers_failure() {
    init_tracing();
    let bus = MessageBus::new();
    bus.register(DestinationConfig::synchronous("mail.send"))
        .expect("register");
    bus.add_handler("mail.send", Arc::new(FailingHandler))
        .expect("add handler");

    let ctx = ProxyMode::new();
    let err = bus
        .send(&ctx, Envelope::new("mail.send", vec![]))
        .await
        .expect_err("handler failure must propagate");

    assert!(matches!(err, DispatchError::HandlerExecution(_)));
    assert!(err.to_string().contains("suggestion backend unavailable"));
}

#[tokio::test]
async fn async_send_acks_before_handler_completes() {
    init_tracing();
    let bus = MessageBus::new();
    bus.register(DestinationConfig::asynchronous("audit.trail"))
        .expect("register");

    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let gate = Arc::new(Notify::new());
    bus.add_handler(
        "audit.trail",
        Arc::new(GatedHandler {
            started: started_tx,
            gate: gate.clone(),
        }),
    )
    .expect("add handler");

    let ctx = ProxyMode::new();
    let outcome = bus
        .send(&ctx, Envelope::new("audit.trail", vec![1]))
        .await
        .expect("send");

    // Ack only; the handler is still parked on its gate.
    assert!(matches!(outcome, SendOutcome::Enqueued { .. }));

    started_rx.recv().await.expect("handler started");
    gate.notify_one();
}

#[tokio::test]
async fn forced_sync_overrides_async_destination() {
    init_tracing();
    let bus = MessageBus::new();
    bus.register(DestinationConfig::asynchronous("search.suggest"))
        .expect("register");

    let done = Arc::new(AtomicBool::new(false));
    bus.add_handler(
        "search.suggest",
        Arc::new(EchoHandler {
            delay: Duration::ZERO,
            done: done.clone(),
        }),
    )
    .expect("add handler");

    let ctx = ProxyMode::new();
    ctx.set_force_sync(true);

    let outcome = bus
        .send(&ctx, Envelope::new("search.suggest", b"q".to_vec()))
        .await
        .expect("send");

    assert!(done.load(Ordering::SeqCst));
    match outcome {
        SendOutcome::Delivered { reply } => assert_eq!(reply, Some(b"q".to_vec())),
        SendOutcome::Enqueued { .. } => panic!("forced sync must deliver inline"),
    }
}

/// Search suggestions over an asynchronous destination: production sends
/// get an ack; a forcing context gets the suggestion list inline.
#[tokio::test]
async fn search_suggest_scenario() {
    init_tracing();

    struct SuggestHandler;

    #[async_trait]
    impl MessageHandler for SuggestHandler {
        async fn handle(&self, envelope: &Envelope) -> Result<Option<Vec<u8>>, HandlerError> {
            let query: String = JsonCodec.decode(&envelope.payload)?;
            let suggestions = vec![format!("{query} portal"), format!("{query} forum")];
            Ok(Some(JsonCodec.encode(&suggestions)?))
        }
    }

    let bus = MessageBus::new();
    bus.register(DestinationConfig::asynchronous("search.suggest"))
        .expect("register");
    bus.add_handler("search.suggest", Arc::new(SuggestHandler))
        .expect("add handler");

    let query = JsonCodec.encode(&"liferay").expect("encode");

    // Default context: returns immediately with an acknowledgment.
    let ctx = ProxyMode::new();
    let outcome = bus
        .send(&ctx, Envelope::new("search.suggest", query.clone()))
        .await
        .expect("send");
    assert!(matches!(outcome, SendOutcome::Enqueued { .. }));

    // Forcing context: blocks until the handler returns its result.
    ctx.set_force_sync(true);
    let reply = bus
        .call(&ctx, Envelope::new("search.suggest", query))
        .await
        .expect("call")
        .expect("suggestions present");
    let suggestions: Vec<String> = JsonCodec.decode(&reply).expect("decode");
    assert_eq!(suggestions, vec!["liferay portal", "liferay forum"]);
}

#[tokio::test]
async fn async_call_round_trips_through_worker() {
    init_tracing();
    let bus = MessageBus::new();
    bus.register(DestinationConfig::asynchronous("echo").with_workers(2))
        .expect("register");

    let done = Arc::new(AtomicBool::new(false));
    bus.add_handler(
        "echo",
        Arc::new(EchoHandler {
            delay: Duration::ZERO,
            done,
        }),
    )
    .expect("add handler");

    let ctx = ProxyMode::new();
    let reply = bus
        .call(&ctx, Envelope::new("echo", b"ping".to_vec()))
        .await
        .expect("call");

    assert_eq!(reply, Some(b"ping".to_vec()));
    assert_eq!(bus.pending_count(), 0);
}

#[tokio::test]
async fn fail_backpressure_yields_queue_full() {
    init_tracing();
    let bus = MessageBus::new();
    bus.register(
        DestinationConfig::asynchronous("narrow")
            .with_queue_capacity(1)
            .with_backpressure(BackpressurePolicy::Fail),
    )
    .expect("register");

    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let gate = Arc::new(Notify::new());
    bus.add_handler(
        "narrow",
        Arc::new(GatedHandler {
            started: started_tx,
            gate: gate.clone(),
        }),
    )
    .expect("add handler");

    let ctx = ProxyMode::new();

    // First envelope: picked up by the worker, which parks in the handler.
    bus.send(&ctx, Envelope::new("narrow", vec![1]))
        .await
        .expect("first send");
    started_rx.recv().await.expect("worker busy");

    // Second envelope fills the capacity-1 queue.
    bus.send(&ctx, Envelope::new("narrow", vec![2]))
        .await
        .expect("second send");

    // Third envelope has nowhere to go.
    let err = bus
        .send(&ctx, Envelope::new("narrow", vec![3]))
        .await
        .expect_err("queue full");
    assert!(matches!(err, DispatchError::QueueFull(name) if name == "narrow"));

    gate.notify_waiters();
}

#[tokio::test(start_paused = true)]
async fn correlation_timeout_and_late_reply_discard() {
    init_tracing();
    let bus = MessageBus::new();
    bus.register(DestinationConfig::asynchronous("slow").with_reply_timeout(Duration::from_millis(50)))
        .expect("register");

    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let gate = Arc::new(Notify::new());
    bus.add_handler(
        "slow",
        Arc::new(GatedHandler {
            started: started_tx,
            gate: gate.clone(),
        }),
    )
    .expect("add handler");

    let ctx = ProxyMode::new();
    let err = bus
        .call(&ctx, Envelope::new("slow", vec![]))
        .await
        .expect_err("reply deadline elapsed");
    assert!(matches!(err, DispatchError::CorrelationTimeout(_)));
    assert_eq!(bus.pending_count(), 0);

    started_rx.recv().await.expect("handler started");

    // Release the handler; its late reply finds no waiter and is dropped.
    gate.notify_one();
    tokio::task::yield_now().await;
    assert_eq!(bus.pending_count(), 0);
}

#[tokio::test]
async fn cancelled_wait_abandons_correlation() {
    init_tracing();
    let bus = MessageBus::new();
    bus.register(DestinationConfig::asynchronous("slow"))
        .expect("register");

    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let gate = Arc::new(Notify::new());
    bus.add_handler(
        "slow",
        Arc::new(GatedHandler {
            started: started_tx,
            gate: gate.clone(),
        }),
    )
    .expect("add handler");

    let ctx = ProxyMode::new();
    let round_trip = bus
        .begin_call(&ctx, Envelope::new("slow", vec![]))
        .await
        .expect("begin call");

    let handle = match round_trip {
        RoundTrip::Pending(handle) => handle,
        RoundTrip::Completed(_) => panic!("async destination must go through the queue"),
    };
    assert_eq!(bus.pending_count(), 1);

    handle.cancel();
    assert_eq!(bus.pending_count(), 0);

    started_rx.recv().await.expect("handler started");
    gate.notify_one();
}

#[tokio::test]
async fn failed_async_envelope_reaches_dead_letter_sink() {
    init_tracing();

    struct ChannelSink {
        tx: mpsc::UnboundedSender<(String, String)>,
    }

    impl DeadLetterSink for ChannelSink {
        fn consume(&self, envelope: Envelope, error: HandlerError) {
            let _ = self
                .tx
                .send((envelope.destination, error.message().to_string()));
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let bus = MessageBus::new();
    bus.register(
        DestinationConfig::asynchronous("search.suggest")
            .with_failure_policy(FailurePolicy::DeadLetter(Arc::new(ChannelSink { tx }))),
    )
    .expect("register");
    bus.add_handler("search.suggest", Arc::new(FailingHandler))
        .expect("add handler");

    let ctx = ProxyMode::new();
    bus.send(&ctx, Envelope::new("search.suggest", vec![]))
        .await
        .expect("send");

    let (destination, message) = rx.recv().await.expect("dead letter delivered");
    assert_eq!(destination, "search.suggest");
    assert_eq!(message, "suggestion backend unavailable");
}

#[tokio::test]
async fn failed_correlated_request_fails_the_waiter_not_the_sink() {
    init_tracing();

    struct PanickySink;

    impl DeadLetterSink for PanickySink {
        fn consume(&self, _envelope: Envelope, _error: HandlerError) {
            panic!("correlated failures must be delivered to the waiter");
        }
    }

    let bus = MessageBus::new();
    bus.register(
        DestinationConfig::asynchronous("search.suggest")
            .with_failure_policy(FailurePolicy::DeadLetter(Arc::new(PanickySink))),
    )
    .expect("register");
    bus.add_handler("search.suggest", Arc::new(FailingHandler))
        .expect("add handler");

    let ctx = ProxyMode::new();
    let err = bus
        .call(&ctx, Envelope::new("search.suggest", vec![]))
        .await
        .expect_err("handler failure arrives as the reply");
    assert!(matches!(err, DispatchError::HandlerExecution(_)));
}

#[tokio::test]
async fn serial_destination_preserves_enqueue_order() {
    init_tracing();

    struct RecordingHandler {
        seen: Arc<Mutex<Vec<u8>>>,
        processed: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle(&self, envelope: &Envelope) -> Result<Option<Vec<u8>>, HandlerError> {
            self.seen.lock().expect("seen lock").push(envelope.payload[0]);
            let _ = self.processed.send(());
            Ok(None)
        }
    }

    let bus = MessageBus::new();
    bus.register(DestinationConfig::asynchronous("journal").with_workers(1))
        .expect("register");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (processed_tx, mut processed_rx) = mpsc::unbounded_channel();
    bus.add_handler(
        "journal",
        Arc::new(RecordingHandler {
            seen: seen.clone(),
            processed: processed_tx,
        }),
    )
    .expect("add handler");

    let ctx = ProxyMode::new();
    for i in 0..10u8 {
        bus.send(&ctx, Envelope::new("journal", vec![i]))
            .await
            .expect("send");
    }

    for _ in 0..10 {
        processed_rx.recv().await.expect("processed");
    }
    assert_eq!(*seen.lock().expect("seen lock"), (0..10).collect::<Vec<u8>>());
}

#[tokio::test]
async fn stats_track_delivery_outcomes() {
    init_tracing();
    let bus = MessageBus::new();
    let destination = bus
        .register(DestinationConfig::synchronous("mail.send"))
        .expect("register");
    bus.add_handler("mail.send", Arc::new(FailingHandler))
        .expect("add handler");

    let ctx = ProxyMode::new();
    let _ = bus.send(&ctx, Envelope::new("mail.send", vec![])).await;

    let snapshot = destination.stats().snapshot();
    assert_eq!(snapshot.sent, 1);
    assert_eq!(snapshot.delivered, 0);
    assert_eq!(snapshot.failed, 1);
}

#[tokio::test]
async fn shutdown_closes_async_sends() {
    init_tracing();
    let bus = MessageBus::new();
    bus.register(DestinationConfig::asynchronous("audit.trail"))
        .expect("register");

    bus.shutdown();

    let ctx = ProxyMode::new();
    let err = bus
        .send(&ctx, Envelope::new("audit.trail", vec![]))
        .await
        .expect_err("bus closed");
    assert!(matches!(err, DispatchError::BusClosed));

    // Forced-sync delivery bypasses the queue and still works.
    ctx.set_force_sync(true);
    bus.send(&ctx, Envelope::new("audit.trail", vec![]))
        .await
        .expect("inline delivery after shutdown");
}

#[tokio::test]
async fn lookup_unregistered_fails_with_unknown_destination() {
    init_tracing();
    let bus = MessageBus::new();

    let err = bus.registry().lookup("unregistered").expect_err("unknown");
    assert_eq!(
        err,
        RegistryError::UnknownDestination("unregistered".to_string())
    );
}

#[tokio::test]
async fn correlation_ids_are_distinct_across_concurrent_callers() {
    init_tracing();
    let bus = Arc::new(MessageBus::new());
    bus.register(DestinationConfig::asynchronous("fanout").with_workers(4))
        .expect("register");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let bus = bus.clone();
        tasks.push(tokio::spawn(async move {
            let ctx = ProxyMode::new();
            match bus
                .send(&ctx, Envelope::new("fanout", vec![]))
                .await
                .expect("send")
            {
                SendOutcome::Enqueued { correlation_id } => correlation_id,
                SendOutcome::Delivered { .. } => panic!("async destination must enqueue"),
            }
        }));
    }

    let mut ids: Vec<CorrelationId> = Vec::new();
    for task in tasks {
        ids.push(task.await.expect("task"));
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
}
