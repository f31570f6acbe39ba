use async_trait::async_trait;
use rs_sqs_consumer::consumer::{HandlerOutcome, HandlerResult, SqsConsumer, SqsConsumerConfig};
use rs_sqs_consumer::errors::{HandlerError, MessageFault, SqsConsumerError};
use rs_sqs_consumer::queue::{Message, OutgoingMessage, QueueClient, SendBatchEntryResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Delete,
    ChangeVisibility(i32),
}

#[derive(Default)]
struct FakeState {
    pending: VecDeque<Message>,
    receive_requests: Vec<usize>,
    calls: HashMap<String, Vec<Call>>,
    fail_receive: bool,
    fail_delete_for: HashSet<String>,
    fail_change_visibility_for: HashSet<(String, i32)>,
    cancel_on_receive: Option<CancellationToken>,
    send_batches: Vec<usize>,
}

/// In-memory queue that records every call by receipt handle.
#[derive(Clone, Default)]
struct FakeQueue {
    state: Arc<Mutex<FakeState>>,
}

impl FakeQueue {
    fn with_messages(count: usize) -> Self {
        let queue = FakeQueue::default();
        queue.push_bodies((1..=count).map(|i| format!("body-{i}")));
        queue
    }

    fn push_bodies(&self, bodies: impl IntoIterator<Item = String>) {
        let mut state = self.state.lock().unwrap();
        for body in bodies {
            let n = state.pending.len() + 1;
            state
                .pending
                .push_back(Message::new(format!("m-{n}"), body, format!("r-{n}")));
        }
    }

    fn receive_requests(&self) -> Vec<usize> {
        self.state.lock().unwrap().receive_requests.clone()
    }

    fn calls(&self) -> HashMap<String, Vec<Call>> {
        self.state.lock().unwrap().calls.clone()
    }

    fn calls_for(&self, receipt: &str) -> Vec<Call> {
        self.calls().get(receipt).cloned().unwrap_or_default()
    }

    fn resolved_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    fn record(&self, receipt: &str, call: Call) {
        self.state
            .lock()
            .unwrap()
            .calls
            .entry(receipt.to_string())
            .or_default()
            .push(call);
    }
}

#[async_trait]
impl QueueClient for FakeQueue {
    async fn receive_batch(
        &self,
        max_count: usize,
        _wait_time_seconds: i32,
        _visibility_timeout_seconds: i32,
    ) -> Result<Vec<Message>, SqsConsumerError> {
        let mut state = self.state.lock().unwrap();
        state.receive_requests.push(max_count);
        if let Some(token) = &state.cancel_on_receive {
            token.cancel();
        }
        if state.fail_receive {
            return Err(SqsConsumerError::TransportError(
                "AWS.SimpleQueueService.NonExistentQueue".to_string(),
            ));
        }
        let take = max_count.min(state.pending.len());
        Ok(state.pending.drain(..take).collect())
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), SqsConsumerError> {
        self.record(receipt_handle, Call::Delete);
        if self
            .state
            .lock()
            .unwrap()
            .fail_delete_for
            .contains(receipt_handle)
        {
            return Err(SqsConsumerError::TransportError(
                "ReceiptHandleIsInvalid".to_string(),
            ));
        }
        Ok(())
    }

    async fn change_visibility(
        &self,
        receipt_handle: &str,
        timeout_seconds: i32,
    ) -> Result<(), SqsConsumerError> {
        self.record(receipt_handle, Call::ChangeVisibility(timeout_seconds));
        if self
            .state
            .lock()
            .unwrap()
            .fail_change_visibility_for
            .contains(&(receipt_handle.to_string(), timeout_seconds))
        {
            return Err(SqsConsumerError::TransportError(
                "MessageNotInflight".to_string(),
            ));
        }
        Ok(())
    }

    async fn send_batch(
        &self,
        entries: &[OutgoingMessage],
    ) -> Result<Vec<SendBatchEntryResult>, SqsConsumerError> {
        self.state.lock().unwrap().send_batches.push(entries.len());
        Ok(entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                if entry.body.is_empty() {
                    SendBatchEntryResult::Failed {
                        code: "EmptyBody".to_string(),
                        reason: "message body must not be empty".to_string(),
                    }
                } else if entry.delay_seconds.is_some_and(|d| d > 900) {
                    SendBatchEntryResult::Failed {
                        code: "InvalidParameterValue".to_string(),
                        reason: "DelaySeconds must be at most 900".to_string(),
                    }
                } else {
                    SendBatchEntryResult::Sent {
                        message_id: format!("sent-{i}"),
                    }
                }
            })
            .collect())
    }
}

/// Shared resource that observes handler concurrency.
#[derive(Clone)]
struct Tally {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    handled: Arc<AtomicUsize>,
    gate: Arc<Semaphore>,
}

impl Tally {
    fn open() -> Self {
        Tally::with_gate(Semaphore::MAX_PERMITS)
    }

    fn with_gate(permits: usize) -> Self {
        Tally {
            current: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            handled: Arc::new(AtomicUsize::new(0)),
            gate: Arc::new(Semaphore::new(permits)),
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }
}

/// Picks the outcome from the message body.
async fn scripted_handler(message: Message, tally: Tally) -> HandlerResult {
    let now = tally.current.fetch_add(1, Ordering::SeqCst) + 1;
    tally.peak.fetch_max(now, Ordering::SeqCst);

    tally
        .gate
        .acquire()
        .await
        .expect("gate closed")
        .forget();

    if let Some(ms) = message.body().strip_prefix("sleep-") {
        tokio::time::sleep(Duration::from_millis(ms.parse().unwrap())).await;
    }

    tally.current.fetch_sub(1, Ordering::SeqCst);
    tally.handled.fetch_add(1, Ordering::SeqCst);

    match message.body() {
        "retry" => Ok(HandlerOutcome::Retry { after_seconds: 30 }),
        "retry-now" => Ok(HandlerOutcome::retry_now()),
        "give-up" => Ok(HandlerOutcome::failed("unsupported payload")),
        "fail" => Ok(HandlerOutcome::Failed {
            reason: "downstream unavailable".to_string(),
            retry_after_seconds: Some(5),
        }),
        "error" => Err(HandlerError::from("cannot parse body")),
        "panic" => panic!("handler blew up on {}", message.message_id()),
        _ => Ok(HandlerOutcome::Completed),
    }
}

fn fast_config() -> SqsConsumerConfig {
    SqsConsumerConfig {
        wait_time_seconds: 0,
        interval: Duration::from_millis(10),
        busy_retry_delay: Duration::from_millis(10),
        shutdown_timeout: Duration::from_secs(5),
        ..SqsConsumerConfig::default()
    }
}

fn run_once_config() -> SqsConsumerConfig {
    SqsConsumerConfig {
        run_once: true,
        ..fast_config()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn consumer(queue: &FakeQueue, config: SqsConsumerConfig, tally: &Tally) -> SqsConsumer<Tally> {
    init_tracing();
    let mut consumer = SqsConsumer::new(queue.clone(), config, tally.clone()).unwrap();
    consumer.register_handler_fn(scripted_handler);
    consumer
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let result = timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

#[tokio::test]
async fn test_invalid_config_fails_without_queue_calls() {
    let queue = FakeQueue::with_messages(1);

    let config = SqsConsumerConfig {
        max_batch_size: 11,
        ..SqsConsumerConfig::default()
    };
    let result = SqsConsumer::new(queue.clone(), config, ());
    assert!(matches!(result, Err(SqsConsumerError::ConfigError(_))));

    let config = SqsConsumerConfig {
        visibility_timeout_seconds: -1,
        ..SqsConsumerConfig::default()
    };
    let result = SqsConsumer::new(queue.clone(), config, ());
    assert!(matches!(result, Err(SqsConsumerError::ConfigError(_))));

    assert!(queue.receive_requests().is_empty());
    assert!(queue.calls().is_empty());
}

#[tokio::test]
async fn test_run_without_handler_is_config_error() {
    let queue = FakeQueue::with_messages(1);
    let consumer = SqsConsumer::new(queue.clone(), run_once_config(), ()).unwrap();

    let result = consumer.run().await;

    assert!(matches!(result, Err(SqsConsumerError::ConfigError(_))));
    assert!(queue.receive_requests().is_empty());
}

#[tokio::test]
async fn test_run_once_deletes_completed_messages_exactly_once() {
    let queue = FakeQueue::with_messages(4);
    let tally = Tally::open();

    consumer(&queue, run_once_config(), &tally).run().await.unwrap();

    assert_eq!(queue.receive_requests(), vec![10]);
    assert_eq!(tally.handled(), 4);
    for i in 1..=4 {
        assert_eq!(queue.calls_for(&format!("r-{i}")), vec![Call::Delete]);
    }
}

#[tokio::test]
async fn test_run_once_waits_for_slow_handlers() {
    let queue = FakeQueue::default();
    queue.push_bodies(["sleep-300".to_string(), "sleep-150".to_string()]);
    let tally = Tally::open();

    consumer(&queue, run_once_config(), &tally).run().await.unwrap();

    assert_eq!(tally.handled(), 2);
    assert_eq!(queue.resolved_count(), 2);
}

#[tokio::test]
async fn test_outcomes_map_to_queue_calls() {
    let queue = FakeQueue::default();
    queue.push_bodies(
        ["done", "retry", "fail", "error", "retry-now", "give-up"]
            .into_iter()
            .map(String::from),
    );
    let tally = Tally::open();

    consumer(&queue, run_once_config(), &tally).run().await.unwrap();

    assert_eq!(queue.calls_for("r-1"), vec![Call::Delete]);
    assert_eq!(queue.calls_for("r-2"), vec![Call::ChangeVisibility(30)]);
    assert_eq!(queue.calls_for("r-3"), vec![Call::ChangeVisibility(5)]);
    assert_eq!(queue.calls_for("r-4"), vec![Call::ChangeVisibility(0)]);
    assert_eq!(queue.calls_for("r-5"), vec![Call::ChangeVisibility(0)]);
    assert_eq!(queue.calls_for("r-6"), vec![Call::ChangeVisibility(0)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_handler_does_not_affect_siblings() {
    let queue = FakeQueue::default();
    queue.push_bodies(["panic", "ok"].into_iter().map(String::from));
    let tally = Tally::open();

    let faults: Arc<Mutex<Vec<MessageFault>>> = Arc::default();
    let mut consumer = consumer(&queue, run_once_config(), &tally);
    let sink = Arc::clone(&faults);
    consumer.set_fault_sink(move |fault: MessageFault| sink.lock().unwrap().push(fault));

    consumer.run().await.unwrap();

    assert_eq!(queue.calls_for("r-1"), vec![Call::ChangeVisibility(0)]);
    assert_eq!(queue.calls_for("r-2"), vec![Call::Delete]);
    assert_eq!(consumer.in_flight(), 0);

    let faults = faults.lock().unwrap();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].message_id, "m-1");
    assert!(matches!(
        &faults[0].error,
        SqsConsumerError::HandlerFault { detail, .. } if detail.contains("handler blew up")
    ));
}

#[tokio::test]
async fn test_failed_delete_is_reported_and_loop_continues() {
    let queue = FakeQueue::with_messages(2);
    queue
        .state
        .lock()
        .unwrap()
        .fail_delete_for
        .insert("r-1".to_string());
    let tally = Tally::open();

    let faults: Arc<Mutex<Vec<MessageFault>>> = Arc::default();
    let mut consumer = consumer(&queue, run_once_config(), &tally);
    let sink = Arc::clone(&faults);
    consumer.set_fault_sink(move |fault: MessageFault| sink.lock().unwrap().push(fault));

    assert!(consumer.run().await.is_ok());

    assert_eq!(queue.calls_for("r-1"), vec![Call::Delete]);
    assert_eq!(queue.calls_for("r-2"), vec![Call::Delete]);
    let faults = faults.lock().unwrap();
    assert_eq!(faults.len(), 1);
    assert!(matches!(faults[0].error, SqsConsumerError::TransportError(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_at_capacity_fetches_nothing_until_a_handler_finishes() {
    let queue = FakeQueue::with_messages(5);
    let tally = Tally::with_gate(0);
    let config = SqsConsumerConfig {
        max_concurrent_handlers: 2,
        ..fast_config()
    };
    let consumer = Arc::new(consumer(&queue, config, &tally));
    let shutdown = consumer.shutdown_token();

    let running = Arc::clone(&consumer);
    let run = tokio::spawn(async move { running.run().await });

    wait_until("first batch", || tally.current.load(Ordering::SeqCst) == 2).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(queue.receive_requests(), vec![2]);
    assert_eq!(consumer.in_flight(), 2);

    tally.gate.add_permits(1);
    wait_until("second fetch", || queue.receive_requests().len() >= 2).await;
    assert_eq!(queue.receive_requests()[1], 1);

    tally.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    wait_until("all messages resolved", || queue.resolved_count() == 5).await;
    shutdown.cancel();
    run.await.unwrap().unwrap();

    assert!(tally.peak() <= 2);
    assert!(queue.receive_requests().iter().all(|&n| n <= 2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_message_resolved_exactly_once_under_cap() {
    let queue = FakeQueue::default();
    queue.push_bodies((0..30).map(|i| {
        match i % 5 {
            0 => "retry".to_string(),
            1 => "panic".to_string(),
            2 => "error".to_string(),
            _ => format!("sleep-{}", 5 + i % 7),
        }
    }));
    let tally = Tally::open();
    let config = SqsConsumerConfig {
        max_concurrent_handlers: 3,
        max_batch_size: 4,
        ..fast_config()
    };
    let mut consumer = consumer(&queue, config, &tally);
    consumer.set_fault_sink(|_fault: MessageFault| {});
    let consumer = Arc::new(consumer);
    let shutdown = consumer.shutdown_token();

    let running = Arc::clone(&consumer);
    let run = tokio::spawn(async move { running.run().await });

    wait_until("all messages resolved", || queue.resolved_count() == 30).await;
    shutdown.cancel();
    run.await.unwrap().unwrap();

    assert!(tally.peak() <= 3);
    assert_eq!(consumer.in_flight(), 0);
    let calls = queue.calls();
    assert_eq!(calls.len(), 30);
    for (receipt, calls) in calls {
        assert_eq!(calls.len(), 1, "{receipt} resolved {} times", calls.len());
    }
}

#[tokio::test]
async fn test_cancel_during_interval_returns_without_fetching() {
    let queue = FakeQueue::default();
    let tally = Tally::open();
    let config = SqsConsumerConfig {
        interval: Duration::from_secs(60),
        ..fast_config()
    };
    let consumer = consumer(&queue, config, &tally);
    let shutdown = consumer.shutdown_token();

    let run = tokio::spawn(async move { consumer.run().await });
    wait_until("first fetch", || queue.receive_requests().len() == 1).await;

    shutdown.cancel();
    let result = timeout(Duration::from_secs(1), run).await;

    assert!(result.is_ok(), "run did not return after cancellation");
    assert!(result.unwrap().unwrap().is_ok());
    assert_eq!(queue.receive_requests().len(), 1);
}

#[tokio::test]
async fn test_cancel_bounds_wait_for_stuck_handlers() {
    let queue = FakeQueue::with_messages(1);
    let tally = Tally::with_gate(0);
    let config = SqsConsumerConfig {
        shutdown_timeout: Duration::from_millis(100),
        ..run_once_config()
    };
    let consumer = Arc::new(consumer(&queue, config, &tally));
    let shutdown = consumer.shutdown_token();

    let running = Arc::clone(&consumer);
    let run = tokio::spawn(async move { running.run().await });
    wait_until("handler started", || consumer.in_flight() == 1).await;

    shutdown.cancel();
    let result = timeout(Duration::from_secs(1), run).await;
    assert!(result.is_ok(), "drain was not bounded by the shutdown timeout");

    tally.gate.add_permits(1);
    wait_until("stuck handler resolved", || queue.resolved_count() == 1).await;
    assert_eq!(queue.calls_for("r-1"), vec![Call::Delete]);
}

#[tokio::test]
async fn test_fetch_error_terminates_run() {
    let queue = FakeQueue::with_messages(3);
    queue.state.lock().unwrap().fail_receive = true;
    let tally = Tally::open();

    let result = consumer(&queue, fast_config(), &tally).run().await;

    assert!(matches!(result, Err(SqsConsumerError::TransportError(_))));
    assert_eq!(queue.receive_requests().len(), 1);
    assert_eq!(tally.handled(), 0);
}

#[tokio::test]
async fn test_cancel_during_busy_delay_returns_promptly() {
    let queue = FakeQueue::with_messages(2);
    let tally = Tally::with_gate(0);
    let config = SqsConsumerConfig {
        max_concurrent_handlers: 1,
        busy_retry_delay: Duration::from_secs(60),
        shutdown_timeout: Duration::from_millis(100),
        ..fast_config()
    };
    let consumer = Arc::new(consumer(&queue, config, &tally));
    let shutdown = consumer.shutdown_token();

    let running = Arc::clone(&consumer);
    let run = tokio::spawn(async move { running.run().await });
    wait_until("handler started", || consumer.in_flight() == 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown.cancel();
    let result = timeout(Duration::from_secs(1), run).await;

    assert!(result.is_ok(), "run stayed in the busy delay after cancellation");
    assert!(result.unwrap().unwrap().is_ok());
    assert_eq!(queue.receive_requests(), vec![1]);

    tally.gate.add_permits(1);
    wait_until("blocked handler resolved", || queue.resolved_count() == 1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_runs_share_one_cap() {
    let queue = FakeQueue::default();
    queue.push_bodies((0..20).map(|i| format!("sleep-{}", 2 + i % 4)));
    let tally = Tally::open();
    let config = SqsConsumerConfig {
        max_concurrent_handlers: 1,
        busy_retry_delay: Duration::from_millis(1),
        interval: Duration::from_millis(1),
        ..fast_config()
    };
    let consumer = Arc::new(consumer(&queue, config, &tally));
    let shutdown = consumer.shutdown_token();

    let first = tokio::spawn({
        let consumer = Arc::clone(&consumer);
        async move { consumer.run().await }
    });
    let second = tokio::spawn({
        let consumer = Arc::clone(&consumer);
        async move { consumer.run().await }
    });

    wait_until("all messages resolved", || queue.resolved_count() == 20).await;
    shutdown.cancel();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert!(tally.peak() <= 1, "peak was {}", tally.peak());
    assert_eq!(consumer.in_flight(), 0);
    for (receipt, calls) in queue.calls() {
        assert_eq!(calls.len(), 1, "{receipt} resolved {} times", calls.len());
        assert!(
            calls[0] == Call::Delete || calls[0] == Call::ChangeVisibility(0),
            "{receipt} got {calls:?}"
        );
    }
}

#[tokio::test]
async fn test_batch_received_after_cancel_is_released_unhandled() {
    let queue = FakeQueue::with_messages(3);
    let tally = Tally::open();
    let consumer = consumer(&queue, fast_config(), &tally);
    queue.state.lock().unwrap().cancel_on_receive = Some(consumer.shutdown_token());

    let result = timeout(Duration::from_secs(1), consumer.run()).await;

    assert!(result.expect("run did not return").is_ok());
    assert_eq!(queue.receive_requests().len(), 1);
    assert_eq!(tally.handled(), 0);
    for i in 1..=3 {
        assert_eq!(
            queue.calls_for(&format!("r-{i}")),
            vec![Call::ChangeVisibility(0)]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_lease_extension_is_reported_and_message_still_deleted() {
    let queue = FakeQueue::default();
    queue.push_bodies(["sleep-1200".to_string()]);
    queue
        .state
        .lock()
        .unwrap()
        .fail_change_visibility_for
        .insert(("r-1".to_string(), 2));
    let tally = Tally::open();
    let config = SqsConsumerConfig {
        visibility_timeout_seconds: 1,
        lease_safety_margin: Duration::from_millis(500),
        lease_extension_seconds: Some(2),
        ..run_once_config()
    };

    let faults: Arc<Mutex<Vec<MessageFault>>> = Arc::default();
    let mut consumer = consumer(&queue, config, &tally);
    let sink = Arc::clone(&faults);
    consumer.set_fault_sink(move |fault: MessageFault| sink.lock().unwrap().push(fault));

    consumer.run().await.unwrap();

    assert_eq!(
        queue.calls_for("r-1"),
        vec![Call::ChangeVisibility(2), Call::Delete]
    );
    let faults = faults.lock().unwrap();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].message_id, "m-1");
    assert!(matches!(faults[0].error, SqsConsumerError::TransportError(_)));
}

#[tokio::test(start_paused = true)]
async fn test_long_handler_gets_lease_extended() {
    let queue = FakeQueue::default();
    queue.push_bodies(["sleep-1200".to_string()]);
    let tally = Tally::open();
    let config = SqsConsumerConfig {
        visibility_timeout_seconds: 1,
        lease_safety_margin: Duration::from_millis(500),
        lease_extension_seconds: Some(2),
        ..run_once_config()
    };

    consumer(&queue, config, &tally).run().await.unwrap();

    assert_eq!(
        queue.calls_for("r-1"),
        vec![Call::ChangeVisibility(2), Call::Delete]
    );
}

#[tokio::test(start_paused = true)]
async fn test_lease_warning_without_extension_makes_no_extra_calls() {
    let queue = FakeQueue::default();
    queue.push_bodies(["sleep-1200".to_string()]);
    let tally = Tally::open();
    let config = SqsConsumerConfig {
        visibility_timeout_seconds: 1,
        lease_safety_margin: Duration::from_millis(500),
        ..run_once_config()
    };

    consumer(&queue, config, &tally).run().await.unwrap();

    assert_eq!(queue.calls_for("r-1"), vec![Call::Delete]);
}

#[tokio::test]
async fn test_enqueue_splits_into_sqs_sized_batches() {
    let queue = FakeQueue::default();
    let consumer = SqsConsumer::new(queue.clone(), fast_config(), ()).unwrap();

    let mut messages: Vec<_> = (0..23)
        .map(|i| {
            OutgoingMessage::new(format!("payload-{i}"))
                .with_group_id("orders")
                .with_deduplication_id(format!("dedup-{i}"))
        })
        .collect();
    messages[4].body.clear();
    messages[12] = messages[12].clone().with_delay_seconds(60);
    messages[17] = messages[17].clone().with_delay_seconds(3600);

    let results = consumer.enqueue(messages).await.unwrap();

    assert_eq!(queue.state.lock().unwrap().send_batches, vec![10, 10, 3]);
    assert_eq!(results.len(), 23);
    assert_eq!(results.iter().filter(|r| r.is_sent()).count(), 21);
    assert!(!results[4].is_sent());
    assert!(results[12].is_sent());
    assert!(matches!(
        &results[17],
        SendBatchEntryResult::Failed { code, .. } if code == "InvalidParameterValue"
    ));
}
