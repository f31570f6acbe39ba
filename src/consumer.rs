use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{SqsQueueClient, create_sqs_client_for_region};
use crate::errors::{FaultSink, SqsConsumerError, TracingFaultSink};
use crate::queue::{OutgoingMessage, QueueClient, SQS_MAX_BATCH_SIZE, SendBatchEntryResult};

mod admission;
mod config;
mod dispatcher;
mod handler;
mod lease;
mod poll_loop;

pub use admission::{AdmissionController, AdmissionPermit};
pub use config::{QueueSettings, SqsConsumerConfig};
pub use handler::{HandlerOutcome, HandlerResult, MessageHandler, MessageHandlerFn};
pub use lease::{Lease, ResolvedLease};

use dispatcher::{Dispatcher, LeasePolicy};
use poll_loop::{PollLoop, PollSession};

/// A bounded-concurrency consumer for one queue.
///
/// Polls batches sized to the free handler capacity, runs the registered
/// handler for every message on its own task and deletes or releases the
/// message according to the handler's [`HandlerOutcome`].
pub struct SqsConsumer<TShared>
where
    TShared: Send + Sync + Clone + 'static,
{
    /// The queue messages are received from and resolved against.
    queue_client: Arc<dyn QueueClient>,

    config: SqsConsumerConfig,

    /// A shared resource cloned into every handler invocation.
    shared_resources: TShared,

    handler: Option<Arc<dyn MessageHandler<TShared>>>,

    fault_sink: Arc<dyn FaultSink>,

    admission: Arc<AdmissionController>,

    shutdown: CancellationToken,
}

impl<TShared> SqsConsumer<TShared>
where
    TShared: Send + Sync + Clone + 'static,
{
    /// Creates a consumer, validating `config` first.
    ///
    /// Fails with [`SqsConsumerError::ConfigError`] without contacting the queue.
    pub fn new(
        queue_client: impl QueueClient,
        config: SqsConsumerConfig,
        shared_resources: TShared,
    ) -> Result<Self, SqsConsumerError> {
        config.validate()?;

        let admission = Arc::new(AdmissionController::new(
            config.max_concurrent_handlers,
            config.busy_retry_delay,
        ));

        Ok(SqsConsumer {
            queue_client: Arc::new(queue_client),
            config,
            shared_resources,
            handler: None,
            fault_sink: Arc::new(TracingFaultSink),
            admission,
            shutdown: CancellationToken::new(),
        })
    }

    /// Creates a consumer for `queue_url` over an AWS SDK client.
    pub fn from_sqs_client(
        sqs_client: aws_sdk_sqs::Client,
        queue_url: &str,
        config: SqsConsumerConfig,
        shared_resources: TShared,
    ) -> Result<Self, SqsConsumerError> {
        Self::new(
            SqsQueueClient::new(sqs_client, queue_url),
            config,
            shared_resources,
        )
    }

    /// Builds a consumer entirely from the process environment.
    ///
    /// The queue comes from [`QueueSettings::from_env`] and the tuning from
    /// [`SqsConsumerConfig::from_env`]. The queue is checked with
    /// [`SqsQueueClient::verify`] before the consumer is returned.
    pub async fn from_env(shared_resources: TShared) -> Result<Self, SqsConsumerError> {
        let settings = QueueSettings::from_env()?;
        let config = SqsConsumerConfig::from_env()?;

        let sqs_client = create_sqs_client_for_region(settings.region.as_deref()).await;
        let queue_client = SqsQueueClient::new(sqs_client, &settings.queue_url);
        queue_client.verify().await?;

        Self::new(queue_client, config, shared_resources)
    }

    /// Registers the message handler, replacing any earlier one.
    pub fn register_handler(&mut self, handler: impl MessageHandler<TShared>) {
        self.handler = Some(Arc::new(handler));
    }

    /// Registers an async function or closure as the message handler.
    ///
    /// ```rust,no_run
    /// use rs_sqs_consumer::client::create_sqs_client_from_env;
    /// use rs_sqs_consumer::consumer::{HandlerOutcome, SqsConsumer, SqsConsumerConfig};
    ///
    /// # async fn example() -> Result<(), rs_sqs_consumer::errors::SqsConsumerError> {
    /// let client = create_sqs_client_from_env().await;
    /// let mut consumer = SqsConsumer::from_sqs_client(
    ///     client,
    ///     "https://sqs.us-east-1.amazonaws.com/123456789012/orders",
    ///     SqsConsumerConfig::default(),
    ///     (),
    /// )?;
    /// consumer.register_handler_fn(|message, _shared: ()| async move {
    ///     println!("{}", message.body());
    ///     Ok(HandlerOutcome::Completed)
    /// });
    /// consumer.run().await
    /// # }
    /// ```
    pub fn register_handler_fn<RFn, Fut>(&mut self, rv_fn: RFn)
    where
        RFn: Fn(crate::queue::Message, TShared) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_handler(MessageHandlerFn::new(rv_fn));
    }

    /// Replaces the default [`TracingFaultSink`].
    pub fn set_fault_sink(&mut self, fault_sink: impl FaultSink) {
        self.fault_sink = Arc::new(fault_sink);
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    ///
    /// Cancellation is permanent: later calls to `run` return immediately.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &SqsConsumerConfig {
        &self.config
    }

    /// Handlers currently running.
    pub fn in_flight(&self) -> usize {
        self.admission.in_flight()
    }

    /// Polls and dispatches until the consumer terminates.
    ///
    /// Returns `Ok(())` after a single run or after cancellation, and the
    /// error that stopped it when a fetch fails. Per-message failures never
    /// surface here; they go to the fault sink.
    pub async fn run(&self) -> Result<(), SqsConsumerError> {
        let handler = self.handler.clone().ok_or_else(|| {
            SqsConsumerError::config("no message handler registered, call register_handler first")
        })?;

        info!(
            max_batch_size = self.config.max_batch_size,
            max_handlers = self.config.max_concurrent_handlers,
            run_once = self.config.run_once,
            "Starting SQS consumer"
        );

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.queue_client),
            handler,
            self.shared_resources.clone(),
            Arc::clone(&self.admission),
            Arc::clone(&self.fault_sink),
            LeasePolicy {
                visibility_timeout_seconds: self.config.visibility_timeout_seconds,
                safety_margin: self.config.lease_safety_margin,
                extension_seconds: self.config.lease_extension_seconds,
            },
        );

        let mut session = PollSession::new(&self.config);
        let result = PollLoop::new(
            &self.queue_client,
            &self.config,
            &self.admission,
            dispatcher,
            &self.shutdown,
        )
        .run(&mut session)
        .await;

        debug_assert!(session.is_terminated());
        debug!(
            state = ?session.state(),
            batches = session.batch(),
            "SQS consumer stopped"
        );
        result
    }

    /// Sends messages to the queue, split into batches SQS accepts.
    ///
    /// Results come back in input order. A failed call aborts the remaining
    /// batches; earlier ones have already been sent.
    pub async fn enqueue(
        &self,
        messages: Vec<OutgoingMessage>,
    ) -> Result<Vec<SendBatchEntryResult>, SqsConsumerError> {
        let mut results = Vec::with_capacity(messages.len());
        for chunk in messages.chunks(SQS_MAX_BATCH_SIZE) {
            results.extend(self.queue_client.send_batch(chunk).await?);
        }

        let sent = results.iter().filter(|r| r.is_sent()).count();
        info!(
            sent,
            failed = results.len() - sent,
            "Enqueued messages"
        );
        Ok(results)
    }
}

/// Consumes `queue_url` with the default configuration until a fetch fails.
///
/// # Example
///
/// ```rust,no_run
/// use rs_sqs_consumer::{client::create_sqs_client_from_env, consumer::{start_consume_queue, HandlerOutcome}};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = create_sqs_client_from_env().await;
///     let queue_url = "https://sqs.region.amazonaws.com/account/queue-name";
///
///     start_consume_queue(client, queue_url, "shared state".to_string(), |message, shared| async move {
///         println!("Processing message: {} with shared: {}", message.body(), shared);
///         Ok(HandlerOutcome::Completed)
///     })
///     .await?;
///
///     Ok(())
/// }
/// ```
pub async fn start_consume_queue<RFn, Fut, TShared>(
    sqs_client: aws_sdk_sqs::Client,
    queue_url: &str,
    shared_resources: TShared,
    rv_fn: RFn,
) -> Result<(), SqsConsumerError>
where
    RFn: Fn(crate::queue::Message, TShared) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
    TShared: Send + Sync + Clone + 'static,
{
    let mut consumer = SqsConsumer::from_sqs_client(
        sqs_client,
        queue_url,
        SqsConsumerConfig::default(),
        shared_resources,
    )?;
    consumer.register_handler_fn(rv_fn);
    consumer.run().await
}
