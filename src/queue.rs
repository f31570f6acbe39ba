use async_trait::async_trait;

use crate::errors::SqsConsumerError;

/// Maximum number of entries SQS accepts in a single receive or send-batch call.
pub const SQS_MAX_BATCH_SIZE: usize = 10;

/// A message received from the queue.
///
/// The consumer hands each message to exactly one handler invocation; the
/// receipt handle stays with the dispatcher so the handler never talks to
/// the queue itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    message_id: String,
    body: String,
    receipt_handle: String,
    receive_count: u32,
    batch: u64,
}

impl Message {
    pub fn new(
        message_id: impl Into<String>,
        body: impl Into<String>,
        receipt_handle: impl Into<String>,
    ) -> Self {
        Message {
            message_id: message_id.into(),
            body: body.into(),
            receipt_handle: receipt_handle.into(),
            receive_count: 1,
            batch: 0,
        }
    }

    /// Sets the queue-reported approximate receive count.
    pub fn with_receive_count(mut self, receive_count: u32) -> Self {
        self.receive_count = receive_count;
        self
    }

    pub(crate) fn with_batch(mut self, batch: u64) -> Self {
        self.batch = batch;
        self
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn receipt_handle(&self) -> &str {
        &self.receipt_handle
    }

    /// How many times the queue has delivered this message, starting at 1.
    pub fn receive_count(&self) -> u32 {
        self.receive_count
    }

    /// The poll-loop batch this message arrived in. Diagnostic only.
    pub fn batch(&self) -> u64 {
        self.batch
    }
}

/// A message to enqueue with [`QueueClient::send_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body: String,
    /// FIFO deduplication id.
    pub deduplication_id: Option<String>,
    /// FIFO message group id.
    pub group_id: Option<String>,
    pub delay_seconds: Option<i32>,
}

impl OutgoingMessage {
    pub fn new(body: impl Into<String>) -> Self {
        OutgoingMessage {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_deduplication_id(mut self, id: impl Into<String>) -> Self {
        self.deduplication_id = Some(id.into());
        self
    }

    pub fn with_group_id(mut self, id: impl Into<String>) -> Self {
        self.group_id = Some(id.into());
        self
    }

    pub fn with_delay_seconds(mut self, seconds: i32) -> Self {
        self.delay_seconds = Some(seconds);
        self
    }
}

/// Per-entry result of a send-batch call, in the same order as the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendBatchEntryResult {
    /// Accepted by the queue, carrying the assigned message id.
    Sent { message_id: String },
    /// Rejected by the queue.
    Failed { code: String, reason: String },
}

impl SendBatchEntryResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendBatchEntryResult::Sent { .. })
    }
}

/// The operations the consumer needs from the backing queue.
///
/// [`SqsQueueClient`](crate::client::SqsQueueClient) implements this over the
/// AWS SDK. Any failure must be reported as
/// [`SqsConsumerError::TransportError`].
#[async_trait]
pub trait QueueClient: Send + Sync + 'static {
    /// Long-polls for up to `max_count` messages.
    async fn receive_batch(
        &self,
        max_count: usize,
        wait_time_seconds: i32,
        visibility_timeout_seconds: i32,
    ) -> Result<Vec<Message>, SqsConsumerError>;

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), SqsConsumerError>;

    async fn change_visibility(
        &self,
        receipt_handle: &str,
        timeout_seconds: i32,
    ) -> Result<(), SqsConsumerError>;

    /// Sends at most [`SQS_MAX_BATCH_SIZE`] entries.
    async fn send_batch(
        &self,
        entries: &[OutgoingMessage],
    ) -> Result<Vec<SendBatchEntryResult>, SqsConsumerError>;
}
