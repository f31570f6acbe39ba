use thiserror::Error;
use tracing::error;

/// Error types for AWS SQS consumer operations.
///
/// Configuration and fetch errors are fatal to the poll loop. Everything
/// that goes wrong with a single message is reported through a [`FaultSink`]
/// instead and never stops the consumer.
#[derive(Debug, Error)]
pub enum SqsConsumerError {
    /// Error that occurs during AWS SQS client initialization.
    ///
    /// This error typically happens when there are issues with AWS credentials,
    /// region configuration, or when the configured queue cannot be reached.
    #[error("failed to initialize AWS SQS client: {0}")]
    InitializationError(String),

    /// Invalid consumer construction parameters, or `run` without a handler.
    #[error("invalid consumer configuration: {0}")]
    ConfigError(String),

    /// A call to the backing queue failed.
    #[error("queue transport error: {0}")]
    TransportError(String),

    /// A handler panicked while processing a message.
    #[error("handler fault on message {message_id}: {detail}")]
    HandlerFault { message_id: String, detail: String },
}

impl SqsConsumerError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        SqsConsumerError::ConfigError(message.into())
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        SqsConsumerError::TransportError(message.into())
    }
}

/// Error returned by a message handler.
///
/// Returning this from a handler is equivalent to returning
/// [`HandlerOutcome::Failed`](crate::consumer::HandlerOutcome::Failed) with no
/// explicit retry delay: the message becomes visible again immediately.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    /// Creates a new `HandlerError` with the provided message.
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(s: String) -> Self {
        HandlerError(s)
    }
}

impl From<&str> for HandlerError {
    fn from(s: &str) -> Self {
        HandlerError(s.to_string())
    }
}

/// A per-message failure surfaced by the dispatcher.
#[derive(Debug)]
pub struct MessageFault {
    pub message_id: String,
    /// Batch the message arrived in.
    pub batch: u64,
    pub error: SqsConsumerError,
}

/// Receives per-message faults: handler panics and failed delete or
/// change-visibility calls.
pub trait FaultSink: Send + Sync + 'static {
    fn report(&self, fault: MessageFault);
}

impl<F> FaultSink for F
where
    F: Fn(MessageFault) + Send + Sync + 'static,
{
    fn report(&self, fault: MessageFault) {
        (self)(fault)
    }
}

/// Default sink, logs every fault at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultSink;

impl FaultSink for TracingFaultSink {
    fn report(&self, fault: MessageFault) {
        error!(
            message_id = %fault.message_id,
            batch = fault.batch,
            error = %fault.error,
            "Message fault"
        );
    }
}
