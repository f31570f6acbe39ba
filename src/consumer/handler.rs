use async_trait::async_trait;
use std::future::Future;

use crate::errors::HandlerError;
use crate::queue::Message;

/// What a handler decided about a message.
///
/// The handler only reports the outcome; the dispatcher turns it into the
/// matching queue call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Fully processed. The message is deleted.
    Completed,
    /// Make the message visible again after `after_seconds`.
    Retry { after_seconds: i32 },
    /// Processing failed. The message becomes visible again after
    /// `retry_after_seconds`, immediately when `None`.
    Failed {
        reason: String,
        retry_after_seconds: Option<i32>,
    },
}

impl HandlerOutcome {
    /// Retry with the message visible again immediately.
    pub fn retry_now() -> Self {
        HandlerOutcome::Retry { after_seconds: 0 }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        HandlerOutcome::Failed {
            reason: reason.into(),
            retry_after_seconds: None,
        }
    }
}

pub type HandlerResult = Result<HandlerOutcome, HandlerError>;

/// Trait for implementing asynchronous SQS message handlers.
///
/// `TShared` is a resource cloned into every invocation, such as a database
/// pool or an HTTP client.
#[async_trait]
pub trait MessageHandler<TShared>: Send + Sync + 'static
where
    TShared: Send + Sync + Clone + 'static,
{
    /// Processes one message.
    ///
    /// An `Err` is treated as [`HandlerOutcome::Failed`] with no retry delay.
    async fn handle(&self, message: Message, shared: TShared) -> HandlerResult;
}

/// [`MessageHandler`] backed by an async function or closure.
///
/// # Type Parameters
///
/// * `RFn` - The message handler function type
/// * `Fut` - The future returned by the handler function
/// * `TShared` - The type of shared resources passed to the handler
pub struct MessageHandlerFn<RFn, Fut, TShared>
where
    RFn: Fn(Message, TShared) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
    TShared: Send + Sync + Clone + 'static,
{
    rv_fn: RFn,
    _marker: std::marker::PhantomData<fn(TShared) -> Fut>,
}

impl<RFn, Fut, TShared> MessageHandlerFn<RFn, Fut, TShared>
where
    RFn: Fn(Message, TShared) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
    TShared: Send + Sync + Clone + 'static,
{
    pub fn new(rv_fn: RFn) -> Self {
        MessageHandlerFn {
            rv_fn,
            _marker: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<RFn, Fut, TShared> MessageHandler<TShared> for MessageHandlerFn<RFn, Fut, TShared>
where
    RFn: Fn(Message, TShared) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
    TShared: Send + Sync + Clone + 'static,
{
    async fn handle(&self, message: Message, shared: TShared) -> HandlerResult {
        (self.rv_fn)(message, shared).await
    }
}
