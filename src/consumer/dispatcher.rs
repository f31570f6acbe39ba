use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use super::admission::{AdmissionController, AdmissionPermit};
use super::handler::{HandlerOutcome, MessageHandler};
use super::lease::{Lease, ResolvedLease};
use crate::errors::{FaultSink, MessageFault, SqsConsumerError};
use crate::queue::{Message, QueueClient};

const MAX_VISIBILITY_TIMEOUT_SECONDS: i32 = 12 * 60 * 60;

/// The single terminal queue call made for a dispatched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Delete,
    Release { visibility_timeout_seconds: i32 },
}

impl Resolution {
    fn release(seconds: i32) -> Self {
        Resolution::Release {
            visibility_timeout_seconds: seconds.clamp(0, MAX_VISIBILITY_TIMEOUT_SECONDS),
        }
    }
}

/// Lease settings shared by every handler task.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LeasePolicy {
    pub visibility_timeout_seconds: i32,
    pub safety_margin: Duration,
    pub extension_seconds: Option<i32>,
}

/// Runs handlers concurrently and resolves each message exactly once.
pub(crate) struct Dispatcher<TShared>
where
    TShared: Send + Sync + Clone + 'static,
{
    queue: Arc<dyn QueueClient>,
    handler: Arc<dyn MessageHandler<TShared>>,
    shared_resources: TShared,
    admission: Arc<AdmissionController>,
    fault_sink: Arc<dyn FaultSink>,
    lease_policy: LeasePolicy,
    tracker: TaskTracker,
}

impl<TShared> Clone for Dispatcher<TShared>
where
    TShared: Send + Sync + Clone + 'static,
{
    fn clone(&self) -> Self {
        Dispatcher {
            queue: Arc::clone(&self.queue),
            handler: Arc::clone(&self.handler),
            shared_resources: self.shared_resources.clone(),
            admission: Arc::clone(&self.admission),
            fault_sink: Arc::clone(&self.fault_sink),
            lease_policy: self.lease_policy,
            tracker: self.tracker.clone(),
        }
    }
}

impl<TShared> Dispatcher<TShared>
where
    TShared: Send + Sync + Clone + 'static,
{
    pub(crate) fn new(
        queue: Arc<dyn QueueClient>,
        handler: Arc<dyn MessageHandler<TShared>>,
        shared_resources: TShared,
        admission: Arc<AdmissionController>,
        fault_sink: Arc<dyn FaultSink>,
        lease_policy: LeasePolicy,
    ) -> Self {
        Dispatcher {
            queue,
            handler,
            shared_resources,
            admission,
            fault_sink,
            lease_policy,
            tracker: TaskTracker::new(),
        }
    }

    /// Number of spawned tasks that have not finished yet.
    pub(crate) fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Starts one handler task per message without waiting for any of them.
    ///
    /// A message that cannot be admitted is handed straight back to the queue.
    /// Returns how many messages were handed to the handler.
    pub(crate) fn dispatch(&self, batch: Vec<Message>, received_at: Instant) -> usize {
        let mut dispatched = 0;
        for message in batch {
            let lease = Lease::new(
                message.message_id(),
                message.receipt_handle(),
                received_at,
                self.lease_policy.visibility_timeout_seconds,
            );

            let Some(permit) = self.admission.try_admit() else {
                warn!(
                    message_id = %message.message_id(),
                    batch = message.batch(),
                    in_flight = self.admission.in_flight(),
                    "No handler capacity left, releasing message back to the queue"
                );
                self.spawn_release(lease, message.batch());
                continue;
            };

            debug!(
                message_id = %message.message_id(),
                batch = message.batch(),
                "Spawned handler"
            );
            let this = self.clone();
            self.tracker
                .spawn(async move { this.process(message, lease, permit).await });
            dispatched += 1;
        }
        dispatched
    }

    /// Makes every message visible again without handling it.
    pub(crate) fn release_all(&self, batch: Vec<Message>, received_at: Instant) {
        for message in batch {
            let lease = Lease::new(
                message.message_id(),
                message.receipt_handle(),
                received_at,
                self.lease_policy.visibility_timeout_seconds,
            );
            self.spawn_release(lease, message.batch());
        }
    }

    /// Waits for every spawned task, including ones started after this call.
    pub(crate) async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    fn spawn_release(&self, lease: Lease, batch: u64) {
        let this = self.clone();
        self.tracker.spawn(async move {
            this.resolve(lease.resolve(), batch, Resolution::release(0))
                .await
        });
    }

    async fn process(self, message: Message, mut lease: Lease, permit: AdmissionPermit) {
        let batch = message.batch();
        let message_id = message.message_id().to_string();

        let handling = AssertUnwindSafe(
            self.handler
                .handle(message, self.shared_resources.clone()),
        )
        .catch_unwind();
        tokio::pin!(handling);

        let mut watch_lease = self.lease_policy.visibility_timeout_seconds > 0;
        let result = loop {
            let warning_at = lease.warning_at(self.lease_policy.safety_margin);
            tokio::select! {
                result = &mut handling => break result,
                _ = tokio::time::sleep_until(warning_at), if watch_lease => {
                    watch_lease = self.on_lease_near_expiry(&mut lease, batch).await;
                }
            }
        };

        let resolution = match result {
            Ok(Ok(HandlerOutcome::Completed)) => Resolution::Delete,
            Ok(Ok(HandlerOutcome::Retry { after_seconds })) => {
                debug!(
                    message_id = %message_id,
                    batch,
                    after_seconds,
                    "Handler asked for a retry"
                );
                Resolution::release(after_seconds)
            }
            Ok(Ok(HandlerOutcome::Failed {
                reason,
                retry_after_seconds,
            })) => {
                warn!(
                    message_id = %message_id,
                    batch,
                    reason = %reason,
                    "Handler failed, message will be retried"
                );
                Resolution::release(retry_after_seconds.unwrap_or(0))
            }
            Ok(Err(e)) => {
                warn!(
                    message_id = %message_id,
                    batch,
                    error = %e,
                    "Handler returned an error, message will be retried"
                );
                Resolution::release(0)
            }
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!(
                    message_id = %message_id,
                    batch,
                    panic = %detail,
                    "Handler panicked, message will be retried"
                );
                self.fault_sink.report(MessageFault {
                    message_id: message_id.clone(),
                    batch,
                    error: SqsConsumerError::HandlerFault {
                        message_id,
                        detail,
                    },
                });
                Resolution::release(0)
            }
        };

        self.resolve(lease.resolve(), batch, resolution).await;
        drop(permit);
    }

    /// Returns whether the lease should keep being watched.
    async fn on_lease_near_expiry(&self, lease: &mut Lease, batch: u64) -> bool {
        warn!(
            message_id = %lease.message_id(),
            batch,
            remaining_ms = lease.remaining().as_millis() as u64,
            "Handler still running close to lease expiry, the message may be redelivered"
        );

        let Some(extension) = self.lease_policy.extension_seconds else {
            return false;
        };

        match self
            .queue
            .change_visibility(lease.receipt_handle(), extension)
            .await
        {
            Ok(()) => {
                lease.extend(extension);
                debug!(
                    message_id = %lease.message_id(),
                    batch,
                    extension_seconds = extension,
                    "Extended lease"
                );
                true
            }
            Err(error) => {
                warn!(
                    message_id = %lease.message_id(),
                    batch,
                    error = %error,
                    "Failed to extend lease"
                );
                self.fault_sink.report(MessageFault {
                    message_id: lease.message_id().to_string(),
                    batch,
                    error,
                });
                false
            }
        }
    }

    async fn resolve(&self, lease: ResolvedLease, batch: u64, resolution: Resolution) {
        let result = match resolution {
            Resolution::Delete => self.queue.delete_message(&lease.receipt_handle).await,
            Resolution::Release {
                visibility_timeout_seconds,
            } => {
                self.queue
                    .change_visibility(&lease.receipt_handle, visibility_timeout_seconds)
                    .await
            }
        };

        match result {
            Ok(()) => debug!(
                message_id = %lease.message_id,
                batch,
                resolution = ?resolution,
                "Resolved message"
            ),
            Err(error) => {
                error!(
                    message_id = %lease.message_id,
                    batch,
                    resolution = ?resolution,
                    error = %error,
                    "Failed to resolve message, it will reappear after its visibility timeout"
                );
                self.fault_sink.report(MessageFault {
                    message_id: lease.message_id,
                    batch,
                    error,
                });
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
