use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use super::admission::AdmissionController;
use super::config::SqsConsumerConfig;
use super::dispatcher::Dispatcher;
use crate::errors::SqsConsumerError;
use crate::queue::QueueClient;

/// Where the poll loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollState {
    Idle,
    Fetching,
    Waiting,
    Dispatching,
    Draining,
    Terminated,
}

/// Bookkeeping for one `run` of the consumer.
#[derive(Debug)]
pub(crate) struct PollSession {
    batch: u64,
    run_once: bool,
    interval: Duration,
    state: PollState,
}

impl PollSession {
    pub(crate) fn new(config: &SqsConsumerConfig) -> Self {
        PollSession {
            batch: 0,
            run_once: config.run_once,
            interval: config.interval,
            state: PollState::Idle,
        }
    }

    pub(crate) fn batch(&self) -> u64 {
        self.batch
    }

    pub(crate) fn state(&self) -> PollState {
        self.state
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.state == PollState::Terminated
    }

    fn transition(&mut self, next: PollState) {
        trace!(batch = self.batch, from = ?self.state, to = ?next, "Poll state transition");
        if next == PollState::Fetching {
            self.batch += 1;
        }
        self.state = next;
    }
}

/// Why the fetch loop stopped.
#[derive(Debug)]
enum PollExit {
    RanOnce,
    Cancelled,
    Failed(SqsConsumerError),
}

enum Next {
    Fetch,
    Exit(PollExit),
}

/// Coordinates fetching, dispatching and waiting until terminated.
pub(crate) struct PollLoop<'a, TShared>
where
    TShared: Send + Sync + Clone + 'static,
{
    queue: &'a Arc<dyn QueueClient>,
    config: &'a SqsConsumerConfig,
    admission: &'a AdmissionController,
    dispatcher: Dispatcher<TShared>,
    shutdown: &'a CancellationToken,
}

impl<'a, TShared> PollLoop<'a, TShared>
where
    TShared: Send + Sync + Clone + 'static,
{
    pub(crate) fn new(
        queue: &'a Arc<dyn QueueClient>,
        config: &'a SqsConsumerConfig,
        admission: &'a AdmissionController,
        dispatcher: Dispatcher<TShared>,
        shutdown: &'a CancellationToken,
    ) -> Self {
        PollLoop {
            queue,
            config,
            admission,
            dispatcher,
            shutdown,
        }
    }

    /// Runs until terminated: single-run completion, cancellation or a fetch error.
    ///
    /// Handlers already running are waited for before returning. After
    /// cancellation that wait is bounded by the configured shutdown timeout.
    pub(crate) async fn run(self, session: &mut PollSession) -> Result<(), SqsConsumerError> {
        let exit = loop {
            if self.shutdown.is_cancelled() {
                break PollExit::Cancelled;
            }
            session.transition(PollState::Fetching);
            let span = info_span!("batch", batch = session.batch());
            match self.iterate(session).instrument(span).await {
                Next::Fetch => continue,
                Next::Exit(exit) => break exit,
            }
        };

        session.transition(PollState::Draining);
        match &exit {
            PollExit::RanOnce => info!(batches = session.batch(), "Single run finished"),
            PollExit::Cancelled => info!(batches = session.batch(), "Consumer cancelled"),
            PollExit::Failed(error) => {
                error!(batches = session.batch(), error = %error, "Consumer stopped on fetch error")
            }
        }
        self.drain(matches!(exit, PollExit::Cancelled)).await;
        session.transition(PollState::Terminated);

        match exit {
            PollExit::Failed(error) => Err(error),
            PollExit::RanOnce | PollExit::Cancelled => Ok(()),
        }
    }

    async fn iterate(&self, session: &mut PollSession) -> Next {
        let max_batch_size = self.config.max_batch_size as usize;
        let granted = self.admission.reserve(max_batch_size).min(max_batch_size);

        if granted == 0 {
            info!(
                in_flight = self.admission.in_flight(),
                max_handlers = self.admission.maximum(),
                "Running at full capacity"
            );
            session.transition(PollState::Waiting);
            return self.wait(self.admission.busy_delay()).await;
        }

        debug!(max_messages = granted, "Start receiving messages");
        let fetched = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Next::Exit(PollExit::Cancelled),
            fetched = self.queue.receive_batch(
                granted,
                self.config.wait_time_seconds,
                self.config.visibility_timeout_seconds,
            ) => fetched,
        };
        let received_at = Instant::now();

        let messages = match fetched {
            Ok(messages) => messages,
            Err(error) => return Next::Exit(PollExit::Failed(error)),
        };

        if messages.is_empty() {
            info!("Queue is empty");
        } else {
            info!(count = messages.len(), "Fetched messages");
        }

        let batch = session.batch();
        let messages: Vec<_> = messages
            .into_iter()
            .map(|message| message.with_batch(batch))
            .collect();

        if self.shutdown.is_cancelled() {
            warn!(
                count = messages.len(),
                "Cancelled while fetching, releasing messages back to the queue"
            );
            self.dispatcher.release_all(messages, received_at);
            return Next::Exit(PollExit::Cancelled);
        }

        session.transition(PollState::Dispatching);
        let dispatched = self.dispatcher.dispatch(messages, received_at);
        debug!(dispatched, in_flight = self.admission.in_flight(), "Dispatched batch");

        if session.run_once {
            info!("Exiting since configured to run once");
            return Next::Exit(PollExit::RanOnce);
        }

        debug!(
            interval_ms = session.interval.as_millis() as u64,
            "Waiting before polling for next batch"
        );
        session.transition(PollState::Waiting);
        self.wait(session.interval).await
    }

    async fn wait(&self, delay: Duration) -> Next {
        tokio::select! {
            _ = self.shutdown.cancelled() => Next::Exit(PollExit::Cancelled),
            _ = tokio::time::sleep(delay) => Next::Fetch,
        }
    }

    async fn drain(&self, cancelled: bool) {
        let pending = self.dispatcher.pending();
        if pending > 0 {
            info!(pending, "Waiting for in-flight handlers to finish");
        }

        if !cancelled {
            tokio::select! {
                _ = self.dispatcher.drain() => return,
                _ = self.shutdown.cancelled() => {
                    info!("Cancelled while draining");
                }
            }
        }

        if tokio::time::timeout(self.config.shutdown_timeout, self.dispatcher.drain())
            .await
            .is_err()
        {
            warn!(
                pending = self.dispatcher.pending(),
                timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
                "Shutdown timeout elapsed with handlers still running"
            );
        }
    }
}
