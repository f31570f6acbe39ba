use std::time::Duration;

use tokio::time::Instant;

/// The visibility window of one in-flight message.
///
/// The queue enforces visibility server-side; the lease is the consumer's
/// local view of it. Resolving takes the lease by value so its deadline can
/// never be read or extended afterwards.
#[derive(Debug)]
pub struct Lease {
    message_id: String,
    receipt_handle: String,
    deadline: Instant,
}

impl Lease {
    /// Starts a lease that expires `visibility_timeout_seconds` after `received_at`.
    pub fn new(
        message_id: impl Into<String>,
        receipt_handle: impl Into<String>,
        received_at: Instant,
        visibility_timeout_seconds: i32,
    ) -> Self {
        Lease {
            message_id: message_id.into(),
            receipt_handle: receipt_handle.into(),
            deadline: received_at + seconds(visibility_timeout_seconds),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn receipt_handle(&self) -> &str {
        &self.receipt_handle
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the message becomes visible again; zero once expired.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// The instant at which the lease enters its safety margin.
    pub fn warning_at(&self, margin: Duration) -> Instant {
        self.deadline.checked_sub(margin).unwrap_or(self.deadline)
    }

    /// Records a visibility change issued now: the message stays hidden for
    /// another `visibility_timeout_seconds`.
    pub fn extend(&mut self, visibility_timeout_seconds: i32) {
        self.deadline = Instant::now() + seconds(visibility_timeout_seconds);
    }

    /// Consumes the lease, handing back what is needed for the terminal call.
    pub fn resolve(self) -> ResolvedLease {
        ResolvedLease {
            message_id: self.message_id,
            receipt_handle: self.receipt_handle,
        }
    }
}

/// What is left of a lease after resolution: enough to address the message
/// in a delete or change-visibility call, and nothing else.
#[derive(Debug)]
pub struct ResolvedLease {
    pub message_id: String,
    pub receipt_handle: String,
}

fn seconds(value: i32) -> Duration {
    Duration::from_secs(value.max(0) as u64)
}
