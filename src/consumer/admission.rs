use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Tracks how many handlers are in flight against an optional maximum.
///
/// The counter is the only state shared between handler tasks. Increments go
/// through [`try_admit`](Self::try_admit), which never lets the count pass the
/// maximum; decrements happen when the returned [`AdmissionPermit`] drops.
#[derive(Debug)]
pub struct AdmissionController {
    in_flight: AtomicUsize,
    maximum: usize,
    busy_delay: Duration,
}

impl AdmissionController {
    /// `maximum == 0` admits without limit.
    pub fn new(maximum: usize, busy_delay: Duration) -> Self {
        AdmissionController {
            in_flight: AtomicUsize::new(0),
            maximum,
            busy_delay,
        }
    }

    pub fn is_capped(&self) -> bool {
        self.maximum > 0
    }

    pub fn maximum(&self) -> usize {
        self.maximum
    }

    pub fn busy_delay(&self) -> Duration {
        self.busy_delay
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// How many new messages may be fetched right now.
    ///
    /// Returns `requested` unchanged when uncapped. When capped, returns the
    /// remaining capacity, which is zero when every slot is taken.
    pub fn reserve(&self, requested: usize) -> usize {
        if !self.is_capped() {
            return requested;
        }
        self.maximum.saturating_sub(self.in_flight())
    }

    /// Takes one in-flight slot, or `None` when the maximum is reached.
    pub fn try_admit(self: &Arc<Self>) -> Option<AdmissionPermit> {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if self.is_capped() && current >= self.maximum {
                return None;
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(AdmissionPermit {
                        controller: Arc::clone(self),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Gives back `n` slots, never going below zero.
    pub fn release(&self, n: usize) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(n))
            });
    }
}

/// One admitted handler. Dropping it releases the slot, so the count is
/// returned whether the handler completes, fails or panics.
#[derive(Debug)]
pub struct AdmissionPermit {
    controller: Arc<AdmissionController>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.controller.release(1);
    }
}
