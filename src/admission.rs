//! Admission control over acknowledgment-awaiting requests.
//!
//! Every call with `expect_ack` owns a rendezvous slot while in flight;
//! slots are a fixed pool so a burst of callers cannot grow the awaiting
//! set without bound. Acquisition is strictly non-blocking: a caller that
//! finds the pool empty fails its call immediately rather than queueing.
//! Fire-and-forget calls never touch the pool.

use std::sync::Arc;

use tokio::sync::{Semaphore, TryAcquireError};

/// A held admission slot. Dropping it returns the slot to the pool.
pub struct Slot {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Bounds the number of requests simultaneously awaiting acknowledgment.
pub struct AdmissionController {
    slots: Arc<Semaphore>,
    max: usize,
}

impl AdmissionController {
    /// Create a controller with `max` slots.
    pub fn new(max: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Try to take a slot without waiting.
    pub fn try_acquire(&self) -> Option<Slot> {
        match self.slots.clone().try_acquire_owned() {
            Ok(permit) => Some(Slot { _permit: permit }),
            Err(TryAcquireError::NoPermits) => None,
            // The engine never closes the pool.
            Err(TryAcquireError::Closed) => None,
        }
    }

    /// Number of requests currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max - self.slots.available_permits()
    }

    /// Configured slot ceiling.
    pub fn capacity(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_up_to_capacity() {
        let ctl = AdmissionController::new(2);
        let a = ctl.try_acquire();
        let b = ctl.try_acquire();
        assert!(a.is_some());
        assert!(b.is_some());
        assert_eq!(ctl.in_flight(), 2);
        assert!(ctl.try_acquire().is_none());
    }

    #[test]
    fn drop_releases_slot() {
        let ctl = AdmissionController::new(1);
        let slot = ctl.try_acquire().unwrap();
        assert!(ctl.try_acquire().is_none());
        drop(slot);
        assert_eq!(ctl.in_flight(), 0);
        assert!(ctl.try_acquire().is_some());
    }

    #[test]
    fn count_never_exceeds_capacity() {
        let ctl = AdmissionController::new(3);
        let mut held = Vec::new();
        for _ in 0..10 {
            if let Some(slot) = ctl.try_acquire() {
                held.push(slot);
            }
            assert!(ctl.in_flight() <= ctl.capacity());
        }
        assert_eq!(held.len(), 3);
    }
}
