/// Outstanding-work counter — tracks nodes accepted but not yet fully expanded.
///
/// The tree size is unknown up front, so instead of a wait-group sized in
/// advance the count grows as workers discover children and shrinks as they
/// finish nodes. Reaching zero after the root has been added is the one and
/// only signal that the traversal is complete, provided every `add` for a child
/// happens before that child is pushed to the queue.
use crate::engine::cancel::CancellationController;
use crate::error::{Result, TraversalError};
use parking_lot::{Condvar, Mutex};
use std::time::Duration;
use tracing::error;

/// Longest a cancellable wait sleeps on the condvar before re-checking the
/// cancel flag.
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
pub struct OutstandingCounter {
    count: Mutex<usize>,
    zero: Condvar,
}

impl OutstandingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for `n` new items. Call before the items become visible to any
    /// consumer.
    pub fn add(&self, n: usize) {
        debug_assert!(n >= 1, "OutstandingCounter::add called with 0");
        *self.count.lock() += n;
    }

    /// Mark one item as fully processed.
    pub fn done(&self) {
        let mut count = self.count.lock();
        match count.checked_sub(1) {
            Some(next) => {
                *count = next;
                if next == 0 {
                    self.zero.notify_all();
                }
            }
            None => {
                // More `done` than `add` calls: a bookkeeping bug upstream.
                error!("OutstandingCounter::done called with nothing outstanding");
                debug_assert!(false, "OutstandingCounter underflow");
            }
        }
    }

    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Block until the count reaches zero.
    pub fn wait_zero(&self) {
        let mut count = self.count.lock();
        while *count != 0 {
            self.zero.wait(&mut count);
        }
    }

    /// Block until the count reaches zero or `cancel` is set, whichever comes
    /// first. Cancellation is noticed within [`CANCEL_POLL_INTERVAL`].
    pub fn wait_zero_or_cancelled(&self, cancel: &CancellationController) -> Result<()> {
        let mut count = self.count.lock();
        loop {
            if cancel.is_cancelled() {
                return Err(TraversalError::Cancelled);
            }
            if *count == 0 {
                return Ok(());
            }
            self.zero.wait_for(&mut count, CANCEL_POLL_INTERVAL);
        }
    }
}
