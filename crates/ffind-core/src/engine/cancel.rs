/// Cancellation — a single-shot signal shared by every engine thread.
///
/// The flag is cheap to poll with [`CancellationController::is_cancelled`].
/// Blocking operations instead select on [`CancellationController::signal`]:
/// the controller holds the only sender of that channel and drops it on
/// cancel, so every receiver becomes ready at once.
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Why a traversal was cancelled. Only the first reason is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Someone outside the engine asked for it (Ctrl-C, UI button, test).
    Requested,
    /// The configured timeout elapsed.
    TimedOut,
    /// A worker hit an error under the abort-all policy.
    Failed,
    /// The caller dropped the result stream.
    ConsumerGone,
}

impl CancelReason {
    /// `true` for reasons that are a clean shutdown rather than a failure.
    pub fn is_clean(self) -> bool {
        !matches!(self, CancelReason::Failed)
    }
}

struct Inner {
    flag: AtomicBool,
    reason: Mutex<Option<CancelReason>>,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

/// Cloneable handle to a shared cancellation signal.
#[derive(Clone)]
pub struct CancellationController {
    inner: Arc<Inner>,
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationController")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

impl CancellationController {
    pub fn new() -> Self {
        // Nothing is ever sent; the channel only exists to be disconnected.
        let (trigger, signal) = bounded::<()>(0);
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                reason: Mutex::new(None),
                trigger: Mutex::new(Some(trigger)),
                signal,
            }),
        }
    }

    /// Request cancellation from outside the engine.
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::Requested);
    }

    /// Set the signal with `reason`. Returns `true` only for the call that
    /// actually flipped it; later calls are no-ops.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        {
            let mut slot = self.inner.reason.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
        }
        self.inner.flag.store(true, Ordering::SeqCst);
        drop(self.inner.trigger.lock().take());
        debug!("Cancellation requested: {reason:?}");
        true
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<CancelReason> {
        *self.inner.reason.lock()
    }

    /// Receiver that is ready (disconnected) once cancellation is set.
    ///
    /// Use it as one arm of a `select!`; never expect a value from it.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// Cancel with [`CancelReason::TimedOut`] after `timeout`, unless
    /// cancellation happens first or `disarm` disconnects.
    ///
    /// The caller keeps the sender paired with `disarm` and drops it when the
    /// work is finished, which lets the deadline thread exit early.
    pub fn cancel_after(
        &self,
        timeout: Duration,
        disarm: Receiver<()>,
    ) -> std::io::Result<JoinHandle<()>> {
        let controller = self.clone();
        thread::Builder::new()
            .name("ffind-deadline".into())
            .spawn(move || {
                crossbeam_channel::select! {
                    recv(controller.signal()) -> _ => {}
                    recv(disarm) -> _ => {}
                    default(timeout) => {
                        if controller.cancel_with(CancelReason::TimedOut) {
                            debug!("Deadline of {timeout:?} reached");
                        }
                    }
                }
            })
    }

    /// Block until cancelled or until `timeout` passes. Returns `true` if
    /// cancellation was observed.
    #[cfg(test)]
    fn wait_timeout(&self, timeout: Duration) -> bool {
        use crossbeam_channel::RecvTimeoutError;
        match self.inner.signal.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) | Ok(()) => self.is_cancelled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn starts_unset() {
        let cancel = CancellationController::new();
        assert!(!cancel.is_cancelled());
        assert_eq!(cancel.reason(), None);
        assert!(cancel.signal().try_recv().is_err());
        assert!(!cancel.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn first_setter_wins() {
        let cancel = CancellationController::new();
        assert!(cancel.cancel_with(CancelReason::Failed));
        assert!(!cancel.cancel_with(CancelReason::Requested));
        cancel.cancel();
        assert_eq!(cancel.reason(), Some(CancelReason::Failed));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn signal_disconnects_for_every_clone() {
        let cancel = CancellationController::new();
        let other = cancel.clone();
        let waiter = thread::spawn(move || other.signal().recv().is_err());
        cancel.cancel();
        assert!(waiter.join().unwrap());
        assert!(cancel.wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn deadline_fires() {
        let cancel = CancellationController::new();
        let (_keep, disarm) = bounded::<()>(0);
        let start = Instant::now();
        let handle = cancel.cancel_after(Duration::from_millis(20), disarm).unwrap();
        handle.join().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(cancel.reason(), Some(CancelReason::TimedOut));
    }

    #[test]
    fn disarmed_deadline_does_not_cancel() {
        let cancel = CancellationController::new();
        let (keep, disarm) = bounded::<()>(0);
        let handle = cancel.cancel_after(Duration::from_secs(60), disarm).unwrap();
        drop(keep);
        handle.join().unwrap();
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn clean_reasons() {
        assert!(CancelReason::Requested.is_clean());
        assert!(CancelReason::TimedOut.is_clean());
        assert!(CancelReason::ConsumerGone.is_clean());
        assert!(!CancelReason::Failed.is_clean());
    }
}
