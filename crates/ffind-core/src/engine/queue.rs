/// Unbounded work queue built from two rendezvous channels and an arbiter.
///
/// Producers hand items to the arbiter thread over a zero-capacity channel and
/// consumers take them from it over another. The arbiter owns the backing
/// `VecDeque` outright, so no lock guards it: each turn it selects between
/// accepting a push and offering the next item to a waiting popper, and it only
/// offers while the buffer is non-empty. Pushers therefore never wait for
/// space, only for the arbiter's attention.
///
/// Closing is a separate signal rather than dropping senders, because the same
/// workers that pop also hold senders for the children they discover.
use crate::config::Discipline;
use crate::engine::cancel::CancellationController;
use crate::error::{Result, TraversalError};
use crossbeam_channel::{bounded, select, Receiver, Select, Sender, TryRecvError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

/// Totals reported by the arbiter when it exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub pushed: u64,
    pub popped: u64,
    /// Largest number of items buffered at once.
    pub peak_len: usize,
    /// Items still buffered when the queue was torn down by cancellation.
    pub abandoned: usize,
}

/// Handle for adding items to the queue. Cheap to clone, one per producer.
pub struct QueueSender<T> {
    tx: Sender<T>,
    closed: Receiver<()>,
    cancel: CancellationController,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closed: self.closed.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> QueueSender<T> {
    /// Hand `item` to the arbiter.
    ///
    /// Fails with [`TraversalError::Cancelled`] once cancellation is set and
    /// otherwise with [`TraversalError::QueueClosed`] once the queue is
    /// closed. The item is dropped in both cases.
    pub fn push(&self, item: T) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(TraversalError::Cancelled);
        }
        if let Err(TryRecvError::Disconnected) = self.closed.try_recv() {
            return Err(self.rejected());
        }
        select! {
            send(self.tx, item) -> res => res.map_err(|_| self.rejected()),
            recv(self.closed) -> _ => Err(self.rejected()),
            recv(self.cancel.signal()) -> _ => Err(TraversalError::Cancelled),
        }
    }

    /// A cancelled arbiter also drops its input, so a failed send only means
    /// the queue was closed if cancellation is still unset.
    fn rejected(&self) -> TraversalError {
        if self.cancel.is_cancelled() {
            TraversalError::Cancelled
        } else {
            TraversalError::QueueClosed
        }
    }
}

/// Handle for taking items from the queue. Cheap to clone, one per consumer.
pub struct QueueReceiver<T> {
    rx: Receiver<T>,
    cancel: CancellationController,
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> QueueReceiver<T> {
    /// Wait for the next item.
    ///
    /// Returns `Ok(None)` once the queue has been closed and drained, and
    /// `Err(Cancelled)` if cancellation wins the race.
    pub fn pop(&self) -> Result<Option<T>> {
        if self.cancel.is_cancelled() {
            return Err(TraversalError::Cancelled);
        }
        select! {
            recv(self.rx) -> msg => Ok(msg.ok()),
            recv(self.cancel.signal()) -> _ => Err(TraversalError::Cancelled),
        }
    }
}

/// Handle that closes the input side of the queue. Idempotent.
#[derive(Clone)]
pub struct QueueCloser {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
}

impl QueueCloser {
    pub fn close(&self) {
        if self.trigger.lock().take().is_some() {
            debug!("Work queue closed for input");
        }
    }
}

/// The queue itself: owns the arbiter thread plus one handle of each kind.
pub struct UnboundedQueue<T> {
    sender: QueueSender<T>,
    receiver: QueueReceiver<T>,
    closer: QueueCloser,
    arbiter: JoinHandle<QueueStats>,
}

impl<T: Send + 'static> UnboundedQueue<T> {
    /// Start the arbiter thread.
    pub fn spawn(discipline: Discipline, cancel: CancellationController) -> Result<Self> {
        let (in_tx, in_rx) = bounded::<T>(0);
        let (out_tx, out_rx) = bounded::<T>(0);
        let (close_tx, close_rx) = bounded::<()>(0);

        let arbiter = Arbiter {
            buffer: VecDeque::new(),
            discipline,
            stats: QueueStats::default(),
        };
        let arbiter_cancel = cancel.signal().clone();
        let arbiter_close = close_rx.clone();
        let handle = thread::Builder::new()
            .name("ffind-queue".into())
            .spawn(move || arbiter.run(in_rx, out_tx, arbiter_close, arbiter_cancel))
            .map_err(|source| TraversalError::Spawn {
                name: "ffind-queue".into(),
                source,
            })?;

        Ok(Self {
            sender: QueueSender {
                tx: in_tx,
                closed: close_rx,
                cancel: cancel.clone(),
            },
            receiver: QueueReceiver { rx: out_rx, cancel },
            closer: QueueCloser {
                trigger: Arc::new(Mutex::new(Some(close_tx))),
            },
            arbiter: handle,
        })
    }
}

impl<T> UnboundedQueue<T> {
    pub fn sender(&self) -> QueueSender<T> {
        self.sender.clone()
    }

    pub fn receiver(&self) -> QueueReceiver<T> {
        self.receiver.clone()
    }

    pub fn closer(&self) -> QueueCloser {
        self.closer.clone()
    }

    pub fn push(&self, item: T) -> Result<()> {
        self.sender.push(item)
    }

    pub fn pop(&self) -> Result<Option<T>> {
        self.receiver.pop()
    }

    pub fn close(&self) {
        self.closer.close();
    }

    /// Wait for the arbiter to exit and return its totals.
    ///
    /// The arbiter exits once the queue is closed and drained, or on
    /// cancellation. Call this only after one of those is guaranteed.
    pub fn join(self) -> QueueStats {
        let Self {
            sender,
            receiver,
            closer,
            arbiter,
        } = self;
        drop((sender, receiver, closer));
        arbiter.join().unwrap_or_default()
    }
}

/// The only owner of the backing buffer.
struct Arbiter<T> {
    buffer: VecDeque<T>,
    discipline: Discipline,
    stats: QueueStats,
}

impl<T> Arbiter<T> {
    fn take(&mut self) -> Option<T> {
        match self.discipline {
            Discipline::Fifo => self.buffer.pop_front(),
            Discipline::Lifo => self.buffer.pop_back(),
        }
    }

    fn run(
        mut self,
        input: Receiver<T>,
        output: Sender<T>,
        closed: Receiver<()>,
        cancel: Receiver<()>,
    ) -> QueueStats {
        let mut accepting = true;

        loop {
            if !accepting && self.buffer.is_empty() {
                break;
            }

            let mut sel = Select::new();
            let cancel_op = sel.recv(&cancel);
            let close_op = accepting.then(|| sel.recv(&closed));
            let push_op = accepting.then(|| sel.recv(&input));
            let offer_op = (!self.buffer.is_empty()).then(|| sel.send(&output));

            let oper = sel.select();
            let index = oper.index();

            if index == cancel_op {
                let _ = oper.recv(&cancel);
                self.stats.abandoned = self.buffer.len();
                debug!(
                    "Work queue torn down by cancellation with {} item(s) pending",
                    self.buffer.len()
                );
                break;
            } else if Some(index) == close_op {
                let _ = oper.recv(&closed);
                accepting = false;
            } else if Some(index) == push_op {
                match oper.recv(&input) {
                    Ok(item) => {
                        self.buffer.push_back(item);
                        self.stats.pushed += 1;
                        self.stats.peak_len = self.stats.peak_len.max(self.buffer.len());
                    }
                    // Every sender is gone; nothing more can arrive.
                    Err(_) => accepting = false,
                }
            } else {
                debug_assert_eq!(Some(index), offer_op);
                let item = self
                    .take()
                    .expect("offer is only registered while the buffer is non-empty");
                if oper.send(&output, item).is_err() {
                    // Every receiver is gone; nobody can take items any more.
                    self.stats.abandoned = self.buffer.len() + 1;
                    break;
                }
                self.stats.popped += 1;
            }
        }

        trace!(
            "Arbiter exiting: {} pushed, {} popped, peak {}",
            self.stats.pushed,
            self.stats.popped,
            self.stats.peak_len
        );
        // Dropping `output` here tells every popper the queue is exhausted.
        self.stats
    }
}
