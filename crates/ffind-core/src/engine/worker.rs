/// Worker threads — pop a node, list it, route its children.
///
/// Each worker:
/// - Pops one node at a time from the shared work queue
/// - Lists its children through the [`ChildLister`]
/// - Sends matching leaves to the result sink
/// - Accounts for and pushes every non-leaf child back onto the queue
/// - Marks the node done, whatever happened while expanding it
use crate::config::ErrorPolicy;
use crate::engine::cancel::{CancelReason, CancellationController};
use crate::engine::counter::OutstandingCounter;
use crate::engine::queue::{QueueReceiver, QueueSender};
use crate::error::{ListingError, Result, TraversalError};
use crate::source::{ChildLister, Predicate};
use crossbeam_channel::{select, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

/// Counters shared by every worker of one traversal.
#[derive(Debug, Default)]
pub struct TraversalStats {
    /// Nodes whose listing was attempted.
    pub expanded: AtomicU64,
    /// Leaves inspected by the predicate.
    pub leaves: AtomicU64,
    /// Matches handed to the result sink.
    pub matches: AtomicU64,
    /// Listings that failed.
    pub errors: AtomicU64,
}

impl TraversalStats {
    fn record_expanded(&self) {
        self.expanded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_leaf(&self) {
        self.leaves.fetch_add(1, Ordering::Relaxed);
    }

    fn record_match(&self) {
        self.matches.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything a worker needs, shared by reference count across the pool.
pub struct WorkerContext<L: ChildLister> {
    pub lister: Arc<L>,
    pub predicate: Arc<dyn Predicate>,
    pub queue_rx: QueueReceiver<L::Node>,
    pub queue_tx: QueueSender<L::Node>,
    pub counter: Arc<OutstandingCounter>,
    pub results: Sender<L::Node>,
    pub cancel: CancellationController,
    pub error_policy: ErrorPolicy,
    /// First fatal error of the run; later ones are discarded.
    pub failure: Arc<Mutex<Option<TraversalError>>>,
    /// Listing errors skipped under [`ErrorPolicy::SkipAndContinue`].
    pub skipped: Arc<Mutex<Vec<ListingError>>>,
    pub stats: Arc<TraversalStats>,
}

impl<L: ChildLister> Clone for WorkerContext<L> {
    fn clone(&self) -> Self {
        Self {
            lister: Arc::clone(&self.lister),
            predicate: Arc::clone(&self.predicate),
            queue_rx: self.queue_rx.clone(),
            queue_tx: self.queue_tx.clone(),
            counter: Arc::clone(&self.counter),
            results: self.results.clone(),
            cancel: self.cancel.clone(),
            error_policy: self.error_policy,
            failure: Arc::clone(&self.failure),
            skipped: Arc::clone(&self.skipped),
            stats: Arc::clone(&self.stats),
        }
    }
}

/// A spawned worker thread.
pub struct Worker {
    id: usize,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn spawn<L: ChildLister>(id: usize, ctx: WorkerContext<L>) -> Result<Self> {
        let name = format!("ffind-worker-{id}");
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(id, ctx))
            .map_err(|source| TraversalError::Spawn { name, source })?;
        Ok(Self { id, handle })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish.
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| TraversalError::WorkerPanicked { id: self.id })
    }
}

fn worker_loop<L: ChildLister>(id: usize, ctx: WorkerContext<L>) {
    debug!("Worker {id} starting");

    loop {
        let node = match ctx.queue_rx.pop() {
            Ok(Some(node)) => node,
            Ok(None) => {
                trace!("Worker {id}: queue exhausted");
                break;
            }
            Err(_) => {
                trace!("Worker {id}: cancelled while waiting for work");
                break;
            }
        };

        // Popped but never expanded: still has to be accounted for.
        if ctx.cancel.is_cancelled() {
            ctx.counter.done();
            break;
        }

        let outcome = expand(&ctx, &node);
        ctx.counter.done();

        match outcome {
            Ok(()) => {}
            Err(TraversalError::Cancelled) => break,
            Err(TraversalError::Listing(err)) => match ctx.error_policy {
                ErrorPolicy::SkipAndContinue => {
                    warn!("Worker {id}: skipping: {err}");
                    ctx.skipped.lock().push(err);
                }
                ErrorPolicy::AbortAll => {
                    warn!("Worker {id}: aborting traversal: {err}");
                    fail(&ctx, TraversalError::Listing(err));
                    break;
                }
            },
            Err(err) => {
                error!("Worker {id}: {err}");
                fail(&ctx, err);
                break;
            }
        }
    }

    debug!("Worker {id} exiting");
}

/// List one node and route every child. Runs to completion for this node
/// unless cancellation interrupts a blocking send or push.
fn expand<L: ChildLister>(ctx: &WorkerContext<L>, node: &L::Node) -> Result<()> {
    ctx.stats.record_expanded();
    let children = ctx.lister.list(node).inspect_err(|_| ctx.stats.record_error())?;
    trace!("Expanded node with {} children", children.len());

    for child in children {
        if child.is_leaf {
            ctx.stats.record_leaf();
            if ctx.predicate.matches(&child.name) {
                emit(ctx, child.node)?;
            }
            continue;
        }

        // Accounted for before it becomes visible to any other worker.
        ctx.counter.add(1);
        if let Err(err) = ctx.queue_tx.push(child.node) {
            // Never entered the queue, so nobody else will mark it done.
            ctx.counter.done();
            return Err(err);
        }
    }
    Ok(())
}

/// Hand one match to the result sink, racing against cancellation.
fn emit<L: ChildLister>(ctx: &WorkerContext<L>, node: L::Node) -> Result<()> {
    select! {
        send(ctx.results, node) -> res => match res {
            Ok(()) => {
                ctx.stats.record_match();
                Ok(())
            }
            Err(_) => {
                // The caller dropped the result stream: nobody is listening.
                ctx.cancel.cancel_with(CancelReason::ConsumerGone);
                Err(TraversalError::Cancelled)
            }
        },
        recv(ctx.cancel.signal()) -> _ => Err(TraversalError::Cancelled),
    }
}

/// Record `err` as the run's failure (first one wins) and stop everyone.
fn fail<L: ChildLister>(ctx: &WorkerContext<L>, err: TraversalError) {
    {
        let mut slot = ctx.failure.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }
    ctx.cancel.cancel_with(CancelReason::Failed);
}
