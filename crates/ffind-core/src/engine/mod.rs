/// Engine module — the dynamic-fanout parallel traversal.
///
/// Thread layout for one traversal:
/// - **N workers** pop nodes, list them, push sub-nodes and emit matches.
/// - **1 queue arbiter** owns the unbounded buffer (see [`queue`]).
/// - **1 closer** waits for the outstanding-work counter to reach zero, then
///   closes the queue's input side so idle workers see exhaustion.
/// - **1 supervisor** joins the workers, closes the result sink, and builds
///   the final [`TraversalSummary`].
///
/// The caller reads matches from [`TraversalHandle`] while all of this runs,
/// and may cancel at any point.
pub mod cancel;
pub mod counter;
pub mod queue;
pub mod worker;

pub use cancel::{CancelReason, CancellationController};
pub use counter::OutstandingCounter;
pub use queue::{QueueStats, UnboundedQueue};
pub use worker::TraversalStats;

use crate::config::TraversalConfig;
use crate::error::{ListingError, Result, TraversalError};
use crate::source::{ChildLister, Predicate};
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use worker::{Worker, WorkerContext};

/// Lifecycle of one traversal. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TraversalState {
    Idle,
    /// Root accounted for and pushed.
    Seeded,
    /// Workers and closer started.
    Running,
    /// Every worker has returned; waiting on the remaining threads.
    Draining,
    /// Result sink closed; the summary is ready.
    Closed,
}

/// Shared, observable lifecycle state.
#[derive(Clone)]
struct StateCell(Arc<Mutex<TraversalState>>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(TraversalState::Idle)))
    }

    fn advance(&self, next: TraversalState) {
        let mut state = self.0.lock();
        debug_assert!(next > *state, "state went from {:?} to {next:?}", *state);
        debug!("Traversal {:?} -> {next:?}", *state);
        *state = next;
    }

    fn get(&self) -> TraversalState {
        *self.0.lock()
    }
}

/// Outcome of a traversal that did not fail.
#[derive(Debug)]
pub struct TraversalSummary {
    /// Nodes whose children were listed (including ones that failed).
    pub expanded: u64,
    /// Leaves inspected by the predicate.
    pub leaves: u64,
    /// Matches delivered to the result sink.
    pub matches: u64,
    /// Listing errors skipped under the skip-and-continue policy.
    pub skipped: Vec<ListingError>,
    /// Set when the run stopped early for a clean reason (request, timeout,
    /// dropped consumer).
    pub cancelled: Option<CancelReason>,
    pub queue: QueueStats,
    pub duration: Duration,
}

impl TraversalSummary {
    /// `true` if every reachable node was expanded.
    pub fn is_complete(&self) -> bool {
        self.cancelled.is_none()
    }
}

/// Handle to a running traversal: the result stream plus control.
pub struct TraversalHandle<N> {
    results: Receiver<N>,
    cancel: CancellationController,
    state: StateCell,
    supervisor: JoinHandle<Result<TraversalSummary>>,
}

impl<N> TraversalHandle<N> {
    /// The result stream. It closes once every worker has stopped.
    pub fn results(&self) -> &Receiver<N> {
        &self.results
    }

    /// Blocking iterator over matches; ends when the stream closes.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, N> {
        self.results.iter()
    }

    /// Request cancellation. Matches already in the stream stay readable.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A controller clone for signal handlers and timers.
    pub fn canceller(&self) -> CancellationController {
        self.cancel.clone()
    }

    pub fn state(&self) -> TraversalState {
        self.state.get()
    }

    /// Wait for every engine thread and return the outcome.
    ///
    /// Call this after draining [`iter`](Self::iter). Unread matches are
    /// discarded; if workers were still producing, they see the closed stream
    /// and the run ends with [`CancelReason::ConsumerGone`].
    pub fn finish(self) -> Result<TraversalSummary> {
        let Self {
            results,
            supervisor,
            ..
        } = self;
        drop(results);
        supervisor
            .join()
            .unwrap_or_else(|_| Err(TraversalError::ThreadPanicked("ffind-supervisor".into())))
    }
}

/// Start a traversal of the tree below `root`.
///
/// Returns as soon as the root is seeded and every thread is running.
/// Matches arrive on the returned handle in whatever order workers produce
/// them.
pub fn start_traversal<L, P>(
    root: L::Node,
    lister: L,
    predicate: P,
    config: TraversalConfig,
) -> Result<TraversalHandle<L::Node>>
where
    L: ChildLister,
    P: Predicate,
{
    config.validate()?;
    let start = Instant::now();
    let state = StateCell::new();
    let cancel = CancellationController::new();
    let counter = Arc::new(OutstandingCounter::new());

    // Idle -> Seeded. The root is counted before any thread can observe the
    // counter, so the closer cannot see a premature zero.
    let queue = UnboundedQueue::spawn(config.discipline, cancel.clone())?;
    counter.add(1);
    if let Err(err) = queue.push(root) {
        cancel.cancel_with(CancelReason::Failed);
        return Err(err);
    }
    state.advance(TraversalState::Seeded);

    let (results_tx, results_rx) = bounded(config.result_capacity);
    let ctx = WorkerContext {
        lister: Arc::new(lister),
        predicate: Arc::new(predicate),
        queue_rx: queue.receiver(),
        queue_tx: queue.sender(),
        counter: Arc::clone(&counter),
        results: results_tx,
        cancel: cancel.clone(),
        error_policy: config.error_policy,
        failure: Arc::new(Mutex::new(None)),
        skipped: Arc::new(Mutex::new(Vec::new())),
        stats: Arc::new(TraversalStats::default()),
    };

    // Seeded -> Running.
    let mut workers = Vec::with_capacity(config.concurrency);
    for id in 0..config.concurrency {
        match Worker::spawn(id, ctx.clone()) {
            Ok(worker) => workers.push(worker),
            Err(err) => {
                cancel.cancel_with(CancelReason::Failed);
                return Err(err);
            }
        }
    }

    let closer = {
        let counter = Arc::clone(&counter);
        let cancel = cancel.clone();
        let closer = queue.closer();
        spawn_named("ffind-closer", move || {
            if counter.wait_zero_or_cancelled(&cancel).is_ok() {
                closer.close();
            }
        })
    };
    let closer = match closer {
        Ok(handle) => handle,
        Err(err) => {
            cancel.cancel_with(CancelReason::Failed);
            return Err(err);
        }
    };

    let (disarm_tx, disarm_rx) = bounded::<()>(0);
    let deadline = match config.timeout {
        Some(timeout) => match cancel.cancel_after(timeout, disarm_rx) {
            Ok(handle) => Some(handle),
            Err(source) => {
                cancel.cancel_with(CancelReason::Failed);
                return Err(TraversalError::Spawn {
                    name: "ffind-deadline".into(),
                    source,
                });
            }
        },
        None => None,
    };

    state.advance(TraversalState::Running);
    info!(
        "Traversal started: {} workers, {:?} order, {:?} on error",
        config.concurrency, config.discipline, config.error_policy
    );

    let supervisor = {
        let state = state.clone();
        let cancel = cancel.clone();
        spawn_named("ffind-supervisor", move || {
            supervise(Supervised {
                ctx,
                workers,
                closer,
                queue,
                deadline,
                disarm: disarm_tx,
                state,
                cancel,
                start,
            })
        })
    };
    let supervisor = match supervisor {
        Ok(handle) => handle,
        Err(err) => {
            // The supervisor owned every other thread handle; with it gone the
            // threads unwind on their own once cancelled.
            cancel.cancel_with(CancelReason::Failed);
            return Err(err);
        }
    };

    Ok(TraversalHandle {
        results: results_rx,
        cancel,
        state,
        supervisor,
    })
}

/// Everything the supervisor thread takes ownership of.
struct Supervised<L: ChildLister> {
    ctx: WorkerContext<L>,
    workers: Vec<Worker>,
    closer: JoinHandle<()>,
    queue: UnboundedQueue<L::Node>,
    deadline: Option<JoinHandle<()>>,
    disarm: crossbeam_channel::Sender<()>,
    state: StateCell,
    cancel: CancellationController,
    start: Instant,
}

fn supervise<L: ChildLister>(run: Supervised<L>) -> Result<TraversalSummary> {
    let Supervised {
        ctx,
        workers,
        closer,
        queue,
        deadline,
        disarm,
        state,
        cancel,
        start,
    } = run;

    let WorkerContext {
        results,
        failure,
        skipped,
        stats,
        queue_rx,
        queue_tx,
        ..
    } = ctx;
    drop((queue_rx, queue_tx));

    // Running -> Draining: wait for every worker to stop writing results.
    let mut panicked = None;
    for worker in workers {
        let id = worker.id();
        if worker.join().is_err() {
            warn!("Worker {id} panicked");
            cancel.cancel_with(CancelReason::Failed);
            panicked.get_or_insert(id);
        }
    }
    state.advance(TraversalState::Draining);

    // Draining -> Closed: the last sender goes away, ending the caller's loop.
    drop(results);

    // Either the counter reached zero and the queue is closed, or the run was
    // cancelled; both let the closer and the arbiter exit.
    let closer_panicked = closer.join().is_err();
    let queue_stats = queue.join();
    drop(disarm);
    if let Some(deadline) = deadline {
        let _ = deadline.join();
    }
    state.advance(TraversalState::Closed);

    let duration = start.elapsed();
    if let Some(err) = failure.lock().take() {
        info!("Traversal failed after {duration:?}: {err}");
        return Err(err);
    }
    if let Some(id) = panicked {
        return Err(TraversalError::WorkerPanicked { id });
    }
    if closer_panicked {
        return Err(TraversalError::ThreadPanicked("ffind-closer".into()));
    }

    let summary = TraversalSummary {
        expanded: stats.expanded.load(Ordering::Relaxed),
        leaves: stats.leaves.load(Ordering::Relaxed),
        matches: stats.matches.load(Ordering::Relaxed),
        skipped: std::mem::take(&mut *skipped.lock()),
        cancelled: cancel.reason(),
        queue: queue_stats,
        duration,
    };
    info!(
        "Traversal finished in {duration:?}: {} nodes expanded, {} matches, {} skipped{}",
        summary.expanded,
        summary.matches,
        summary.skipped.len(),
        match summary.cancelled {
            Some(reason) => format!(", cancelled ({reason:?})"),
            None => String::new(),
        }
    );
    Ok(summary)
}

fn spawn_named<T, F>(name: &str, f: F) -> Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .map_err(|source| TraversalError::Spawn {
            name: name.into(),
            source,
        })
}
