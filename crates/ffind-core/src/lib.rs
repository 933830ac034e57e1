/// ffind Core — parallel tree traversal with streaming matches.
///
/// This crate contains the whole search engine with zero CLI dependencies.
/// It is designed to be reusable across different frontends (CLI, TUI, tests
/// driving an in-memory tree).
///
/// # Modules
///
/// - [`engine`] — Unbounded work queue, outstanding-work counter, worker pool
///   and the driver that ties them together.
/// - [`source`] — The collaborators the engine calls: child listers and
///   predicates, plus the real filesystem lister.
/// - [`config`] — Traversal configuration and validation.
/// - [`error`] — Error types shared by every module.
pub mod config;
pub mod engine;
pub mod error;
pub mod source;

pub use config::{Discipline, ErrorPolicy, TraversalConfig};
pub use engine::{
    start_traversal, CancelReason, CancellationController, TraversalHandle, TraversalState,
    TraversalSummary,
};
pub use error::{ConfigError, ListingError, TraversalError};
pub use source::{Child, ChildLister, FsLister, NameEquals, Predicate};
