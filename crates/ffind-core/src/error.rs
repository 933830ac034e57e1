/// Error types for the traversal engine.
///
/// `ListingError` comes from a collaborator, `ConfigError` from validation,
/// and `TraversalError` is what the driver hands back to its caller.
use std::io;
use thiserror::Error;

/// A child lister failed to enumerate one node.
#[derive(Error, Debug)]
#[error("failed to list '{node}': {source}")]
pub struct ListingError {
    /// Display form of the node that could not be listed.
    pub node: String,
    /// Underlying I/O failure (permission denied, vanished directory, ...).
    #[source]
    pub source: io::Error,
}

impl ListingError {
    pub fn new(node: impl Into<String>, source: io::Error) -> Self {
        Self {
            node: node.into(),
            source,
        }
    }

    /// The I/O error kind, handy for policy decisions and tests.
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

/// Invalid traversal configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid concurrency {count}: must be between 1 and {max}")]
    InvalidConcurrency { count: usize, max: usize },

    #[error("invalid result capacity {capacity}: must be at most {max}")]
    InvalidResultCapacity { capacity: usize, max: usize },
}

/// Terminal and internal errors of a traversal.
#[derive(Error, Debug)]
pub enum TraversalError {
    /// A node could not be listed and the run was aborted because of it.
    #[error(transparent)]
    Listing(#[from] ListingError),

    /// The operation was abandoned because cancellation was observed.
    #[error("traversal cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A push arrived after the work queue was closed.
    #[error("push to a closed work queue")]
    QueueClosed,

    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("worker {id} panicked")]
    WorkerPanicked { id: usize },

    #[error("thread '{0}' panicked")]
    ThreadPanicked(String),
}

pub type Result<T> = std::result::Result<T, TraversalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_error_names_the_node() {
        let err = ListingError::new(
            "/srv/locked",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(err.to_string(), "failed to list '/srv/locked': denied");
    }

    #[test]
    fn listing_error_is_transparent_inside_traversal_error() {
        let err: TraversalError =
            ListingError::new("x", io::Error::new(io::ErrorKind::NotFound, "gone")).into();
        assert_eq!(err.to_string(), "failed to list 'x': gone");
    }
}
