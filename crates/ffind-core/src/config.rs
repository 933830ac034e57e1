/// Traversal configuration — worker count, queue discipline, error policy.
///
/// All fields have sensible defaults; frontends override only what the user
/// asked for and call [`TraversalConfig::validate`] before starting.
use crate::error::ConfigError;
use std::time::Duration;

/// Maximum reasonable worker count.
pub const MAX_CONCURRENCY: usize = 512;

/// Default number of matches that may queue up before workers block on the
/// result sink. The caller drains the sink continuously, so this only has to
/// absorb short bursts from a very wide directory.
pub const RESULT_CHANNEL_CAPACITY: usize = 1_024;

/// Upper bound for `result_capacity`; anything larger is almost certainly a
/// unit mistake.
pub const MAX_RESULT_CAPACITY: usize = 1 << 20;

/// Order in which the work queue hands out pending nodes.
///
/// With a single worker, `Fifo` expands the tree in breadth-first level order
/// and `Lifo` expands it depth-first, taking the most recently pushed sibling
/// first. With more workers the order is only approximately either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Discipline {
    #[default]
    Fifo,
    Lifo,
}

/// What a worker does when a node cannot be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Cancel every worker and surface the first error as the run's result.
    #[default]
    AbortAll,
    /// Log the error, record it in the summary and keep going.
    SkipAndContinue,
}

/// Runtime configuration for one traversal.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Number of parallel workers.
    pub concurrency: usize,
    pub discipline: Discipline,
    pub error_policy: ErrorPolicy,
    /// Capacity of the bounded result channel. Zero makes it a rendezvous.
    pub result_capacity: usize,
    /// Cancel the traversal automatically once this much time has elapsed.
    pub timeout: Option<Duration>,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            discipline: Discipline::default(),
            error_policy: ErrorPolicy::default(),
            result_capacity: RESULT_CHANNEL_CAPACITY,
            timeout: None,
        }
    }
}

impl TraversalConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn with_result_capacity(mut self, result_capacity: usize) -> Self {
        self.result_capacity = result_capacity;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check the configuration before any thread is spawned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::InvalidConcurrency {
                count: self.concurrency,
                max: MAX_CONCURRENCY,
            });
        }
        if self.result_capacity > MAX_RESULT_CAPACITY {
            return Err(ConfigError::InvalidResultCapacity {
                capacity: self.result_capacity,
                max: MAX_RESULT_CAPACITY,
            });
        }
        Ok(())
    }
}

/// Directory listing is I/O bound, so use at least 10 workers even on small
/// machines, and cap the default at 20.
pub fn default_concurrency() -> usize {
    num_cpus::get().clamp(10, 20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TraversalConfig::default();
        assert!(config.validate().is_ok());
        assert!((10..=20).contains(&config.concurrency));
        assert_eq!(config.discipline, Discipline::Fifo);
        assert_eq!(config.error_policy, ErrorPolicy::AbortAll);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = TraversalConfig::default().with_concurrency(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidConcurrency {
                count: 0,
                max: MAX_CONCURRENCY
            })
        );
    }

    #[test]
    fn test_excessive_concurrency_rejected() {
        let config = TraversalConfig::default().with_concurrency(MAX_CONCURRENCY + 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConcurrency { .. })
        ));
        assert!(TraversalConfig::default()
            .with_concurrency(MAX_CONCURRENCY)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_result_capacity_bounds() {
        assert!(TraversalConfig::default()
            .with_result_capacity(0)
            .validate()
            .is_ok());
        assert!(matches!(
            TraversalConfig::default()
                .with_result_capacity(MAX_RESULT_CAPACITY + 1)
                .validate(),
            Err(ConfigError::InvalidResultCapacity { .. })
        ));
    }
}
