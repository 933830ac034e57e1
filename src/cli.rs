/// Command-line arguments and their mapping onto the engine configuration.
use clap::builder::TypedValueParser;
use clap::{Parser, ValueEnum};
use ffind_core::config::{default_concurrency, MAX_CONCURRENCY};
use ffind_core::{Discipline, ErrorPolicy, TraversalConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Find files by exact name, in parallel
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ffind",
    version,
    about = "Find files by exact name, walking the tree with a pool of parallel workers",
    after_help = "EXAMPLES:\n    \
        ffind -n Cargo.toml ~/src\n    \
        ffind -n .env --hidden -c 32 /srv\n    \
        ffind -n core --keep-going --timeout 30 / --json"
)]
pub struct CliArgs {
    /// File name to look for (exact match on the last path component)
    #[arg(
        short,
        long,
        value_name = "NAME",
        value_parser = clap::builder::NonEmptyStringValueParser::new()
    )]
    pub name: String,

    /// Directory to start from
    #[arg(value_name = "ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Number of parallel workers
    #[arg(
        short,
        long,
        default_value_t = default_concurrency(),
        value_parser = clap::value_parser!(u16).range(1..=MAX_CONCURRENCY as i64).map(usize::from),
        value_name = "NUM"
    )]
    pub concurrency: usize,

    /// Traversal order: breadth-first or depth-first
    #[arg(long, value_enum, default_value_t = Order::Bfs)]
    pub order: Order,

    /// Report unreadable directories and keep going instead of aborting
    #[arg(short = 'k', long)]
    pub keep_going: bool,

    /// Include hidden entries (names starting with '.')
    #[arg(short = 'H', long)]
    pub hidden: bool,

    /// Stop searching after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print one JSON object per match instead of plain paths
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Breadth-first (FIFO work queue)
    Bfs,
    /// Depth-first (LIFO work queue)
    Dfs,
}

impl CliArgs {
    pub fn traversal_config(&self) -> TraversalConfig {
        let mut config = TraversalConfig::default()
            .with_concurrency(self.concurrency)
            .with_discipline(match self.order {
                Order::Bfs => Discipline::Fifo,
                Order::Dfs => Discipline::Lifo,
            })
            .with_error_policy(if self.keep_going {
                ErrorPolicy::SkipAndContinue
            } else {
                ErrorPolicy::AbortAll
            });
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["ffind", "-n", "target"]).unwrap();
        assert_eq!(args.root, PathBuf::from("."));
        assert_eq!(args.order, Order::Bfs);
        assert!(!args.keep_going);

        let config = args.traversal_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.discipline, Discipline::Fifo);
        assert_eq!(config.error_policy, ErrorPolicy::AbortAll);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_full_flags() {
        let args = CliArgs::try_parse_from([
            "ffind", "--name", "core", "-c", "32", "--order", "dfs", "--keep-going", "--hidden",
            "--timeout", "5", "--json", "-vv", "/srv",
        ])
        .unwrap();
        assert_eq!(args.root, PathBuf::from("/srv"));
        assert!(args.hidden);
        assert!(args.json);
        assert_eq!(args.verbose, 2);

        let config = args.traversal_config();
        assert_eq!(config.concurrency, 32);
        assert_eq!(config.discipline, Discipline::Lifo);
        assert_eq!(config.error_policy, ErrorPolicy::SkipAndContinue);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_name_is_required() {
        assert!(CliArgs::try_parse_from(["ffind", "/tmp"]).is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(CliArgs::try_parse_from(["ffind", "-n", "", "/tmp"]).is_err());
        assert!(CliArgs::try_parse_from(["ffind", "--name=", "/tmp"]).is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(CliArgs::try_parse_from(["ffind", "-n", "x", "-c", "0"]).is_err());
    }
}
