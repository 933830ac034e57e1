//! ffind — parallel file finder.
//!
//! Thin binary entry point. All search logic lives in the `ffind-core`
//! crate; this file wires up logging, Ctrl-C and output.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::CliArgs;
use ffind_core::{start_traversal, CancelReason, FsLister, NameEquals, TraversalSummary};
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, warn, Level};

/// Conventional exit status for a process stopped by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

/// One line of `--json` output.
#[derive(Serialize)]
struct MatchRecord<'a> {
    path: &'a Path,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(summary) => match summary.cancelled {
            Some(CancelReason::Requested) => ExitCode::from(EXIT_INTERRUPTED),
            _ => ExitCode::SUCCESS,
        },
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries nothing but matches.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &CliArgs) -> Result<TraversalSummary> {
    let config = args.traversal_config();
    let lister = FsLister::new().include_hidden(args.hidden);

    info!("Searching {} for '{}'", args.root.display(), args.name);
    let handle = start_traversal(
        args.root.clone(),
        lister,
        NameEquals::new(args.name.as_str()),
        config,
    )
    .context("Failed to start search")?;

    let canceller = handle.canceller();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        canceller.cancel();
    })
    .context("Failed to set signal handler")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for path in handle.iter() {
        let written = if args.json {
            serde_json::to_writer(&mut out, &MatchRecord { path: &path })
                .map_err(io::Error::from)
                .and_then(|()| writeln!(out))
        } else {
            writeln!(out, "{}", path.display())
        };
        if let Err(err) = written {
            // Usually a closed pipe (`ffind ... | head`): stop searching.
            if err.kind() != io::ErrorKind::BrokenPipe {
                warn!("Failed to write result: {err}");
            }
            handle.canceller().cancel_with(CancelReason::ConsumerGone);
            break;
        }
    }
    if let Err(err) = out.flush() {
        if err.kind() != io::ErrorKind::BrokenPipe {
            warn!("Failed to flush output: {err}");
        }
    }
    drop(out);

    let summary = handle.finish().context("Search failed")?;
    for skipped in &summary.skipped {
        eprintln!("ffind: {skipped}");
    }
    match summary.cancelled {
        Some(CancelReason::TimedOut) => warn!("Search timed out; results are incomplete"),
        Some(CancelReason::Requested) => info!("Search interrupted; results are incomplete"),
        _ => {}
    }
    Ok(summary)
}
