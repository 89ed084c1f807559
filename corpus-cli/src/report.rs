//! Fatal error output: diagnosis, numbered remedies, and with `-v` the
//! cause chain plus git's raw stderr.

use colored::Colorize;

use corpus_cache::CacheError;
use corpus_core::{ConfigError, PathError, Remedy};
use corpus_sync::SyncError;
use corpus_transport::TransportError;

use crate::error::CliError;

pub fn print_error(err: &anyhow::Error, verbose: u8) {
    let (diagnosis, remedies) = explain(err);

    eprintln!("{} {diagnosis}", "error:".red().bold());
    if !remedies.is_empty() {
        eprintln!();
        eprintln!("{}", "How to fix:".bold());
        for (i, remedy) in remedies.iter().enumerate() {
            eprintln!("  {}. {remedy}", i + 1);
        }
    }

    if verbose > 0 {
        let causes: Vec<String> = err.chain().skip(1).map(|c| c.to_string()).collect();
        if !causes.is_empty() {
            eprintln!();
            eprintln!("{}", "Caused by:".bold());
            for cause in causes {
                eprintln!("  {cause}");
            }
        }
        if let Some(stderr) = raw_stderr(err) {
            eprintln!();
            eprintln!("{}", "git output:".bold());
            for line in stderr.lines() {
                eprintln!("  {}", line.bright_black());
            }
        }
    } else if raw_stderr(err).is_some() {
        eprintln!();
        eprintln!("Re-run with -v to see git's full output.");
    }
}

/// The first typed error in the chain decides the message. Context added
/// with `anyhow` is kept in front of the diagnosis. Untyped errors still get
/// a remedy, so every fatal error prints a "How to fix:" list.
fn explain(err: &anyhow::Error) -> (String, Vec<String>) {
    let remedy = err.chain().find_map(|cause| -> Option<&dyn Remedy> {
        if let Some(e) = cause.downcast_ref::<SyncError>() {
            return Some(e);
        }
        if let Some(e) = cause.downcast_ref::<TransportError>() {
            return Some(e);
        }
        if let Some(e) = cause.downcast_ref::<CacheError>() {
            return Some(e);
        }
        if let Some(e) = cause.downcast_ref::<ConfigError>() {
            return Some(e);
        }
        if let Some(e) = cause.downcast_ref::<CliError>() {
            return Some(e);
        }
        cause.downcast_ref::<PathError>().map(|e| e as &dyn Remedy)
    });

    match remedy {
        Some(r) => {
            let top = err.to_string();
            let diagnosis = r.diagnosis();
            let diagnosis = if top == diagnosis || top == diagnosis.trim() {
                diagnosis
            } else {
                format!("{top}: {diagnosis}")
            };
            (diagnosis, r.remedies())
        }
        None => (
            format!("{err:#}"),
            vec!["Re-run with -v for the full cause chain and logs.".to_string()],
        ),
    }
}

fn raw_stderr(err: &anyhow::Error) -> Option<&str> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<TransportError>()
            .or_else(|| match cause.downcast_ref::<SyncError>() {
                Some(SyncError::Transport(inner)) => Some(inner),
                _ => None,
            })
            .and_then(TransportError::raw_diagnostic)
    })
}
