//! In-process invocation.
//!
//! Calls are serialized by a process-wide gate because stream interception
//! swaps process-global descriptors. Each call parses its own argv, so no
//! flag state survives between calls.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use clap::error::ErrorKind;

use crate::error::Result;
use crate::exec::ExecuteResult;
use crate::exec::capture::Redirect;
use crate::tree::{CommandTree, Parsed};

static GATE: Mutex<()> = Mutex::new(());

/// Run `argv` against `tree` on the blocking pool.
pub async fn run(tree: Arc<CommandTree>, argv: Vec<String>, intercept: bool) -> Result<ExecuteResult> {
    let joined = tokio::task::spawn_blocking(move || run_blocking(&tree, argv, intercept)).await;
    Ok(joined.unwrap_or_else(|e| ExecuteResult {
        exit_code: 101,
        error: Some(format!("in-process task failed: {e}")),
        ..Default::default()
    }))
}

/// Synchronous core of `run`. Blocks while another in-process call is active.
pub fn run_blocking(tree: &CommandTree, argv: Vec<String>, intercept: bool) -> ExecuteResult {
    let _gate = GATE.lock().unwrap_or_else(PoisonError::into_inner);
    tracing::debug!(argv = ?argv, "in-process call running");

    let (invocation, handler, help) = match tree.parse(argv) {
        Parsed::Clap(e) => return clap_outcome(&e),
        Parsed::Node {
            invocation,
            handler,
            help,
        } => (invocation, handler, help),
    };
    let Some(handler) = handler else {
        return ExecuteResult {
            stdout: help,
            ..Default::default()
        };
    };

    let mut structured: Vec<u8> = Vec::new();
    let redirect = if intercept {
        match Redirect::begin() {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!(error = %e, "stream interception unavailable; running without it");
                None
            }
        }
    } else {
        None
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        handler.call(&invocation, &mut structured)
    }));
    let intercepted = redirect.map(Redirect::finish).unwrap_or_default();

    // Structured output first, then whatever reached the raw stream.
    structured.extend_from_slice(&intercepted);
    let stdout = String::from_utf8_lossy(&structured).into_owned();

    match outcome {
        Ok(Ok(())) => ExecuteResult {
            stdout,
            ..Default::default()
        },
        Ok(Err(e)) => {
            let message = format!("{e:#}");
            ExecuteResult {
                stdout,
                stderr: format!("Error: {message}\n"),
                exit_code: 1,
                error: Some(message),
            }
        }
        Err(payload) => {
            let message = format!("handler panicked: {}", panic_message(payload.as_ref()));
            tracing::error!(path = ?invocation.path, "{message}");
            ExecuteResult {
                stdout,
                stderr: String::new(),
                exit_code: 101,
                error: Some(message),
            }
        }
    }
}

/// Help and version requests succeed with clap's text on stdout; real parse
/// errors carry clap's message on stderr.
fn clap_outcome(e: &clap::Error) -> ExecuteResult {
    let rendered = e.render().to_string();
    match e.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => ExecuteResult {
            stdout: rendered,
            exit_code: e.exit_code(),
            ..Default::default()
        },
        _ => ExecuteResult {
            error: Some(
                rendered
                    .lines()
                    .next()
                    .unwrap_or("invalid arguments")
                    .trim_start_matches("error: ")
                    .to_string(),
            ),
            stderr: rendered,
            exit_code: e.exit_code(),
            stdout: String::new(),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
