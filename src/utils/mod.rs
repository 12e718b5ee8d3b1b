//! Utilities: logging setup (tracing to stderr) and process signal tweaks.
//!
//! Key items:
//!   derive_level / init_logging
//!   ignore_sigpipe

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Map `-v` / `-q` counts to a level. Quiet wins.
pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. Output goes to stderr; stdout carries the
/// MCP channel and command output. `RUST_LOG` overrides `level`.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logging(level: LevelFilter) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}

/// Let writes to a closed stdout fail with EPIPE instead of killing the server.
#[cfg(unix)]
pub fn ignore_sigpipe() {
    // SAFETY: installs SIG_IGN, which runs no code in signal context.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
pub fn ignore_sigpipe() {}
