//! Logging setup

use crate::proxy::progress::{clear_status_line, status_line_live};
use std::io;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`. Output goes to stderr so
/// it never mixes with result lines written to stdout. A live progress line
/// is wiped before each event. Calling this twice is harmless; the second
/// call is ignored.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(stderr_writer)
        .try_init();
}

fn stderr_writer() -> io::Stderr {
    let mut stderr = io::stderr();
    if status_line_live() {
        let _ = clear_status_line(&mut stderr);
    }
    stderr
}
