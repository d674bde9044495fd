//! Tracing subscriber setup for the command-line tool.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job. Output goes to stderr so stdout stays machine-readable.

use std::sync::OnceLock;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT_GUARD: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once. `RUST_LOG` directives are honoured;
/// `verbose` adds a DEBUG default, otherwise WARN.
pub fn init(verbose: bool) {
    if INIT_GUARD.set(()).is_err() {
        return;
    }

    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Another subscriber may already be installed (e.g. by a test harness).
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}
