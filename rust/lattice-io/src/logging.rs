// rust/lattice-io/src/logging.rs

//! Tracing subscriber setup for programs driving lattice I/O sessions.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Verbosity;

/// Maps a session verbosity onto a tracing filter directive.
pub fn filter_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Off => "warn",
        Verbosity::Low | Verbosity::Medium => "info",
        Verbosity::Regular => "debug",
        Verbosity::Debug => "trace",
    }
}

/// Installs a global fmt subscriber. `RUST_LOG` wins over `verbosity`.
///
/// Returns `false` if a subscriber was already installed.
pub fn init(verbosity: Verbosity) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
