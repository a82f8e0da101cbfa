//! Tracing initialization for host applications and tests.
//!
//! The library itself only emits through `log` and `tracing` macros; hosts
//! call [`init`] once at startup to get formatted output on stderr honoring
//! `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber with an `info` default filter.
pub fn init() {
    init_with_filter("info");
}

/// Installs the global subscriber, using `directives` when `RUST_LOG` is
/// unset. Safe to call more than once; later calls are no-ops.
pub fn init_with_filter(directives: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        // Route log:: records through tracing so both macro families land
        // in the same stream.
        let _ = tracing_log::LogTracer::init();
    }
}
