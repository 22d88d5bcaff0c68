//! Diagnostic tracing controlled by the `LOCKGATE_DEBUG` environment
//! variable.

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable that switches on verbose diagnostics.
pub const DEBUG_ENV_VAR: &str = "LOCKGATE_DEBUG";

/// Whether `LOCKGATE_DEBUG=1` is set. Read once per process.
pub fn debug_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var(DEBUG_ENV_VAR).map(|v| v == "1").unwrap_or(false)
    })
}

/// Installs a stderr `tracing` subscriber at trace level for the lockgate
/// crates when [`debug_enabled`] is true.
///
/// No-op otherwise, and safe to call when a subscriber is already
/// installed (the existing one wins). Applications that run their own
/// subscriber can ignore this and filter `lockgate*` targets themselves.
pub fn init_debug_tracing() {
    if !debug_enabled() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "lockgate=trace,lockgate_core=trace,lockgate_file=trace,\
             lockgate_distributed=trace,lockgate_http=trace",
        )
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
