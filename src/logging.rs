//! Log setup for the demo binary. Library code only emits `tracing` events
//! and leaves subscriber installation to the host.

use tracing_subscriber::EnvFilter;

/// Initialize stdout logging. Level comes from `RUST_LOG`, `info` if unset.
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
