//! Tracing setup for binaries. Library code only emits events; it never
//! installs a subscriber itself.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber reading its filter from
/// `WFPOA_LOG` (falling back to `info`). Call once, from `main`.
pub fn init() {
    let filter = EnvFilter::try_from_env("WFPOA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
