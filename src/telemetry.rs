//! Tracing setup for hosts embedding the ledger.

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Calling it a second time is harmless: the first subscriber stays in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("Tracing initialized");
    }
}
