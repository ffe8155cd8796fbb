//! Tracing setup for test binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a fmt subscriber that writes through the test harness capture.
///
/// Honors `RUST_LOG`, defaulting to `info`. Safe to call from every test;
/// only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
