//! Tracing subscriber initialization.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber.
///
/// An explicit verbosity level wins; otherwise `RUST_LOG` applies, falling
/// back to errors only. `HALCYON_LOG_JSON=1` switches to JSON output for
/// log shippers.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init(level: Option<tracing::Level>) -> Result<()> {
    let filter = level.map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        |level| EnvFilter::default().add_directive(level.into()),
    );

    let json = std::env::var("HALCYON_LOG_JSON")
        .is_ok_and(|value| value == "1" || value.eq_ignore_ascii_case("true"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder
            .json()
            .try_init()
            .map_err(|err| anyhow!("failed to initialize telemetry: {err}"))
    } else {
        builder
            .try_init()
            .map_err(|err| anyhow!("failed to initialize telemetry: {err}"))
    }
}
