use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor a CLI level is given.
pub const DEFAULT_FILTER: &str = concat!(env!("CARGO_CRATE_NAME"), "=info");

/// Install a stderr fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Stdout is left to results.
pub fn init(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| anyhow!("invalid log filter {default_filter:?}: {e}"))?;

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .try_init()
        .map_err(|e| anyhow!("install tracing subscriber: {e}"))
}
