//! Structured logging.
//!
//! Installs the global `tracing` subscriber. The filter defaults to
//! `shttp=info` and can be overridden through `RUST_LOG`. Events go to
//! stderr so they never interleave with the access log on stdout.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "shttp=info";

/// Initialize the tracing subscriber.
pub fn init() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
