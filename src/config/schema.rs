//! Configuration schema definitions.
//!
//! `Config` mirrors the command-line flags one to one. It is built once at
//! startup by the loader and never mutated afterwards.

use std::path::PathBuf;
use std::time::Duration;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default max header bytes (1 MiB).
pub const DEFAULT_MAX_HEADER_BYTES: usize = 1 << 20;

/// Root configuration for the server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listener configuration (address, timeouts, limits).
    pub listener: ListenerConfig,

    /// Directory served in file mode. Ignored when `proxy` is set.
    pub dir: PathBuf,

    /// Reverse-proxy target URL. `None` selects file mode.
    pub proxy: Option<String>,

    /// Open a browser pointing at the server once it is listening.
    pub open: bool,

    /// Suppress access logging and the startup banner.
    pub quiet: bool,

    /// Disable the CORS layer.
    pub no_cors: bool,

    /// Dump every request to the diagnostic log.
    pub debug: bool,

    /// Add headers disabling HTTP caching on every response.
    pub no_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            dir: PathBuf::from("."),
            proxy: None,
            open: false,
            quiet: false,
            no_cors: false,
            debug: false,
            no_cache: false,
        }
    }
}

impl Config {
    /// Whether the server runs as a reverse proxy.
    pub fn is_proxy(&self) -> bool {
        self.proxy.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Listen address (host name or IP).
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Deadline for reading a request head.
    pub read_timeout: Duration,

    /// Deadline for producing a response.
    pub write_timeout: Duration,

    /// Upper bound on request header bytes per connection.
    pub max_header_bytes: usize,

    /// How long in-flight connections may drain after a shutdown signal.
    pub stop_timeout: Duration,

    /// How long to wait for forcibly aborted connections to wind down.
    pub kill_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            stop_timeout: Duration::from_secs(1),
            kill_timeout: Duration::from_secs(1),
        }
    }
}

impl ListenerConfig {
    /// `host:port` string suitable for binding.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL announced to the operator and the browser. `bound_port` is
    /// the port actually bound, which differs from `port` when that is 0.
    pub fn base_url(&self, bound_port: u16) -> String {
        format!("http://{}:{}/", self.host, bound_port)
    }
}
