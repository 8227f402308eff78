//! Configuration validation.
//!
//! # Responsibilities
//! - Reject flag combinations that cannot be composed into a pipeline
//! - Reject proxy targets the reverse proxy cannot forward to, by parsing
//!   them with [`ProxyTarget::parse`]
//!
//! # Design Decisions
//! - Runs before any socket is bound; every failure is fatal at startup
//! - Validation is a pure function over `Config`

use thiserror::Error;

use crate::config::schema::Config;
use crate::http::ProxyTarget;

/// A configuration that cannot be served.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Two flags that exclude each other were both set.
    #[error("incompatible options '{0}' and '{1}'")]
    IncompatibleFlags(&'static str, &'static str),

    /// The proxy target is not a parseable URL.
    #[error("error extracting URL from proxy parameter {url:?}: {source}")]
    InvalidProxyUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The proxy target uses a scheme other than plain HTTP.
    #[error("unsupported proxy scheme {0:?}, only http targets are supported")]
    UnsupportedProxyScheme(String),

    /// The proxy target has no host component.
    #[error("proxy target {0:?} has no host")]
    MissingProxyHost(String),

    /// The proxy host cannot be used as an authority or Host header.
    #[error("proxy target {0:?} has an invalid host")]
    InvalidProxyHost(String),
}

/// Check flag combinations and the proxy target.
pub fn validate_config(config: &Config) -> Result<(), ValidationError> {
    if config.debug && config.quiet {
        return Err(ValidationError::IncompatibleFlags("debug", "quiet"));
    }
    if let Some(raw) = config.proxy.as_deref().filter(|raw| !raw.is_empty()) {
        ProxyTarget::parse(raw)?;
    }
    Ok(())
}
