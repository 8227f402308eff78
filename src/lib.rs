//! shttp: serve a directory or reverse-proxy a single host over HTTP.
//!
//! A base handler (static files or reverse proxy) is wrapped by a fixed,
//! flag-driven stack of decorators and served until a termination signal.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::Config;
pub use http::{Handler, Pipeline, Supervisor};
pub use lifecycle::Shutdown;
