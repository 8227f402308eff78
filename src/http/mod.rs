//! HTTP handling subsystem.
//!
//! # Data Flow
//! ```text
//! accepted connection
//!     → server.rs (hyper http1 connection, header read timeout, header limit)
//!     → pipeline.rs (composed decorators, outermost first)
//!         → middleware/* (no-cache, diagnostic, CORS, access log, host rewrite)
//!         → write timeout
//!     → base.rs (files.rs directory serving | proxy.rs upstream forwarding)
//!     → response streamed back through the same layers
//! ```

pub mod base;
pub mod files;
pub mod headers;
pub mod middleware;
pub mod pipeline;
pub mod proxy;
pub mod server;

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{Request, Response};
use tower::util::BoxCloneService;

/// Anything that turns a request into a response: the base handlers and
/// every decorator around them.
pub type Handler = BoxCloneService<Request<Body>, Response<Body>, Infallible>;

pub use base::BaseHandler;
pub use files::FileServer;
pub use pipeline::{Decorator, Pipeline};
pub use proxy::{ProxyTarget, ReverseProxy};
pub use server::{BoundServer, ServeError, Supervisor};
