//! Request decorators.
//!
//! Each module provides a `tower::Layer` whose service keeps the wrapped
//! handler's contract and adds exactly one behavior. The order they are
//! stacked in is decided by `http::pipeline`, not here.

pub mod access_log;
pub mod cors;
pub mod diagnostic;
pub mod host_rewrite;
pub mod no_cache;

pub use access_log::AccessLogLayer;
pub use cors::{cors_layer, PermissiveCorsLayer};
pub use diagnostic::DiagnosticLogLayer;
pub use host_rewrite::HostRewriteLayer;
pub use no_cache::NoCacheLayer;
