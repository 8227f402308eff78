//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Operational events (bind, shutdown, upstream errors):
//!     → tracing macros → logging.rs subscriber → stderr
//!
//! Request output (access log, diagnostic dumps, banner):
//!     → sink.rs LogSink injected into each decorator → stdout
//! ```
//!
//! # Design Decisions
//! - Request output is plain text meant for the operator, not structured events
//! - The sink is passed in at construction so tests can capture it

pub mod logging;
pub mod sink;

pub use sink::{LogSink, MemorySink, SharedSink, StdoutSink};
