//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → assemble pipeline → bind listener → banner / browser
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGINT/SIGTERM → stop accepting → drain (stop timeout) → abort (kill timeout) → exit
//! ```
//!
//! # Server States
//! ```text
//! Unstarted → Listening → ShuttingDown → Stopped
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is retried
//! - The listener binds last, after the pipeline is known to be valid
//! - Draining is bounded; stragglers are aborted, not asked

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, StartupError};

/// Where a server instance is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, socket not bound yet.
    Unstarted,
    /// Bound and accepting connections.
    Listening,
    /// Termination requested; no new connections, in-flight ones draining.
    ShuttingDown,
    /// Every connection is gone and the socket is closed.
    Stopped,
}
