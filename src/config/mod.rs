//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process arguments
//!     → loader.rs (clap parse into Config)
//!     → validation.rs (flag conflicts)
//!     → Config (validated, immutable)
//!     → handed to the pipeline assembler and the supervisor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - Every flag has a default so `shttp` alone serves the current directory
//! - Validation separates syntactic (clap) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, Cli, ConfigError};
pub use schema::{Config, ListenerConfig};
pub use validation::{validate_config, ValidationError};
