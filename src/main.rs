//! shttp: a disposable local HTTP endpoint.
//!
//! # Architecture Overview
//!
//! ```text
//! Client ─▶ net::listener ─▶ http::server (hyper, read timeout)
//!                                   │
//!                                   ▼
//!     no-cache → diagnostic → CORS → access log → host rewrite → write timeout
//!                                   │
//!                                   ▼
//!                  FileServer (--dir)  |  ReverseProxy (--proxy) ─▶ upstream
//!
//! lifecycle: Unstarted → Listening → ShuttingDown → Stopped
//! ```

use std::process::ExitCode;

use shttp::config::{load_config, ConfigError};
use shttp::lifecycle::{self, signals};
use shttp::observability::{self, StdoutSink};

#[tokio::main]
async fn main() -> ExitCode {
    observability::logging::init();

    let config = match load_config(std::env::args_os()) {
        Ok(config) => config,
        Err(ConfigError::Args(e)) => e.exit(),
        Err(e) => {
            eprintln!("{e}, exiting.");
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!(?config, "Configuration loaded");

    let server = match lifecycle::start(&config, StdoutSink::shared()).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("{e}, exiting.");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.serve(signals::termination()).await {
        tracing::error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
