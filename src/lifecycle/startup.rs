//! Startup orchestration.
//!
//! # Responsibilities
//! - Assemble the pipeline from the validated configuration
//! - Bind the listener
//! - Announce the base URL and optionally open a browser on it
//!
//! # Design Decisions
//! - Fail fast: configuration and bind errors are returned before serving
//! - The listener binds last, so a bad configuration never holds a socket
//! - Opening the browser runs in the background and never fails startup

use std::io;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::config::{Config, ValidationError};
use crate::http::{BoundServer, Pipeline, ServeError, Supervisor};
use crate::observability::SharedSink;

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ValidationError),

    #[error(transparent)]
    Serve(#[from] ServeError),
}

/// Build the pipeline, bind, and announce. The returned server is listening.
pub async fn start(config: &Config, sink: SharedSink) -> Result<BoundServer, StartupError> {
    let pipeline = Pipeline::assemble(config, sink.clone())?;

    tracing::info!(
        mode = if config.is_proxy() { "proxy" } else { "directory" },
        decorators = ?pipeline.decorators(),
        "Pipeline ready"
    );

    let server = Supervisor::new(config.listener.clone(), pipeline.into_handler())
        .bind()
        .await?;

    let port = server
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(config.listener.port);
    let url = config.listener.base_url(port);

    if !config.quiet {
        announce(&sink, &url);
    }
    if config.open {
        spawn_open_browser(url);
    }

    Ok(server)
}

/// Print the base URL for the operator.
pub fn announce(sink: &SharedSink, url: &str) {
    sink.write_line(&format!("Listening to {url}"));
    sink.write_line("Hit CTRL-C to exit...");
}

/// Platform command that opens a URL in the default browser.
fn browser_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("open", &[] as &[&str])
    } else if cfg!(windows) {
        ("cmd", &["/C", "start", ""] as &[&str])
    } else {
        ("xdg-open", &[] as &[&str])
    }
}

/// Ask the desktop environment to open `url`.
pub async fn open_browser(url: &str) -> io::Result<()> {
    let (program, args) = browser_command();
    let status = Command::new(program)
        .args(args)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{program} exited with {status}")))
    }
}

/// Open the browser in the background; failures are only logged.
pub fn spawn_open_browser(url: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        match open_browser(&url).await {
            Ok(()) => tracing::debug!(url = %url, "Browser opened"),
            Err(e) => tracing::warn!(url = %url, error = %e, "Error opening browser"),
        }
    })
}
