//! Configuration loading from process arguments.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::config::schema::{Config, ListenerConfig, DEFAULT_MAX_HEADER_BYTES, DEFAULT_PORT};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Arguments could not be parsed (also covers `--help` / `--version`).
    #[error(transparent)]
    Args(#[from] clap::Error),

    /// Arguments parsed but describe an unusable configuration.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Command-line flags.
#[derive(Debug, Parser)]
#[command(name = "shttp", version)]
#[command(about = "Serve a directory or reverse-proxy a single host over HTTP", long_about = None)]
pub struct Cli {
    /// Port to bind the server
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Listen address
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Server read timeout
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    pub rtimeout: Duration,

    /// Server write timeout
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    pub wtimeout: Duration,

    /// Max header size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_HEADER_BYTES)]
    pub maxheaders: usize,

    /// Directory to expose
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Act as a reverse proxy for the given URL
    #[arg(long, default_value = "")]
    pub proxy: String,

    /// Open a browser pointing to this server
    #[arg(long)]
    pub open: bool,

    /// Do not log requests
    #[arg(long)]
    pub quiet: bool,

    /// Disable CORS headers
    #[arg(long)]
    pub nocors: bool,

    /// Log request information
    #[arg(long)]
    pub debug: bool,

    /// Add headers disabling HTTP cache for all requests
    #[arg(long)]
    pub nocache: bool,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            listener: ListenerConfig {
                host: cli.host,
                port: cli.port,
                read_timeout: cli.rtimeout,
                write_timeout: cli.wtimeout,
                max_header_bytes: cli.maxheaders,
                ..ListenerConfig::default()
            },
            dir: cli.dir,
            proxy: Some(cli.proxy).filter(|p| !p.is_empty()),
            open: cli.open,
            quiet: cli.quiet,
            no_cors: cli.nocors,
            debug: cli.debug,
            no_cache: cli.nocache,
        }
    }
}

/// Parse and validate configuration from an argument list (program name first).
pub fn load_config<I, T>(args: I) -> Result<Config, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config = Config::from(Cli::try_parse_from(args)?);
    validate_config(&config)?;
    Ok(config)
}
