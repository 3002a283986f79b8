//! Subscriber setup for the host binaries.
//!
//! The library only emits `tracing` events; whichever binary embeds it calls
//! [`init`] once at startup to decide where they go.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "dirscape=info";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Filter directives such as `debug` or `dirscape=trace`. Falls back to
    /// `RUST_LOG`, then [`DEFAULT_FILTER`].
    pub filter: Option<String>,
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

#[derive(Debug)]
pub enum LogError {
    Filter(ParseError),
    File { path: PathBuf, source: std::io::Error },
    AlreadyInitialized(String),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::Filter(err) => write!(f, "invalid log filter: {err}"),
            LogError::File { path, source } => write!(f, "cannot open log file {}: {}", path.display(), source),
            LogError::AlreadyInitialized(msg) => write!(f, "logging already initialized: {msg}"),
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LogError::Filter(err) => Some(err),
            LogError::File { source, .. } => Some(source),
            LogError::AlreadyInitialized(_) => None,
        }
    }
}

impl From<ParseError> for LogError {
    fn from(err: ParseError) -> Self {
        LogError::Filter(err)
    }
}

/// Build the event filter: explicit directives win over `RUST_LOG`.
pub fn env_filter(directives: Option<&str>) -> Result<EnvFilter, LogError> {
    match directives {
        Some(directives) => Ok(EnvFilter::try_new(directives)?),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Install the global fmt subscriber.
pub fn init(options: &LogOptions) -> Result<(), LogError> {
    let filter = env_filter(options.filter.as_deref())?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = match &options.file {
        Some(path) => {
            let file = open_log_file(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|err| LogError::AlreadyInitialized(err.to_string()))
}

fn open_log_file(path: &Path) -> Result<File, LogError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogError::File {
            path: path.to_path_buf(),
            source,
        })
}
