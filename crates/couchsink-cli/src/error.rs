//! Error types for the command-line driver.

use std::path::PathBuf;

use couchsink::{ConfigError, ProcessError};

/// Errors that stop the driver.
///
/// Record-level outcomes (conflict, failure) are reported, not raised. Only
/// startup problems and escalated processing errors end up here.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// `COUCHSINK_LOG_FORMAT` is not `text` or `json`.
    #[error("invalid log format {0:?} (expected text or json)")]
    LogFormat(String),

    /// An input file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The file that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Standard input could not be read.
    #[error("failed to read stdin: {0}")]
    Stdin(#[source] std::io::Error),

    /// A record was stored but could not be reported back.
    #[error("processing error: {0}")]
    Process(#[from] ProcessError),

    /// A report line could not be serialized.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
