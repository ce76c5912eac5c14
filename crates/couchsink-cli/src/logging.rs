//! Log output setup.
//!
//! Logs always go to stderr so stdout carries only report lines.
//! `COUCHSINK_LOG_FORMAT=json` switches from human-readable lines to one
//! JSON object per event.

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use crate::error::CliError;

/// Environment variable selecting the log format.
pub const LOG_FORMAT: &str = "COUCHSINK_LOG_FORMAT";

/// How log events are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CliError::LogFormat(other.to_owned())),
        }
    }
}

impl LogFormat {
    /// Read the format from the environment, defaulting to text.
    pub fn from_env() -> Result<Self, CliError> {
        std::env::var(LOG_FORMAT).map_or(Ok(Self::Text), |s| s.parse())
    }
}

/// Install the global subscriber. `RUST_LOG` filters, default `info`.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parsing() {
        assert!(matches!("json".parse::<LogFormat>(), Ok(LogFormat::Json)));
        assert!(matches!(" JSON ".parse::<LogFormat>(), Ok(LogFormat::Json)));
        assert!(matches!("text".parse::<LogFormat>(), Ok(LogFormat::Text)));
        assert!(matches!(
            "yaml".parse::<LogFormat>(),
            Err(CliError::LogFormat(ref f)) if f == "yaml"
        ));
    }
}
