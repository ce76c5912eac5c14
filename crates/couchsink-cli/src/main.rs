//! Command-line driver for the `CouchDB` document sink.
//!
//! Each file argument is one record; with no arguments a single record is
//! read from stdin. Records are processed one at a time through the same
//! [`DocumentProcessor`], so the pooled connection is shared across them.
//!
//! ```text
//! couchsink [FILE...]  -->  DocumentProcessor  -->  one JSON line per record
//! ```
//!
//! Configuration comes from the environment (`COUCHDB_HOST`,
//! `COUCHDB_DATABASE`, ...). Logs go to stderr, reports to stdout.
//! Each report line carries the routed payload when it is UTF-8.

mod error;
mod input;
mod logging;
mod report;

use couchsink::{DocumentProcessor, ProcessorConfig};
use tracing::{error, info};

use crate::error::CliError;
use crate::input::Source;
use crate::logging::LogFormat;
use crate::report::RecordReport;

/// Application entry point.
///
/// # Errors
///
/// Returns an error on invalid configuration, unreadable input, or a record
/// that was stored but could not be reported.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(LogFormat::from_env()?);

    let config = ProcessorConfig::from_env().map_err(CliError::from)?;
    info!(
        connection = ?config.connection,
        include_document = config.include_document,
        connection_mode = ?config.connection_mode,
        "configuration loaded"
    );

    let processor = DocumentProcessor::from_config(config);
    let auto_terminated: Vec<_> = processor.relationships().auto_terminated().collect();
    info!(?auto_terminated, "routing configured");
    let sources = Source::from_args(std::env::args().skip(1));

    if let Err(e) = run(&processor, &sources).await {
        error!(error = %e, "couchsink stopped");
        return Err(e.into());
    }
    Ok(())
}

async fn run(
    processor: &DocumentProcessor<couchsink::ConnectionPool>,
    sources: &[Source],
) -> Result<(), CliError> {
    let mut routed = 0_usize;
    for source in sources {
        let label = source.label();
        let record = source.read().await?;
        let disposition = processor.on_record(record).await?;
        println!(
            "{}",
            serde_json::to_string(&RecordReport::new(&label, &disposition))?
        );
        routed = routed.saturating_add(1);
    }
    info!(records = routed, "all records processed");
    Ok(())
}
