//! Error types for the `CouchDB` sink.
//!
//! Record-scoped problems (conflicts, rejected writes, malformed payloads)
//! are not errors: they become a [`SaveOutcome`](crate::SaveOutcome) and a
//! routing decision. Only the two kinds below leave the processor.
//!
//! - [`ConnectionError`] -- the store could not be reached or used. The
//!   processor routes the current record to failure.
//! - [`ProcessError`] -- escalated to the caller of
//!   [`DocumentProcessor::on_record`](crate::DocumentProcessor::on_record).

use crate::store::StoreError;

/// A connection to the store could not be established.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The configured server address does not form a valid URL.
    #[error("invalid server URL {url}: {reason}")]
    InvalidUrl {
        /// The URL that failed to parse.
        url: String,
        /// Why it failed.
        reason: String,
    },

    /// The server did not answer.
    #[error("cannot reach CouchDB at {url}: {source}")]
    Unreachable {
        /// The URL that was requested.
        url: String,
        /// The transport failure.
        #[source]
        source: reqwest::Error,
    },

    /// The server refused the credentials.
    #[error("CouchDB rejected credentials for {username} (status {status})")]
    Unauthorized {
        /// The login user.
        username: String,
        /// 401 or 403.
        status: u16,
    },

    /// The database does not exist and auto-create is off.
    #[error("database {database} does not exist and auto-create is disabled")]
    DatabaseMissing {
        /// The missing database.
        database: String,
    },

    /// The server answered with a status the connection builder does not expect.
    #[error("unexpected status {status} from {url}: {body}")]
    UnexpectedStatus {
        /// The URL that was requested.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
}

/// An invocation-level error escalated to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The document was stored, but fetching it back failed.
    ///
    /// Not downgraded to failure: the write already happened, and routing
    /// the record to failure would misreport the store's state.
    #[error("document {id}@{rev} was stored but could not be fetched: {source}")]
    FetchInconsistency {
        /// Identifier of the stored document.
        id: String,
        /// Revision of the stored document.
        rev: String,
        /// The fetch failure.
        #[source]
        source: StoreError,
    },

    /// The success payload could not be serialized.
    #[error("failed to serialize write response: {0}")]
    Serialization(#[from] serde_json::Error),
}
