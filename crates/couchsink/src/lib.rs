//! Single-record `CouchDB` persistence connector.
//!
//! Takes one inbound record at a time, parses its payload as a JSON
//! document, saves it to a `CouchDB` database and routes the record to one
//! of three relationships depending on how the store answered.
//!
//! # Invocation
//!
//! ```text
//! InboundRecord
//!     |
//!     +-- CONNECT --(ConnectionError)--------------------------+
//!     |     ConnectionPool -> CouchConnection                   |
//!     |                                                         |
//!     +-- WRITE   writer::write -> SaveOutcome                  |
//!     |     Stored | Conflict | Failed                          |
//!     |                                                         |
//!     +-- ROUTE   OutcomeRouter::route <------------------------+
//!           success | conflict | failure | dropped
//! ```
//!
//! # Modules
//!
//! - [`config`] -- Validated connection and processor configuration
//! - [`connection`] -- HTTP connection builder and connection pool
//! - [`document`] -- Payload parsing into JSON documents
//! - [`store`] -- The document store interface the writer and router use
//! - [`writer`] -- Save attempt and outcome classification
//! - [`router`] -- Outcome routing and attribute contract
//! - [`processor`] -- The per-record state machine tying it all together
//! - [`record`] -- Inbound record payload and attributes
//! - [`relationship`] -- Routing targets
//! - [`error`] -- Shared error types

pub mod config;
pub mod connection;
pub mod document;
pub mod error;
pub mod processor;
pub mod record;
pub mod relationship;
pub mod router;
pub mod store;
pub mod writer;

// Re-export primary types for convenience.
pub use config::{ConfigError, ConnectionConfig, ProcessorConfig, Scheme};
pub use connection::{ConnectionFactory, ConnectionMode, ConnectionPool, CouchConnection};
pub use document::{Document, DocumentError};
pub use error::{ConnectionError, ProcessError};
pub use processor::DocumentProcessor;
pub use record::InboundRecord;
pub use relationship::{Relationship, Relationships};
pub use router::{Disposition, OutcomeRouter};
pub use store::{DocumentStore, SaveResponse, StoreError};
pub use writer::SaveOutcome;
