//! The per-record state machine.
//!
//! ```text
//! START -> CONNECT -> WRITE -> {STORED, CONFLICT, FAILED} -> ROUTE -> END
//!              |                                              ^
//!              +-------------- (connection error) ------------+ failure
//! ```
//!
//! Nothing is carried from one invocation to the next except the pooled
//! connection.

use tracing::{debug, error};

use crate::config::ProcessorConfig;
use crate::connection::{ConnectionFactory, ConnectionPool};
use crate::error::ProcessError;
use crate::record::InboundRecord;
use crate::relationship::{Relationship, Relationships};
use crate::router::{Disposition, OutcomeRouter};
use crate::writer;

/// Writes one record per invocation and decides where it goes.
pub struct DocumentProcessor<F> {
    connector: F,
    router: OutcomeRouter,
}

impl DocumentProcessor<ConnectionPool> {
    /// Build a processor backed by a [`ConnectionPool`].
    pub fn from_config(config: ProcessorConfig) -> Self {
        let pool = ConnectionPool::new(config.connection, config.connection_mode);
        Self::new(
            pool,
            OutcomeRouter::new(config.relationships, config.include_document),
        )
    }
}

impl<F: ConnectionFactory> DocumentProcessor<F> {
    /// Build a processor from a connection source and a router.
    pub const fn new(connector: F, router: OutcomeRouter) -> Self {
        Self { connector, router }
    }

    /// The connection source.
    pub const fn connector(&self) -> &F {
        &self.connector
    }

    /// The routing surface.
    pub const fn relationships(&self) -> &Relationships {
        self.router.relationships()
    }

    /// Process one record.
    ///
    /// Record-scoped problems never surface as errors: a connection failure,
    /// a rejected write or a malformed payload routes the record to failure,
    /// a revision mismatch routes it to conflict. Records on an
    /// auto-terminated relationship come back as [`Disposition::Dropped`].
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] only when the document was stored but the
    /// success payload could not be produced.
    pub async fn on_record(&self, record: InboundRecord) -> Result<Disposition, ProcessError> {
        let store = match self.connector.acquire().await {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, "failed to obtain a CouchDB connection");
                return Ok(self.router.pass_through(Relationship::Failure, record));
            }
        };

        let outcome = writer::write(&store, record.payload()).await;
        debug!(outcome = outcome.label(), "write attempt classified");

        self.router.route(&store, outcome, record).await
    }
}
