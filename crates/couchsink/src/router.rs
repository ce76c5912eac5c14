//! Outcome routing and the success attribute contract.
//!
//! | Outcome | Payload | Attributes | Routed to |
//! |---------|---------|------------|-----------|
//! | `Stored`, success auto-terminated | -- | -- | dropped |
//! | `Stored`, include document | stored document | `filename`, `path`, `mime-type` | success |
//! | `Stored` | `{"id":..,"rev":..}` | `filename`, `path`, `mime-type` | success |
//! | `Conflict` | unchanged | unchanged | conflict |
//! | `Failed` | unchanged | unchanged | failure |
//!
//! A conflict or failure on an auto-terminated relationship is dropped too.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ProcessError;
use crate::record::{InboundRecord, JSON_MIME_TYPE, attributes};
use crate::relationship::{Relationship, Relationships};
use crate::store::DocumentStore;
use crate::writer::SaveOutcome;

/// What happened to a record at the end of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The record is handed back to the pipeline on `relationship`.
    Transfer {
        /// Where the record goes.
        relationship: Relationship,
        /// The record, possibly with a new payload and attributes.
        record: InboundRecord,
    },
    /// The record was discarded because its relationship is auto-terminated.
    Dropped,
}

impl Disposition {
    /// The relationship a transferred record goes to.
    pub const fn relationship(&self) -> Option<Relationship> {
        match self {
            Self::Transfer { relationship, .. } => Some(*relationship),
            Self::Dropped => None,
        }
    }

    /// The transferred record.
    pub const fn record(&self) -> Option<&InboundRecord> {
        match self {
            Self::Transfer { record, .. } => Some(record),
            Self::Dropped => None,
        }
    }
}

/// Write response echoed as the success payload.
#[derive(Debug, Serialize)]
struct WriteReceipt<'a> {
    id: &'a str,
    rev: &'a str,
}

/// Decides a record's content and destination from a [`SaveOutcome`].
#[derive(Debug, Clone, Default)]
pub struct OutcomeRouter {
    relationships: Relationships,
    include_document: bool,
}

impl OutcomeRouter {
    /// Create a router over the given routing surface.
    pub const fn new(relationships: Relationships, include_document: bool) -> Self {
        Self {
            relationships,
            include_document,
        }
    }

    /// The routing surface.
    pub const fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    /// Route `record` according to `outcome`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::FetchInconsistency`] when include-document is
    /// on and the stored revision cannot be fetched back.
    pub async fn route<S: DocumentStore>(
        &self,
        store: &S,
        outcome: SaveOutcome,
        mut record: InboundRecord,
    ) -> Result<Disposition, ProcessError> {
        match outcome {
            SaveOutcome::Stored { id, rev } => {
                if self.relationships.is_auto_terminated(Relationship::Success) {
                    debug!(id, rev, "success is auto-terminated, dropping record");
                    return Ok(Disposition::Dropped);
                }

                let payload = if self.include_document {
                    store
                        .fetch(&id, &rev)
                        .await
                        .map_err(|source| ProcessError::FetchInconsistency {
                            id: id.clone(),
                            rev: rev.clone(),
                            source,
                        })?
                } else {
                    serde_json::to_vec(&WriteReceipt { id: &id, rev: &rev })?
                };
                record.replace_payload(payload);

                record.put_attribute(attributes::FILENAME, format!("{id}@{rev}"));
                record.put_attribute(attributes::PATH, store.database_uri());
                record.put_attribute(attributes::MIME_TYPE, JSON_MIME_TYPE);

                info!(id, rev, include_document = self.include_document, "document stored");
                Ok(Disposition::Transfer {
                    relationship: Relationship::Success,
                    record,
                })
            }
            SaveOutcome::Conflict { reason } => {
                info!(reason, "document conflicts with an existing revision");
                Ok(self.pass_through(Relationship::Conflict, record))
            }
            SaveOutcome::Failed { reason } => {
                warn!(reason, "failed to store document");
                Ok(self.pass_through(Relationship::Failure, record))
            }
        }
    }

    /// Hand `record` on unchanged, or drop it when `relationship` is
    /// auto-terminated.
    pub fn pass_through(&self, relationship: Relationship, record: InboundRecord) -> Disposition {
        if self.relationships.is_auto_terminated(relationship) {
            debug!(%relationship, "relationship is auto-terminated, dropping record");
            return Disposition::Dropped;
        }
        Disposition::Transfer {
            relationship,
            record,
        }
    }
}
