//! Document writer: parse, save, classify.
//!
//! [`write`] never fails. Every payload produces exactly one
//! [`SaveOutcome`], which the router turns into a routing decision.
//!
//! Classification precedence when the store answers:
//! 1. a rejected request (conflict, other status, transport failure),
//! 2. an `error` field inside an accepted response,
//! 3. acceptance.

use tracing::debug;

use crate::document::Document;
use crate::store::{DocumentStore, SaveResponse, StoreError};

/// Failure reason for payloads that are not a single JSON object.
pub const INVALID_DOCUMENT: &str = "invalid document";

/// Result of one write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The store accepted the write. Both fields are non-empty.
    Stored {
        /// Identifier assigned or confirmed by the store.
        id: String,
        /// Revision token of the new document version.
        rev: String,
    },
    /// A different revision already exists at the document's identifier.
    Conflict {
        /// The store's explanation.
        reason: String,
    },
    /// Any other rejection.
    Failed {
        /// Operator-facing reason.
        reason: String,
    },
}

impl SaveOutcome {
    /// Short label for logging.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stored { .. } => "stored",
            Self::Conflict { .. } => "conflict",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Parse `payload` as a document and save it.
pub async fn write<S: DocumentStore>(store: &S, payload: &[u8]) -> SaveOutcome {
    let document = match Document::parse(payload) {
        Ok(document) => document,
        Err(e) => {
            debug!(error = %e, payload_size = payload.len(), "payload is not a JSON object");
            return SaveOutcome::Failed {
                reason: INVALID_DOCUMENT.to_owned(),
            };
        }
    };

    classify(store.save(&document).await)
}

/// Map the store's answer to a [`SaveOutcome`].
pub fn classify(result: Result<SaveResponse, StoreError>) -> SaveOutcome {
    let response = match result {
        Ok(response) => response,
        Err(StoreError::Conflict { reason }) => return SaveOutcome::Conflict { reason },
        Err(e) => {
            return SaveOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    if let Some(error) = response.error {
        let reason = response.reason.unwrap_or_default();
        return SaveOutcome::Failed {
            reason: format!("{error}: {reason}"),
        };
    }

    match (response.id, response.rev) {
        (Some(id), Some(rev)) if !id.is_empty() && !rev.is_empty() => {
            SaveOutcome::Stored { id, rev }
        }
        _ => SaveOutcome::Failed {
            reason: "store accepted the write without reporting an id and revision".to_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{Faults, MemoryStore};

    fn accepted(id: &str, rev: &str) -> SaveResponse {
        SaveResponse {
            ok: Some(true),
            id: Some(id.to_owned()),
            rev: Some(rev.to_owned()),
            ..SaveResponse::default()
        }
    }

    #[test]
    fn accepted_response_is_stored() {
        assert_eq!(
            classify(Ok(accepted("doc1", "1-abc"))),
            SaveOutcome::Stored {
                id: "doc1".to_owned(),
                rev: "1-abc".to_owned()
            }
        );
    }

    #[test]
    fn error_field_wins_over_acceptance() {
        let response = SaveResponse {
            error: Some("forbidden".to_owned()),
            reason: Some("quota exceeded".to_owned()),
            ..accepted("doc1", "1-abc")
        };
        assert_eq!(
            classify(Ok(response)),
            SaveOutcome::Failed {
                reason: "forbidden: quota exceeded".to_owned()
            }
        );
    }

    #[test]
    fn conflict_signal_is_conflict() {
        let outcome = classify(Err(StoreError::conflict(
            br#"{"error":"conflict","reason":"Document update conflict."}"#,
        )));
        assert_eq!(
            outcome,
            SaveOutcome::Conflict {
                reason: "Document update conflict.".to_owned()
            }
        );
    }

    #[test]
    fn other_rejections_carry_store_message() {
        let outcome = classify(Err(StoreError::rejected(
            400,
            br#"{"error":"bad_request","reason":"Document must be a JSON object"}"#,
        )));
        assert!(matches!(
            outcome,
            SaveOutcome::Failed { ref reason } if reason.contains("Document must be a JSON object")
        ));
    }

    #[test]
    fn missing_id_or_rev_is_never_stored() {
        let no_rev = SaveResponse {
            rev: None,
            ..accepted("doc1", "")
        };
        assert_eq!(classify(Ok(no_rev)).label(), "failed");
        assert_eq!(classify(Ok(accepted("", "1-abc"))).label(), "failed");
        assert_eq!(classify(Ok(accepted("doc1", ""))).label(), "failed");
    }

    #[tokio::test]
    async fn malformed_payload_fails_without_touching_store() {
        let store = MemoryStore::new();
        let payloads: [&[u8]; 5] = [b"{\"name\":", b"not json", b"[1,2,3]", b"\"text\"", b""];
        for payload in payloads {
            assert_eq!(
                write(&store, payload).await,
                SaveOutcome::Failed {
                    reason: INVALID_DOCUMENT.to_owned()
                }
            );
        }
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn new_document_gets_server_assigned_id() {
        let store = MemoryStore::new();
        let outcome = write(&store, br#"{"name":"a"}"#).await;
        assert_eq!(outcome.label(), "stored");
        let SaveOutcome::Stored { id, rev } = outcome else { return };
        assert!(!id.is_empty());
        assert!(rev.starts_with("1-"));
        assert_eq!(store.latest_rev(&id), Some(rev));
    }

    #[tokio::test]
    async fn stale_revision_conflicts() {
        let store = MemoryStore::new();
        let first = write(&store, br#"{"_id":"doc1","n":1}"#).await;
        assert_eq!(first.label(), "stored");

        // Same identifier, no revision: stale.
        let second = write(&store, br#"{"_id":"doc1","n":2}"#).await;
        assert_eq!(second.label(), "conflict");
    }

    #[tokio::test]
    async fn response_error_field_yields_failed() {
        let store = MemoryStore::with_faults(Faults {
            error_field: Some("forbidden".to_owned()),
            ..Faults::default()
        });
        let outcome = write(&store, br#"{"name":"a"}"#).await;
        assert_eq!(
            outcome,
            SaveOutcome::Failed {
                reason: "forbidden: scripted".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn rejected_write_yields_failed() {
        let store = MemoryStore::with_faults(Faults {
            reject_status: Some(500),
            ..Faults::default()
        });
        let outcome = write(&store, br#"{"name":"a"}"#).await;
        assert!(matches!(outcome, SaveOutcome::Failed { ref reason } if reason.contains("500")));
    }
}
