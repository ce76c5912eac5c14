//! The document store interface.
//!
//! The writer and router talk to the store only through [`DocumentStore`].
//! [`CouchConnection`](crate::CouchConnection) implements it over HTTP;
//! tests substitute an in-memory store.
//!
//! Errors from the store come back on two channels, mirroring how `CouchDB`
//! answers: a rejected request is an `Err(StoreError)`, while an accepted
//! request may still carry an `error` field inside its [`SaveResponse`].

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Body of a save response.
///
/// Every field is optional because `CouchDB` uses the same shape for
/// success (`ok`, `id`, `rev`) and per-document errors (`error`, `reason`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    /// `true` when the server reports the write as accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// Identifier assigned or confirmed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// New revision token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Error code, set on partial failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable error reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A store request that did not complete normally.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The server holds a revision that does not match the submitted one.
    #[error("document update conflict: {reason}")]
    Conflict {
        /// The server's explanation.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("server returned {status}: {error}: {reason}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error code from the response body.
        error: String,
        /// Reason from the response body.
        reason: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// Build a [`StoreError::Rejected`] from a status and raw response body.
    pub fn rejected(status: u16, body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<ErrorBody>(body).unwrap_or_default();
        Self::Rejected {
            status,
            error: parsed.error.unwrap_or_else(|| "unknown_error".to_owned()),
            reason: parsed
                .reason
                .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned()),
        }
    }

    /// Build a [`StoreError::Conflict`] from a raw response body.
    pub fn conflict(body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<ErrorBody>(body).unwrap_or_default();
        Self::Conflict {
            reason: parsed
                .reason
                .unwrap_or_else(|| "Document update conflict.".to_owned()),
        }
    }
}

/// `{"error": ..., "reason": ...}` body returned with `CouchDB` error statuses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Operations the writer and router need from a document store.
pub trait DocumentStore: Send + Sync {
    /// Create or update a document.
    ///
    /// A document with an `_id` is written at that identifier; without one
    /// the server assigns it.
    fn save(
        &self,
        document: &Document,
    ) -> impl Future<Output = Result<SaveResponse, StoreError>> + Send;

    /// Fetch the raw bytes of one revision of a document.
    fn fetch(&self, id: &str, rev: &str) -> impl Future<Output = Result<Vec<u8>, StoreError>> + Send;

    /// Canonical URI of the target database, with a trailing slash.
    fn database_uri(&self) -> &str;
}

impl<S: DocumentStore> DocumentStore for Arc<S> {
    fn save(
        &self,
        document: &Document,
    ) -> impl Future<Output = Result<SaveResponse, StoreError>> + Send {
        (**self).save(document)
    }

    fn fetch(&self, id: &str, rev: &str) -> impl Future<Output = Result<Vec<u8>, StoreError>> + Send {
        (**self).fetch(id, rev)
    }

    fn database_uri(&self) -> &str {
        (**self).database_uri()
    }
}
