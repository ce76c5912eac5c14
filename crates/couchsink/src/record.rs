//! The inbound record: an opaque payload plus string attributes.
//!
//! Records belong to the calling pipeline. The processor reads the payload,
//! may replace it, and sets the attributes listed in [`attributes`] when a
//! document is stored.

use std::collections::BTreeMap;

/// Attribute keys set on records routed to success.
pub mod attributes {
    /// `{id}@{rev}` of the stored document.
    pub const FILENAME: &str = "filename";
    /// Canonical URI of the target database.
    pub const PATH: &str = "path";
    /// Always [`JSON_MIME_TYPE`](super::JSON_MIME_TYPE) on success.
    pub const MIME_TYPE: &str = "mime-type";
}

/// MIME type of every success payload.
pub const JSON_MIME_TYPE: &str = "application/json";

/// One record handed to the processor per invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRecord {
    payload: Vec<u8>,
    attributes: BTreeMap<String, String>,
}

impl InboundRecord {
    /// Create a record with the given payload and no attributes.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute, builder style.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.put_attribute(key, value);
        self
    }

    /// The payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Replace the payload.
    pub fn replace_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }

    /// All attributes.
    pub const fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// A single attribute value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Set an attribute, overwriting any previous value.
    pub fn put_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Consume the record and return its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
