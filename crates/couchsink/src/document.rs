//! JSON documents parsed from record payloads.

use serde::Serialize;
use serde_json::{Map, Value};

/// Field holding a document's identifier.
pub const ID_FIELD: &str = "_id";

/// Field holding a document's revision token.
pub const REV_FIELD: &str = "_rev";

/// Reasons a payload is not a storable document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The payload is not valid JSON.
    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload is valid JSON but not an object.
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// A JSON object ready to be saved.
///
/// May carry `_id` and `_rev` for updates; without `_id` the server assigns
/// an identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Parse a payload as exactly one JSON object.
    pub fn parse(payload: &[u8]) -> Result<Self, DocumentError> {
        match serde_json::from_slice::<Value>(payload)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DocumentError::NotAnObject(json_kind(&other))),
        }
    }

    /// The document's `_id`, when present as a non-empty string.
    pub fn id(&self) -> Option<&str> {
        self.string_field(ID_FIELD)
    }

    /// The document's `_rev`, when present as a non-empty string.
    pub fn rev(&self) -> Option<&str> {
        self.string_field(REV_FIELD)
    }

    /// The underlying JSON object.
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn string_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_with_id_and_rev() {
        let doc = Document::parse(br#"{"_id":"doc1","_rev":"1-abc","name":"a"}"#);
        assert!(doc.is_ok());
        let Ok(doc) = doc else { return };
        assert_eq!(doc.id(), Some("doc1"));
        assert_eq!(doc.rev(), Some("1-abc"));
        assert_eq!(doc.as_map().len(), 3);
    }

    #[test]
    fn empty_or_non_string_id_is_absent() {
        let doc = Document::parse(br#"{"_id":"","_rev":7}"#);
        assert!(doc.is_ok());
        let Ok(doc) = doc else { return };
        assert_eq!(doc.id(), None);
        assert_eq!(doc.rev(), None);
    }

    #[test]
    fn rejects_malformed_and_non_object_payloads() {
        assert!(matches!(
            Document::parse(b"{\"name\":"),
            Err(DocumentError::Malformed(_))
        ));
        assert!(matches!(
            Document::parse(b"[1,2]"),
            Err(DocumentError::NotAnObject("an array"))
        ));
        assert!(matches!(Document::parse(b""), Err(DocumentError::Malformed(_))));
    }

    #[test]
    fn serializes_transparently() {
        let doc = Document::parse(br#"{"name":"a"}"#);
        assert!(doc.is_ok());
        let Ok(doc) = doc else { return };
        assert_eq!(serde_json::to_string(&doc).unwrap_or_default(), r#"{"name":"a"}"#);
    }
}
