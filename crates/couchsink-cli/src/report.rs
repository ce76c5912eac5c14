//! One JSON line per processed record.

use std::collections::BTreeMap;

use couchsink::{Disposition, Relationship};
use serde::Serialize;

/// What the driver prints for one record.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RecordReport<'a> {
    /// The record was routed to a relationship.
    Routed {
        /// Input the record came from.
        source: &'a str,
        /// Relationship the record was routed to.
        relationship: Relationship,
        /// The record's attributes after routing.
        attributes: &'a BTreeMap<String, String>,
        /// The record's payload after routing, when it is UTF-8.
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<&'a str>,
    },
    /// The record was dropped on an auto-terminated relationship.
    Dropped {
        /// Input the record came from.
        source: &'a str,
        /// Always `true`.
        dropped: bool,
    },
}

impl<'a> RecordReport<'a> {
    /// Describe `disposition` for the record read from `source`.
    pub fn new(source: &'a str, disposition: &'a Disposition) -> Self {
        match disposition {
            Disposition::Transfer {
                relationship,
                record,
            } => Self::Routed {
                source,
                relationship: *relationship,
                attributes: record.attributes(),
                payload: std::str::from_utf8(record.payload()).ok(),
            },
            Disposition::Dropped => Self::Dropped {
                source,
                dropped: true,
            },
        }
    }
}
