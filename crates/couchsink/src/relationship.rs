//! Routing targets for processed records.
//!
//! Every record ends an invocation on exactly one [`Relationship`], unless
//! its relationship is auto-terminated, in which case it is dropped. The set
//! of relationships is fixed and built once at startup as [`Relationships`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named terminal channel a record is sent to after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    /// The document was stored.
    Success,
    /// The store already holds a different revision at the document's id.
    Conflict,
    /// The document could not be stored.
    Failure,
}

impl Relationship {
    /// Every relationship, in routing-surface order.
    pub const ALL: [Self; 3] = [Self::Success, Self::Conflict, Self::Failure];

    /// Stable lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Conflict => "conflict",
            Self::Failure => "failure",
        }
    }

    /// Operator-facing description.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "Records whose document was stored; carries the server's write response or the stored document",
            Self::Conflict => "Records whose document conflicted with an existing revision",
            Self::Failure => "Records whose document could not be stored",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A relationship name did not match any known relationship.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown relationship {0:?}")]
pub struct UnknownRelationship(pub String);

impl FromStr for Relationship {
    type Err = UnknownRelationship;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRelationship(s.to_owned()))
    }
}

/// The immutable routing surface: all relationships plus the subset whose
/// records are discarded on arrival.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    auto_terminated: BTreeSet<Relationship>,
}

impl Relationships {
    /// A routing surface with no auto-terminated relationships.
    pub fn new() -> Self {
        Self::default()
    }

    /// A routing surface where the given relationships are auto-terminated.
    pub fn with_auto_terminated(auto_terminated: impl IntoIterator<Item = Relationship>) -> Self {
        Self {
            auto_terminated: auto_terminated.into_iter().collect(),
        }
    }

    /// Whether records routed to `relationship` are discarded.
    pub fn is_auto_terminated(&self, relationship: Relationship) -> bool {
        self.auto_terminated.contains(&relationship)
    }

    /// The auto-terminated relationships, in order.
    pub fn auto_terminated(&self) -> impl Iterator<Item = Relationship> + '_ {
        self.auto_terminated.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_case_insensitively() {
        for relationship in Relationship::ALL {
            assert_eq!(relationship.name().parse::<Relationship>(), Ok(relationship));
            assert_eq!(
                relationship.name().to_uppercase().parse::<Relationship>(),
                Ok(relationship)
            );
        }
        assert!("original".parse::<Relationship>().is_err());
    }

    #[test]
    fn serializes_as_lowercase_name() {
        let json = serde_json::to_string(&Relationship::Conflict).unwrap_or_default();
        assert_eq!(json, "\"conflict\"");
    }

    #[test]
    fn auto_termination_is_per_relationship() {
        let relationships = Relationships::with_auto_terminated([Relationship::Success]);
        assert!(relationships.is_auto_terminated(Relationship::Success));
        assert!(!relationships.is_auto_terminated(Relationship::Conflict));
        assert!(!relationships.is_auto_terminated(Relationship::Failure));
        assert_eq!(relationships.auto_terminated().collect::<Vec<_>>(), [Relationship::Success]);
        assert!(!Relationships::new().is_auto_terminated(Relationship::Success));
    }
}
