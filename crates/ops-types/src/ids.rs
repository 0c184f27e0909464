//! Typed identifiers.

use serde::{Deserialize, Serialize};

/// Identifier of a relation, unique for the lifetime of a model.
///
/// The platform allocates these as small integers; they are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(pub u64);

impl RelationId {
    /// Return the raw integer value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for RelationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RelationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<RelationId> for u64 {
    fn from(id: RelationId) -> Self {
        id.0
    }
}
