//! Error types for the `ops-testing` crate.

use ops_framework::{FrameworkError, ModelError, RelationId};

use crate::meta::MetaError;

/// Errors returned by [`Harness`](crate::Harness) operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Metadata or config YAML could not be parsed.
    #[error(transparent)]
    Meta(#[from] MetaError),

    /// The simulated platform rejected the request.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The unit is already a member of the relation.
    #[error("unit {unit:?} has already joined relation {relation_id}")]
    DuplicateUnit {
        /// The relation that was joined.
        relation_id: RelationId,
        /// The unit that joined twice.
        unit: String,
    },

    /// Emission or charm construction failed.
    #[error(transparent)]
    Framework(#[from] FrameworkError),
}

impl HarnessError {
    /// Whether this error reports a missing relation, app, or unit.
    pub const fn is_not_found(&self) -> bool {
        match self {
            Self::Model(err) => err.is_not_found(),
            Self::Framework(FrameworkError::Model(err)) => err.is_not_found(),
            _ => false,
        }
    }
}
