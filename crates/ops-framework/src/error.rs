//! Error types for the framework and model layers.
//!
//! [`ModelError`] covers platform-fact failures surfaced by a
//! [`ModelBackend`](crate::backend::ModelBackend). [`FrameworkError`] covers
//! dispatch, persistence, and handler failures, and wraps [`ModelError`]
//! when a model call fails outside a handler.

use ops_storage::StorageError;
use ops_types::{HandleParseError, RelationId};

/// Errors reported by the model layer and its backends.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The relation id does not exist.
    #[error("relation {relation_id} not found")]
    RelationNotFound {
        /// The unknown relation id.
        relation_id: RelationId,
    },

    /// The relation exists but has no bag for the named app or unit.
    #[error("relation {relation_id} has no member {member:?}")]
    MemberNotFound {
        /// The relation that was queried.
        relation_id: RelationId,
        /// The unknown app or unit name.
        member: String,
    },

    /// The endpoint is not declared in the charm metadata.
    #[error("endpoint {endpoint:?} is not declared in metadata")]
    InvalidEndpoint {
        /// The undeclared endpoint name.
        endpoint: String,
    },

    /// The caller may not perform this write.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Why the write was refused.
        reason: String,
    },

    /// More than one relation exists where exactly one was expected.
    #[error("endpoint {endpoint:?} has {count} relations, expected at most one")]
    TooManyRelated {
        /// The endpoint that was queried.
        endpoint: String,
        /// How many relations it has.
        count: usize,
    },

    /// An event-specific operation was used on the wrong kind of event.
    #[error("{operation} is only valid on {expected} events, not {actual}")]
    WrongEventKind {
        /// The attempted operation.
        operation: &'static str,
        /// The event kind that supports it.
        expected: &'static str,
        /// The event kind it was attempted on.
        actual: String,
    },
}

impl ModelError {
    /// Whether this error reports a missing relation, app, or unit.
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RelationNotFound { .. } | Self::MemberNotFound { .. }
        )
    }
}

/// Errors that can occur while registering, emitting, or persisting.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    /// The durable store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A model call failed.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// A snapshot could not be serialised or restored.
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored handle path could not be parsed.
    #[error("invalid handle: {0}")]
    InvalidHandle(#[from] HandleParseError),

    /// An observer's handler returned an error. Dispatch of the event was
    /// aborted; notices recorded so far are left in place.
    #[error("handler {observer}.{method} failed on {event}: {source}")]
    Handler {
        /// Path of the event being delivered.
        event: String,
        /// Path of the observer.
        observer: String,
        /// Registered method name.
        method: String,
        /// The handler's error.
        #[source]
        source: anyhow::Error,
    },

    /// A handler tried to re-enter itself through a nested emission.
    #[error("handler {observer}.{method} is already running")]
    ReentrantDispatch {
        /// Path of the observer.
        observer: String,
        /// Registered method name.
        method: String,
    },

    /// The same observer method was registered twice for one event source.
    #[error("{observer}.{method} already observes {event}")]
    DuplicateObserver {
        /// Emitter path and event kind, e.g. `Charm/on/start`.
        event: String,
        /// Path of the observer.
        observer: String,
        /// Registered method name.
        method: String,
    },

    /// The framework was used after [`close`](crate::Framework::close).
    #[error("framework is closed")]
    Closed,
}
