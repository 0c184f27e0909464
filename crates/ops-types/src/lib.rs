//! Shared value types for the ops operator framework.
//!
//! Everything here is plain data: identities, event kinds and payloads,
//! notice records, and status values. The framework, the durable store,
//! and the test harness all speak in these types.
//!
//! # Modules
//!
//! - [`handle`] -- Hierarchical path-based object identity ([`Handle`]).
//! - [`event`] -- [`EventKind`] and the persisted [`EventPayload`].
//! - [`notice`] -- The `(event, observer, method)` [`Notice`] triple.
//! - [`ids`] -- Typed identifiers such as [`RelationId`].
//! - [`status`] -- Workload [`Status`] values.
//! - [`error`] -- Parse errors.

pub mod error;
pub mod event;
pub mod handle;
pub mod ids;
pub mod notice;
pub mod status;

// Re-export all public types at crate root for convenience.
pub use error::HandleParseError;
pub use event::{EventKind, EventPayload};
pub use handle::{Handle, HandleSegment, validate_kind};
pub use ids::RelationId;
pub use notice::Notice;
pub use status::{Status, StatusName};
