//! Event framework, stored state, and model layer for ops charms.
//!
//! Charm code runs inside short-lived process invocations. Each invocation
//! builds a [`Framework`] over a durable [`Storage`](ops_storage::Storage)
//! and a [`Model`], lets the charm register observers, replays any deferred
//! events, emits the triggering event, and commits.
//!
//! # Modules
//!
//! - [`framework`] -- Observer registry, emission, defer/reemit, commit.
//! - [`event`] -- [`Event`], [`EventSource`], and the [`CharmEvents`]
//!   named constructors.
//! - [`stored_state`] -- Per-object persistent state ([`StoredState`]).
//! - [`charm`] -- The [`Charm`] trait and [`CharmBase`].
//! - [`model`] -- [`Model`] and [`Relation`], the charm's view of the
//!   platform.
//! - [`backend`] -- The [`ModelBackend`] trait implemented by platform
//!   adapters and the test harness.
//! - [`dispatch`] -- [`run_invocation`], one hook invocation end to end.
//! - [`error`] -- [`FrameworkError`] and [`ModelError`].
//!
//! [`run_invocation`]: dispatch::run_invocation

pub mod backend;
pub mod charm;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod framework;
pub mod model;
pub mod stored_state;

pub use backend::{ConfigData, ModelBackend, RelationData};
pub use charm::{Charm, CharmBase};
pub use dispatch::{HookTrigger, run_invocation, run_invocation_with};
pub use error::{FrameworkError, ModelError};
pub use event::{CharmEvents, Event, EventSource};
pub use framework::Framework;
pub use model::{Model, Relation};
pub use stored_state::{StoredState, StoredStateData};

pub use ops_types::{EventKind, EventPayload, Handle, Notice, RelationId, Status, StatusName};
