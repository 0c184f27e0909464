//! Example charm built on the ops framework.
//!
//! [`ExampleCharm`] observes lifecycle, relation, metrics, and action
//! events and records each delivery in stored state. It doubles as a
//! fixture for exercising deferral, reemission, and the testing harness.
//!
//! # Modules
//!
//! - [`charm`] -- The charm and its handlers
//! - [`options`] -- Feature switches for optional observers
//! - [`error`] -- Option parsing errors

pub mod charm;
pub mod error;
pub mod options;

pub use charm::{ExampleCharm, OBSERVED_EVENT_TYPES};
pub use error::OptionsError;
pub use options::{ExampleCharmOptions, USE_ACTIONS_VAR, USE_LOG_ACTIONS_VAR};

/// `metadata.yaml` of the example charm: one endpoint per section.
pub const METADATA: &str = "
name: example
requires:
  db:
    interface: db
provides:
  mon:
    interface: monitoring
peers:
  ha:
    interface: cluster
";
