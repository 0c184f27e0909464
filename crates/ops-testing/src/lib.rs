//! Test harness and simulated platform backend for ops charms.
//!
//! [`Harness`] drives a charm deterministically: it parses the charm's
//! metadata, owns an in-memory store and a [`TestingBackend`], and turns
//! each simulated platform change into the event the charm would observe.
//! Every backend call made by charm code is recorded as a
//! [`BackendCall`] so tests can assert exactly which queries ran.
//!
//! # Modules
//!
//! - [`harness`] -- The [`Harness`] driver.
//! - [`backend`] -- [`TestingBackend`] and the [`BackendCall`] log.
//! - [`meta`] -- [`CharmMeta`] and [`ConfigSchema`] parsed from YAML.
//! - [`error`] -- [`HarnessError`].

pub mod backend;
pub mod error;
pub mod harness;
pub mod meta;

pub use backend::{BackendCall, MetricBatch, TestingBackend};
pub use error::HarnessError;
pub use harness::Harness;
pub use meta::{CharmMeta, ConfigOption, ConfigSchema, MetaError, RelationMeta, RelationRole};
