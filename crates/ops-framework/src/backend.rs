//! The boundary through which charm code reads and writes platform facts.
//!
//! In production a [`ModelBackend`] translates each call into a hook-tool
//! invocation against the orchestration platform. Tests use the simulated
//! backend from the `ops-testing` crate instead. The framework never touches
//! platform state except through this trait.
//!
//! Every call is either a pure query or a single state transition. Unknown
//! identifiers are always reported as errors, never silently ignored.

use std::collections::BTreeMap;

use ops_types::{RelationId, Status};

use crate::error::ModelError;

/// One participant's relation data bag.
pub type RelationData = BTreeMap<String, String>;

/// Charm configuration values keyed by option name.
pub type ConfigData = BTreeMap<String, serde_json::Value>;

/// Platform operations consumed by the [`Model`](crate::Model).
pub trait ModelBackend {
    /// Relation ids established on `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidEndpoint`] if the endpoint is not
    /// declared in metadata. A declared endpoint with no relations yields an
    /// empty list.
    fn relation_ids(&self, endpoint: &str) -> Result<Vec<RelationId>, ModelError>;

    /// Remote unit names currently in a relation.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::RelationNotFound`] for an unknown id.
    fn relation_list(&self, relation_id: RelationId) -> Result<Vec<String>, ModelError>;

    /// Read a data bag. With `is_app`, `member` may name the app or any of
    /// its units; the app-level bag is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::RelationNotFound`] for an unknown id and
    /// [`ModelError::MemberNotFound`] for an unknown member.
    fn relation_get(
        &self,
        relation_id: RelationId,
        member: &str,
        is_app: bool,
    ) -> Result<RelationData, ModelError>;

    /// Write one key in the local unit's bag, or the local app's bag when
    /// `is_app`. An empty `value` deletes the key.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::RelationNotFound`] for an unknown id and
    /// [`ModelError::Unauthorized`] for app-level writes by a non-leader.
    fn relation_set(
        &self,
        relation_id: RelationId,
        key: &str,
        value: &str,
        is_app: bool,
    ) -> Result<(), ModelError>;

    /// Current charm configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the platform query fails.
    fn config_get(&self) -> Result<ConfigData, ModelError>;

    /// Whether the local unit is the application leader.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the platform query fails.
    fn is_leader(&self) -> Result<bool, ModelError>;

    /// Current unit status, or app status when `is_app`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the platform query fails.
    fn status_get(&self, is_app: bool) -> Result<Status, ModelError>;

    /// Set unit status, or app status when `is_app`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Unauthorized`] when a non-leader sets app
    /// status.
    fn status_set(&self, status: &Status, is_app: bool) -> Result<(), ModelError>;

    /// Record metric samples with optional labels.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the platform rejects the samples.
    fn add_metrics(
        &self,
        metrics: &BTreeMap<String, f64>,
        labels: &BTreeMap<String, String>,
    ) -> Result<(), ModelError>;
}

/// Backend with no relations and default answers, for unit tests.
#[cfg(test)]
pub(crate) struct NullBackend;

#[cfg(test)]
impl ModelBackend for NullBackend {
    fn relation_ids(&self, _endpoint: &str) -> Result<Vec<RelationId>, ModelError> {
        Ok(Vec::new())
    }

    fn relation_list(&self, relation_id: RelationId) -> Result<Vec<String>, ModelError> {
        Err(ModelError::RelationNotFound { relation_id })
    }

    fn relation_get(
        &self,
        relation_id: RelationId,
        _member: &str,
        _is_app: bool,
    ) -> Result<RelationData, ModelError> {
        Err(ModelError::RelationNotFound { relation_id })
    }

    fn relation_set(
        &self,
        relation_id: RelationId,
        _key: &str,
        _value: &str,
        _is_app: bool,
    ) -> Result<(), ModelError> {
        Err(ModelError::RelationNotFound { relation_id })
    }

    fn config_get(&self) -> Result<ConfigData, ModelError> {
        Ok(ConfigData::new())
    }

    fn is_leader(&self) -> Result<bool, ModelError> {
        Ok(false)
    }

    fn status_get(&self, _is_app: bool) -> Result<Status, ModelError> {
        Ok(Status::default())
    }

    fn status_set(&self, _status: &Status, _is_app: bool) -> Result<(), ModelError> {
        Ok(())
    }

    fn add_metrics(
        &self,
        _metrics: &BTreeMap<String, f64>,
        _labels: &BTreeMap<String, String>,
    ) -> Result<(), ModelError> {
        Ok(())
    }
}
