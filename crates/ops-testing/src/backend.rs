//! In-memory simulation of the platform behind [`ModelBackend`].
//!
//! [`TestingBackend`] keeps relation membership, data bags, config,
//! leadership, and status in a single [`RefCell`]. Charm code reaches it
//! only through the [`ModelBackend`] trait, and every such call is appended
//! to a call log before it is answered. The [`Harness`](crate::Harness)
//! mutates the same state directly, without logging.

use std::cell::RefCell;
use std::collections::BTreeMap;

use ops_framework::model::app_of;
use ops_framework::{ConfigData, ModelBackend, ModelError, RelationData};
use ops_types::{RelationId, Status};

/// One recorded call into the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// `relation_ids(endpoint)`
    RelationIds {
        /// Queried endpoint.
        endpoint: String,
    },
    /// `relation_list(relation_id)`
    RelationList {
        /// Queried relation.
        relation_id: RelationId,
    },
    /// `relation_get(relation_id, member, is_app)`
    RelationGet {
        /// Queried relation.
        relation_id: RelationId,
        /// App or unit name.
        member: String,
        /// Whether the app bag was requested.
        is_app: bool,
    },
    /// `relation_set(relation_id, key, value, is_app)`
    RelationSet {
        /// Target relation.
        relation_id: RelationId,
        /// Key written.
        key: String,
        /// Value written; empty deletes.
        value: String,
        /// Whether the app bag was targeted.
        is_app: bool,
    },
    /// `config_get()`
    ConfigGet,
    /// `is_leader()`
    IsLeader,
    /// `status_get(is_app)`
    StatusGet {
        /// Whether app status was requested.
        is_app: bool,
    },
    /// `status_set(status, is_app)`
    StatusSet {
        /// The new status.
        status: Status,
        /// Whether app status was targeted.
        is_app: bool,
    },
    /// `add_metrics(metrics, labels)`
    AddMetrics {
        /// Metric samples.
        metrics: BTreeMap<String, f64>,
        /// Labels.
        labels: BTreeMap<String, String>,
    },
}

impl BackendCall {
    /// The backend method name, e.g. `relation_ids`.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RelationIds { .. } => "relation_ids",
            Self::RelationList { .. } => "relation_list",
            Self::RelationGet { .. } => "relation_get",
            Self::RelationSet { .. } => "relation_set",
            Self::ConfigGet => "config_get",
            Self::IsLeader => "is_leader",
            Self::StatusGet { .. } => "status_get",
            Self::StatusSet { .. } => "status_set",
            Self::AddMetrics { .. } => "add_metrics",
        }
    }
}

/// Metric samples recorded by one `add_metrics` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricBatch {
    /// Samples keyed by metric name.
    pub metrics: BTreeMap<String, f64>,
    /// Labels attached to the samples.
    pub labels: BTreeMap<String, String>,
}

/// Simulated platform state.
#[derive(Debug, Default)]
pub(crate) struct BackendState {
    /// Relation ids per declared endpoint.
    pub(crate) relation_ids: BTreeMap<String, Vec<RelationId>>,
    /// Endpoint of each live relation.
    pub(crate) relation_names: BTreeMap<RelationId, String>,
    /// Remote units of each relation, in join order.
    pub(crate) relation_units: BTreeMap<RelationId, Vec<String>>,
    /// Remote app of each relation.
    pub(crate) relation_apps: BTreeMap<RelationId, String>,
    /// Bags per relation, keyed by app or unit name.
    pub(crate) relation_data: BTreeMap<RelationId, BTreeMap<String, RelationData>>,
    pub(crate) config: ConfigData,
    pub(crate) is_leader: bool,
    pub(crate) unit_status: Status,
    pub(crate) app_status: Status,
    pub(crate) metrics: Vec<MetricBatch>,
    pub(crate) calls: Vec<BackendCall>,
}

/// A [`ModelBackend`] answering from memory.
#[derive(Debug)]
pub struct TestingBackend {
    unit_name: String,
    app_name: String,
    state: RefCell<BackendState>,
}

impl TestingBackend {
    /// A backend for unit `<app_name>/0` with the given endpoints declared
    /// and no relations.
    pub fn new<'a>(app_name: &str, endpoints: impl IntoIterator<Item = &'a str>) -> Self {
        let state = BackendState {
            relation_ids: endpoints
                .into_iter()
                .map(|endpoint| (endpoint.to_owned(), Vec::new()))
                .collect(),
            ..BackendState::default()
        };
        Self {
            unit_name: format!("{app_name}/0"),
            app_name: app_name.to_owned(),
            state: RefCell::new(state),
        }
    }

    /// Local unit name.
    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    /// Local application name.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Calls recorded since the last reset, optionally clearing the log.
    pub fn calls(&self, reset: bool) -> Vec<BackendCall> {
        let mut state = self.state.borrow_mut();
        if reset {
            std::mem::take(&mut state.calls)
        } else {
            state.calls.clone()
        }
    }

    /// Metric batches recorded so far.
    pub fn metrics(&self) -> Vec<MetricBatch> {
        self.state.borrow().metrics.clone()
    }

    /// Run `f` against the state without logging a call.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut BackendState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    fn record(&self, call: BackendCall) -> std::cell::RefMut<'_, BackendState> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        state
    }
}

impl ModelBackend for TestingBackend {
    fn relation_ids(&self, endpoint: &str) -> Result<Vec<RelationId>, ModelError> {
        let state = self.record(BackendCall::RelationIds {
            endpoint: endpoint.to_owned(),
        });
        state
            .relation_ids
            .get(endpoint)
            .cloned()
            .ok_or_else(|| ModelError::InvalidEndpoint {
                endpoint: endpoint.to_owned(),
            })
    }

    fn relation_list(&self, relation_id: RelationId) -> Result<Vec<String>, ModelError> {
        let state = self.record(BackendCall::RelationList { relation_id });
        state
            .relation_units
            .get(&relation_id)
            .cloned()
            .ok_or(ModelError::RelationNotFound { relation_id })
    }

    fn relation_get(
        &self,
        relation_id: RelationId,
        member: &str,
        is_app: bool,
    ) -> Result<RelationData, ModelError> {
        let state = self.record(BackendCall::RelationGet {
            relation_id,
            member: member.to_owned(),
            is_app,
        });
        let bags = state
            .relation_data
            .get(&relation_id)
            .ok_or(ModelError::RelationNotFound { relation_id })?;
        let key = if is_app { app_of(member) } else { member };
        bags.get(key)
            .cloned()
            .ok_or_else(|| ModelError::MemberNotFound {
                relation_id,
                member: key.to_owned(),
            })
    }

    fn relation_set(
        &self,
        relation_id: RelationId,
        key: &str,
        value: &str,
        is_app: bool,
    ) -> Result<(), ModelError> {
        let mut state = self.record(BackendCall::RelationSet {
            relation_id,
            key: key.to_owned(),
            value: value.to_owned(),
            is_app,
        });
        if is_app && !state.is_leader {
            return Err(ModelError::Unauthorized {
                reason: format!("{} is not the leader of {}", self.unit_name, self.app_name),
            });
        }
        let owner = if is_app { &self.app_name } else { &self.unit_name };
        let bag = state
            .relation_data
            .get_mut(&relation_id)
            .ok_or(ModelError::RelationNotFound { relation_id })?
            .entry(owner.clone())
            .or_default();
        if value.is_empty() {
            bag.remove(key);
        } else {
            bag.insert(key.to_owned(), value.to_owned());
        }
        Ok(())
    }

    fn config_get(&self) -> Result<ConfigData, ModelError> {
        Ok(self.record(BackendCall::ConfigGet).config.clone())
    }

    fn is_leader(&self) -> Result<bool, ModelError> {
        Ok(self.record(BackendCall::IsLeader).is_leader)
    }

    fn status_get(&self, is_app: bool) -> Result<Status, ModelError> {
        let state = self.record(BackendCall::StatusGet { is_app });
        Ok(if is_app {
            state.app_status.clone()
        } else {
            state.unit_status.clone()
        })
    }

    fn status_set(&self, status: &Status, is_app: bool) -> Result<(), ModelError> {
        let mut state = self.record(BackendCall::StatusSet {
            status: status.clone(),
            is_app,
        });
        if is_app {
            if !state.is_leader {
                return Err(ModelError::Unauthorized {
                    reason: format!("{} cannot set application status", self.unit_name),
                });
            }
            state.app_status = status.clone();
        } else {
            state.unit_status = status.clone();
        }
        Ok(())
    }

    fn add_metrics(
        &self,
        metrics: &BTreeMap<String, f64>,
        labels: &BTreeMap<String, String>,
    ) -> Result<(), ModelError> {
        let mut state = self.record(BackendCall::AddMetrics {
            metrics: metrics.clone(),
            labels: labels.clone(),
        });
        state.metrics.push(MetricBatch {
            metrics: metrics.clone(),
            labels: labels.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ops_types::StatusName;

    use super::*;

    fn backend() -> TestingBackend {
        let backend = TestingBackend::new("test-charm", ["db"]);
        backend.with_state(|state| {
            state.relation_ids.insert("db".to_owned(), vec![RelationId(0)]);
            state.relation_units.insert(RelationId(0), vec!["pg/0".to_owned()]);
            let mut bags = BTreeMap::new();
            bags.insert("pg".to_owned(), RelationData::new());
            bags.insert("pg/0".to_owned(), RelationData::new());
            bags.insert("test-charm".to_owned(), RelationData::new());
            bags.insert("test-charm/0".to_owned(), RelationData::new());
            state.relation_data.insert(RelationId(0), bags);
        });
        backend
    }

    #[test]
    fn declared_but_empty_endpoint_is_not_an_error() {
        let backend = TestingBackend::new("test-charm", ["db"]);
        assert!(backend.relation_ids("db").unwrap().is_empty());
        assert!(matches!(
            backend.relation_ids("unknown"),
            Err(ModelError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn unknown_relation_ids_fail_as_not_found() {
        let backend = TestingBackend::new("test-charm", ["db"]);
        let err = backend.relation_get(RelationId(1234), "unit/0", false).unwrap_err();
        assert!(err.is_not_found());
        let err = backend.relation_list(RelationId(1234)).unwrap_err();
        assert!(matches!(err, ModelError::RelationNotFound { .. }));
    }

    #[test]
    fn app_reads_accept_a_unit_name() {
        let backend = backend();
        backend.with_state(|state| {
            if let Some(bags) = state.relation_data.get_mut(&RelationId(0)) {
                bags.entry("pg".to_owned())
                    .or_default()
                    .insert("app".to_owned(), "data".to_owned());
            }
        });
        let bag = backend.relation_get(RelationId(0), "pg/0", true).unwrap();
        assert_eq!(bag.get("app").map(String::as_str), Some("data"));
        assert!(matches!(
            backend.relation_get(RelationId(0), "other/0", false),
            Err(ModelError::MemberNotFound { .. })
        ));
    }

    #[test]
    fn app_writes_need_leadership_and_empty_deletes() {
        let backend = backend();
        assert!(matches!(
            backend.relation_set(RelationId(0), "k", "v", true),
            Err(ModelError::Unauthorized { .. })
        ));
        backend.with_state(|state| state.is_leader = true);
        backend.relation_set(RelationId(0), "k", "v", true).unwrap();
        assert_eq!(
            backend.relation_get(RelationId(0), "test-charm", true).unwrap().get("k"),
            Some(&"v".to_owned())
        );
        backend.relation_set(RelationId(0), "k", "", true).unwrap();
        assert!(
            backend
                .relation_get(RelationId(0), "test-charm", true)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn every_call_is_logged_in_order() {
        let backend = backend();
        backend.is_leader().unwrap();
        backend.status_set(&Status::active("ok"), false).unwrap();
        let _ = backend.status_set(&Status::blocked("no"), true);
        let names: Vec<&str> = backend.calls(false).iter().map(BackendCall::name).collect();
        assert_eq!(names, vec!["is_leader", "status_set", "status_set"]);
        assert_eq!(backend.status_get(false).unwrap().name, StatusName::Active);
        assert_eq!(backend.status_get(true).unwrap().name, StatusName::Unknown);

        assert_eq!(backend.calls(true).len(), 5);
        assert!(backend.calls(false).is_empty());
    }

    #[test]
    fn metrics_are_collected_per_call() {
        let backend = backend();
        let metrics = BTreeMap::from([("foo".to_owned(), 42.0)]);
        let labels = BTreeMap::from([("bar".to_owned(), "4.2".to_owned())]);
        backend.add_metrics(&metrics, &labels).unwrap();
        assert_eq!(backend.metrics(), vec![MetricBatch { metrics, labels }]);
    }
}
