//! Charm-facing view of platform state.
//!
//! [`Model`] wraps a shared [`ModelBackend`] together with the identity of
//! the local unit. It adds the small amount of policy that belongs on the
//! charm side of the boundary: resolving a relation by endpoint, routing
//! data-bag reads to the app or unit bag, and refusing writes to bags the
//! local unit does not own.

use std::collections::BTreeMap;
use std::rc::Rc;

use ops_types::{RelationId, Status};

use crate::backend::{ConfigData, ModelBackend, RelationData};
use crate::error::ModelError;

/// A relation as seen from the local unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Relation id.
    pub id: RelationId,
    /// Local endpoint name.
    pub endpoint: String,
    /// Remote application, derived from the member units. `None` while no
    /// remote unit has joined.
    pub app: Option<String>,
    /// Remote unit names, in join order.
    pub units: Vec<String>,
}

/// Access to platform facts for one unit.
#[derive(Clone)]
pub struct Model {
    unit_name: String,
    app_name: String,
    backend: Rc<dyn ModelBackend>,
}

impl core::fmt::Debug for Model {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Model")
            .field("unit_name", &self.unit_name)
            .field("app_name", &self.app_name)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Create a model for `unit_name` (e.g. `my-app/0`) over `backend`.
    pub fn new(unit_name: impl Into<String>, backend: Rc<dyn ModelBackend>) -> Self {
        let unit_name = unit_name.into();
        let app_name = app_of(&unit_name).to_owned();
        Self {
            unit_name,
            app_name,
            backend,
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

    /// Relation ids on `endpoint`.
    ///
    /// # Errors
    ///
    /// Propagates [`ModelError::InvalidEndpoint`] from the backend.
    pub fn relation_ids(&self, endpoint: &str) -> Result<Vec<RelationId>, ModelError> {
        self.backend.relation_ids(endpoint)
    }

    /// Look up a relation on `endpoint`.
    ///
    /// With an explicit id the relation is returned even if the endpoint no
    /// longer lists it, as long as the backend still knows its members.
    /// Without an id, returns the only relation on the endpoint or `None`
    /// if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::TooManyRelated`] when no id is given and the
    /// endpoint has several relations, and propagates backend errors.
    pub fn get_relation(
        &self,
        endpoint: &str,
        relation_id: Option<RelationId>,
    ) -> Result<Option<Relation>, ModelError> {
        let ids = self.backend.relation_ids(endpoint)?;
        let id = match relation_id {
            Some(id) => id,
            None => match ids.as_slice() {
                [] => return Ok(None),
                [only] => *only,
                _ => {
                    return Err(ModelError::TooManyRelated {
                        endpoint: endpoint.to_owned(),
                        count: ids.len(),
                    });
                }
            },
        };

        let units = self.backend.relation_list(id)?;
        let app = units.first().map(|unit| app_of(unit).to_owned());
        Ok(Some(Relation {
            id,
            endpoint: endpoint.to_owned(),
            app,
            units,
        }))
    }

    /// Read the bag of `member` in a relation. Names without a `/` are
    /// treated as applications.
    ///
    /// # Errors
    ///
    /// Propagates not-found errors from the backend.
    pub fn relation_data(
        &self,
        relation_id: RelationId,
        member: &str,
    ) -> Result<RelationData, ModelError> {
        self.backend
            .relation_get(relation_id, member, !member.contains('/'))
    }

    /// Write one key into a bag owned by the local unit or app. An empty
    /// value deletes the key.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Unauthorized`] when `member` is neither the
    /// local unit nor the local app, or when writing app data without
    /// leadership.
    pub fn set_relation_data(
        &self,
        relation_id: RelationId,
        member: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ModelError> {
        let is_app = if member == self.unit_name {
            false
        } else if member == self.app_name {
            true
        } else {
            return Err(ModelError::Unauthorized {
                reason: format!("{} cannot write relation data of {member}", self.unit_name),
            });
        };
        self.backend.relation_set(relation_id, key, value, is_app)
    }

    /// Current configuration.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn config(&self) -> Result<ConfigData, ModelError> {
        self.backend.config_get()
    }

    /// Whether the local unit leads its application.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn is_leader(&self) -> Result<bool, ModelError> {
        self.backend.is_leader()
    }

    /// Local unit status.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn unit_status(&self) -> Result<Status, ModelError> {
        self.backend.status_get(false)
    }

    /// Set the local unit status.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn set_unit_status(&self, status: &Status) -> Result<(), ModelError> {
        self.backend.status_set(status, false)
    }

    /// Application status.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn app_status(&self) -> Result<Status, ModelError> {
        self.backend.status_get(true)
    }

    /// Set the application status. Requires leadership.
    ///
    /// # Errors
    ///
    /// Propagates [`ModelError::Unauthorized`] from the backend.
    pub fn set_app_status(&self, status: &Status) -> Result<(), ModelError> {
        self.backend.status_set(status, true)
    }

    /// Record metric samples.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn add_metrics(
        &self,
        metrics: &BTreeMap<String, f64>,
        labels: &BTreeMap<String, String>,
    ) -> Result<(), ModelError> {
        self.backend.add_metrics(metrics, labels)
    }
}

/// Application part of a unit name (`pg/0` -> `pg`).
pub fn app_of(unit_name: &str) -> &str {
    unit_name.split_once('/').map_or(unit_name, |(app, _)| app)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Backend with a fixed set of relations on `db` and a call log.
    #[derive(Default)]
    struct FixedBackend {
        relations: BTreeMap<RelationId, Vec<String>>,
        writes: RefCell<Vec<(RelationId, String, String, bool)>>,
    }

    impl ModelBackend for FixedBackend {
        fn relation_ids(&self, endpoint: &str) -> Result<Vec<RelationId>, ModelError> {
            if endpoint == "db" {
                Ok(self.relations.keys().copied().collect())
            } else {
                Err(ModelError::InvalidEndpoint {
                    endpoint: endpoint.to_owned(),
                })
            }
        }

        fn relation_list(&self, relation_id: RelationId) -> Result<Vec<String>, ModelError> {
            self.relations
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
            let mut data = RelationData::new();
            data.insert("member".to_owned(), member.to_owned());
            data.insert("is_app".to_owned(), is_app.to_string());
            data.insert("id".to_owned(), relation_id.to_string());
            Ok(data)
        }

        fn relation_set(
            &self,
            relation_id: RelationId,
            key: &str,
            value: &str,
            is_app: bool,
        ) -> Result<(), ModelError> {
            self.writes
                .borrow_mut()
                .push((relation_id, key.to_owned(), value.to_owned(), is_app));
            Ok(())
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

    fn model_with(relations: &[(u64, &[&str])]) -> (Model, Rc<FixedBackend>) {
        let backend = Rc::new(FixedBackend {
            relations: relations
                .iter()
                .map(|(id, units)| {
                    (
                        RelationId(*id),
                        units.iter().map(|u| (*u).to_owned()).collect(),
                    )
                })
                .collect(),
            ..FixedBackend::default()
        });
        let model = Model::new("me/0", Rc::clone(&backend) as Rc<dyn ModelBackend>);
        (model, backend)
    }

    #[test]
    fn names_are_split_from_unit() {
        let (model, _) = model_with(&[]);
        assert_eq!(model.unit_name(), "me/0");
        assert_eq!(model.app_name(), "me");
        assert_eq!(app_of("postgresql/3"), "postgresql");
        assert_eq!(app_of("postgresql"), "postgresql");
    }

    #[test]
    fn get_relation_without_id_uses_the_only_relation() {
        let (model, _) = model_with(&[(2, &["pg/0", "pg/1"])]);
        let rel = model.get_relation("db", None).unwrap().unwrap();
        assert_eq!(rel.id, RelationId(2));
        assert_eq!(rel.app.as_deref(), Some("pg"));
        assert_eq!(rel.units, vec!["pg/0", "pg/1"]);
    }

    #[test]
    fn get_relation_handles_empty_and_ambiguous_endpoints() {
        let (empty, _) = model_with(&[]);
        assert!(empty.get_relation("db", None).unwrap().is_none());

        let (many, _) = model_with(&[(0, &[]), (1, &[])]);
        assert!(matches!(
            many.get_relation("db", None),
            Err(ModelError::TooManyRelated { count: 2, .. })
        ));
        let rel = many.get_relation("db", Some(RelationId(1))).unwrap().unwrap();
        assert!(rel.app.is_none());
    }

    #[test]
    fn relation_data_routes_app_and_unit_reads() {
        let (model, _) = model_with(&[(0, &["pg/0"])]);
        let app = model.relation_data(RelationId(0), "pg").unwrap();
        assert_eq!(app.get("is_app").map(String::as_str), Some("true"));
        let unit = model.relation_data(RelationId(0), "pg/0").unwrap();
        assert_eq!(unit.get("is_app").map(String::as_str), Some("false"));
    }

    #[test]
    fn writes_to_remote_bags_are_refused() {
        let (model, backend) = model_with(&[(0, &["pg/0"])]);
        model
            .set_relation_data(RelationId(0), "me/0", "k", "v")
            .unwrap();
        model.set_relation_data(RelationId(0), "me", "k", "v").unwrap();
        assert!(matches!(
            model.set_relation_data(RelationId(0), "pg/0", "k", "v"),
            Err(ModelError::Unauthorized { .. })
        ));
        let writes = backend.writes.borrow();
        assert_eq!(writes.len(), 2);
        assert!(!writes[0].3);
        assert!(writes[1].3);
    }
}
