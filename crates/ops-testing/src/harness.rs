//! Deterministic driver for charm tests.
//!
//! A [`Harness`] owns a [`TestingBackend`], a [`MemoryStorage`], and a
//! [`Framework`] wired to both. Test code changes simulated platform state
//! through harness methods; when events are enabled, each change emits the
//! event the platform would have fired, synchronously, before the method
//! returns.
//!
//! Events start disabled so that a test can build its baseline state
//! without triggering handlers. Call [`Harness::enable_events`] once the
//! charm is initialised.

use std::collections::BTreeMap;
use std::rc::Rc;

use ops_framework::model::app_of;
use ops_framework::{
    Charm, CharmBase, CharmEvents, ConfigData, EventSource, Framework, FrameworkError, Model,
    ModelBackend, ModelError, RelationData,
};
use ops_storage::MemoryStorage;
use ops_types::{EventPayload, RelationId, Status};

use crate::backend::{BackendCall, MetricBatch, TestingBackend};
use crate::error::HarnessError;
use crate::meta::{CharmMeta, ConfigSchema};

/// Test driver for a single charm unit.
#[derive(Debug)]
pub struct Harness {
    meta: CharmMeta,
    backend: Rc<TestingBackend>,
    storage: MemoryStorage,
    framework: Framework,
    base: CharmBase,
    events_enabled: bool,
    next_relation_id: u64,
}

impl Harness {
    /// Build a harness from `metadata.yaml` content. Config starts empty.
    pub fn new(metadata_yaml: &str) -> Result<Self, HarnessError> {
        Ok(Self::build(CharmMeta::from_yaml(metadata_yaml)?, ConfigData::new()))
    }

    /// Build a harness whose config is seeded from the defaults in
    /// `config.yaml` content.
    pub fn with_config(metadata_yaml: &str, config_yaml: &str) -> Result<Self, HarnessError> {
        let meta = CharmMeta::from_yaml(metadata_yaml)?;
        let schema = ConfigSchema::from_yaml(config_yaml)?;
        Ok(Self::build(meta, schema.defaults()))
    }

    fn build(meta: CharmMeta, config: ConfigData) -> Self {
        let backend = Rc::new(TestingBackend::new(
            &meta.name,
            meta.endpoints().map(|(name, _, _)| name),
        ));
        backend.with_state(|state| state.config = config);
        let dyn_backend: Rc<dyn ModelBackend> = backend.clone();
        let model = Model::new(backend.unit_name(), dyn_backend);
        let storage = MemoryStorage::new();
        let framework = Framework::new(Box::new(storage.clone()), model);
        tracing::debug!(unit = backend.unit_name(), "Created harness");
        Self {
            meta,
            backend,
            storage,
            framework,
            base: CharmBase::default(),
            events_enabled: false,
            next_relation_id: 0,
        }
    }

    /// Construct charm `C` against the harness framework.
    pub fn initialize<C: Charm>(&mut self) -> Result<C, HarnessError> {
        self.base = CharmBase::new(C::KIND);
        Ok(C::init(&mut self.framework, self.base.clone())?)
    }

    /// Construct a charm with a custom constructor.
    pub fn initialize_with<C, F>(&mut self, init: F) -> Result<C, HarnessError>
    where
        F: FnOnce(&mut Framework, CharmBase) -> Result<C, FrameworkError>,
    {
        Ok(init(&mut self.framework, self.base.clone())?)
    }

    /// Start emitting events for state changes.
    pub fn enable_events(&mut self) {
        self.events_enabled = true;
    }

    /// Apply state changes silently.
    pub fn disable_events(&mut self) {
        self.events_enabled = false;
    }

    /// Whether state changes currently emit events.
    pub const fn events_enabled(&self) -> bool {
        self.events_enabled
    }

    /// Establish a relation with `remote_app` on a declared endpoint.
    ///
    /// Seeds the remote app bag with `remote_app_data` and the local unit
    /// bag with `initial_unit_data`. No remote unit has joined yet, so no
    /// event is emitted.
    pub fn add_relation(
        &mut self,
        endpoint: &str,
        remote_app: &str,
        remote_app_data: &[(&str, &str)],
        initial_unit_data: &[(&str, &str)],
    ) -> Result<RelationId, HarnessError> {
        if self.meta.interface(endpoint).is_none() {
            return Err(ModelError::InvalidEndpoint {
                endpoint: endpoint.to_owned(),
            }
            .into());
        }
        let relation_id = RelationId(self.next_relation_id);
        self.next_relation_id = self.next_relation_id.saturating_add(1);

        let own_app = self.backend.app_name().to_owned();
        let own_unit = self.backend.unit_name().to_owned();
        self.backend.with_state(|state| {
            state
                .relation_ids
                .entry(endpoint.to_owned())
                .or_default()
                .push(relation_id);
            state.relation_names.insert(relation_id, endpoint.to_owned());
            state.relation_units.insert(relation_id, Vec::new());
            state.relation_apps.insert(relation_id, remote_app.to_owned());
            // On a peer relation the remote app is the local app.
            let mut bags = BTreeMap::new();
            bags.insert(remote_app.to_owned(), bag(remote_app_data));
            bags.entry(own_app).or_default();
            bags.insert(own_unit, bag(initial_unit_data));
            state.relation_data.insert(relation_id, bags);
        });
        tracing::info!(%relation_id, endpoint, remote_app, "Added relation");
        Ok(relation_id)
    }

    /// Add a remote unit to a relation and seed its bag.
    ///
    /// A unit that is already a member is refused with
    /// [`HarnessError::DuplicateUnit`].
    ///
    /// With events enabled, the model looks the relation up again (one
    /// `relation_ids` and one `relation_list` call) and the harness emits
    /// `relation_joined` followed by `relation_changed` for the unit.
    pub fn add_relation_unit(
        &mut self,
        relation_id: RelationId,
        unit_name: &str,
        remote_unit_data: &[(&str, &str)],
    ) -> Result<(), HarnessError> {
        let endpoint = self.backend.with_state(|state| -> Result<String, HarnessError> {
            let endpoint = endpoint_of(state.relation_names.get(&relation_id), relation_id)?;
            let units = state.relation_units.entry(relation_id).or_default();
            if units.iter().any(|u| u == unit_name) {
                return Err(HarnessError::DuplicateUnit {
                    relation_id,
                    unit: unit_name.to_owned(),
                });
            }
            units.push(unit_name.to_owned());
            state
                .relation_data
                .entry(relation_id)
                .or_default()
                .insert(unit_name.to_owned(), bag(remote_unit_data));
            Ok(endpoint)
        })?;
        tracing::info!(%relation_id, unit = unit_name, "Added relation unit");
        if !self.events_enabled {
            return Ok(());
        }

        let relation = self
            .framework
            .model()
            .get_relation(&endpoint, Some(relation_id))?
            .ok_or(ModelError::RelationNotFound { relation_id })?;
        let payload = EventPayload::relation(relation_id, relation.app.as_deref(), Some(unit_name));
        let joined = self.base.on().relation_joined(&endpoint);
        let changed = self.base.on().relation_changed(&endpoint);
        self.emit(&joined, payload.clone())?;
        self.emit(&changed, payload)
    }

    /// Merge `key_values` into the bag of `member`. Empty values delete
    /// keys.
    ///
    /// `member` must already own a bag in the relation: the remote app, a
    /// joined remote unit, or the local app or unit. Anything else fails
    /// with [`ModelError::MemberNotFound`].
    ///
    /// With events enabled, a change to a remote app or unit bag emits
    /// `relation_changed`. Changes to the local unit or app bag do not.
    pub fn update_relation_data(
        &mut self,
        relation_id: RelationId,
        member: &str,
        key_values: &[(&str, &str)],
    ) -> Result<(), HarnessError> {
        let endpoint = self.backend.with_state(|state| -> Result<String, ModelError> {
            let endpoint = endpoint_of(state.relation_names.get(&relation_id), relation_id)?;
            let bag = state
                .relation_data
                .get_mut(&relation_id)
                .and_then(|bags| bags.get_mut(member))
                .ok_or_else(|| ModelError::MemberNotFound {
                    relation_id,
                    member: member.to_owned(),
                })?;
            for (key, value) in key_values {
                if value.is_empty() {
                    bag.remove(*key);
                } else {
                    bag.insert((*key).to_owned(), (*value).to_owned());
                }
            }
            Ok(endpoint)
        })?;
        tracing::info!(%relation_id, member, keys = key_values.len(), "Updated relation data");
        if !self.events_enabled || self.is_local(member) {
            return Ok(());
        }

        let payload = if member.contains('/') {
            EventPayload::relation(relation_id, Some(app_of(member)), Some(member))
        } else {
            EventPayload::relation(relation_id, Some(member), None)
        };
        let changed = self.base.on().relation_changed(&endpoint);
        self.emit(&changed, payload)
    }

    /// Remove a remote unit from a relation.
    ///
    /// With events enabled, emits `relation_departed` naming the unit as
    /// the departing unit. The unit's bag stays readable during delivery
    /// and is dropped afterwards.
    pub fn remove_relation_unit(
        &mut self,
        relation_id: RelationId,
        unit_name: &str,
    ) -> Result<(), HarnessError> {
        let (endpoint, app) = self.backend.with_state(
            |state| -> Result<(String, Option<String>), ModelError> {
                let endpoint = endpoint_of(state.relation_names.get(&relation_id), relation_id)?;
                let units = state
                    .relation_units
                    .get_mut(&relation_id)
                    .ok_or(ModelError::RelationNotFound { relation_id })?;
                let pos = units.iter().position(|u| u == unit_name).ok_or_else(|| {
                    ModelError::MemberNotFound {
                        relation_id,
                        member: unit_name.to_owned(),
                    }
                })?;
                units.remove(pos);
                Ok((endpoint, state.relation_apps.get(&relation_id).cloned()))
            },
        )?;
        tracing::info!(%relation_id, unit = unit_name, "Removed relation unit");

        if self.events_enabled {
            let payload = EventPayload::relation_departed(
                relation_id,
                app.as_deref(),
                Some(unit_name),
                unit_name,
            );
            let departed = self.base.on().relation_departed(&endpoint);
            self.emit(&departed, payload)?;
        }
        self.backend.with_state(|state| {
            if let Some(bags) = state.relation_data.get_mut(&relation_id) {
                bags.remove(unit_name);
            }
        });
        Ok(())
    }

    /// Tear a relation down: depart every remaining unit, then emit
    /// `relation_broken` (with no app or unit) and forget the relation.
    pub fn remove_relation(&mut self, relation_id: RelationId) -> Result<(), HarnessError> {
        let units = self.backend.with_state(|state| {
            state
                .relation_units
                .get(&relation_id)
                .cloned()
                .ok_or(ModelError::RelationNotFound { relation_id })
        })?;
        for unit in units {
            self.remove_relation_unit(relation_id, &unit)?;
        }

        let endpoint = self.backend.with_state(|state| -> Result<String, ModelError> {
            let endpoint = endpoint_of(state.relation_names.get(&relation_id), relation_id)?;
            if let Some(ids) = state.relation_ids.get_mut(&endpoint) {
                ids.retain(|id| *id != relation_id);
            }
            Ok(endpoint)
        })?;
        if self.events_enabled {
            let broken = self.base.on().relation_broken(&endpoint);
            self.emit(&broken, EventPayload::relation(relation_id, None, None))?;
        }
        self.backend.with_state(|state| {
            state.relation_names.remove(&relation_id);
            state.relation_units.remove(&relation_id);
            state.relation_apps.remove(&relation_id);
            state.relation_data.remove(&relation_id);
        });
        tracing::info!(%relation_id, %endpoint, "Removed relation");
        Ok(())
    }

    /// Read a bag directly. `None` if the relation has no such member.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::RelationNotFound`] for an unknown id.
    pub fn read_relation_data(
        &self,
        relation_id: RelationId,
        member: &str,
    ) -> Result<Option<RelationData>, HarnessError> {
        Ok(self.backend.with_state(|state| {
            state
                .relation_data
                .get(&relation_id)
                .map(|bags| bags.get(member).cloned())
                .ok_or(ModelError::RelationNotFound { relation_id })
        })?)
    }

    /// Merge `key_values` into the config and remove the `unset` keys.
    /// Emits `config_changed` when events are enabled.
    pub fn update_config(
        &mut self,
        key_values: &[(&str, serde_json::Value)],
        unset: &[&str],
    ) -> Result<(), HarnessError> {
        self.backend.with_state(|state| {
            for (key, value) in key_values {
                state.config.insert((*key).to_owned(), value.clone());
            }
            for key in unset {
                state.config.remove(*key);
            }
        });
        tracing::info!(set = key_values.len(), unset = unset.len(), "Updated config");
        if self.events_enabled {
            let changed = self.base.on().config_changed();
            self.emit(&changed, EventPayload::Empty)?;
        }
        Ok(())
    }

    /// Set leadership. Emits `leader_elected` only when the unit becomes
    /// leader while events are enabled.
    pub fn set_leader(&mut self, is_leader: bool) -> Result<(), HarnessError> {
        let was_leader =
            self.backend
                .with_state(|state| std::mem::replace(&mut state.is_leader, is_leader));
        tracing::info!(is_leader, was_leader, "Set leadership");
        if self.events_enabled && is_leader && !was_leader {
            let elected = self.base.on().leader_elected();
            self.emit(&elected, EventPayload::Empty)?;
        }
        Ok(())
    }

    /// Backend calls made by charm code since the last reset.
    pub fn get_backend_calls(&self, reset: bool) -> Vec<BackendCall> {
        self.backend.calls(reset)
    }

    /// Current config, without logging a backend call.
    pub fn config(&self) -> ConfigData {
        self.backend.with_state(|state| state.config.clone())
    }

    /// Current leadership, without logging a backend call.
    pub fn is_leader(&self) -> bool {
        self.backend.with_state(|state| state.is_leader)
    }

    /// Status last set for the unit.
    pub fn unit_status(&self) -> Status {
        self.backend.with_state(|state| state.unit_status.clone())
    }

    /// Status last set for the application.
    pub fn app_status(&self) -> Status {
        self.backend.with_state(|state| state.app_status.clone())
    }

    /// Metric batches recorded by the charm.
    pub fn metrics(&self) -> Vec<MetricBatch> {
        self.backend.metrics()
    }

    /// The simulated backend.
    pub fn backend(&self) -> &TestingBackend {
        &self.backend
    }

    /// Parsed metadata.
    pub const fn meta(&self) -> &CharmMeta {
        &self.meta
    }

    /// The store behind the framework.
    pub const fn storage(&self) -> &MemoryStorage {
        &self.storage
    }

    /// The harness framework.
    pub const fn framework(&self) -> &Framework {
        &self.framework
    }

    /// The harness framework, for registering extra observers or emitting
    /// events by hand.
    pub const fn framework_mut(&mut self) -> &mut Framework {
        &mut self.framework
    }

    /// The model charm code sees.
    pub const fn model(&self) -> &Model {
        self.framework.model()
    }

    /// Event sources of the initialised charm.
    pub const fn charm_events(&self) -> &CharmEvents {
        self.base.on()
    }

    /// The root charm object.
    pub const fn charm(&self) -> &CharmBase {
        &self.base
    }

    fn is_local(&self, member: &str) -> bool {
        member == self.backend.unit_name() || member == self.backend.app_name()
    }

    fn emit(&mut self, source: &EventSource, payload: EventPayload) -> Result<(), HarnessError> {
        self.framework.emit(source, payload)?;
        Ok(())
    }
}

fn bag(pairs: &[(&str, &str)]) -> RelationData {
    pairs
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

fn endpoint_of(name: Option<&String>, relation_id: RelationId) -> Result<String, ModelError> {
    name.cloned()
        .ok_or(ModelError::RelationNotFound { relation_id })
}
