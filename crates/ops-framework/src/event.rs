//! Live event objects and the named event sources charms observe.

use std::collections::BTreeMap;

use ops_types::{EventKind, EventPayload, Handle, RelationId};

use crate::error::ModelError;
use crate::model::Model;

/// An event instance being delivered to one observer.
///
/// Built fresh from the stored snapshot for every delivery, so a handler
/// never sees state left behind by another observer's handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    handle: Handle,
    kind: EventKind,
    payload: EventPayload,
    deferred: bool,
}

impl Event {
    /// Create an event that has not been deferred.
    pub const fn new(handle: Handle, kind: EventKind, payload: EventPayload) -> Self {
        Self {
            handle,
            kind,
            payload,
            deferred: false,
        }
    }

    /// Identity of this event instance, e.g. `Charm/on/start[3]`.
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The event kind.
    pub const fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// The persisted payload.
    pub const fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Ask for this event to be delivered again to the current observer on
    /// a future invocation.
    pub const fn defer(&mut self) {
        self.deferred = true;
    }

    /// Whether [`defer`](Self::defer) was called during this delivery.
    pub const fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Relation id of a relation event.
    pub const fn relation_id(&self) -> Option<RelationId> {
        match &self.payload {
            EventPayload::Relation { relation_id, .. } => Some(*relation_id),
            _ => None,
        }
    }

    /// Remote application of a relation event.
    pub fn app(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Relation { app, .. } => app.as_deref(),
            _ => None,
        }
    }

    /// Remote unit of a relation event.
    pub fn unit(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Relation { unit, .. } => unit.as_deref(),
            _ => None,
        }
    }

    /// Departing unit of a relation-departed event.
    pub fn departing_unit(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Relation { departing_unit, .. } => departing_unit.as_deref(),
            _ => None,
        }
    }

    /// Parameters of an action event.
    pub const fn params(&self) -> Option<&BTreeMap<String, serde_json::Value>> {
        match &self.payload {
            EventPayload::Action { params } => Some(params),
            _ => None,
        }
    }

    /// Payload as a JSON value.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if a custom payload is not
    /// representable.
    pub fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        self.payload.to_snapshot()
    }

    /// Record metric samples. Only valid while handling `collect_metrics`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::WrongEventKind`] on any other event and
    /// propagates backend errors.
    pub fn add_metrics(
        &self,
        model: &Model,
        metrics: &BTreeMap<String, f64>,
        labels: &BTreeMap<String, String>,
    ) -> Result<(), ModelError> {
        if self.kind != EventKind::CollectMetrics {
            return Err(ModelError::WrongEventKind {
                operation: "add_metrics",
                expected: "collect_metrics",
                actual: self.kind.name(),
            });
        }
        model.add_metrics(metrics, labels)
    }
}

/// An emitter paired with one event kind. Observers register against an
/// `EventSource`; emission goes through one too.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventSource {
    emitter: Handle,
    kind: EventKind,
}

impl EventSource {
    /// Pair an emitter handle with a kind.
    pub const fn new(emitter: Handle, kind: EventKind) -> Self {
        Self { emitter, kind }
    }

    /// The emitting object, e.g. `Charm/on`.
    pub const fn emitter(&self) -> &Handle {
        &self.emitter
    }

    /// The event kind.
    pub const fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// `<emitter>/<kind>` without an instance key.
    pub fn path(&self) -> String {
        self.emitter.nest(self.kind.name(), None).path()
    }
}

impl core::fmt::Display for EventSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.path())
    }
}

/// Named constructors for the events a charm can observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharmEvents {
    emitter: Handle,
}

impl CharmEvents {
    /// Events emitted under `<charm>/on`.
    pub fn new(charm: &Handle) -> Self {
        Self {
            emitter: charm.nest("on", None),
        }
    }

    /// The emitter handle.
    pub const fn emitter(&self) -> &Handle {
        &self.emitter
    }

    /// Source for an arbitrary kind.
    pub fn source(&self, kind: EventKind) -> EventSource {
        EventSource::new(self.emitter.clone(), kind)
    }

    /// `install`
    pub fn install(&self) -> EventSource {
        self.source(EventKind::Install)
    }

    /// `start`
    pub fn start(&self) -> EventSource {
        self.source(EventKind::Start)
    }

    /// `stop`
    pub fn stop(&self) -> EventSource {
        self.source(EventKind::Stop)
    }

    /// `remove`
    pub fn remove(&self) -> EventSource {
        self.source(EventKind::Remove)
    }

    /// `update_status`
    pub fn update_status(&self) -> EventSource {
        self.source(EventKind::UpdateStatus)
    }

    /// `config_changed`
    pub fn config_changed(&self) -> EventSource {
        self.source(EventKind::ConfigChanged)
    }

    /// `upgrade_charm`
    pub fn upgrade_charm(&self) -> EventSource {
        self.source(EventKind::UpgradeCharm)
    }

    /// `leader_elected`
    pub fn leader_elected(&self) -> EventSource {
        self.source(EventKind::LeaderElected)
    }

    /// `leader_settings_changed`
    pub fn leader_settings_changed(&self) -> EventSource {
        self.source(EventKind::LeaderSettingsChanged)
    }

    /// `collect_metrics`
    pub fn collect_metrics(&self) -> EventSource {
        self.source(EventKind::CollectMetrics)
    }

    /// `<endpoint>_relation_joined`
    pub fn relation_joined(&self, endpoint: &str) -> EventSource {
        self.source(EventKind::RelationJoined {
            endpoint: endpoint.to_owned(),
        })
    }

    /// `<endpoint>_relation_changed`
    pub fn relation_changed(&self, endpoint: &str) -> EventSource {
        self.source(EventKind::RelationChanged {
            endpoint: endpoint.to_owned(),
        })
    }

    /// `<endpoint>_relation_departed`
    pub fn relation_departed(&self, endpoint: &str) -> EventSource {
        self.source(EventKind::RelationDeparted {
            endpoint: endpoint.to_owned(),
        })
    }

    /// `<endpoint>_relation_broken`
    pub fn relation_broken(&self, endpoint: &str) -> EventSource {
        self.source(EventKind::RelationBroken {
            endpoint: endpoint.to_owned(),
        })
    }

    /// `<name>_action`
    pub fn action(&self, name: &str) -> EventSource {
        self.source(EventKind::Action {
            name: name.to_owned(),
        })
    }

    /// An application-defined event.
    pub fn custom(&self, name: &str) -> EventSource {
        self.source(EventKind::Custom {
            name: name.to_owned(),
        })
    }
}
