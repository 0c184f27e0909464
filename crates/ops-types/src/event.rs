//! Event kinds and the payloads persisted with each event instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::RelationId;

/// The type of an event.
///
/// The kind's [`name`](EventKind::name) becomes the final segment kind of
/// every event handle, so it must be stable across invocations: a deferred
/// event is matched back to its observers by this name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The charm was installed.
    Install,
    /// The unit was started.
    Start,
    /// The unit is being stopped.
    Stop,
    /// The unit is being removed.
    Remove,
    /// Periodic status refresh.
    UpdateStatus,
    /// Charm configuration changed.
    ConfigChanged,
    /// The charm code was upgraded.
    UpgradeCharm,
    /// This unit became the leader.
    LeaderElected,
    /// Leader-published settings changed.
    LeaderSettingsChanged,
    /// The platform is collecting metrics.
    CollectMetrics,
    /// A remote unit joined a relation.
    RelationJoined {
        /// Relation endpoint name.
        endpoint: String,
    },
    /// Relation data or membership changed.
    RelationChanged {
        /// Relation endpoint name.
        endpoint: String,
    },
    /// A remote unit left a relation.
    RelationDeparted {
        /// Relation endpoint name.
        endpoint: String,
    },
    /// The relation is being torn down.
    RelationBroken {
        /// Relation endpoint name.
        endpoint: String,
    },
    /// An operator-invoked action.
    Action {
        /// Action name as declared (hyphens allowed).
        name: String,
    },
    /// An application-defined event.
    Custom {
        /// Event name, used verbatim as the handle kind.
        name: String,
    },
}

const RELATION_SUFFIXES: [(&str, RelationEvent); 4] = [
    ("-relation-joined", RelationEvent::Joined),
    ("-relation-changed", RelationEvent::Changed),
    ("-relation-departed", RelationEvent::Departed),
    ("-relation-broken", RelationEvent::Broken),
];

#[derive(Clone, Copy)]
enum RelationEvent {
    Joined,
    Changed,
    Departed,
    Broken,
}

impl EventKind {
    /// Handle kind for this event, e.g. `config_changed`,
    /// `db_relation_joined`, `foo_bar_action`.
    pub fn name(&self) -> String {
        match self {
            Self::Install => "install".to_owned(),
            Self::Start => "start".to_owned(),
            Self::Stop => "stop".to_owned(),
            Self::Remove => "remove".to_owned(),
            Self::UpdateStatus => "update_status".to_owned(),
            Self::ConfigChanged => "config_changed".to_owned(),
            Self::UpgradeCharm => "upgrade_charm".to_owned(),
            Self::LeaderElected => "leader_elected".to_owned(),
            Self::LeaderSettingsChanged => "leader_settings_changed".to_owned(),
            Self::CollectMetrics => "collect_metrics".to_owned(),
            Self::RelationJoined { endpoint } => format!("{}_relation_joined", snake(endpoint)),
            Self::RelationChanged { endpoint } => format!("{}_relation_changed", snake(endpoint)),
            Self::RelationDeparted { endpoint } => {
                format!("{}_relation_departed", snake(endpoint))
            }
            Self::RelationBroken { endpoint } => format!("{}_relation_broken", snake(endpoint)),
            Self::Action { name } => format!("{}_action", snake(name)),
            Self::Custom { name } => name.clone(),
        }
    }

    /// The relation endpoint this event belongs to, if any.
    pub fn relation_endpoint(&self) -> Option<&str> {
        match self {
            Self::RelationJoined { endpoint }
            | Self::RelationChanged { endpoint }
            | Self::RelationDeparted { endpoint }
            | Self::RelationBroken { endpoint } => Some(endpoint),
            _ => None,
        }
    }

    /// Map a hook name as the platform reports it onto an event kind.
    ///
    /// `db-relation-changed` becomes [`EventKind::RelationChanged`] for
    /// endpoint `db`; `foo-bar-action` becomes [`EventKind::Action`].
    /// Returns `None` for names that are not recognised.
    pub fn from_hook_name(hook: &str) -> Option<Self> {
        for (suffix, which) in RELATION_SUFFIXES {
            if let Some(endpoint) = hook.strip_suffix(suffix) {
                if endpoint.is_empty() {
                    return None;
                }
                let endpoint = endpoint.to_owned();
                return Some(match which {
                    RelationEvent::Joined => Self::RelationJoined { endpoint },
                    RelationEvent::Changed => Self::RelationChanged { endpoint },
                    RelationEvent::Departed => Self::RelationDeparted { endpoint },
                    RelationEvent::Broken => Self::RelationBroken { endpoint },
                });
            }
        }
        if let Some(name) = hook.strip_suffix("-action") {
            if !name.is_empty() {
                return Some(Self::Action {
                    name: name.to_owned(),
                });
            }
        }
        match hook {
            "install" => Some(Self::Install),
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "remove" => Some(Self::Remove),
            "update-status" => Some(Self::UpdateStatus),
            "config-changed" => Some(Self::ConfigChanged),
            "upgrade-charm" => Some(Self::UpgradeCharm),
            "leader-elected" => Some(Self::LeaderElected),
            "leader-settings-changed" => Some(Self::LeaderSettingsChanged),
            "collect-metrics" => Some(Self::CollectMetrics),
            _ => None,
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name())
    }
}

fn snake(name: &str) -> String {
    name.replace('-', "_")
}

/// Kind-specific data persisted with an event instance.
///
/// This is the snapshot written to the store when an event is emitted and
/// read back when it is (re)delivered. It carries identifiers only; live
/// platform facts such as relation data are read through the model at
/// delivery time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// No payload.
    #[default]
    Empty,
    /// A relation event.
    Relation {
        /// The relation the event is about.
        relation_id: RelationId,
        /// Remote application name, if known.
        #[serde(default)]
        app: Option<String>,
        /// Remote unit name, if the event concerns a single unit.
        #[serde(default)]
        unit: Option<String>,
        /// Unit that is leaving, on departed events.
        #[serde(default)]
        departing_unit: Option<String>,
    },
    /// An action invocation.
    Action {
        /// Action parameters.
        #[serde(default)]
        params: BTreeMap<String, serde_json::Value>,
    },
    /// Free-form payload of a custom event.
    Custom {
        /// Arbitrary serialisable data.
        data: serde_json::Value,
    },
}

impl EventPayload {
    /// Build a relation payload.
    pub fn relation(relation_id: RelationId, app: Option<&str>, unit: Option<&str>) -> Self {
        Self::Relation {
            relation_id,
            app: app.map(str::to_owned),
            unit: unit.map(str::to_owned),
            departing_unit: None,
        }
    }

    /// Build a relation-departed payload.
    pub fn relation_departed(
        relation_id: RelationId,
        app: Option<&str>,
        unit: Option<&str>,
        departing_unit: &str,
    ) -> Self {
        Self::Relation {
            relation_id,
            app: app.map(str::to_owned),
            unit: unit.map(str::to_owned),
            departing_unit: Some(departing_unit.to_owned()),
        }
    }

    /// Serialise into a storable snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if a custom payload cannot be
    /// represented as JSON.
    pub fn to_snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Rebuild a payload from a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the snapshot has the wrong shape.
    pub fn from_snapshot(snapshot: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(snapshot)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_handle_conventions() {
        assert_eq!(EventKind::ConfigChanged.name(), "config_changed");
        assert_eq!(
            EventKind::RelationJoined {
                endpoint: "my-db".to_owned()
            }
            .name(),
            "my_db_relation_joined"
        );
        assert_eq!(
            EventKind::Action {
                name: "foo-bar".to_owned()
            }
            .name(),
            "foo_bar_action"
        );
        assert_eq!(
            EventKind::Custom {
                name: "ready".to_owned()
            }
            .name(),
            "ready"
        );
    }

    #[test]
    fn hook_names_map_onto_kinds() {
        assert_eq!(
            EventKind::from_hook_name("db-relation-changed"),
            Some(EventKind::RelationChanged {
                endpoint: "db".to_owned()
            })
        );
        assert_eq!(
            EventKind::from_hook_name("ha-relation-broken"),
            Some(EventKind::RelationBroken {
                endpoint: "ha".to_owned()
            })
        );
        assert_eq!(
            EventKind::from_hook_name("update-status"),
            Some(EventKind::UpdateStatus)
        );
        assert_eq!(
            EventKind::from_hook_name("foo-bar-action"),
            Some(EventKind::Action {
                name: "foo-bar".to_owned()
            })
        );
        assert_eq!(EventKind::from_hook_name("-relation-joined"), None);
        assert_eq!(EventKind::from_hook_name("bogus"), None);
    }

    #[test]
    fn relation_endpoint_only_for_relation_kinds() {
        let kind = EventKind::RelationDeparted {
            endpoint: "mon".to_owned(),
        };
        assert_eq!(kind.relation_endpoint(), Some("mon"));
        assert_eq!(EventKind::Start.relation_endpoint(), None);
    }

    #[test]
    fn payload_snapshot_restores_relation_fields() {
        let payload =
            EventPayload::relation_departed(RelationId(4), Some("pg"), Some("pg/1"), "pg/1");
        let snapshot = payload.to_snapshot().unwrap();
        assert_eq!(snapshot["type"], "relation");
        assert_eq!(snapshot["relation_id"], 4);
        assert_eq!(EventPayload::from_snapshot(snapshot).unwrap(), payload);
    }

    #[test]
    fn snapshot_of_wrong_shape_is_rejected() {
        let bad = serde_json::json!({"type": "relation"});
        assert!(EventPayload::from_snapshot(bad).is_err());
    }
}
