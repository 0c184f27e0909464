//! The example charm.
//!
//! Every handler appends the event kind to its own list and to the shared
//! `observed_event_types` list, so a test can see which handlers ran and in
//! what order across invocations. Relation handlers also keep a snapshot of
//! the last event they saw.

use std::collections::BTreeMap;

use serde_json::Value;

use ops_framework::{Charm, CharmBase, Event, EventSource, Framework, FrameworkError, StoredState};
use ops_types::EventPayload;

use crate::options::ExampleCharmOptions;

/// Stored list of every event kind handled, in order.
pub const OBSERVED_EVENT_TYPES: &str = "observed_event_types";

/// Per-handler lists seeded at construction.
const HANDLER_LISTS: [&str; 17] = [
    "on_install",
    "on_start",
    "on_config_changed",
    "on_update_status",
    "on_leader_settings_changed",
    "on_db_relation_joined",
    "on_mon_relation_changed",
    "on_mon_relation_departed",
    "on_ha_relation_broken",
    "on_foo_bar_action",
    "on_start_action",
    "on_collect_metrics",
    "on_log_critical_action",
    "on_log_error_action",
    "on_log_warning_action",
    "on_log_info_action",
    "on_log_debug_action",
];

/// What a recorded handler does besides recording.
#[derive(Debug, Clone, Copy)]
enum Reaction {
    Record,
    Defer,
    /// Keep a snapshot under the given key; the event must name an app.
    RelationWithApp(&'static str),
    /// Keep a snapshot under the given key; the event must name neither
    /// app nor unit.
    RelationBroken(&'static str),
    /// The handle kind must match.
    Action(&'static str),
    Metrics,
}

impl Reaction {
    fn apply(
        self,
        state: &StoredState,
        framework: &mut Framework,
        event: &mut Event,
    ) -> anyhow::Result<()> {
        match self {
            Self::Record => {}
            Self::Defer => event.defer(),
            Self::RelationWithApp(key) => {
                anyhow::ensure!(
                    event.app().is_some(),
                    "application name cannot be None for a {} event",
                    event.kind()
                );
                state.set(framework, key, event.snapshot()?)?;
            }
            Self::RelationBroken(key) => {
                anyhow::ensure!(
                    event.app().is_none(),
                    "relation-broken events cannot reference a remote application"
                );
                anyhow::ensure!(
                    event.unit().is_none(),
                    "relation-broken events cannot reference a remote unit"
                );
                state.set(framework, key, event.snapshot()?)?;
            }
            Self::Action(expected) => {
                anyhow::ensure!(
                    event.handle().kind() == expected,
                    "action {} handled as {expected}",
                    event.handle().kind()
                );
            }
            Self::Metrics => {
                let metrics = BTreeMap::from([("foo".to_owned(), 42.0)]);
                let labels = BTreeMap::from([("bar".to_owned(), "4.2".to_owned())]);
                event.add_metrics(framework.model(), &metrics, &labels)?;
            }
        }
        Ok(())
    }
}

/// A charm that records every event it handles.
#[derive(Debug, Clone)]
pub struct ExampleCharm {
    base: CharmBase,
    state: StoredState,
    options: ExampleCharmOptions,
}

impl ExampleCharm {
    /// Seed stored state and register observers.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if stored state cannot be loaded or an
    /// observer is registered twice.
    pub fn new(
        framework: &mut Framework,
        base: CharmBase,
        options: ExampleCharmOptions,
    ) -> Result<Self, FrameworkError> {
        let state = base.stored_state("_stored");
        state.set_defaults(
            framework,
            HANDLER_LISTS
                .iter()
                .map(|key| (*key, Value::Array(Vec::new()))),
        )?;
        state.set_default(framework, OBSERVED_EVENT_TYPES, Vec::<String>::new())?;
        state.set(framework, "options", options)?;

        let on = base.on();
        let mut recorded = vec![
            (on.install(), "on_install", Reaction::Record),
            (on.start(), "on_start", Reaction::Record),
            (on.config_changed(), "on_config_changed", Reaction::Defer),
            (on.update_status(), "on_update_status", Reaction::Record),
            (
                on.leader_settings_changed(),
                "on_leader_settings_changed",
                Reaction::Record,
            ),
            // Endpoints from each metadata section: requires, provides, peers.
            (
                on.relation_joined("db"),
                "on_db_relation_joined",
                Reaction::RelationWithApp("db_relation_joined_data"),
            ),
            (
                on.relation_changed("mon"),
                "on_mon_relation_changed",
                Reaction::RelationWithApp("mon_relation_changed_data"),
            ),
            (
                on.relation_departed("mon"),
                "on_mon_relation_departed",
                Reaction::RelationWithApp("mon_relation_departed_data"),
            ),
            (
                on.relation_broken("ha"),
                "on_ha_relation_broken",
                Reaction::RelationBroken("ha_relation_broken_data"),
            ),
        ];
        if options.use_actions {
            recorded.push((
                on.action("start"),
                "on_start_action",
                Reaction::Action("start_action"),
            ));
            recorded.push((
                on.action("foo-bar"),
                "on_foo_bar_action",
                Reaction::Action("foo_bar_action"),
            ));
        }
        recorded.push((on.collect_metrics(), "on_collect_metrics", Reaction::Metrics));

        for (source, method, reaction) in recorded {
            observe_recorded(framework, &base, &state, &source, method, reaction)?;
        }
        if options.use_log_actions {
            observe_log_actions(framework, &base)?;
        }

        tracing::debug!(
            use_actions = options.use_actions,
            use_log_actions = options.use_log_actions,
            "Example charm initialised"
        );
        Ok(Self {
            base,
            state,
            options,
        })
    }

    /// Root charm object.
    pub const fn base(&self) -> &CharmBase {
        &self.base
    }

    /// The charm's stored state.
    pub const fn state(&self) -> &StoredState {
        &self.state
    }

    /// Options the charm was built with.
    pub const fn options(&self) -> ExampleCharmOptions {
        self.options
    }

    /// Event kinds recorded by handler `method`, e.g. `on_start`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if stored state cannot be read.
    pub fn handled(
        &self,
        framework: &mut Framework,
        method: &str,
    ) -> Result<Vec<String>, FrameworkError> {
        Ok(self.state.get(framework, method)?.unwrap_or_default())
    }

    /// Every event kind handled so far, in order.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if stored state cannot be read.
    pub fn observed_event_types(
        &self,
        framework: &mut Framework,
    ) -> Result<Vec<String>, FrameworkError> {
        self.handled(framework, OBSERVED_EVENT_TYPES)
    }

    /// Last payload stored under `key`, e.g. `db_relation_joined_data`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if stored state cannot be read.
    pub fn relation_snapshot(
        &self,
        framework: &mut Framework,
        key: &str,
    ) -> Result<Option<EventPayload>, FrameworkError> {
        self.state.get(framework, key)
    }
}

impl Charm for ExampleCharm {
    fn init(framework: &mut Framework, base: CharmBase) -> Result<Self, FrameworkError> {
        Self::new(framework, base, ExampleCharmOptions::default())
    }
}

fn observe_recorded(
    framework: &mut Framework,
    base: &CharmBase,
    state: &StoredState,
    source: &EventSource,
    method: &'static str,
    reaction: Reaction,
) -> Result<(), FrameworkError> {
    let state = state.clone();
    framework.observe(source, base.handle(), method, move |fw, event| {
        reaction.apply(&state, fw, event)?;
        let kind = event.kind().name();
        state.update(fw, method, |list: &mut Vec<String>| list.push(kind.clone()))?;
        state.update(fw, OBSERVED_EVENT_TYPES, |list: &mut Vec<String>| {
            list.push(kind);
        })?;
        Ok(())
    })
}

fn observe_log_actions(framework: &mut Framework, base: &CharmBase) -> Result<(), FrameworkError> {
    let on = base.on();
    let handle = base.handle();
    framework.observe(&on.action("log-critical"), handle, "on_log_critical_action", |_, _| {
        tracing::error!(severity = "critical", "super critical");
        Ok(())
    })?;
    framework.observe(&on.action("log-error"), handle, "on_log_error_action", |_, _| {
        tracing::error!("grave error");
        Ok(())
    })?;
    framework.observe(&on.action("log-warning"), handle, "on_log_warning_action", |_, _| {
        tracing::warn!("wise warning");
        Ok(())
    })?;
    framework.observe(&on.action("log-info"), handle, "on_log_info_action", |_, _| {
        tracing::info!("useful info");
        Ok(())
    })?;
    framework.observe(&on.action("log-debug"), handle, "on_log_debug_action", |_, _| {
        tracing::debug!("insightful debug");
        Ok(())
    })
}
