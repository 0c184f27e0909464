//! Drives the example charm through the harness and through separate
//! invocations over a persisted store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::json;

use ops_example_charm::{ExampleCharm, ExampleCharmOptions, METADATA};
use ops_framework::{
    Charm, CharmBase, EventPayload, Framework, FrameworkError, HookTrigger, Model, RelationId,
    run_invocation_with,
};
use ops_storage::{MemoryStorage, Storage};
use ops_testing::{Harness, TestingBackend};

fn harness_with(options: ExampleCharmOptions) -> (Harness, ExampleCharm) {
    let mut harness = Harness::new(METADATA).unwrap();
    let charm = harness
        .initialize_with(|fw, base| ExampleCharm::new(fw, base, options))
        .unwrap();
    harness.enable_events();
    (harness, charm)
}

fn model() -> Model {
    Model::new(
        "example/0",
        Rc::new(TestingBackend::new("example", ["db", "mon", "ha"])),
    )
}

fn invoke(
    store: &MemoryStorage,
    options: ExampleCharmOptions,
    hook: &str,
    payload: EventPayload,
) -> Result<ExampleCharm, FrameworkError> {
    run_invocation_with(
        store.clone(),
        model(),
        CharmBase::new(ExampleCharm::KIND),
        HookTrigger::from_hook_name(hook, payload),
        |fw, base| ExampleCharm::new(fw, base, options),
    )
}

/// Reopen the committed state of `store` and read it through a charm.
fn observed(store: &MemoryStorage, options: ExampleCharmOptions) -> Vec<String> {
    let mut fw = Framework::new(Box::new(store.restarted()), model());
    let charm = ExampleCharm::new(&mut fw, CharmBase::new(ExampleCharm::KIND), options).unwrap();
    charm.observed_event_types(&mut fw).unwrap()
}

#[test]
fn config_changed_is_always_deferred() {
    let (mut harness, charm) = harness_with(ExampleCharmOptions::default());
    harness.update_config(&[("k", json!("v"))], &[]).unwrap();

    let fw = harness.framework_mut();
    assert_eq!(
        charm.handled(fw, "on_config_changed").unwrap(),
        vec!["config_changed"]
    );
    let notices = fw.notices().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].method, "on_config_changed");

    fw.reemit().unwrap();
    assert_eq!(
        charm.handled(fw, "on_config_changed").unwrap().len(),
        2
    );
    assert_eq!(fw.notices().unwrap().len(), 1);
}

#[test]
fn relation_handlers_keep_snapshots() {
    let (mut harness, charm) = harness_with(ExampleCharmOptions::default());

    let db = harness.add_relation("db", "postgresql", &[], &[]).unwrap();
    harness.add_relation_unit(db, "postgresql/0", &[]).unwrap();
    let mon = harness.add_relation("mon", "prometheus", &[], &[]).unwrap();
    harness.add_relation_unit(mon, "prometheus/0", &[]).unwrap();
    harness.remove_relation_unit(mon, "prometheus/0").unwrap();
    let ha = harness.add_relation("ha", "example", &[], &[]).unwrap();
    harness.remove_relation(ha).unwrap();

    let fw = harness.framework_mut();
    assert_eq!(
        charm.observed_event_types(fw).unwrap(),
        vec![
            "db_relation_joined",
            "mon_relation_changed",
            "mon_relation_departed",
            "ha_relation_broken",
        ]
    );
    assert_eq!(
        charm
            .relation_snapshot(fw, "db_relation_joined_data")
            .unwrap(),
        Some(EventPayload::relation(
            db,
            Some("postgresql"),
            Some("postgresql/0")
        ))
    );
    assert_eq!(
        charm
            .relation_snapshot(fw, "mon_relation_departed_data")
            .unwrap(),
        Some(EventPayload::relation_departed(
            mon,
            Some("prometheus"),
            Some("prometheus/0"),
            "prometheus/0"
        ))
    );
    assert_eq!(
        charm
            .relation_snapshot(fw, "ha_relation_broken_data")
            .unwrap(),
        Some(EventPayload::relation(ha, None, None))
    );
}

#[test]
fn collect_metrics_records_a_batch() {
    let (mut harness, charm) = harness_with(ExampleCharmOptions::default());
    let source = harness.charm_events().collect_metrics();
    harness
        .framework_mut()
        .emit(&source, EventPayload::Empty)
        .unwrap();

    let metrics = harness.metrics();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].metrics, BTreeMap::from([("foo".to_owned(), 42.0)]));
    assert_eq!(
        metrics[0].labels,
        BTreeMap::from([("bar".to_owned(), "4.2".to_owned())])
    );
    assert_eq!(
        charm
            .handled(harness.framework_mut(), "on_collect_metrics")
            .unwrap(),
        vec!["collect_metrics"]
    );
}

#[test]
fn deferred_config_change_returns_on_every_invocation() {
    let options = ExampleCharmOptions::default();
    let mut store = MemoryStorage::new();
    for hook in ["install", "config-changed", "start", "update-status"] {
        invoke(&store, options, hook, EventPayload::Empty).unwrap();
        store = store.restarted();
    }

    assert_eq!(
        observed(&store, options),
        vec![
            "install",
            "config_changed",
            "config_changed",
            "start",
            "config_changed",
            "update_status",
        ]
    );
    let notices = store.notices(None).unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].event_path, "Charm/on/config_changed[2]");
}

#[test]
fn actions_are_ignored_unless_enabled() {
    let payload = EventPayload::Action {
        params: BTreeMap::new(),
    };
    let store = MemoryStorage::new();
    invoke(&store, ExampleCharmOptions::default(), "foo-bar-action", payload.clone()).unwrap();
    assert!(observed(&store, ExampleCharmOptions::default()).is_empty());
    assert!(store.restarted().notices(None).unwrap().is_empty());

    let options = ExampleCharmOptions {
        use_actions: true,
        use_log_actions: true,
    };
    let mut store = store.restarted();
    for hook in ["foo-bar-action", "start-action", "log-info-action"] {
        invoke(&store, options, hook, payload.clone()).unwrap();
        store = store.restarted();
    }
    assert_eq!(
        observed(&store, options),
        vec!["foo_bar_action", "start_action"]
    );
}

#[test]
fn broken_relation_naming_an_app_is_rejected() {
    let store = MemoryStorage::new();
    let err = invoke(
        &store,
        ExampleCharmOptions::default(),
        "ha-relation-broken",
        EventPayload::relation(RelationId(3), Some("example"), None),
    )
    .err()
    .unwrap();
    assert!(matches!(err, FrameworkError::Handler { ref method, .. } if method == "on_ha_relation_broken"));

    // The failed delivery stays owed.
    let store = store.restarted();
    assert_eq!(store.notices(None).unwrap().len(), 1);
    assert!(observed(&store, ExampleCharmOptions::default()).is_empty());
}

#[test]
fn default_charm_init_has_no_actions() {
    let mut harness = Harness::new(METADATA).unwrap();
    let charm = harness.initialize::<ExampleCharm>().unwrap();
    assert_eq!(charm.options(), ExampleCharmOptions::default());
    harness.enable_events();
    let source = harness.charm_events().action("start");
    harness
        .framework_mut()
        .emit(&source, EventPayload::Empty)
        .unwrap();
    assert!(
        charm
            .observed_event_types(harness.framework_mut())
            .unwrap()
            .is_empty()
    );
}
