//! Scripted demo for the example charm.
//!
//! Replays a fixed sequence of hook invocations against an in-memory store
//! and a simulated backend. Each invocation starts from the state the
//! previous one committed, the way separate hook processes would, so the
//! deferred `config_changed` can be seen coming back on every run until
//! the script ends.
//!
//! Feature switches come from `EXAMPLE_USE_ACTIONS` and
//! `EXAMPLE_USE_LOG_ACTIONS`; log verbosity from `RUST_LOG`.

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ops_example_charm::{ExampleCharm, ExampleCharmOptions, METADATA};
use ops_framework::{
    Charm, CharmBase, Framework, HookTrigger, Model, ModelBackend, run_invocation_with,
};
use ops_storage::MemoryStorage;
use ops_testing::{CharmMeta, TestingBackend};
use ops_types::{EventPayload, RelationId};

/// Hooks to replay, in order, with the payload each one carries.
fn script(options: ExampleCharmOptions) -> Vec<(&'static str, EventPayload)> {
    let db = RelationId(0);
    let mon = RelationId(1);
    let ha = RelationId(2);
    let mut hooks = vec![
        ("install", EventPayload::Empty),
        ("config-changed", EventPayload::Empty),
        ("start", EventPayload::Empty),
        (
            "db-relation-joined",
            EventPayload::relation(db, Some("postgresql"), Some("postgresql/0")),
        ),
        (
            "mon-relation-changed",
            EventPayload::relation(mon, Some("prometheus"), Some("prometheus/0")),
        ),
        (
            "mon-relation-departed",
            EventPayload::relation_departed(
                mon,
                Some("prometheus"),
                Some("prometheus/0"),
                "prometheus/0",
            ),
        ),
        ("ha-relation-broken", EventPayload::relation(ha, None, None)),
        ("update-status", EventPayload::Empty),
        ("collect-metrics", EventPayload::Empty),
    ];
    if options.use_actions {
        hooks.push(("start-action", no_params()));
        hooks.push(("foo-bar-action", no_params()));
    }
    if options.use_log_actions {
        for hook in [
            "log-critical-action",
            "log-error-action",
            "log-warning-action",
            "log-info-action",
            "log-debug-action",
        ] {
            hooks.push((hook, no_params()));
        }
    }
    hooks
}

const fn no_params() -> EventPayload {
    EventPayload::Action {
        params: BTreeMap::new(),
    }
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the options are malformed or any invocation fails.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("ops-example-charm starting");

    let options = ExampleCharmOptions::from_env()?;
    info!(
        use_actions = options.use_actions,
        use_log_actions = options.use_log_actions,
        "options loaded"
    );

    let meta = CharmMeta::from_yaml(METADATA)?;
    let backend = Rc::new(TestingBackend::new(
        &meta.name,
        meta.endpoints().map(|(name, _, _)| name),
    ));
    let dyn_backend: Rc<dyn ModelBackend> = backend.clone();
    let model = Model::new(backend.unit_name(), dyn_backend);

    let mut store = MemoryStorage::new();
    for (hook, payload) in script(options) {
        let trigger = HookTrigger::from_hook_name(hook, payload)
            .with_context(|| format!("unrecognised hook {hook}"))?;
        run_invocation_with(
            store.clone(),
            model.clone(),
            CharmBase::new(ExampleCharm::KIND),
            Some(trigger),
            |fw, base| ExampleCharm::new(fw, base, options),
        )
        .with_context(|| format!("hook {hook} failed"))?;
        info!(hook, "invocation committed");
        store = store.restarted();
    }

    let mut framework = Framework::new(Box::new(store), model);
    let charm = ExampleCharm::new(&mut framework, CharmBase::new(ExampleCharm::KIND), options)?;
    let observed = charm.observed_event_types(&mut framework)?;
    let pending = framework.notices()?;
    info!(
        handled = observed.len(),
        deferred = pending.len(),
        metric_batches = backend.metrics().len(),
        "script finished"
    );
    for (position, kind) in observed.iter().enumerate() {
        info!(position, kind = kind.as_str(), "observed");
    }
    for notice in &pending {
        info!(%notice, "still deferred");
    }
    Ok(())
}
