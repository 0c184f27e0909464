//! One hook invocation, start to finish.
//!
//! A real deployment starts a fresh process per hook. [`run_invocation`]
//! performs the whole lifecycle of such a process against the supplied
//! store and model:
//!
//! 1. build the [`Framework`],
//! 2. construct the charm, which registers its observers,
//! 3. replay outstanding notices,
//! 4. emit the triggering event, if any,
//! 5. commit and close the store.
//!
//! If a handler fails, the store is still committed before the error is
//! returned, so notices recorded up to that point are honoured next time.

use ops_storage::Storage;
use ops_types::{EventKind, EventPayload};

use crate::charm::{Charm, CharmBase};
use crate::error::FrameworkError;
use crate::framework::Framework;
use crate::model::Model;

/// The event that started an invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct HookTrigger {
    /// Kind of the triggering event.
    pub kind: EventKind,
    /// Payload to persist with it.
    pub payload: EventPayload,
}

impl HookTrigger {
    /// A trigger with an empty payload.
    pub const fn new(kind: EventKind) -> Self {
        Self {
            kind,
            payload: EventPayload::Empty,
        }
    }

    /// A trigger carrying `payload`.
    pub const fn with_payload(kind: EventKind, payload: EventPayload) -> Self {
        Self { kind, payload }
    }

    /// Trigger for a hook name such as `install` or `db-relation-changed`.
    /// Returns `None` for unrecognised names.
    pub fn from_hook_name(hook: &str, payload: EventPayload) -> Option<Self> {
        EventKind::from_hook_name(hook).map(|kind| Self::with_payload(kind, payload))
    }
}

/// Run one invocation of charm `C`.
///
/// # Errors
///
/// Returns [`FrameworkError`] from charm construction, reemission,
/// emission, or the final commit.
pub fn run_invocation<C, S>(
    storage: S,
    model: Model,
    trigger: Option<HookTrigger>,
) -> Result<C, FrameworkError>
where
    C: Charm,
    S: Storage + 'static,
{
    run_invocation_with(storage, model, CharmBase::new(C::KIND), trigger, C::init)
}

/// Run one invocation, building the charm with `init`.
///
/// # Errors
///
/// Returns [`FrameworkError`] from `init`, reemission, emission, or the
/// final commit.
pub fn run_invocation_with<C, S, F>(
    storage: S,
    model: Model,
    base: CharmBase,
    trigger: Option<HookTrigger>,
    init: F,
) -> Result<C, FrameworkError>
where
    S: Storage + 'static,
    F: FnOnce(&mut Framework, CharmBase) -> Result<C, FrameworkError>,
{
    let mut framework = Framework::new(Box::new(storage), model);
    let on = base.on().clone();
    let charm = init(&mut framework, base)?;

    let outcome = framework.reemit().and_then(|()| match trigger {
        Some(trigger) => {
            tracing::debug!(event = %trigger.kind, "Dispatching hook");
            framework
                .emit(&on.source(trigger.kind), trigger.payload)
                .map(drop)
        }
        None => Ok(()),
    });

    match outcome {
        Ok(()) => {
            framework.commit()?;
            framework.close()?;
            Ok(charm)
        }
        Err(err @ FrameworkError::Handler { .. }) => {
            tracing::warn!(error = %err, "Handler failed, committing recorded notices");
            framework.commit()?;
            framework.close()?;
            Err(err)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::rc::Rc;

    use ops_storage::MemoryStorage;

    use super::*;
    use crate::backend::NullBackend;
    use crate::stored_state::StoredState;

    /// Counts starts and defers config changes until told otherwise.
    struct Counting {
        state: StoredState,
    }

    impl Charm for Counting {
        fn init(framework: &mut Framework, base: CharmBase) -> Result<Self, FrameworkError> {
            let state = base.stored_state("_stored");
            state.set_default(framework, "starts", 0_u32)?;
            state.set_default(framework, "release", false)?;

            let st = state.clone();
            framework.observe(&base.on().start(), base.handle(), "on_start", move |fw, _| {
                st.update(fw, "starts", |n: &mut u32| *n = n.saturating_add(1))?;
                Ok(())
            })?;
            let st = state.clone();
            framework.observe(
                &base.on().config_changed(),
                base.handle(),
                "on_config_changed",
                move |fw, event| {
                    if !st.get::<bool>(fw, "release")?.unwrap_or(false) {
                        event.defer();
                    }
                    Ok(())
                },
            )?;
            framework.observe(&base.on().stop(), base.handle(), "on_stop", |_, _| {
                anyhow::bail!("refusing to stop")
            })?;
            Ok(Self { state })
        }
    }

    fn model() -> Model {
        Model::new("app/0", Rc::new(NullBackend))
    }

    fn invoke(store: &MemoryStorage, kind: EventKind) -> Result<Counting, FrameworkError> {
        run_invocation::<Counting, _>(store.clone(), model(), Some(HookTrigger::new(kind)))
    }

    #[test]
    fn state_persists_across_invocations() {
        let store = MemoryStorage::new();
        invoke(&store, EventKind::Start).unwrap();
        let store = store.restarted();
        let charm = invoke(&store, EventKind::Start).unwrap();

        let mut fw = Framework::new(Box::new(store.restarted()), model());
        assert_eq!(charm.state.get::<u32>(&mut fw, "starts").unwrap(), Some(2));
    }

    #[test]
    fn deferred_event_is_replayed_before_the_new_trigger() {
        let store = MemoryStorage::new();
        invoke(&store, EventKind::ConfigChanged).unwrap();
        let store = store.restarted();
        assert_eq!(
            store.notices(None).unwrap()[0].event_path,
            "Charm/on/config_changed[1]"
        );

        // Still deferring: the notice survives another invocation.
        invoke(&store, EventKind::Start).unwrap();
        let store = store.restarted();
        assert_eq!(store.notices(None).unwrap().len(), 1);

        let mut fw = Framework::new(Box::new(store.clone()), model());
        StoredState::new(CharmBase::default().handle(), "_stored")
            .set(&mut fw, "release", true)
            .unwrap();
        fw.commit().unwrap();
        let store = store.restarted();

        invoke(&store, EventKind::UpdateStatus).unwrap();
        let store = store.restarted();
        assert!(store.notices(None).unwrap().is_empty());
        assert!(
            store
                .snapshot_paths()
                .iter()
                .all(|p| !p.contains("config_changed"))
        );
    }

    #[test]
    fn handler_failure_still_commits() {
        let store = MemoryStorage::new();
        let err = invoke(&store, EventKind::Stop).err().unwrap();
        assert!(matches!(err, FrameworkError::Handler { .. }));

        let store = store.restarted();
        let notices = store.notices(None).unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].method, "on_stop");
    }

    #[test]
    fn hook_names_build_triggers() {
        let trigger = HookTrigger::from_hook_name("db-relation-joined", EventPayload::Empty).unwrap();
        assert_eq!(
            trigger.kind,
            EventKind::RelationJoined {
                endpoint: "db".to_owned()
            }
        );
        assert!(HookTrigger::from_hook_name("nope", EventPayload::Empty).is_none());
    }
}
