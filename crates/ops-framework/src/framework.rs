//! Observer registry, emission, and deferred-event bookkeeping.
//!
//! # Emission
//!
//! [`Framework::emit`] gives the event a fresh handle
//! `<emitter>/<kind>[<n>]`, where `n` comes from a counter persisted in the
//! framework's own stored state. It then saves the payload snapshot and one
//! [`Notice`] per registered observer, and delivers the event to each
//! observer in registration order. A notice is dropped as soon as its
//! handler returns without deferring. Once no notice references the event,
//! its snapshot is dropped too.
//!
//! # Reemission
//!
//! [`Framework::reemit`] walks every outstanding notice, grouped by event
//! path in the order the paths first appear in the queue, and redelivers
//! each event only to the observer named in the notice.
//!
//! # Failure
//!
//! A handler error aborts delivery of the current event and is returned as
//! [`FrameworkError::Handler`]. Notices that were not yet resolved stay in
//! the store, so the next invocation replays them.

use std::cell::RefCell;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use ops_storage::Storage;
use ops_types::{EventPayload, Handle, Notice, validate_kind};

use crate::error::FrameworkError;
use crate::event::{Event, EventSource};
use crate::model::Model;
use crate::stored_state::{StoredState, StoredStateData};

/// Root handle kind of the framework's own state.
const FRAMEWORK_KIND: &str = "Framework";

/// Key of the persisted event counter.
const EVENT_COUNT_KEY: &str = "event_count";

type Handler = Rc<RefCell<dyn FnMut(&mut Framework, &mut Event) -> anyhow::Result<()>>>;

struct Observation {
    source: EventSource,
    /// `source.path()`, cached for matching against stored event paths.
    source_path: String,
    observer: Handle,
    observer_path: String,
    method: String,
    handler: Handler,
}

impl Observation {
    fn matches(&self, source_path: &str, notice: &Notice) -> bool {
        self.source_path == source_path
            && self.observer_path == notice.observer_path
            && self.method == notice.method
    }
}

/// Central registry and dispatcher for one invocation.
pub struct Framework {
    storage: Box<dyn Storage>,
    model: Model,
    observations: Vec<Observation>,
    stored: BTreeMap<String, StoredStateData>,
    own_state: StoredState,
    closed: bool,
}

impl core::fmt::Debug for Framework {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Framework")
            .field("model", &self.model)
            .field("observations", &self.observations.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Framework {
    /// Bind a framework to a store and a model.
    pub fn new(storage: Box<dyn Storage>, model: Model) -> Self {
        Self {
            storage,
            model,
            observations: Vec::new(),
            stored: BTreeMap::new(),
            own_state: StoredState::new(&Handle::new(FRAMEWORK_KIND, None), "_stored"),
            closed: false,
        }
    }

    /// The model this framework was built with.
    pub const fn model(&self) -> &Model {
        &self.model
    }

    /// Register `handler` as `observer.method` for events from `source`.
    ///
    /// Handlers run in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError::DuplicateObserver`] if the same observer
    /// method is already registered for `source`, and
    /// [`FrameworkError::InvalidHandle`] if the event kind cannot appear in
    /// a handle path.
    pub fn observe<F>(
        &mut self,
        source: &EventSource,
        observer: &Handle,
        method: &str,
        handler: F,
    ) -> Result<(), FrameworkError>
    where
        F: FnMut(&mut Self, &mut Event) -> anyhow::Result<()> + 'static,
    {
        self.ensure_open()?;
        validate_kind(&source.kind().name())?;
        if self
            .observations
            .iter()
            .any(|o| o.source == *source && o.observer == *observer && o.method == method)
        {
            return Err(FrameworkError::DuplicateObserver {
                event: source.path(),
                observer: observer.path(),
                method: method.to_owned(),
            });
        }

        tracing::debug!(
            event = %source,
            observer = %observer,
            method,
            "Registered observer"
        );
        self.observations.push(Observation {
            source: source.clone(),
            source_path: source.path(),
            observer: observer.clone(),
            observer_path: observer.path(),
            method: method.to_owned(),
            handler: Rc::new(RefCell::new(handler)),
        });
        Ok(())
    }

    /// Emit an event from `source` and deliver it to every observer.
    ///
    /// Returns the handle assigned to the event instance. An event with no
    /// observers still consumes a handle but leaves nothing in the store.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError::InvalidHandle`] before anything is stored
    /// if the event kind cannot appear in a handle path,
    /// [`FrameworkError::Handler`] if an observer fails, and storage or
    /// serialisation errors otherwise.
    pub fn emit(
        &mut self,
        source: &EventSource,
        payload: EventPayload,
    ) -> Result<Handle, FrameworkError> {
        self.ensure_open()?;
        let kind = source.kind().name();
        validate_kind(&kind)?;
        let count = self.next_event_count()?;
        let handle = source.emitter().nest(kind, Some(&count.to_string()));
        let path = handle.path();

        let notices: Vec<Notice> = self
            .observations
            .iter()
            .filter(|o| o.source == *source)
            .map(|o| Notice::new(&handle, &o.observer, &o.method))
            .collect();
        if notices.is_empty() {
            tracing::debug!(event = %path, "Emitted event with no observers");
            return Ok(handle);
        }

        self.storage.save_snapshot(&path, payload.to_snapshot()?)?;
        for notice in &notices {
            self.storage.save_notice(notice)?;
        }
        tracing::debug!(event = %path, observers = notices.len(), "Emitted event");

        self.reemit_notices(Some(&path))?;
        Ok(handle)
    }

    /// Redeliver every outstanding notice.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError::Handler`] if an observer fails, and
    /// storage or parse errors otherwise.
    pub fn reemit(&mut self) -> Result<(), FrameworkError> {
        self.ensure_open()?;
        self.reemit_notices(None)
    }

    /// Outstanding notices in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if the store cannot be read.
    pub fn notices(&self) -> Result<Vec<Notice>, FrameworkError> {
        self.ensure_open()?;
        Ok(self.storage.notices(None)?)
    }

    /// Drop outstanding notices, all of them or only those addressed to
    /// `observer`. Snapshots no longer referenced by any notice are dropped
    /// as well. Returns the number of notices removed.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if the store cannot be updated.
    pub fn clear_notices(&mut self, observer: Option<&Handle>) -> Result<usize, FrameworkError> {
        self.ensure_open()?;
        let observer_path = observer.map(Handle::path);
        let doomed: Vec<Notice> = self
            .storage
            .notices(None)?
            .into_iter()
            .filter(|n| {
                observer_path
                    .as_deref()
                    .is_none_or(|path| n.observer_path == path)
            })
            .collect();

        let mut paths = BTreeSet::new();
        for notice in &doomed {
            self.storage.drop_notice(notice)?;
            paths.insert(notice.event_path.as_str());
        }
        for path in paths {
            if self.storage.notices(Some(path))?.is_empty() {
                self.storage.drop_snapshot(path)?;
            }
        }
        tracing::debug!(cleared = doomed.len(), "Cleared notices");
        Ok(doomed.len())
    }

    /// The state container addressed by `state`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if the stored snapshot cannot be read or
    /// decoded.
    pub fn stored_data(
        &mut self,
        state: &StoredState,
    ) -> Result<&mut StoredStateData, FrameworkError> {
        self.ensure_open()?;
        match self.stored.entry(state.handle().path()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let data = match self.storage.load_snapshot(entry.key())? {
                    Some(snapshot) => StoredStateData::from_snapshot(snapshot)?,
                    None => StoredStateData::default(),
                };
                Ok(entry.insert(data))
            }
        }
    }

    /// Save changed state containers and commit the store.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if the store rejects a write.
    pub fn commit(&mut self) -> Result<(), FrameworkError> {
        self.ensure_open()?;
        for (path, data) in &mut self.stored {
            if data.is_dirty() {
                self.storage.save_snapshot(path, data.to_snapshot())?;
                data.mark_clean();
            }
        }
        self.storage.commit()?;
        tracing::debug!("Committed framework state");
        Ok(())
    }

    /// Close the underlying store. Uncommitted writes are not saved.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError::Closed`] if already closed.
    pub fn close(&mut self) -> Result<(), FrameworkError> {
        self.ensure_open()?;
        self.closed = true;
        self.storage.close()?;
        Ok(())
    }

    const fn ensure_open(&self) -> Result<(), FrameworkError> {
        if self.closed {
            Err(FrameworkError::Closed)
        } else {
            Ok(())
        }
    }

    fn next_event_count(&mut self) -> Result<u64, FrameworkError> {
        let state = self.own_state.clone();
        let count = state
            .get::<u64>(self, EVENT_COUNT_KEY)?
            .unwrap_or(0)
            .saturating_add(1);
        state.set(self, EVENT_COUNT_KEY, count)?;
        Ok(count)
    }

    fn reemit_notices(&mut self, event_path: Option<&str>) -> Result<(), FrameworkError> {
        let mut groups: Vec<(String, Vec<Notice>)> = Vec::new();
        for notice in self.storage.notices(event_path)? {
            match groups.iter_mut().find(|(path, _)| *path == notice.event_path) {
                Some((_, group)) => group.push(notice),
                None => groups.push((notice.event_path.clone(), vec![notice])),
            }
        }
        for (path, group) in groups {
            self.deliver(&path, group)?;
        }
        Ok(())
    }

    fn deliver(&mut self, path: &str, group: Vec<Notice>) -> Result<(), FrameworkError> {
        let handle = Handle::from_path(path)?;
        let Some(snapshot) = self.storage.load_snapshot(path)? else {
            tracing::warn!(event = %path, "Dropping notices of event without snapshot");
            for notice in &group {
                self.storage.drop_notice(notice)?;
            }
            return Ok(());
        };
        let payload = EventPayload::from_snapshot(snapshot)?;
        let source_path = handle
            .parent()
            .map_or_else(|| handle.kind().to_owned(), |p| p.nest(handle.kind(), None).path());

        for notice in group {
            // A handler earlier in this walk may have cleared it.
            if !self.storage.notices(Some(path))?.contains(&notice) {
                continue;
            }
            let Some(observation) = self
                .observations
                .iter()
                .find(|o| o.matches(&source_path, &notice))
            else {
                tracing::warn!(%notice, "No observer registered for notice, keeping it");
                continue;
            };
            let handler = Rc::clone(&observation.handler);
            let mut event = Event::new(
                handle.clone(),
                observation.source.kind().clone(),
                payload.clone(),
            );

            let Ok(mut callback) = handler.try_borrow_mut() else {
                return Err(FrameworkError::ReentrantDispatch {
                    observer: notice.observer_path,
                    method: notice.method,
                });
            };
            tracing::debug!(%notice, "Delivering event");
            let outcome = (&mut *callback)(self, &mut event);
            drop(callback);

            if let Err(source) = outcome {
                return Err(FrameworkError::Handler {
                    event: notice.event_path,
                    observer: notice.observer_path,
                    method: notice.method,
                    source,
                });
            }
            if event.is_deferred() {
                tracing::debug!(%notice, "Event deferred");
            } else {
                self.storage.drop_notice(&notice)?;
            }
        }

        if self.storage.notices(Some(path))?.is_empty() {
            self.storage.drop_snapshot(path)?;
        }
        Ok(())
    }
}
