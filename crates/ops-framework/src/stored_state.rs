//! Per-object persistent state.
//!
//! A [`StoredState`] is a lightweight key addressing one state container:
//! `<owner>/StoredStateData[<attr>]`. The container itself,
//! [`StoredStateData`], is owned by the [`Framework`], loaded lazily from
//! the store on first access and written back on
//! [`Framework::commit`]. Two `StoredState` values with the same owner and
//! attribute name resolve to the same container.

use serde::Serialize;
use serde::de::DeserializeOwned;

use ops_types::Handle;

use crate::error::FrameworkError;
use crate::framework::Framework;

/// Handle-kind of every stored state container.
pub const STORED_STATE_KIND: &str = "StoredStateData";

/// Address of a state container attached to an owning object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredState {
    handle: Handle,
}

impl StoredState {
    /// State named `attr` belonging to `owner`.
    pub fn new(owner: &Handle, attr: &str) -> Self {
        Self {
            handle: owner.nest(STORED_STATE_KIND, Some(attr)),
        }
    }

    /// Storage handle of the container.
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Seed `key` with `value` unless it already holds a value.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if the container cannot be loaded or the
    /// value cannot be serialised.
    pub fn set_default<T: Serialize>(
        &self,
        framework: &mut Framework,
        key: &str,
        value: T,
    ) -> Result<(), FrameworkError> {
        let value = serde_json::to_value(value)?;
        framework.stored_data(self)?.set_default(key, value);
        Ok(())
    }

    /// Seed several keys at once. Existing values are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if the container cannot be loaded.
    pub fn set_defaults<'a, I>(&self, framework: &mut Framework, defaults: I) -> Result<(), FrameworkError>
    where
        I: IntoIterator<Item = (&'a str, serde_json::Value)>,
    {
        let data = framework.stored_data(self)?;
        for (key, value) in defaults {
            data.set_default(key, value);
        }
        Ok(())
    }

    /// Read and decode `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError::Serialization`] if the stored value has a
    /// different shape than `T`.
    pub fn get<T: DeserializeOwned>(
        &self,
        framework: &mut Framework,
        key: &str,
    ) -> Result<Option<T>, FrameworkError> {
        framework
            .stored_data(self)?
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(FrameworkError::from)
    }

    /// Encode and store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if the container cannot be loaded or the
    /// value cannot be serialised.
    pub fn set<T: Serialize>(
        &self,
        framework: &mut Framework,
        key: &str,
        value: T,
    ) -> Result<(), FrameworkError> {
        let value = serde_json::to_value(value)?;
        framework.stored_data(self)?.set(key, value);
        Ok(())
    }

    /// Read-modify-write `key`, starting from `T::default()` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if the stored value does not decode as
    /// `T` or the result cannot be serialised.
    pub fn update<T, F>(&self, framework: &mut Framework, key: &str, f: F) -> Result<(), FrameworkError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T),
    {
        let mut current: T = self.get(framework, key)?.unwrap_or_default();
        f(&mut current);
        self.set(framework, key, current)
    }

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if the container cannot be loaded.
    pub fn remove(&self, framework: &mut Framework, key: &str) -> Result<(), FrameworkError> {
        framework.stored_data(self)?.remove(key);
        Ok(())
    }
}

/// Contents of one state container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredStateData {
    values: serde_json::Map<String, serde_json::Value>,
    dirty: bool,
}

impl StoredStateData {
    /// Rebuild a container from its snapshot. Non-object snapshots are
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the snapshot is not a JSON object.
    pub fn from_snapshot(snapshot: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(Self {
            values: serde_json::from_value(snapshot)?,
            dirty: false,
        })
    }

    /// Raw value under `key`.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Whether `key` holds a value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Replace the value under `key`.
    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_owned(), value);
            self.dirty = true;
        }
    }

    /// Insert `value` only if `key` is absent.
    pub fn set_default(&mut self, key: &str, value: serde_json::Value) {
        if !self.values.contains_key(key) {
            self.values.insert(key.to_owned(), value);
            self.dirty = true;
        }
    }

    /// Remove `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        let old = self.values.remove(key);
        if old.is_some() {
            self.dirty = true;
        }
        old
    }

    /// Whether the container changed since it was loaded or last saved.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forget pending changes after they were saved.
    pub const fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Snapshot to persist.
    pub fn to_snapshot(&self) -> serde_json::Value {
        serde_json::Value::Object(self.values.clone())
    }
}
