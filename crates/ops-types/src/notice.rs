//! Durable record of an outstanding observer obligation.

use serde::{Deserialize, Serialize};

use crate::handle::Handle;

/// An observer that still owes a reaction to an event instance.
///
/// The persisted shape is the triple `(event path, observer path, method
/// name)`. At most one notice exists per distinct triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Notice {
    /// Path of the event handle.
    pub event_path: String,
    /// Path of the observing object's handle.
    pub observer_path: String,
    /// Name under which the observer's handler was registered.
    pub method: String,
}

impl Notice {
    /// Create a notice for the given event, observer, and method.
    pub fn new(event: &Handle, observer: &Handle, method: &str) -> Self {
        Self {
            event_path: event.path(),
            observer_path: observer.path(),
            method: method.to_owned(),
        }
    }
}

impl core::fmt::Display for Notice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} -> {}.{}", self.event_path, self.observer_path, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_renders_paths() {
        let charm = Handle::new("Charm", None);
        let event = charm.nest("on", None).nest("start", Some("1"));
        let notice = Notice::new(&event, &charm, "on_start");
        assert_eq!(notice.event_path, "Charm/on/start[1]");
        assert_eq!(notice.observer_path, "Charm");
        assert_eq!(notice.to_string(), "Charm/on/start[1] -> Charm.on_start");
    }
}
