//! The charm entry point.

use ops_types::Handle;

use crate::error::FrameworkError;
use crate::event::CharmEvents;
use crate::framework::Framework;
use crate::stored_state::StoredState;

/// Root handle kind used unless a charm overrides [`Charm::KIND`].
pub const DEFAULT_CHARM_KIND: &str = "Charm";

/// Identity and event sources of the root charm object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharmBase {
    handle: Handle,
    on: CharmEvents,
}

impl CharmBase {
    /// Root object of handle kind `kind` (usually `Charm`).
    pub fn new(kind: &str) -> Self {
        let handle = Handle::new(kind, None);
        let on = CharmEvents::new(&handle);
        Self { handle, on }
    }

    /// Handle of the charm object.
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Event sources emitted on behalf of the charm.
    pub const fn on(&self) -> &CharmEvents {
        &self.on
    }

    /// Handle for a child object such as a relation helper.
    pub fn child(&self, kind: &str, key: Option<&str>) -> Handle {
        self.handle.nest(kind, key)
    }

    /// State container named `attr` on the charm object.
    pub fn stored_state(&self, attr: &str) -> StoredState {
        StoredState::new(&self.handle, attr)
    }
}

impl Default for CharmBase {
    fn default() -> Self {
        Self::new(DEFAULT_CHARM_KIND)
    }
}

/// Application logic driven by the framework.
///
/// `init` runs once per invocation. It registers observers on the
/// framework and returns the charm value; all state that must survive the
/// invocation belongs in [`StoredState`].
pub trait Charm: Sized {
    /// Handle kind of the root object.
    const KIND: &'static str = DEFAULT_CHARM_KIND;

    /// Register observers and build the charm.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError`] if registration or state seeding fails.
    fn init(framework: &mut Framework, base: CharmBase) -> Result<Self, FrameworkError>;
}
