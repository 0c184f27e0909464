//! Feature switches for the example charm.

use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

/// Environment variable enabling the `start` and `foo-bar` actions.
pub const USE_ACTIONS_VAR: &str = "EXAMPLE_USE_ACTIONS";

/// Environment variable enabling the `log-*` actions.
pub const USE_LOG_ACTIONS_VAR: &str = "EXAMPLE_USE_LOG_ACTIONS";

/// Which optional observers the charm registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleCharmOptions {
    /// Observe the `start` and `foo-bar` actions.
    pub use_actions: bool,
    /// Observe the `log-critical` .. `log-debug` actions.
    pub use_log_actions: bool,
}

impl ExampleCharmOptions {
    /// Load options from the process environment. Unset switches are off.
    pub fn from_env() -> Result<Self, OptionsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load options through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OptionsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            use_actions: flag(&lookup, USE_ACTIONS_VAR)?,
            use_log_actions: flag(&lookup, USE_LOG_ACTIONS_VAR)?,
        })
    }
}

fn flag<F>(lookup: &F, name: &'static str) -> Result<bool, OptionsError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(false);
    };
    let parsed = value.trim().parse();
    parsed.map_err(|source| OptionsError::InvalidFlag {
        name,
        value,
        source,
    })
}
