//! Workload status reported to the platform.

use serde::{Deserialize, Serialize};

/// The status category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusName {
    /// The workload is running as expected.
    Active,
    /// Operator intervention is required.
    Blocked,
    /// The unit is performing setup or upkeep.
    Maintenance,
    /// The unit is waiting on something outside its control.
    Waiting,
    /// No status has been set yet.
    Unknown,
}

impl StatusName {
    /// Return the canonical string label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Maintenance => "maintenance",
            Self::Waiting => "waiting",
            Self::Unknown => "unknown",
        }
    }
}

impl core::fmt::Display for StatusName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status value together with its human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status {
    /// The status category.
    pub name: StatusName,
    /// Free-form message shown to operators.
    pub message: String,
}

impl Status {
    /// Create a status value.
    pub fn new(name: StatusName, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
        }
    }

    /// `active` with the given message.
    pub fn active(message: impl Into<String>) -> Self {
        Self::new(StatusName::Active, message)
    }

    /// `blocked` with the given message.
    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(StatusName::Blocked, message)
    }

    /// `maintenance` with the given message.
    pub fn maintenance(message: impl Into<String>) -> Self {
        Self::new(StatusName::Maintenance, message)
    }

    /// `waiting` with the given message.
    pub fn waiting(message: impl Into<String>) -> Self {
        Self::new(StatusName::Waiting, message)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new(StatusName::Unknown, "")
    }
}
