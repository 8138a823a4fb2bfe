//! Lifecycle state machines shared by entity write models.

use serde::{Deserialize, Serialize};

/// Anything whose lifecycle decides whether it exists for mutation purposes.
pub trait Exists {
    /// `false` for never-created and removed entities.
    fn exists(&self) -> bool;
}

/// `Unspecified → Active ⇄ Inactive → Removed`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Unspecified,
    Active,
    Inactive,
    Removed,
}

impl LifecycleState {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    pub fn is_inactive(self) -> bool {
        self == Self::Inactive
    }
}

impl Exists for LifecycleState {
    fn exists(&self) -> bool {
        matches!(self, Self::Active | Self::Inactive)
    }
}

/// `Unspecified → Active → Removed`, for entities that cannot be deactivated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectState {
    #[default]
    Unspecified,
    Active,
    Removed,
}

impl Exists for ObjectState {
    fn exists(&self) -> bool {
        *self == Self::Active
    }
}
