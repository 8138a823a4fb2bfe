use serde::{Deserialize, Serialize};

use warden_core::Exists;

/// `Unspecified → Active ⇄ Inactive`, `Active ⇄ Locked`, any → `Removed`.
///
/// Inactive users only come back through reactivation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    #[default]
    Unspecified,
    Active,
    Inactive,
    Locked,
    Removed,
}

impl UserState {
    pub fn can_lock(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl Exists for UserState {
    fn exists(&self) -> bool {
        matches!(self, Self::Active | Self::Inactive | Self::Locked)
    }
}
