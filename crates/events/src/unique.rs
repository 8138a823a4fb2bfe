//! Unique-constraint reservations carried alongside events.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UniqueAction {
    Add,
    Remove,
}

/// Reservation (or release) of a unique key within one instance.
///
/// The store applies constraints atomically with the events they accompany;
/// adding a key that is already reserved fails the whole push with
/// `error_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub kind: String,
    pub key: String,
    pub action: UniqueAction,
    pub error_message: String,
}

impl UniqueConstraint {
    /// Keys are compared case-insensitively.
    pub fn add(kind: impl Into<String>, key: impl AsRef<str>, error_message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.as_ref().to_lowercase(),
            action: UniqueAction::Add,
            error_message: error_message.into(),
        }
    }

    pub fn remove(kind: impl Into<String>, key: impl AsRef<str>) -> Self {
        Self {
            kind: kind.into(),
            key: key.as_ref().to_lowercase(),
            action: UniqueAction::Remove,
            error_message: String::new(),
        }
    }
}
