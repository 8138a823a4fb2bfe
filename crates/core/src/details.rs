//! Caller-visible result of a successful mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Proof of a mutation's effect: owner, the aggregate's new sequence and the
/// change time. Derived from the folded write model, never persisted itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDetails {
    pub resource_owner: String,
    pub sequence: u64,
    pub change_date: Option<DateTime<Utc>>,
    /// Set when the command created an entity with a generated id.
    pub id: Option<String>,
}

impl ObjectDetails {
    pub fn new(resource_owner: impl Into<String>, sequence: u64, change_date: Option<DateTime<Utc>>) -> Self {
        Self {
            resource_owner: resource_owner.into(),
            sequence,
            change_date,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}
