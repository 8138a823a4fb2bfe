use serde::{Deserialize, Serialize};

/// Identity of one mutable entity stream.
///
/// The composite key is `(instance_id, aggregate_type, id)`; `resource_owner`
/// is the organization that owns the stream. Two aggregates with the same
/// type and id under different instances are unrelated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aggregate {
    pub aggregate_type: String,
    pub id: String,
    pub resource_owner: String,
    pub instance_id: String,
}

impl Aggregate {
    pub fn new(
        aggregate_type: impl Into<String>,
        id: impl Into<String>,
        resource_owner: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            id: id.into(),
            resource_owner: resource_owner.into(),
            instance_id: instance_id.into(),
        }
    }

    /// Stream key used by stores to locate the aggregate's events.
    pub fn stream_key(&self) -> StreamKey {
        StreamKey {
            instance_id: self.instance_id.clone(),
            aggregate_type: self.aggregate_type.clone(),
            aggregate_id: self.id.clone(),
        }
    }
}

/// Key of one aggregate stream (resource owner is not part of identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey {
    pub instance_id: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
}
