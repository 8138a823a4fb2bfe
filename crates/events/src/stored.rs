use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use warden_core::Result;

use crate::aggregate::Aggregate;
use crate::command::Command;
use crate::event::EventCodec;

/// An appended event as returned by the store.
///
/// `sequence` is 1-based and dense per aggregate stream; `position` is a
/// global, strictly increasing ordering across all streams of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub instance_id: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub resource_owner: String,
    pub sequence: u64,
    pub position: u64,
    pub event_type: String,
    pub event_version: u32,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl StoredEvent {
    /// Materializes an appended draft. Field operations and unique
    /// constraints are store concerns and are not carried over.
    pub fn from_command(command: Command, sequence: u64, position: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            instance_id: command.aggregate.instance_id,
            aggregate_type: command.aggregate.aggregate_type,
            aggregate_id: command.aggregate.id,
            resource_owner: command.aggregate.resource_owner,
            sequence,
            position,
            event_type: command.event_type,
            event_version: command.event_version,
            creator: command.creator,
            created_at,
            payload: command.payload,
        }
    }

    /// Decodes the payload into `E`; `Ok(None)` if `E` does not know this
    /// event type.
    pub fn decode<E: EventCodec>(&self) -> Result<Option<E>> {
        E::decode(&self.event_type, &self.payload)
    }

    pub fn aggregate(&self) -> Aggregate {
        Aggregate::new(
            self.aggregate_type.clone(),
            self.aggregate_id.clone(),
            self.resource_owner.clone(),
            self.instance_id.clone(),
        )
    }
}
