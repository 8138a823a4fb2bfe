use serde_json::Value as JsonValue;

use warden_core::{CommandContext, ExpectedVersion, Result};

use crate::aggregate::Aggregate;
use crate::event::Event;
use crate::field::FieldOperation;
use crate::unique::UniqueConstraint;

/// An event that has been decided but not yet appended.
///
/// The command layer builds a batch of these and hands it to the store in a
/// single push; the store assigns sequence, position and creation time. The
/// expected version defaults to [`ExpectedVersion::Any`]; primary mutations
/// pin it to the write model's processed sequence with [`Command::expecting`].
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub aggregate: Aggregate,
    pub event_type: String,
    pub event_version: u32,
    pub creator: String,
    pub payload: JsonValue,
    pub expected: ExpectedVersion,
    pub fields: Vec<FieldOperation>,
    pub unique_constraints: Vec<UniqueConstraint>,
}

impl Command {
    pub fn new<E: Event>(ctx: &CommandContext, aggregate: &Aggregate, event: &E) -> Result<Self> {
        Ok(Self {
            aggregate: aggregate.clone(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            creator: ctx.actor_id().to_string(),
            payload: event.to_payload()?,
            expected: ExpectedVersion::Any,
            fields: event.fields(aggregate)?,
            unique_constraints: event.unique_constraints(aggregate),
        })
    }

    pub fn expecting(mut self, expected: ExpectedVersion) -> Self {
        self.expected = expected;
        self
    }
}
