//! Helpers for reducer tests in domain crates.

use chrono::Utc;

use warden_core::CommandContext;

use crate::aggregate::Aggregate;
use crate::command::Command;
use crate::event::Event;
use crate::stored::StoredEvent;

/// Materializes events of one aggregate with dense sequences, as a store
/// would after a push.
#[derive(Debug)]
pub struct Stream {
    aggregate: Aggregate,
    sequence: u64,
}

impl Stream {
    pub fn new(aggregate: Aggregate) -> Self {
        Self {
            aggregate,
            sequence: 0,
        }
    }

    pub fn next<E: Event>(&mut self, event: E) -> StoredEvent {
        self.sequence += 1;
        let ctx = CommandContext::new(self.aggregate.instance_id.clone(), "tester");
        let command = Command::new(&ctx, &self.aggregate, &event).expect("event encodes");
        StoredEvent::from_command(command, self.sequence, self.sequence, Utc::now())
    }
}
