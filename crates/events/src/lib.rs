//! `warden-events` — event-sourcing vocabulary of the command side.
//!
//! Typed domain events ([`Event`]), the draft [`Command`] handed to a store,
//! the [`StoredEvent`] a store returns, event queries, the secondary field
//! index vocabulary and the [`WriteModel`] folding contract.

pub mod aggregate;
pub mod command;
pub mod event;
pub mod field;
pub mod query;
pub mod stored;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod unique;
pub mod write_model;

pub use aggregate::{Aggregate, StreamKey};
pub use command::Command;
pub use event::{Event, EventCodec};
pub use field::{FieldOperation, SearchCriteria, SearchField, SearchResult};
pub use query::{AggregateFilter, SearchQuery};
pub use stored::StoredEvent;
pub use unique::{UniqueAction, UniqueConstraint};
pub use write_model::{WriteModel, WriteModelBase, append_and_reduce};

#[doc(hidden)]
pub mod __private {
    pub use serde;
    pub use serde_json;
    pub use warden_core::Result;
}
