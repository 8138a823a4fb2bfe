//! Append-only event store boundary.
//!
//! The [`Eventstore`] port plus an in-memory adapter for tests and local
//! development. Durable backends live outside this workspace.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventstore;
pub use r#trait::{EventStoreError, Eventstore};
