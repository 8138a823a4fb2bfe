use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use warden_core::Error;
use warden_events::{Command, SearchCriteria, SearchQuery, SearchResult, StoredEvent};

/// Event store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, uniqueness) as
/// opposed to domain errors; the command layer maps them into
/// [`warden_core::Error`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<EventStoreError> for Error {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => Error::conflict(msg),
            EventStoreError::UniqueViolation(msg) => Error::already_exists(msg),
            other => Error::internal(other.to_string()),
        }
    }
}

/// Append-only, instance-scoped event store with a secondary field index.
///
/// ## Push semantics
///
/// `push()` is atomic: either every command of the batch is appended or none.
/// Implementations must:
/// - check each command's `ExpectedVersion` against the sequence its
///   aggregate had *before* the batch
/// - assign dense, 1-based per-aggregate sequences and a global position
/// - apply unique constraints in batch order (an `Add` of a taken key fails
///   the batch with [`EventStoreError::UniqueViolation`])
/// - apply field operations in batch order
///
/// ## Reads
///
/// `filter()` returns matching events in position order; an empty result is
/// not an error. `search()` answers field-index questions for one instance.
#[async_trait]
pub trait Eventstore: Send + Sync {
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>, EventStoreError>;

    async fn push(&self, commands: Vec<Command>) -> Result<Vec<StoredEvent>, EventStoreError>;

    async fn search(
        &self,
        instance_id: &str,
        criteria: &[SearchCriteria],
    ) -> Result<Vec<SearchResult>, EventStoreError>;
}

#[async_trait]
impl<S> Eventstore for Arc<S>
where
    S: Eventstore + ?Sized,
{
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).filter(query).await
    }

    async fn push(&self, commands: Vec<Command>) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).push(commands).await
    }

    async fn search(
        &self,
        instance_id: &str,
        criteria: &[SearchCriteria],
    ) -> Result<Vec<SearchResult>, EventStoreError> {
        (**self).search(instance_id, criteria).await
    }
}
