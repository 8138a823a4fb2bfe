//! Write models: state folded from an aggregate's events to decide commands.

use chrono::{DateTime, Utc};

use warden_core::{ExpectedVersion, ObjectDetails, Result};

use crate::query::SearchQuery;
use crate::stored::StoredEvent;

/// Metadata every write model tracks about the aggregate it folds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteModelBase {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub resource_owner: String,
    pub instance_id: String,
    pub processed_sequence: u64,
    pub change_date: Option<DateTime<Utc>>,
}

impl WriteModelBase {
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        resource_owner: impl Into<String>,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            resource_owner: resource_owner.into(),
            ..Self::default()
        }
    }

    pub fn object_details(&self) -> ObjectDetails {
        ObjectDetails::new(
            self.resource_owner.clone(),
            self.processed_sequence,
            self.change_date,
        )
    }

    /// Concurrency expectation for the next push on this aggregate.
    pub fn expected_version(&self) -> ExpectedVersion {
        ExpectedVersion::Exact(self.processed_sequence)
    }

    /// Whether `event` belongs to the folded aggregate rather than to one
    /// the model merely reads.
    pub fn is_own(&self, event: &StoredEvent) -> bool {
        event.aggregate_type == self.aggregate_type && event.aggregate_id == self.aggregate_id
    }

    fn observe(&mut self, event: &StoredEvent) {
        self.processed_sequence = event.sequence;
        self.change_date = Some(event.created_at);
        self.resource_owner.clone_from(&event.resource_owner);
        self.instance_id.clone_from(&event.instance_id);
    }
}

/// A reducer over stored events.
///
/// `reduce` must ignore event types it does not know. Models that fold
/// several aggregates (e.g. a project grant and its project's roles) receive
/// all matching events, but only events of their own aggregate advance the
/// base metadata.
///
/// A model that pushes must query its own aggregate without an event-type
/// restriction: the processed sequence is what `Exact` expectations compare
/// against the aggregate's current version.
pub trait WriteModel {
    fn base(&self) -> &WriteModelBase;

    fn base_mut(&mut self) -> &mut WriteModelBase;

    fn query(&self) -> SearchQuery;

    fn reduce(&mut self, event: &StoredEvent) -> Result<()>;
}

/// Folds `events` (in position order) into `model`.
///
/// Events of the model's own aggregate that are already processed are
/// skipped, so the same model can be refreshed with the events a push just
/// returned.
pub fn append_and_reduce<M>(model: &mut M, events: &[StoredEvent]) -> Result<()>
where
    M: WriteModel + ?Sized,
{
    for event in events {
        let own = model.base().is_own(event);
        if own && event.sequence <= model.base().processed_sequence {
            continue;
        }
        model.reduce(event)?;
        if own {
            model.base_mut().observe(event);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::query::AggregateFilter;

    #[derive(Default)]
    struct CountingModel {
        base: WriteModelBase,
        own: u32,
        foreign: u32,
    }

    impl WriteModel for CountingModel {
        fn base(&self) -> &WriteModelBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut WriteModelBase {
            &mut self.base
        }

        fn query(&self) -> SearchQuery {
            SearchQuery::new().filter(AggregateFilter::new("thing"))
        }

        fn reduce(&mut self, event: &StoredEvent) -> Result<()> {
            if self.base.is_own(event) {
                self.own += 1;
            } else {
                self.foreign += 1;
            }
            Ok(())
        }
    }

    fn event(id: &str, sequence: u64, position: u64) -> StoredEvent {
        typed_event("thing", id, sequence, position)
    }

    fn typed_event(aggregate_type: &str, id: &str, sequence: u64, position: u64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::now_v7(),
            instance_id: "inst".into(),
            aggregate_type: aggregate_type.into(),
            aggregate_id: id.into(),
            resource_owner: "org1".into(),
            sequence,
            position,
            event_type: "thing.touched".into(),
            event_version: 1,
            creator: "actor".into(),
            created_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn own_events_advance_base() {
        let mut model = CountingModel {
            base: WriteModelBase::new("thing", "a", ""),
            ..CountingModel::default()
        };
        append_and_reduce(&mut model, &[event("a", 1, 1), event("b", 1, 2), event("a", 2, 3)]).unwrap();

        assert_eq!(model.own, 2);
        assert_eq!(model.foreign, 1);
        assert_eq!(model.base.processed_sequence, 2);
        assert_eq!(model.base.resource_owner, "org1");
        assert_eq!(model.base.instance_id, "inst");
        assert_eq!(model.base.expected_version(), ExpectedVersion::Exact(2));
        assert_eq!(model.base.object_details().sequence, 2);
    }

    #[test]
    fn already_processed_events_are_skipped() {
        let mut model = CountingModel {
            base: WriteModelBase::new("thing", "a", ""),
            ..CountingModel::default()
        };
        append_and_reduce(&mut model, &[event("a", 1, 1), event("a", 2, 2)]).unwrap();
        append_and_reduce(&mut model, &[event("a", 2, 2), event("a", 3, 4)]).unwrap();

        assert_eq!(model.own, 3);
        assert_eq!(model.base.processed_sequence, 3);
    }

    #[test]
    fn same_id_under_another_type_is_foreign() {
        let mut model = CountingModel {
            base: WriteModelBase::new("thing", "a", ""),
            ..CountingModel::default()
        };
        append_and_reduce(
            &mut model,
            &[event("a", 1, 1), event("a", 2, 2), typed_event("other", "a", 1, 3)],
        )
        .unwrap();

        assert_eq!(model.own, 2);
        assert_eq!(model.foreign, 1);
        assert_eq!(model.base.processed_sequence, 2);
    }
}
