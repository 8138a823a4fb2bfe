use serde::{Deserialize, Serialize};

use crate::stored::StoredEvent;

/// Matches events by aggregate type, aggregate id and event type. Empty
/// lists match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateFilter {
    pub aggregate_types: Vec<String>,
    pub aggregate_ids: Vec<String>,
    pub event_types: Vec<String>,
}

impl AggregateFilter {
    pub fn new(aggregate_type: impl Into<String>) -> Self {
        Self {
            aggregate_types: vec![aggregate_type.into()],
            ..Self::default()
        }
    }

    pub fn aggregate_id(mut self, id: impl Into<String>) -> Self {
        self.aggregate_ids.push(id.into());
        self
    }

    pub fn aggregate_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aggregate_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn event_types(mut self, types: &[&str]) -> Self {
        self.event_types.extend(types.iter().map(|t| t.to_string()));
        self
    }

    pub fn matches(&self, event: &StoredEvent) -> bool {
        fn any_or(list: &[String], value: &str) -> bool {
            list.is_empty() || list.iter().any(|v| v == value)
        }
        any_or(&self.aggregate_types, &event.aggregate_type)
            && any_or(&self.aggregate_ids, &event.aggregate_id)
            && any_or(&self.event_types, &event.event_type)
    }
}

/// Event query. Filters are OR-ed; instance and resource owner restrict all
/// of them. Results are ordered by global position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub instance_id: Option<String>,
    pub resource_owner: Option<String>,
    pub filters: Vec<AggregateFilter>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn resource_owner(mut self, resource_owner: impl Into<String>) -> Self {
        self.resource_owner = Some(resource_owner.into());
        self
    }

    /// Restricts to `resource_owner` unless it is empty (owner not known yet).
    pub fn owned_by(self, resource_owner: &str) -> Self {
        if resource_owner.is_empty() {
            self
        } else {
            self.resource_owner(resource_owner)
        }
    }

    pub fn filter(mut self, filter: AggregateFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn matches(&self, event: &StoredEvent) -> bool {
        if self
            .instance_id
            .as_deref()
            .is_some_and(|i| i != event.instance_id)
        {
            return false;
        }
        if self
            .resource_owner
            .as_deref()
            .is_some_and(|o| o != event.resource_owner)
        {
            return false;
        }
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(event))
    }
}
