use serde::{Deserialize, Serialize};

use warden_core::{Exists, LifecycleState, Result};
use warden_events::{
    Aggregate, AggregateFilter, Event, FieldOperation, SearchQuery, StoredEvent,
    UniqueConstraint, WriteModel, WriteModelBase, impl_event_codec,
};

pub const GROUP_AGGREGATE_TYPE: &str = "group";
pub const GROUP_SEARCH_TYPE: &str = "group";
/// Group names are unique within their organization.
pub const GROUP_NAME_UNIQUE_TYPE: &str = "group_name";

pub fn group_aggregate(group_id: &str, org_id: &str, instance_id: &str) -> Aggregate {
    Aggregate::new(GROUP_AGGREGATE_TYPE, group_id, org_id, instance_id)
}

fn name_key(org_id: &str, name: &str) -> String {
    format!("{org_id}:{name}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAdded {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRemoved {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEvent {
    Added(GroupAdded),
    Removed(GroupRemoved),
}

impl_event_codec!(GroupEvent {
    Added => "group.added",
    Removed => "group.removed",
});

impl Event for GroupEvent {
    fn fields(&self, aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        Ok(match self {
            GroupEvent::Added(_) => vec![FieldOperation::set(
                GROUP_SEARCH_TYPE,
                &aggregate.id,
                crate::STATE_SEARCH_FIELD,
                LifecycleState::Active,
            )?],
            GroupEvent::Removed(_) => vec![FieldOperation::RemoveAggregate],
        })
    }

    fn unique_constraints(&self, aggregate: &Aggregate) -> Vec<UniqueConstraint> {
        match self {
            GroupEvent::Added(e) => vec![UniqueConstraint::add(
                GROUP_NAME_UNIQUE_TYPE,
                name_key(&aggregate.resource_owner, &e.name),
                "group name is already taken in the organization",
            )],
            GroupEvent::Removed(e) => vec![UniqueConstraint::remove(
                GROUP_NAME_UNIQUE_TYPE,
                name_key(&aggregate.resource_owner, &e.name),
            )],
        }
    }
}

/// A named set of users that can be granted project roles as a whole.
#[derive(Debug, Clone, Default)]
pub struct GroupWriteModel {
    pub base: WriteModelBase,
    pub name: String,
    pub description: String,
    pub state: LifecycleState,
}

impl GroupWriteModel {
    pub fn new(group_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            base: WriteModelBase::new(GROUP_AGGREGATE_TYPE, group_id, org_id),
            ..Self::default()
        }
    }
}

impl Exists for GroupWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}

impl WriteModel for GroupWriteModel {
    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    fn query(&self) -> SearchQuery {
        SearchQuery::new()
            .filter(
                AggregateFilter::new(GROUP_AGGREGATE_TYPE)
                    .aggregate_id(self.base.aggregate_id.clone()),
            )
            .owned_by(&self.base.resource_owner)
    }

    fn reduce(&mut self, event: &StoredEvent) -> Result<()> {
        match event.decode::<GroupEvent>()? {
            Some(GroupEvent::Added(e)) => {
                self.name = e.name;
                self.description = e.description;
                self.state = LifecycleState::Active;
            }
            Some(GroupEvent::Removed(_)) => self.state = LifecycleState::Removed,
            None => {}
        }
        Ok(())
    }
}
