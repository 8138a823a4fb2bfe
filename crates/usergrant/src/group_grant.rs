use serde::{Deserialize, Serialize};

use warden_core::{Exists, LifecycleState, Result};
use warden_events::{
    Aggregate, AggregateFilter, Event, FieldOperation, SearchQuery, StoredEvent,
    UniqueConstraint, WriteModel, WriteModelBase, impl_event_codec,
};

use crate::grant::STATE_SEARCH_FIELD;

pub const GROUP_GRANT_AGGREGATE_TYPE: &str = "group_grant";
pub const GROUP_GRANT_SEARCH_TYPE: &str = "group_grant";
/// One grant per `(group, project, project grant)`.
pub const GROUP_GRANT_UNIQUE_TYPE: &str = "group_grant";

pub fn group_grant_aggregate(group_grant_id: &str, org_id: &str, instance_id: &str) -> Aggregate {
    Aggregate::new(GROUP_GRANT_AGGREGATE_TYPE, group_grant_id, org_id, instance_id)
}

fn unique_key(group_id: &str, project_id: &str, project_grant_id: Option<&str>) -> String {
    format!("{group_id}:{project_id}:{}", project_grant_id.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupGrantAdded {
    pub group_id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_grant_id: Option<String>,
    #[serde(default)]
    pub role_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupGrantChanged {
    pub role_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupGrantDeactivated {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupGrantReactivated {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupGrantRemoved {
    pub group_id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_grant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupGrantEvent {
    Added(GroupGrantAdded),
    Changed(GroupGrantChanged),
    /// Role keys narrowed because a project role went away.
    CascadeChanged(GroupGrantChanged),
    Deactivated(GroupGrantDeactivated),
    Reactivated(GroupGrantReactivated),
    Removed(GroupGrantRemoved),
    CascadeRemoved(GroupGrantRemoved),
}

impl_event_codec!(GroupGrantEvent {
    Added => "group.grant.added",
    Changed => "group.grant.changed",
    CascadeChanged => "group.grant.cascade.changed",
    Deactivated => "group.grant.deactivated",
    Reactivated => "group.grant.reactivated",
    Removed => "group.grant.removed",
    CascadeRemoved => "group.grant.cascade.removed",
});

impl Event for GroupGrantEvent {
    fn fields(&self, aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        let state = |state: LifecycleState| {
            FieldOperation::set(GROUP_GRANT_SEARCH_TYPE, &aggregate.id, STATE_SEARCH_FIELD, state)
                .map(|op| vec![op])
        };
        match self {
            GroupGrantEvent::Added(_) | GroupGrantEvent::Reactivated(_) => state(LifecycleState::Active),
            GroupGrantEvent::Deactivated(_) => state(LifecycleState::Inactive),
            GroupGrantEvent::Removed(_) | GroupGrantEvent::CascadeRemoved(_) => {
                Ok(vec![FieldOperation::RemoveAggregate])
            }
            GroupGrantEvent::Changed(_) | GroupGrantEvent::CascadeChanged(_) => Ok(Vec::new()),
        }
    }

    fn unique_constraints(&self, _aggregate: &Aggregate) -> Vec<UniqueConstraint> {
        match self {
            GroupGrantEvent::Added(e) => vec![UniqueConstraint::add(
                GROUP_GRANT_UNIQUE_TYPE,
                unique_key(&e.group_id, &e.project_id, e.project_grant_id.as_deref()),
                "group already has a grant on this project",
            )],
            GroupGrantEvent::Removed(e) | GroupGrantEvent::CascadeRemoved(e) => {
                vec![UniqueConstraint::remove(
                    GROUP_GRANT_UNIQUE_TYPE,
                    unique_key(&e.group_id, &e.project_id, e.project_grant_id.as_deref()),
                )]
            }
            _ => Vec::new(),
        }
    }
}

/// State of one group grant.
#[derive(Debug, Clone, Default)]
pub struct GroupGrantWriteModel {
    pub base: WriteModelBase,
    pub group_id: String,
    pub project_id: String,
    pub project_grant_id: Option<String>,
    pub role_keys: Vec<String>,
    pub state: LifecycleState,
}

impl GroupGrantWriteModel {
    /// An empty `org_id` matches any owner; it is filled from the events.
    pub fn new(group_grant_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            base: WriteModelBase::new(GROUP_GRANT_AGGREGATE_TYPE, group_grant_id, org_id),
            ..Self::default()
        }
    }

    pub fn removed_payload(&self) -> GroupGrantRemoved {
        GroupGrantRemoved {
            group_id: self.group_id.clone(),
            project_id: self.project_id.clone(),
            project_grant_id: self.project_grant_id.clone(),
        }
    }

    /// Remaining keys once `removed` are stripped, or `None` if the grant
    /// holds none of them.
    pub fn without_roles(&self, removed: &[String]) -> Option<Vec<String>> {
        if !self.role_keys.iter().any(|k| removed.contains(k)) {
            return None;
        }
        Some(
            self.role_keys
                .iter()
                .filter(|k| !removed.contains(k))
                .cloned()
                .collect(),
        )
    }
}

impl Exists for GroupGrantWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}

impl WriteModel for GroupGrantWriteModel {
    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    fn query(&self) -> SearchQuery {
        SearchQuery::new()
            .filter(
                AggregateFilter::new(GROUP_GRANT_AGGREGATE_TYPE)
                    .aggregate_id(self.base.aggregate_id.clone()),
            )
            .owned_by(&self.base.resource_owner)
    }

    fn reduce(&mut self, event: &StoredEvent) -> Result<()> {
        let Some(e) = event.decode::<GroupGrantEvent>()? else {
            return Ok(());
        };
        match e {
            GroupGrantEvent::Added(e) => {
                self.group_id = e.group_id;
                self.project_id = e.project_id;
                self.project_grant_id = e.project_grant_id;
                self.role_keys = e.role_keys;
                self.state = LifecycleState::Active;
            }
            GroupGrantEvent::Changed(e) | GroupGrantEvent::CascadeChanged(e) => {
                self.role_keys = e.role_keys;
            }
            GroupGrantEvent::Deactivated(_) => self.state = LifecycleState::Inactive,
            GroupGrantEvent::Reactivated(_) => self.state = LifecycleState::Active,
            GroupGrantEvent::Removed(_) | GroupGrantEvent::CascadeRemoved(_) => {
                self.state = LifecycleState::Removed;
            }
        }
        Ok(())
    }
}
