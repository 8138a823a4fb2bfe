use serde::{Deserialize, Serialize};

use warden_core::{Exists, LifecycleState, Result};
use warden_events::{
    Aggregate, AggregateFilter, Event, FieldOperation, SearchQuery, StoredEvent,
    UniqueConstraint, WriteModel, WriteModelBase, impl_event_codec,
};

pub const AGGREGATE_TYPE: &str = "user_grant";
pub const USER_GRANT_SEARCH_TYPE: &str = "user_grant";
pub const STATE_SEARCH_FIELD: &str = "state";
/// One grant per `(user, project, project grant)`.
pub const USER_GRANT_UNIQUE_TYPE: &str = "user_grant";

pub fn aggregate(user_grant_id: &str, org_id: &str, instance_id: &str) -> Aggregate {
    Aggregate::new(AGGREGATE_TYPE, user_grant_id, org_id, instance_id)
}

fn unique_key(user_id: &str, project_id: &str, project_grant_id: Option<&str>) -> String {
    format!("{user_id}:{project_id}:{}", project_grant_id.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrantAdded {
    pub user_id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_grant_id: Option<String>,
    #[serde(default)]
    pub role_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrantChanged {
    pub role_keys: Vec<String>,
}

/// Role keys narrowed because a role or project grant went away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrantCascadeChanged {
    pub role_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrantDeactivated {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrantReactivated {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrantRemoved {
    pub user_id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_grant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserGrantEvent {
    Added(UserGrantAdded),
    Changed(UserGrantChanged),
    CascadeChanged(UserGrantCascadeChanged),
    Deactivated(UserGrantDeactivated),
    Reactivated(UserGrantReactivated),
    Removed(UserGrantRemoved),
    CascadeRemoved(UserGrantRemoved),
}

impl_event_codec!(UserGrantEvent {
    Added => "user.grant.added",
    Changed => "user.grant.changed",
    CascadeChanged => "user.grant.cascade.changed",
    Deactivated => "user.grant.deactivated",
    Reactivated => "user.grant.reactivated",
    Removed => "user.grant.removed",
    CascadeRemoved => "user.grant.cascade.removed",
});

impl Event for UserGrantEvent {
    fn fields(&self, aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        let state = |state: LifecycleState| {
            FieldOperation::set(USER_GRANT_SEARCH_TYPE, &aggregate.id, STATE_SEARCH_FIELD, state)
                .map(|op| vec![op])
        };
        match self {
            UserGrantEvent::Added(_) | UserGrantEvent::Reactivated(_) => state(LifecycleState::Active),
            UserGrantEvent::Deactivated(_) => state(LifecycleState::Inactive),
            UserGrantEvent::Removed(_) | UserGrantEvent::CascadeRemoved(_) => {
                Ok(vec![FieldOperation::RemoveAggregate])
            }
            UserGrantEvent::Changed(_) | UserGrantEvent::CascadeChanged(_) => Ok(Vec::new()),
        }
    }

    fn unique_constraints(&self, _aggregate: &Aggregate) -> Vec<UniqueConstraint> {
        match self {
            UserGrantEvent::Added(e) => vec![UniqueConstraint::add(
                USER_GRANT_UNIQUE_TYPE,
                unique_key(&e.user_id, &e.project_id, e.project_grant_id.as_deref()),
                "user already has a grant on this project",
            )],
            UserGrantEvent::Removed(e) | UserGrantEvent::CascadeRemoved(e) => {
                vec![UniqueConstraint::remove(
                    USER_GRANT_UNIQUE_TYPE,
                    unique_key(&e.user_id, &e.project_id, e.project_grant_id.as_deref()),
                )]
            }
            _ => Vec::new(),
        }
    }
}

/// State of one user grant.
#[derive(Debug, Clone, Default)]
pub struct UserGrantWriteModel {
    pub base: WriteModelBase,
    pub user_id: String,
    pub project_id: String,
    pub project_grant_id: Option<String>,
    pub role_keys: Vec<String>,
    pub state: LifecycleState,
}

impl UserGrantWriteModel {
    /// An empty `org_id` matches any owner; it is filled from the events.
    pub fn new(user_grant_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            base: WriteModelBase::new(AGGREGATE_TYPE, user_grant_id, org_id),
            ..Self::default()
        }
    }

    pub fn removed_payload(&self) -> UserGrantRemoved {
        UserGrantRemoved {
            user_id: self.user_id.clone(),
            project_id: self.project_id.clone(),
            project_grant_id: self.project_grant_id.clone(),
        }
    }

    pub fn has_role(&self, key: &str) -> bool {
        self.role_keys.iter().any(|k| k == key)
    }
}

impl Exists for UserGrantWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}

impl WriteModel for UserGrantWriteModel {
    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    fn query(&self) -> SearchQuery {
        SearchQuery::new()
            .filter(
                AggregateFilter::new(AGGREGATE_TYPE)
                    .aggregate_id(self.base.aggregate_id.clone()),
            )
            .owned_by(&self.base.resource_owner)
    }

    fn reduce(&mut self, event: &StoredEvent) -> Result<()> {
        let Some(e) = event.decode::<UserGrantEvent>()? else {
            return Ok(());
        };
        match e {
            UserGrantEvent::Added(e) => {
                self.user_id = e.user_id;
                self.project_id = e.project_id;
                self.project_grant_id = e.project_grant_id;
                self.role_keys = e.role_keys;
                self.state = LifecycleState::Active;
            }
            UserGrantEvent::Changed(UserGrantChanged { role_keys })
            | UserGrantEvent::CascadeChanged(UserGrantCascadeChanged { role_keys }) => {
                self.role_keys = role_keys;
            }
            UserGrantEvent::Deactivated(_) => self.state = LifecycleState::Inactive,
            UserGrantEvent::Reactivated(_) => self.state = LifecycleState::Active,
            UserGrantEvent::Removed(_) | UserGrantEvent::CascadeRemoved(_) => {
                self.state = LifecycleState::Removed;
            }
        }
        Ok(())
    }
}
