use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use warden_core::{Exists, LifecycleState, Result};
use warden_events::{
    Aggregate, AggregateFilter, Event, FieldOperation, SearchQuery, StoredEvent,
    UniqueConstraint, WriteModel, WriteModelBase, impl_event_codec,
};

use crate::project::{AGGREGATE_TYPE, ProjectEvent, STATE_SEARCH_FIELD};

pub const GRANT_SEARCH_TYPE: &str = "project_grant";
pub const GRANTED_ORG_SEARCH_FIELD: &str = "granted_org_id";
pub const ROLE_KEY_SEARCH_FIELD: &str = "role_key";
/// A project is granted at most once to the same organization.
pub const GRANT_UNIQUE_TYPE: &str = "project_grant";

pub(crate) fn grant_unique_key(project_id: &str, granted_org_id: &str) -> String {
    format!("{project_id}:{granted_org_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGrantAdded {
    pub grant_id: String,
    pub granted_org_id: String,
    #[serde(default)]
    pub role_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGrantChanged {
    pub grant_id: String,
    pub role_keys: Vec<String>,
}

/// Role keys narrowed because a project role was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGrantCascadeChanged {
    pub grant_id: String,
    pub role_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGrantDeactivated {
    pub grant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGrantReactivated {
    pub grant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGrantRemoved {
    pub grant_id: String,
    pub granted_org_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectGrantEvent {
    Added(ProjectGrantAdded),
    Changed(ProjectGrantChanged),
    CascadeChanged(ProjectGrantCascadeChanged),
    Deactivated(ProjectGrantDeactivated),
    Reactivated(ProjectGrantReactivated),
    Removed(ProjectGrantRemoved),
}

impl_event_codec!(ProjectGrantEvent {
    Added => "project.grant.added",
    Changed => "project.grant.changed",
    CascadeChanged => "project.grant.cascade.changed",
    Deactivated => "project.grant.deactivated",
    Reactivated => "project.grant.reactivated",
    Removed => "project.grant.removed",
});

impl ProjectGrantEvent {
    pub fn grant_id(&self) -> &str {
        match self {
            ProjectGrantEvent::Added(e) => &e.grant_id,
            ProjectGrantEvent::Changed(e) => &e.grant_id,
            ProjectGrantEvent::CascadeChanged(e) => &e.grant_id,
            ProjectGrantEvent::Deactivated(e) => &e.grant_id,
            ProjectGrantEvent::Reactivated(e) => &e.grant_id,
            ProjectGrantEvent::Removed(e) => &e.grant_id,
        }
    }
}

fn role_key_fields(grant_id: &str, role_keys: &[String]) -> Result<Vec<FieldOperation>> {
    role_keys
        .iter()
        .map(|key| FieldOperation::add(GRANT_SEARCH_TYPE, grant_id, ROLE_KEY_SEARCH_FIELD, key))
        .collect()
}

impl Event for ProjectGrantEvent {
    fn fields(&self, _aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        let state = |grant_id: &str, state: LifecycleState| {
            FieldOperation::set(GRANT_SEARCH_TYPE, grant_id, STATE_SEARCH_FIELD, state)
        };
        Ok(match self {
            ProjectGrantEvent::Added(e) => {
                let mut ops = vec![
                    state(&e.grant_id, LifecycleState::Active)?,
                    FieldOperation::set(
                        GRANT_SEARCH_TYPE,
                        &e.grant_id,
                        GRANTED_ORG_SEARCH_FIELD,
                        &e.granted_org_id,
                    )?,
                ];
                ops.extend(role_key_fields(&e.grant_id, &e.role_keys)?);
                ops
            }
            ProjectGrantEvent::Changed(ProjectGrantChanged { grant_id, role_keys })
            | ProjectGrantEvent::CascadeChanged(ProjectGrantCascadeChanged { grant_id, role_keys }) => {
                let mut ops = vec![FieldOperation::remove_field(
                    GRANT_SEARCH_TYPE,
                    grant_id,
                    ROLE_KEY_SEARCH_FIELD,
                )];
                ops.extend(role_key_fields(grant_id, role_keys)?);
                ops
            }
            ProjectGrantEvent::Deactivated(e) => vec![state(&e.grant_id, LifecycleState::Inactive)?],
            ProjectGrantEvent::Reactivated(e) => vec![state(&e.grant_id, LifecycleState::Active)?],
            ProjectGrantEvent::Removed(e) => {
                vec![FieldOperation::remove_object(GRANT_SEARCH_TYPE, &e.grant_id)]
            }
        })
    }

    fn unique_constraints(&self, aggregate: &Aggregate) -> Vec<UniqueConstraint> {
        match self {
            ProjectGrantEvent::Added(e) => vec![UniqueConstraint::add(
                GRANT_UNIQUE_TYPE,
                grant_unique_key(&aggregate.id, &e.granted_org_id),
                "project is already granted to this organization",
            )],
            ProjectGrantEvent::Removed(e) => vec![UniqueConstraint::remove(
                GRANT_UNIQUE_TYPE,
                grant_unique_key(&aggregate.id, &e.granted_org_id),
            )],
            _ => Vec::new(),
        }
    }
}

/// Set difference between granted role keys and a requested set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleKeyDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl RoleKeyDiff {
    pub fn between(current: &[String], requested: &[String]) -> Self {
        let current: BTreeSet<&String> = current.iter().collect();
        let requested: BTreeSet<&String> = requested.iter().collect();
        Self {
            added: requested.difference(&current).map(|k| (*k).clone()).collect(),
            removed: current.difference(&requested).map(|k| (*k).clone()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// One grant of a project to another organization.
#[derive(Debug, Clone, Default)]
pub struct ProjectGrantWriteModel {
    pub base: WriteModelBase,
    pub grant_id: String,
    pub granted_org_id: String,
    pub role_keys: Vec<String>,
    pub state: LifecycleState,
}

impl ProjectGrantWriteModel {
    pub fn new(project_id: impl Into<String>, grant_id: impl Into<String>) -> Self {
        Self {
            base: WriteModelBase::new(AGGREGATE_TYPE, project_id, String::new()),
            grant_id: grant_id.into(),
            ..Self::default()
        }
    }
}

impl Exists for ProjectGrantWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}

impl WriteModel for ProjectGrantWriteModel {
    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    fn query(&self) -> SearchQuery {
        SearchQuery::new().filter(
            AggregateFilter::new(AGGREGATE_TYPE)
                .aggregate_id(self.base.aggregate_id.clone()),
        )
    }

    fn reduce(&mut self, event: &StoredEvent) -> Result<()> {
        if let Some(e) = event.decode::<ProjectGrantEvent>()? {
            if e.grant_id() != self.grant_id {
                return Ok(());
            }
            match e {
                ProjectGrantEvent::Added(e) => {
                    self.granted_org_id = e.granted_org_id;
                    self.role_keys = e.role_keys;
                    self.state = LifecycleState::Active;
                }
                ProjectGrantEvent::Changed(ProjectGrantChanged { role_keys, .. })
                | ProjectGrantEvent::CascadeChanged(ProjectGrantCascadeChanged { role_keys, .. }) => {
                    self.role_keys = role_keys;
                }
                ProjectGrantEvent::Deactivated(_) => self.state = LifecycleState::Inactive,
                ProjectGrantEvent::Reactivated(_) => self.state = LifecycleState::Active,
                ProjectGrantEvent::Removed(_) => self.state = LifecycleState::Removed,
            }
        } else if let Some(ProjectEvent::Removed(_)) = event.decode::<ProjectEvent>()? {
            self.state = LifecycleState::Removed;
        }
        Ok(())
    }
}
