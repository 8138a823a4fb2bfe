use serde::{Deserialize, Serialize};

use warden_core::{Exists, LifecycleState, Result};
use warden_events::{
    Aggregate, AggregateFilter, Event, FieldOperation, SearchQuery, StoredEvent,
    UniqueConstraint, WriteModel, WriteModelBase, impl_event_codec,
};

use crate::grant::{GRANT_UNIQUE_TYPE, ProjectGrantEvent, grant_unique_key};
use crate::role::{ProjectRoleEvent, ROLE_UNIQUE_TYPE, role_unique_key};

pub const AGGREGATE_TYPE: &str = "project";
pub const PROJECT_SEARCH_TYPE: &str = "project";
pub const STATE_SEARCH_FIELD: &str = "state";
/// Project names are unique per owning organization.
pub const NAME_UNIQUE_TYPE: &str = "project_name";

pub fn aggregate(project_id: &str, org_id: &str, instance_id: &str) -> Aggregate {
    Aggregate::new(AGGREGATE_TYPE, project_id, org_id, instance_id)
}

fn name_unique_key(aggregate: &Aggregate, name: &str) -> String {
    format!("{}:{name}", aggregate.resource_owner)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAdded {
    pub name: String,
    #[serde(default)]
    pub project_role_assertion: bool,
    #[serde(default)]
    pub project_role_check: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectChanged {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_role_assertion: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_role_check: Option<bool>,
    #[serde(skip)]
    pub old_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDeactivated {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReactivated {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRemoved {
    pub name: String,
    /// Role keys whose reservations go away with the project.
    #[serde(skip)]
    pub role_keys: Vec<String>,
    #[serde(skip)]
    pub granted_org_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectEvent {
    Added(ProjectAdded),
    Changed(ProjectChanged),
    Deactivated(ProjectDeactivated),
    Reactivated(ProjectReactivated),
    Removed(ProjectRemoved),
}

impl_event_codec!(ProjectEvent {
    Added => "project.added",
    Changed => "project.changed",
    Deactivated => "project.deactivated",
    Reactivated => "project.reactivated",
    Removed => "project.removed",
});

impl Event for ProjectEvent {
    fn fields(&self, aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        let state = |state: LifecycleState| {
            FieldOperation::set(PROJECT_SEARCH_TYPE, &aggregate.id, STATE_SEARCH_FIELD, state)
                .map(|op| vec![op])
        };
        match self {
            ProjectEvent::Added(_) | ProjectEvent::Reactivated(_) => state(LifecycleState::Active),
            ProjectEvent::Deactivated(_) => state(LifecycleState::Inactive),
            ProjectEvent::Changed(_) => Ok(Vec::new()),
            ProjectEvent::Removed(_) => Ok(vec![FieldOperation::RemoveAggregate]),
        }
    }

    fn unique_constraints(&self, aggregate: &Aggregate) -> Vec<UniqueConstraint> {
        const TAKEN: &str = "project name is already taken in this organization";
        match self {
            ProjectEvent::Added(e) => vec![UniqueConstraint::add(
                NAME_UNIQUE_TYPE,
                name_unique_key(aggregate, &e.name),
                TAKEN,
            )],
            ProjectEvent::Changed(ProjectChanged {
                name: Some(name),
                old_name,
                ..
            }) => vec![
                UniqueConstraint::remove(NAME_UNIQUE_TYPE, name_unique_key(aggregate, old_name)),
                UniqueConstraint::add(NAME_UNIQUE_TYPE, name_unique_key(aggregate, name), TAKEN),
            ],
            ProjectEvent::Removed(e) => {
                let mut constraints = vec![UniqueConstraint::remove(
                    NAME_UNIQUE_TYPE,
                    name_unique_key(aggregate, &e.name),
                )];
                constraints.extend(e.role_keys.iter().map(|key| {
                    UniqueConstraint::remove(ROLE_UNIQUE_TYPE, role_unique_key(&aggregate.id, key))
                }));
                constraints.extend(e.granted_org_ids.iter().map(|org| {
                    UniqueConstraint::remove(GRANT_UNIQUE_TYPE, grant_unique_key(&aggregate.id, org))
                }));
                constraints
            }
            _ => Vec::new(),
        }
    }
}

/// Requested project settings; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub project_role_assertion: Option<bool>,
    pub project_role_check: Option<bool>,
}

/// State of one project, including what its removal must release.
#[derive(Debug, Clone, Default)]
pub struct ProjectWriteModel {
    pub base: WriteModelBase,
    pub name: String,
    pub project_role_assertion: bool,
    pub project_role_check: bool,
    pub state: LifecycleState,
    pub role_keys: Vec<String>,
    /// `(grant_id, granted_org_id)` of every live grant.
    pub grants: Vec<(String, String)>,
}

impl ProjectWriteModel {
    pub fn new(project_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            base: WriteModelBase::new(AGGREGATE_TYPE, project_id, org_id),
            ..Self::default()
        }
    }

    pub fn change_event(&self, changes: ProjectChanges) -> Option<ProjectChanged> {
        let event = ProjectChanged {
            name: changes.name.filter(|n| *n != self.name),
            project_role_assertion: changes
                .project_role_assertion
                .filter(|v| *v != self.project_role_assertion),
            project_role_check: changes
                .project_role_check
                .filter(|v| *v != self.project_role_check),
            old_name: self.name.clone(),
        };
        let changed = event.name.is_some()
            || event.project_role_assertion.is_some()
            || event.project_role_check.is_some();
        changed.then_some(event)
    }

    pub fn removed_event(&self) -> ProjectRemoved {
        ProjectRemoved {
            name: self.name.clone(),
            role_keys: self.role_keys.clone(),
            granted_org_ids: self.grants.iter().map(|(_, org)| org.clone()).collect(),
        }
    }

    pub fn has_role(&self, key: &str) -> bool {
        self.role_keys.iter().any(|k| k == key)
    }
}

impl Exists for ProjectWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}

impl WriteModel for ProjectWriteModel {
    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    fn query(&self) -> SearchQuery {
        let query = SearchQuery::new().filter(
            AggregateFilter::new(AGGREGATE_TYPE)
                .aggregate_id(self.base.aggregate_id.clone()),
        );
        query.owned_by(&self.base.resource_owner)
    }

    fn reduce(&mut self, event: &StoredEvent) -> Result<()> {
        if let Some(e) = event.decode::<ProjectEvent>()? {
            match e {
                ProjectEvent::Added(e) => {
                    self.name = e.name;
                    self.project_role_assertion = e.project_role_assertion;
                    self.project_role_check = e.project_role_check;
                    self.state = LifecycleState::Active;
                }
                ProjectEvent::Changed(e) => {
                    if let Some(name) = e.name {
                        self.name = name;
                    }
                    if let Some(v) = e.project_role_assertion {
                        self.project_role_assertion = v;
                    }
                    if let Some(v) = e.project_role_check {
                        self.project_role_check = v;
                    }
                }
                ProjectEvent::Deactivated(_) => self.state = LifecycleState::Inactive,
                ProjectEvent::Reactivated(_) => self.state = LifecycleState::Active,
                ProjectEvent::Removed(_) => {
                    self.state = LifecycleState::Removed;
                    self.role_keys.clear();
                    self.grants.clear();
                }
            }
        } else if let Some(e) = event.decode::<ProjectRoleEvent>()? {
            match e {
                ProjectRoleEvent::Added(e) => self.role_keys.push(e.key),
                ProjectRoleEvent::Removed(e) => self.role_keys.retain(|k| *k != e.key),
                ProjectRoleEvent::Changed(_) => {}
            }
        } else if let Some(e) = event.decode::<ProjectGrantEvent>()? {
            match e {
                ProjectGrantEvent::Added(e) => self.grants.push((e.grant_id, e.granted_org_id)),
                ProjectGrantEvent::Removed(e) => self.grants.retain(|(id, _)| *id != e.grant_id),
                _ => {}
            }
        }
        Ok(())
    }
}
