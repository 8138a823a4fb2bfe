use serde::{Deserialize, Serialize};

use warden_core::{Exists, ObjectState, Result};
use warden_events::{
    Aggregate, AggregateFilter, Event, FieldOperation, SearchQuery, StoredEvent,
    UniqueConstraint, WriteModel, WriteModelBase, impl_event_codec,
};

use crate::project::{AGGREGATE_TYPE, ProjectEvent};

pub const ROLE_SEARCH_TYPE: &str = "project_role";
pub const KEY_SEARCH_FIELD: &str = "key";
pub const ROLE_UNIQUE_TYPE: &str = "project_role";

pub(crate) fn role_unique_key(project_id: &str, key: &str) -> String {
    format!("{project_id}:{key}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRoleAdded {
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub group: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRoleChanged {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRoleRemoved {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRoleEvent {
    Added(ProjectRoleAdded),
    Changed(ProjectRoleChanged),
    Removed(ProjectRoleRemoved),
}

impl_event_codec!(ProjectRoleEvent {
    Added => "project.role.added",
    Changed => "project.role.changed",
    Removed => "project.role.removed",
});

impl Event for ProjectRoleEvent {
    fn fields(&self, _aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        Ok(match self {
            ProjectRoleEvent::Added(e) => {
                vec![FieldOperation::add(ROLE_SEARCH_TYPE, &e.key, KEY_SEARCH_FIELD, &e.key)?]
            }
            ProjectRoleEvent::Removed(e) => {
                vec![FieldOperation::remove_object(ROLE_SEARCH_TYPE, &e.key)]
            }
            ProjectRoleEvent::Changed(_) => Vec::new(),
        })
    }

    fn unique_constraints(&self, aggregate: &Aggregate) -> Vec<UniqueConstraint> {
        match self {
            ProjectRoleEvent::Added(e) => vec![UniqueConstraint::add(
                ROLE_UNIQUE_TYPE,
                role_unique_key(&aggregate.id, &e.key),
                "role key already exists on the project",
            )],
            ProjectRoleEvent::Removed(e) => vec![UniqueConstraint::remove(
                ROLE_UNIQUE_TYPE,
                role_unique_key(&aggregate.id, &e.key),
            )],
            ProjectRoleEvent::Changed(_) => Vec::new(),
        }
    }
}

/// One role of a project, addressed by its key.
#[derive(Debug, Clone, Default)]
pub struct ProjectRoleWriteModel {
    pub base: WriteModelBase,
    pub key: String,
    pub display_name: String,
    pub group: String,
    pub state: ObjectState,
}

impl ProjectRoleWriteModel {
    pub fn new(project_id: impl Into<String>, org_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            base: WriteModelBase::new(AGGREGATE_TYPE, project_id, org_id),
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn change_event(
        &self,
        display_name: Option<String>,
        group: Option<String>,
    ) -> Option<ProjectRoleChanged> {
        let event = ProjectRoleChanged {
            key: self.key.clone(),
            display_name: display_name.filter(|v| *v != self.display_name),
            group: group.filter(|v| *v != self.group),
        };
        (event.display_name.is_some() || event.group.is_some()).then_some(event)
    }
}

impl Exists for ProjectRoleWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}

impl WriteModel for ProjectRoleWriteModel {
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
        if let Some(e) = event.decode::<ProjectRoleEvent>()? {
            match e {
                ProjectRoleEvent::Added(e) if e.key == self.key => {
                    self.display_name = e.display_name;
                    self.group = e.group;
                    self.state = ObjectState::Active;
                }
                ProjectRoleEvent::Changed(e) if e.key == self.key => {
                    if let Some(display_name) = e.display_name {
                        self.display_name = display_name;
                    }
                    if let Some(group) = e.group {
                        self.group = group;
                    }
                }
                ProjectRoleEvent::Removed(e) if e.key == self.key => {
                    self.state = ObjectState::Removed;
                }
                _ => {}
            }
        } else if let Some(ProjectEvent::Removed(_)) = event.decode::<ProjectEvent>()? {
            self.state = ObjectState::Removed;
        }
        Ok(())
    }
}
