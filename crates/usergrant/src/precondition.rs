//! Cross-aggregate preconditions of adding or changing a user or group grant.
//!
//! The facts can be gathered two ways: from the secondary field index (the
//! command layer's default) or by replaying the grantee, project and org
//! streams through [`GrantPreConditionReadModel`]. Both feed the same
//! [`GrantPreconditions::check`].

use warden_core::{Error, LifecycleState, Result};
use warden_events::{
    AggregateFilter, EventCodec, SearchQuery, StoredEvent, WriteModel, WriteModelBase,
};
use warden_org::OrgEvent;
use warden_project::{ProjectEvent, ProjectGrantEvent, ProjectRoleEvent};
use warden_user::{GroupEvent, UserEvent};

/// Who receives the roles of a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grantee {
    User(String),
    /// Groups can only be granted roles inside their own organization.
    Group(String),
}

impl Default for Grantee {
    fn default() -> Self {
        Grantee::User(String::new())
    }
}

/// What is known about the project grant a user grant refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantFacts {
    pub granted_org_id: String,
    pub role_keys: Vec<String>,
    pub state: LifecycleState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantPreconditions {
    pub grantee_exists: bool,
    pub org_state: LifecycleState,
    pub project_state: LifecycleState,
    /// Organization owning the project.
    pub project_owner: String,
    pub project_roles: Vec<String>,
    pub grant: Option<GrantFacts>,
}

impl GrantPreconditions {
    /// Validates a grant of `role_keys` owned by `org_id`.
    ///
    /// Without a project grant the project must belong to `org_id` and the
    /// keys must be project roles; with one, the grant must be given to
    /// `org_id` and the keys must be part of it.
    pub fn check(
        &self,
        org_id: &str,
        project_grant_id: Option<&str>,
        role_keys: &[String],
    ) -> Result<()> {
        if !self.grantee_exists {
            return Err(Error::precondition("grantee does not exist"));
        }
        if !self.project_state.is_active() {
            return Err(Error::precondition("project is not active"));
        }
        if !self.org_state.is_active() {
            return Err(Error::precondition("organization is not active"));
        }

        let available = match project_grant_id {
            Some(grant_id) => {
                let grant = self
                    .grant
                    .as_ref()
                    .filter(|g| matches!(g.state, LifecycleState::Active | LifecycleState::Inactive))
                    .ok_or_else(|| Error::precondition(format!("project grant {grant_id} does not exist")))?;
                if grant.granted_org_id != org_id {
                    return Err(Error::precondition(
                        "project grant is not granted to the organization",
                    ));
                }
                &grant.role_keys
            }
            None => {
                if self.project_owner != org_id {
                    return Err(Error::precondition(
                        "project belongs to another organization; a project grant is required",
                    ));
                }
                &self.project_roles
            }
        };

        if let Some(missing) = role_keys.iter().find(|k| !available.contains(k)) {
            return Err(Error::precondition(format!("role {missing} is not available")));
        }
        Ok(())
    }
}

/// Replays the grantee, project and org streams a grant depends on.
///
/// None of the folded aggregates is the model's own, so the base metadata
/// only carries the resource owner.
#[derive(Debug, Clone, Default)]
pub struct GrantPreConditionReadModel {
    pub base: WriteModelBase,
    pub grantee: Grantee,
    pub project_id: String,
    pub project_grant_id: Option<String>,
    pub facts: GrantPreconditions,
}

impl GrantPreConditionReadModel {
    pub fn new(
        org_id: impl Into<String>,
        grantee: Grantee,
        project_id: impl Into<String>,
        project_grant_id: Option<String>,
    ) -> Self {
        Self {
            base: WriteModelBase::new(String::new(), String::new(), org_id),
            grantee,
            project_id: project_id.into(),
            project_grant_id,
            facts: GrantPreconditions::default(),
        }
    }

    pub fn check(&self, role_keys: &[String]) -> Result<()> {
        self.facts
            .check(&self.base.resource_owner, self.project_grant_id.as_deref(), role_keys)
    }

    fn reduce_grant(&mut self, event: ProjectGrantEvent) {
        if self.project_grant_id.as_deref() != Some(event.grant_id()) {
            return;
        }
        let grant = self.facts.grant.get_or_insert_with(GrantFacts::default);
        match event {
            ProjectGrantEvent::Added(e) => {
                grant.granted_org_id = e.granted_org_id;
                grant.role_keys = e.role_keys;
                grant.state = LifecycleState::Active;
            }
            ProjectGrantEvent::Changed(e) => grant.role_keys = e.role_keys,
            ProjectGrantEvent::CascadeChanged(e) => grant.role_keys = e.role_keys,
            ProjectGrantEvent::Deactivated(_) => grant.state = LifecycleState::Inactive,
            ProjectGrantEvent::Reactivated(_) => grant.state = LifecycleState::Active,
            ProjectGrantEvent::Removed(_) => grant.state = LifecycleState::Removed,
        }
    }
}

impl WriteModel for GrantPreConditionReadModel {
    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    fn query(&self) -> SearchQuery {
        let grantee = match &self.grantee {
            Grantee::User(user_id) => AggregateFilter::new(warden_user::AGGREGATE_TYPE)
                .aggregate_id(user_id.clone())
                .event_types(&["user.human.added", "user.removed"]),
            Grantee::Group(group_id) => AggregateFilter::new(warden_user::GROUP_AGGREGATE_TYPE)
                .aggregate_id(group_id.clone())
                .event_types(GroupEvent::EVENT_TYPES),
        };
        SearchQuery::new()
            .filter(grantee)
            .filter(
                AggregateFilter::new(warden_project::AGGREGATE_TYPE)
                    .aggregate_id(self.project_id.clone())
                    .event_types(ProjectEvent::EVENT_TYPES)
                    .event_types(ProjectRoleEvent::EVENT_TYPES)
                    .event_types(ProjectGrantEvent::EVENT_TYPES),
            )
            .filter(
                AggregateFilter::new(warden_org::AGGREGATE_TYPE)
                    .aggregate_id(self.base.resource_owner.clone())
                    .event_types(OrgEvent::EVENT_TYPES),
            )
    }

    fn reduce(&mut self, event: &StoredEvent) -> Result<()> {
        if let Some(e) = event.decode::<UserEvent>()? {
            match e {
                UserEvent::HumanAdded(_) => self.facts.grantee_exists = true,
                UserEvent::Removed(_) => self.facts.grantee_exists = false,
                _ => {}
            }
        } else if let Some(e) = event.decode::<GroupEvent>()? {
            self.facts.grantee_exists = matches!(e, GroupEvent::Added(_))
                && event.resource_owner == self.base.resource_owner;
        } else if let Some(e) = event.decode::<OrgEvent>()? {
            self.facts.org_state = match e {
                OrgEvent::Added(_) | OrgEvent::Reactivated(_) => LifecycleState::Active,
                OrgEvent::Deactivated(_) => LifecycleState::Inactive,
                OrgEvent::Removed(_) => LifecycleState::Removed,
                OrgEvent::Changed(_) => self.facts.org_state,
            };
        } else if let Some(e) = event.decode::<ProjectEvent>()? {
            match e {
                ProjectEvent::Added(_) | ProjectEvent::Reactivated(_) => {
                    self.facts.project_state = LifecycleState::Active;
                    self.facts.project_owner.clone_from(&event.resource_owner);
                }
                ProjectEvent::Deactivated(_) => self.facts.project_state = LifecycleState::Inactive,
                ProjectEvent::Removed(_) => self.facts.project_state = LifecycleState::Removed,
                ProjectEvent::Changed(_) => {}
            }
        } else if let Some(e) = event.decode::<ProjectRoleEvent>()? {
            match e {
                ProjectRoleEvent::Added(e) => self.facts.project_roles.push(e.key),
                ProjectRoleEvent::Removed(e) => self.facts.project_roles.retain(|k| *k != e.key),
                ProjectRoleEvent::Changed(_) => {}
            }
        } else if let Some(e) = event.decode::<ProjectGrantEvent>()? {
            self.reduce_grant(e);
        }
        Ok(())
    }
}
