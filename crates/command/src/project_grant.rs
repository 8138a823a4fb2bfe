use tracing::{debug, info};

use warden_auth::permissions;
use warden_core::{CommandContext, Error, Exists, LifecycleState, ObjectDetails, Result};
use warden_events::{Command, SearchCriteria, SearchResult};
use warden_org::ORG_SEARCH_TYPE;
use warden_project::{
    KEY_SEARCH_FIELD, PROJECT_SEARCH_TYPE, ProjectGrantAdded, ProjectGrantChanged,
    ProjectGrantDeactivated, ProjectGrantEvent, ProjectGrantReactivated, ProjectGrantRemoved,
    ProjectGrantWriteModel, ROLE_SEARCH_TYPE, RoleKeyDiff, STATE_SEARCH_FIELD, aggregate,
};

use crate::Commands;
use crate::cascade::{GrantCascade, UserGrantScope};
use crate::commands::{distinct_keys, indexed_state, required};

/// Request to share a project with another organization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddProjectGrant {
    pub grant_id: Option<String>,
    pub granted_org_id: String,
    pub role_keys: Vec<String>,
}

pub(crate) fn project_state_criteria(project_id: &str) -> SearchCriteria {
    SearchCriteria::aggregate(warden_project::AGGREGATE_TYPE, project_id)
        .object_type(PROJECT_SEARCH_TYPE)
        .field_name(STATE_SEARCH_FIELD)
}

pub(crate) fn project_roles_criteria(project_id: &str) -> SearchCriteria {
    SearchCriteria::aggregate(warden_project::AGGREGATE_TYPE, project_id)
        .object_type(ROLE_SEARCH_TYPE)
        .field_name(KEY_SEARCH_FIELD)
}

/// Role keys of `project_id` among `results`.
pub(crate) fn indexed_role_keys(results: &[SearchResult], project_id: &str) -> Result<Vec<String>> {
    results
        .iter()
        .filter(|r| {
            r.aggregate.aggregate_type == warden_project::AGGREGATE_TYPE
                && r.aggregate.id == project_id
                && r.object_type == ROLE_SEARCH_TYPE
                && r.field_name == KEY_SEARCH_FIELD
        })
        .map(|r| r.value_as::<String>())
        .collect()
}

fn require_known_roles(requested: &[String], known: &[String]) -> Result<()> {
    match requested.iter().find(|k| !known.contains(k)) {
        Some(missing) => Err(Error::precondition(format!("role key {missing:?} does not exist on the project"))),
        None => Ok(()),
    }
}

impl Commands {
    /// Grants `project_id` to another organization. The grant is owned by
    /// the project's organization; a non-empty `org_id` must match it.
    pub async fn add_project_grant(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        org_id: &str,
        request: AddProjectGrant,
    ) -> Result<ObjectDetails> {
        let project_id = required(project_id, "project id")?;
        let granted_org_id = required(&request.granted_org_id, "granted organization id")?;
        let role_keys = distinct_keys(&request.role_keys, "role key")?;

        let criteria = [
            project_state_criteria(project_id),
            project_roles_criteria(project_id),
            SearchCriteria::aggregate(warden_org::AGGREGATE_TYPE, granted_org_id)
                .object_type(ORG_SEARCH_TYPE)
                .field_name(warden_org::STATE_SEARCH_FIELD),
        ];
        let results = self.search(ctx, &criteria).await?;
        let owner = match indexed_state(&results, warden_project::AGGREGATE_TYPE, project_id, PROJECT_SEARCH_TYPE)? {
            Some((state, owner)) if state.is_active() => owner,
            _ => return Err(Error::precondition("project is not active")),
        };
        let org_id = org_id.trim();
        if !org_id.is_empty() && org_id != owner {
            return Err(Error::precondition("project does not belong to the organization"));
        }
        if granted_org_id == owner {
            return Err(Error::precondition("project cannot be granted to its own organization"));
        }
        match indexed_state(&results, warden_org::AGGREGATE_TYPE, granted_org_id, ORG_SEARCH_TYPE)? {
            Some((state, _)) if state.is_active() => {}
            _ => return Err(Error::precondition("granted organization is not active")),
        }
        require_known_roles(&role_keys, &indexed_role_keys(&results, project_id)?)?;

        let grant_id = self.id_or_next(request.grant_id)?;
        let mut model = ProjectGrantWriteModel::new(project_id, grant_id.clone());
        self.filter_to_reducer(ctx, &mut model).await?;
        if model.exists() {
            return Err(Error::already_exists("project grant already exists"));
        }
        self.authorize(ctx, &permissions::PROJECT_GRANT_WRITE, &owner, project_id)?;

        let event = ProjectGrantEvent::Added(ProjectGrantAdded {
            grant_id: grant_id.clone(),
            granted_org_id: granted_org_id.to_string(),
            role_keys,
        });
        let agg = aggregate(project_id, &owner, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;

        info!(project_id, grant_id = %grant_id, granted_org_id, "project grant added");
        Ok(model.base.object_details().with_id(grant_id))
    }

    /// Replaces the granted roles. Identical roles are a no-op; dropped
    /// roles are stripped from the hinted user grants best effort.
    pub async fn change_project_grant(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        grant_id: &str,
        role_keys: &[String],
        cascade_user_grant_ids: &[String],
    ) -> Result<ObjectDetails> {
        let role_keys = distinct_keys(role_keys, "role key")?;
        let mut model = self.existing_project_grant(ctx, project_id, grant_id).await?;

        let diff = RoleKeyDiff::between(&model.role_keys, &role_keys);
        if diff.is_empty() {
            debug!(grant_id = %model.grant_id, "project grant roles unchanged");
            return Ok(model.base.object_details());
        }
        let results = self
            .search(ctx, &[project_roles_criteria(&model.base.aggregate_id)])
            .await?;
        require_known_roles(&diff.added, &indexed_role_keys(&results, &model.base.aggregate_id)?)?;
        self.authorize(ctx, &permissions::PROJECT_GRANT_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let event = ProjectGrantEvent::Changed(ProjectGrantChanged {
            grant_id: model.grant_id.clone(),
            role_keys,
        });
        let mut commands = vec![Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version())];
        let grant_id = model.grant_id.clone();
        let cascades = self
            .cascade_user_grants(
                ctx,
                cascade_user_grant_ids,
                UserGrantScope::ProjectGrant(&grant_id),
                GrantCascade::DropRoles(&diff.removed),
            )
            .await;
        let skipped = cascades.skipped();
        commands.extend(cascades.into_commands());

        self.push_and_reduce(ctx, &mut model, commands).await?;
        info!(grant_id = %grant_id, skipped_cascades = skipped, "project grant changed");
        Ok(model.base.object_details())
    }

    /// Deactivating an inactive grant returns its current details.
    pub async fn deactivate_project_grant(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        grant_id: &str,
    ) -> Result<ObjectDetails> {
        let mut model = self.existing_project_grant(ctx, project_id, grant_id).await?;
        if model.state == LifecycleState::Inactive {
            debug!(grant_id = %model.grant_id, "project grant already inactive");
            return Ok(model.base.object_details());
        }
        self.authorize(ctx, &permissions::PROJECT_GRANT_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let event = ProjectGrantEvent::Deactivated(ProjectGrantDeactivated {
            grant_id: model.grant_id.clone(),
        });
        self.push_grant_event(ctx, &mut model, event).await?;
        info!(grant_id = %model.grant_id, "project grant deactivated");
        Ok(model.base.object_details())
    }

    pub async fn reactivate_project_grant(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        grant_id: &str,
    ) -> Result<ObjectDetails> {
        let mut model = self.existing_project_grant(ctx, project_id, grant_id).await?;
        if model.state != LifecycleState::Inactive {
            return Err(Error::precondition("project grant is not inactive"));
        }
        self.authorize(ctx, &permissions::PROJECT_GRANT_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let event = ProjectGrantEvent::Reactivated(ProjectGrantReactivated {
            grant_id: model.grant_id.clone(),
        });
        self.push_grant_event(ctx, &mut model, event).await?;
        info!(grant_id = %model.grant_id, "project grant reactivated");
        Ok(model.base.object_details())
    }

    /// Removes the grant; hinted user grants on it are removed best effort.
    pub async fn remove_project_grant(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        grant_id: &str,
        cascade_user_grant_ids: &[String],
    ) -> Result<ObjectDetails> {
        let mut model = self.existing_project_grant(ctx, project_id, grant_id).await?;
        self.authorize(ctx, &permissions::PROJECT_GRANT_DELETE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let event = ProjectGrantEvent::Removed(ProjectGrantRemoved {
            grant_id: model.grant_id.clone(),
            granted_org_id: model.granted_org_id.clone(),
        });
        let mut commands = vec![Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version())];
        let grant_id = model.grant_id.clone();
        let cascades = self
            .cascade_user_grants(
                ctx,
                cascade_user_grant_ids,
                UserGrantScope::ProjectGrant(&grant_id),
                GrantCascade::Remove,
            )
            .await;
        let skipped = cascades.skipped();
        commands.extend(cascades.into_commands());

        self.push_and_reduce(ctx, &mut model, commands).await?;
        info!(grant_id = %grant_id, skipped_cascades = skipped, "project grant removed");
        Ok(model.base.object_details())
    }

    async fn existing_project_grant(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        grant_id: &str,
    ) -> Result<ProjectGrantWriteModel> {
        let project_id = required(project_id, "project id")?;
        let grant_id = required(grant_id, "project grant id")?;
        let mut model = ProjectGrantWriteModel::new(project_id, grant_id);
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("project grant not found"));
        }
        Ok(model)
    }

    async fn push_grant_event(
        &self,
        ctx: &CommandContext,
        model: &mut ProjectGrantWriteModel,
        event: ProjectGrantEvent,
    ) -> Result<()> {
        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, model, vec![command]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_fail_the_precondition() {
        let known = vec!["A".to_string(), "B".to_string()];
        assert!(require_known_roles(&["A".to_string()], &known).is_ok());
        let err = require_known_roles(&["C".to_string()], &known).unwrap_err();
        assert!(err.is_precondition_failed());
    }
}
