use std::collections::BTreeMap;

use tracing::info;

use warden_auth::permissions;
use warden_core::{CommandContext, Error, Exists, ObjectDetails, Result};
use warden_events::{Command, SearchCriteria};
use warden_project::{
    GRANT_SEARCH_TYPE, ProjectGrantCascadeChanged, ProjectGrantEvent, ProjectRoleAdded,
    ProjectRoleEvent, ProjectRoleRemoved, ProjectRoleWriteModel, ROLE_KEY_SEARCH_FIELD, aggregate,
};

use crate::Commands;
use crate::cascade::{CascadeBatch, GrantCascade, GroupGrantScope, UserGrantScope};
use crate::commands::required;

/// A project role as requested by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddProjectRole {
    pub key: String,
    pub display_name: String,
    pub group: String,
}

impl AddProjectRole {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            group: String::new(),
        }
    }

    fn validate(&self) -> Result<ProjectRoleAdded> {
        Ok(ProjectRoleAdded {
            key: required(&self.key, "role key")?.to_string(),
            display_name: self.display_name.trim().to_string(),
            group: self.group.trim().to_string(),
        })
    }

    /// Validates every role and rejects repeated keys.
    pub(crate) fn validate_all(roles: &[AddProjectRole]) -> Result<Vec<ProjectRoleAdded>> {
        let mut out: Vec<ProjectRoleAdded> = Vec::with_capacity(roles.len());
        for role in roles {
            let role = role.validate()?;
            if out.iter().any(|r| r.key == role.key) {
                return Err(Error::invalid_argument(format!("duplicate role key {:?}", role.key)));
            }
            out.push(role);
        }
        Ok(out)
    }
}

impl Commands {
    pub async fn add_project_role(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        org_id: &str,
        role: AddProjectRole,
    ) -> Result<ObjectDetails> {
        self.bulk_add_project_roles(ctx, project_id, org_id, std::slice::from_ref(&role))
            .await
    }

    /// Adds all roles in one push; any existing key rejects the whole batch.
    pub async fn bulk_add_project_roles(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        org_id: &str,
        roles: &[AddProjectRole],
    ) -> Result<ObjectDetails> {
        if roles.is_empty() {
            return Err(Error::invalid_argument("at least one role is required"));
        }
        let roles = AddProjectRole::validate_all(roles)?;

        let mut model = self.existing_project(ctx, project_id, org_id).await?;
        if let Some(existing) = roles.iter().find(|r| model.has_role(&r.key)) {
            return Err(Error::already_exists(format!(
                "role key {:?} already exists on the project",
                existing.key
            )));
        }
        self.authorize(ctx, &permissions::PROJECT_ROLE_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let expected = model.base.expected_version();
        let count = roles.len();
        let commands = roles
            .into_iter()
            .map(|role| Ok(Command::new(ctx, &agg, &ProjectRoleEvent::Added(role))?.expecting(expected)))
            .collect::<Result<Vec<_>>>()?;
        self.push_and_reduce(ctx, &mut model, commands).await?;

        info!(project_id = %model.base.aggregate_id, count, "project roles added");
        Ok(model.base.object_details())
    }

    pub async fn change_project_role(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        org_id: &str,
        role: AddProjectRole,
    ) -> Result<ObjectDetails> {
        let requested = role.validate()?;
        let mut model = self.existing_role(ctx, project_id, org_id, &requested.key).await?;
        let Some(event) = model.change_event(Some(requested.display_name), Some(requested.group)) else {
            return Err(Error::precondition("project role is unchanged"));
        };
        self.authorize(ctx, &permissions::PROJECT_ROLE_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let command = Command::new(ctx, &agg, &ProjectRoleEvent::Changed(event))?
            .expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;
        info!(project_id = %model.base.aggregate_id, key = %model.key, "project role changed");
        Ok(model.base.object_details())
    }

    /// Removes the role and strips its key from every project grant and,
    /// best effort, from the hinted user and group grants.
    pub async fn remove_project_role(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        org_id: &str,
        key: &str,
        cascade_user_grant_ids: &[String],
        cascade_group_grant_ids: &[String],
    ) -> Result<ObjectDetails> {
        let key = required(key, "role key")?;
        let mut model = self.existing_role(ctx, project_id, org_id, key).await?;
        self.authorize(ctx, &permissions::PROJECT_ROLE_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let removed = ProjectRoleEvent::Removed(ProjectRoleRemoved { key: key.to_string() });
        let mut commands = vec![Command::new(ctx, &agg, &removed)?.expecting(model.base.expected_version())];

        let mut grants = CascadeBatch::new("project.grant.cascade.changed");
        for (grant_id, role_keys) in self.grants_holding_role(ctx, &model.base.aggregate_id, key).await? {
            let event = ProjectGrantEvent::CascadeChanged(ProjectGrantCascadeChanged {
                grant_id: grant_id.clone(),
                role_keys,
            });
            grants.add(&grant_id, Command::new(ctx, &agg, &event).map(Some));
        }
        commands.extend(grants.into_commands());

        let removed_keys = [key.to_string()];
        let user_grants = self
            .cascade_user_grants(
                ctx,
                cascade_user_grant_ids,
                UserGrantScope::Project(&model.base.aggregate_id),
                GrantCascade::DropRoles(&removed_keys),
            )
            .await;
        let group_grants = self
            .cascade_group_grants(
                ctx,
                cascade_group_grant_ids,
                GroupGrantScope::Project(&model.base.aggregate_id),
                GrantCascade::DropRoles(&removed_keys),
            )
            .await;
        let skipped = user_grants.skipped() + group_grants.skipped();
        commands.extend(user_grants.into_commands());
        commands.extend(group_grants.into_commands());

        self.push_and_reduce(ctx, &mut model, commands).await?;
        info!(
            project_id = %model.base.aggregate_id,
            key,
            skipped_cascades = skipped,
            "project role removed"
        );
        Ok(model.base.object_details())
    }

    async fn existing_role(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        org_id: &str,
        key: &str,
    ) -> Result<ProjectRoleWriteModel> {
        let project_id = required(project_id, "project id")?;
        let mut model = ProjectRoleWriteModel::new(project_id, org_id.trim(), key);
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("project role not found"));
        }
        Ok(model)
    }

    /// Grants of the project holding `key`, with their remaining keys.
    async fn grants_holding_role(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        key: &str,
    ) -> Result<Vec<(String, Vec<String>)>> {
        let criteria = [SearchCriteria::aggregate(warden_project::AGGREGATE_TYPE, project_id)
            .object_type(GRANT_SEARCH_TYPE)
            .field_name(ROLE_KEY_SEARCH_FIELD)];
        let mut by_grant: BTreeMap<String, (bool, Vec<String>)> = BTreeMap::new();
        for result in self.search(ctx, &criteria).await? {
            let role_key: String = result.value_as()?;
            let (holds, remaining) = by_grant.entry(result.object_id).or_default();
            if role_key == key {
                *holds = true;
            } else {
                remaining.push(role_key);
            }
        }
        Ok(by_grant
            .into_iter()
            .filter(|(_, (holds, _))| *holds)
            .map(|(grant_id, (_, remaining))| (grant_id, remaining))
            .collect())
    }
}
