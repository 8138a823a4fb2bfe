use tracing::info;

use warden_auth::permissions;
use warden_core::{CommandContext, Error, Exists, LifecycleState, ObjectDetails, Result};
use warden_events::Command;
use warden_usergrant::{
    GROUP_GRANT_AGGREGATE_TYPE, GroupGrantAdded, GroupGrantChanged, GroupGrantDeactivated,
    GroupGrantEvent, GroupGrantReactivated, GroupGrantWriteModel, Grantee, group_grant_aggregate,
};

use crate::Commands;
use crate::commands::{distinct_keys, last_details, required};

/// Request to grant project roles to every member of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddGroupGrant {
    pub group_grant_id: Option<String>,
    pub group_id: String,
    pub project_id: String,
    pub project_grant_id: Option<String>,
    pub role_keys: Vec<String>,
}

impl Commands {
    /// Grants roles to a group of `org_id`. The project preconditions are
    /// those of a user grant.
    pub async fn add_group_grant(&self, ctx: &CommandContext, org_id: &str, request: AddGroupGrant) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let group_id = required(&request.group_id, "group id")?;
        let project_id = required(&request.project_id, "project id")?;
        let project_grant_id = request
            .project_grant_id
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty());
        let role_keys = distinct_keys(&request.role_keys, "role key")?;

        let preconditions = self
            .grant_preconditions(ctx, org_id, &Grantee::Group(group_id.to_string()), project_id, project_grant_id)
            .await?;
        preconditions.check(org_id, project_grant_id, &role_keys)?;

        let group_grant_id = self.id_or_next(request.group_grant_id.clone())?;
        let mut model = GroupGrantWriteModel::new(group_grant_id.clone(), "");
        self.filter_to_reducer(ctx, &mut model).await?;
        if model.state != LifecycleState::Unspecified {
            return Err(Error::already_exists("group grant already exists"));
        }
        self.authorize_grant(ctx, &permissions::GROUP_GRANT_WRITE, org_id, project_id, project_grant_id)?;

        let event = GroupGrantEvent::Added(GroupGrantAdded {
            group_id: group_id.to_string(),
            project_id: project_id.to_string(),
            project_grant_id: project_grant_id.map(str::to_string),
            role_keys,
        });
        let agg = group_grant_aggregate(&group_grant_id, org_id, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;

        info!(group_grant_id = %group_grant_id, group_id, project_id, "group grant added");
        Ok(model.base.object_details().with_id(group_grant_id))
    }

    /// Replaces the granted roles; identical roles are rejected.
    pub async fn change_group_grant(
        &self,
        ctx: &CommandContext,
        group_grant_id: &str,
        role_keys: &[String],
    ) -> Result<ObjectDetails> {
        let role_keys = distinct_keys(role_keys, "role key")?;
        let mut model = self.existing_group_grant(ctx, group_grant_id).await?;
        let mut current = model.role_keys.clone();
        let mut requested = role_keys.clone();
        current.sort();
        requested.sort();
        if current == requested {
            return Err(Error::precondition("group grant roles are unchanged"));
        }

        let owner = model.base.resource_owner.clone();
        let project_grant_id = model.project_grant_id.clone();
        let preconditions = self
            .grant_preconditions(
                ctx,
                &owner,
                &Grantee::Group(model.group_id.clone()),
                &model.project_id,
                project_grant_id.as_deref(),
            )
            .await?;
        preconditions.check(&owner, project_grant_id.as_deref(), &role_keys)?;
        self.authorize_grant(
            ctx,
            &permissions::GROUP_GRANT_WRITE,
            &owner,
            &model.project_id,
            project_grant_id.as_deref(),
        )?;

        self.push_group_grant_event(ctx, &mut model, GroupGrantEvent::Changed(GroupGrantChanged { role_keys }))
            .await?;
        info!(group_grant_id = %model.base.aggregate_id, "group grant changed");
        Ok(model.base.object_details())
    }

    pub async fn deactivate_group_grant(&self, ctx: &CommandContext, group_grant_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_group_grant(ctx, group_grant_id).await?;
        if model.state != LifecycleState::Active {
            return Err(Error::precondition("group grant is not active"));
        }
        self.authorize_group_grant_write(ctx, &model)?;

        self.push_group_grant_event(ctx, &mut model, GroupGrantEvent::Deactivated(GroupGrantDeactivated {}))
            .await?;
        info!(group_grant_id = %model.base.aggregate_id, "group grant deactivated");
        Ok(model.base.object_details())
    }

    pub async fn reactivate_group_grant(&self, ctx: &CommandContext, group_grant_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_group_grant(ctx, group_grant_id).await?;
        if model.state != LifecycleState::Inactive {
            return Err(Error::precondition("group grant is not inactive"));
        }
        self.authorize_group_grant_write(ctx, &model)?;

        self.push_group_grant_event(ctx, &mut model, GroupGrantEvent::Reactivated(GroupGrantReactivated {}))
            .await?;
        info!(group_grant_id = %model.base.aggregate_id, "group grant reactivated");
        Ok(model.base.object_details())
    }

    pub async fn remove_group_grant(&self, ctx: &CommandContext, group_grant_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_group_grant(ctx, group_grant_id).await?;
        let command = self.group_grant_removal(ctx, &model)?;
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;
        info!(group_grant_id = %model.base.aggregate_id, "group grant removed");
        Ok(model.base.object_details())
    }

    /// Removes every listed grant in one push, rejecting the whole batch if
    /// any grant is missing or forbidden.
    pub async fn bulk_remove_group_grants(
        &self,
        ctx: &CommandContext,
        group_grant_ids: &[String],
    ) -> Result<ObjectDetails> {
        let ids = distinct_keys(group_grant_ids, "group grant id")?;
        if ids.is_empty() {
            return Err(Error::invalid_argument("at least one group grant id is required"));
        }
        let mut commands = Vec::with_capacity(ids.len());
        for id in &ids {
            let model = self.existing_group_grant(ctx, id).await?;
            commands.push(self.group_grant_removal(ctx, &model)?);
        }
        let pushed = self.push(ctx, commands).await?;
        info!(count = ids.len(), "group grants removed");
        last_details(&pushed)
    }

    fn authorize_group_grant_write(&self, ctx: &CommandContext, model: &GroupGrantWriteModel) -> Result<()> {
        self.authorize_grant(
            ctx,
            &permissions::GROUP_GRANT_WRITE,
            &model.base.resource_owner,
            &model.project_id,
            model.project_grant_id.as_deref(),
        )
    }

    fn group_grant_removal(&self, ctx: &CommandContext, model: &GroupGrantWriteModel) -> Result<Command> {
        self.authorize_grant(
            ctx,
            &permissions::GROUP_GRANT_DELETE,
            &model.base.resource_owner,
            &model.project_id,
            model.project_grant_id.as_deref(),
        )?;
        let agg = group_grant_aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let event = GroupGrantEvent::Removed(model.removed_payload());
        Ok(Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version()))
    }

    async fn existing_group_grant(&self, ctx: &CommandContext, group_grant_id: &str) -> Result<GroupGrantWriteModel> {
        let group_grant_id = required(group_grant_id, "group grant id")?;
        let owner = self
            .resolve_resource_owner(ctx, GROUP_GRANT_AGGREGATE_TYPE, group_grant_id)
            .await?;
        let mut model = GroupGrantWriteModel::new(group_grant_id, owner);
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("group grant not found"));
        }
        Ok(model)
    }

    async fn push_group_grant_event(
        &self,
        ctx: &CommandContext,
        model: &mut GroupGrantWriteModel,
        event: GroupGrantEvent,
    ) -> Result<()> {
        let agg = group_grant_aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, model, vec![command]).await?;
        Ok(())
    }
}
