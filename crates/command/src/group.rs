use tracing::info;

use warden_auth::permissions;
use warden_core::{CommandContext, Error, Exists, LifecycleState, ObjectDetails, Result};
use warden_events::Command;
use warden_user::{GroupAdded, GroupEvent, GroupRemoved, GroupWriteModel, group_aggregate};

use crate::Commands;
use crate::cascade::{GrantCascade, GroupGrantScope};
use crate::commands::required;

/// Request to create a group of users in an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddGroup {
    pub group_id: Option<String>,
    pub name: String,
    pub description: String,
}

impl Commands {
    pub async fn add_group(&self, ctx: &CommandContext, org_id: &str, request: AddGroup) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let name = required(&request.name, "group name")?.to_string();

        self.require_active_org(ctx, org_id).await?;

        let group_id = self.id_or_next(request.group_id)?;
        let mut model = GroupWriteModel::new(group_id.clone(), "");
        self.filter_to_reducer(ctx, &mut model).await?;
        if model.state != LifecycleState::Unspecified {
            return Err(Error::already_exists("group already exists"));
        }
        self.authorize(ctx, &permissions::GROUP_WRITE, org_id, &group_id)?;

        let event = GroupEvent::Added(GroupAdded {
            name,
            description: request.description.trim().to_string(),
        });
        let agg = group_aggregate(&group_id, org_id, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;

        info!(group_id = %group_id, org_id, "group added");
        Ok(model.base.object_details().with_id(group_id))
    }

    /// Removes the group and, best effort, the hinted group grants.
    pub async fn remove_group(
        &self,
        ctx: &CommandContext,
        group_id: &str,
        org_id: &str,
        cascade_group_grant_ids: &[String],
    ) -> Result<ObjectDetails> {
        let mut model = self.existing_group(ctx, group_id, org_id).await?;
        self.authorize(ctx, &permissions::GROUP_DELETE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let agg = group_aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let removed = GroupEvent::Removed(GroupRemoved { name: model.name.clone() });
        let mut commands = vec![Command::new(ctx, &agg, &removed)?.expecting(model.base.expected_version())];
        let cascades = self
            .cascade_group_grants(
                ctx,
                cascade_group_grant_ids,
                GroupGrantScope::Group(&model.base.aggregate_id),
                GrantCascade::Remove,
            )
            .await;
        let skipped = cascades.skipped();
        commands.extend(cascades.into_commands());

        self.push_and_reduce(ctx, &mut model, commands).await?;
        info!(group_id = %model.base.aggregate_id, skipped_cascades = skipped, "group removed");
        Ok(model.base.object_details())
    }

    /// Loads a group; an empty `org_id` accepts any owner.
    async fn existing_group(&self, ctx: &CommandContext, group_id: &str, org_id: &str) -> Result<GroupWriteModel> {
        let group_id = required(group_id, "group id")?;
        let mut model = GroupWriteModel::new(group_id, org_id.trim());
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("group not found"));
        }
        Ok(model)
    }
}
