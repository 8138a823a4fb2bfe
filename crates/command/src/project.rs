use tracing::info;

use warden_auth::permissions;
use warden_core::{CommandContext, Error, Exists, LifecycleState, ObjectDetails, Result};
use warden_events::{Command, SearchCriteria};
use warden_org::ORG_SEARCH_TYPE;
use warden_project::{
    ProjectAdded, ProjectChanges, ProjectDeactivated, ProjectEvent, ProjectReactivated,
    ProjectRoleEvent, ProjectWriteModel, aggregate,
};

use crate::Commands;
use crate::cascade::{GrantCascade, UserGrantScope};
use crate::commands::{indexed_state, required};
use crate::project_role::AddProjectRole;

/// Request to create a project, optionally with its initial roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddProject {
    pub project_id: Option<String>,
    pub name: String,
    pub project_role_assertion: bool,
    pub project_role_check: bool,
    /// Added in this order, after the project itself.
    pub roles: Vec<AddProjectRole>,
}

impl Commands {
    pub async fn add_project(&self, ctx: &CommandContext, org_id: &str, request: AddProject) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let name = required(&request.name, "project name")?.to_string();
        let roles = AddProjectRole::validate_all(&request.roles)?;

        self.require_active_org(ctx, org_id).await?;

        let project_id = self.id_or_next(request.project_id)?;
        // Unqualified owner: a project id taken in any organization is taken.
        let mut model = ProjectWriteModel::new(project_id.clone(), "");
        self.filter_to_reducer(ctx, &mut model).await?;
        if model.state != LifecycleState::Unspecified {
            return Err(Error::already_exists("project already exists"));
        }
        self.authorize(ctx, &permissions::PROJECT_CREATE, org_id, org_id)?;

        let agg = aggregate(&project_id, org_id, ctx.instance_id());
        let expected = model.base.expected_version();
        let added = ProjectEvent::Added(ProjectAdded {
            name,
            project_role_assertion: request.project_role_assertion,
            project_role_check: request.project_role_check,
        });
        let mut commands = vec![Command::new(ctx, &agg, &added)?.expecting(expected)];
        for role in roles {
            let event = ProjectRoleEvent::Added(role);
            commands.push(Command::new(ctx, &agg, &event)?.expecting(expected));
        }
        self.push_and_reduce(ctx, &mut model, commands).await?;

        info!(project_id = %project_id, org_id, sequence = model.base.processed_sequence, "project added");
        Ok(model.base.object_details().with_id(project_id))
    }

    pub async fn change_project(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        org_id: &str,
        changes: ProjectChanges,
    ) -> Result<ObjectDetails> {
        let changes = ProjectChanges {
            name: changes
                .name
                .map(|n| required(&n, "project name").map(str::to_string))
                .transpose()?,
            ..changes
        };
        let mut model = self.existing_project(ctx, project_id, org_id).await?;
        let Some(event) = model.change_event(changes) else {
            return Err(Error::precondition("project is unchanged"));
        };
        self.authorize(ctx, &permissions::PROJECT_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        self.push_project_event(ctx, &mut model, ProjectEvent::Changed(event)).await?;
        info!(project_id = %model.base.aggregate_id, sequence = model.base.processed_sequence, "project changed");
        Ok(model.base.object_details())
    }

    pub async fn deactivate_project(&self, ctx: &CommandContext, project_id: &str, org_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_project(ctx, project_id, org_id).await?;
        if model.state != LifecycleState::Active {
            return Err(Error::precondition("project is not active"));
        }
        self.authorize(ctx, &permissions::PROJECT_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        self.push_project_event(ctx, &mut model, ProjectEvent::Deactivated(ProjectDeactivated {}))
            .await?;
        info!(project_id = %model.base.aggregate_id, sequence = model.base.processed_sequence, "project deactivated");
        Ok(model.base.object_details())
    }

    pub async fn reactivate_project(&self, ctx: &CommandContext, project_id: &str, org_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_project(ctx, project_id, org_id).await?;
        if model.state != LifecycleState::Inactive {
            return Err(Error::precondition("project is not inactive"));
        }
        self.authorize(ctx, &permissions::PROJECT_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        self.push_project_event(ctx, &mut model, ProjectEvent::Reactivated(ProjectReactivated {}))
            .await?;
        info!(project_id = %model.base.aggregate_id, sequence = model.base.processed_sequence, "project reactivated");
        Ok(model.base.object_details())
    }

    /// Removes the project with its roles and grants; hinted user grants
    /// on the project are removed best effort.
    pub async fn remove_project(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        org_id: &str,
        cascade_user_grant_ids: &[String],
    ) -> Result<ObjectDetails> {
        let mut model = self.existing_project(ctx, project_id, org_id).await?;
        self.authorize(ctx, &permissions::PROJECT_DELETE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let removed = ProjectEvent::Removed(model.removed_event());
        let mut commands = vec![Command::new(ctx, &agg, &removed)?.expecting(model.base.expected_version())];
        let cascades = self
            .cascade_user_grants(
                ctx,
                cascade_user_grant_ids,
                UserGrantScope::Project(&model.base.aggregate_id),
                GrantCascade::Remove,
            )
            .await;
        let skipped = cascades.skipped();
        commands.extend(cascades.into_commands());

        self.push_and_reduce(ctx, &mut model, commands).await?;
        info!(
            project_id = %model.base.aggregate_id,
            sequence = model.base.processed_sequence,
            skipped_cascades = skipped,
            "project removed"
        );
        Ok(model.base.object_details())
    }

    /// Loads a project; an empty `org_id` accepts any owner.
    pub(crate) async fn existing_project(
        &self,
        ctx: &CommandContext,
        project_id: &str,
        org_id: &str,
    ) -> Result<ProjectWriteModel> {
        let project_id = required(project_id, "project id")?;
        let mut model = ProjectWriteModel::new(project_id, org_id.trim());
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("project not found"));
        }
        Ok(model)
    }

    pub(crate) async fn require_active_org(&self, ctx: &CommandContext, org_id: &str) -> Result<()> {
        let criteria = [SearchCriteria::aggregate(warden_org::AGGREGATE_TYPE, org_id)
            .object_type(ORG_SEARCH_TYPE)
            .field_name(warden_org::STATE_SEARCH_FIELD)];
        let results = self.search(ctx, &criteria).await?;
        match indexed_state(&results, warden_org::AGGREGATE_TYPE, org_id, ORG_SEARCH_TYPE)? {
            Some((state, _)) if state.is_active() => Ok(()),
            _ => Err(Error::precondition("organization is not active")),
        }
    }

    async fn push_project_event(
        &self,
        ctx: &CommandContext,
        model: &mut ProjectWriteModel,
        event: ProjectEvent,
    ) -> Result<()> {
        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, model, vec![command]).await?;
        Ok(())
    }
}
