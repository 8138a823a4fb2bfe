use tracing::info;

use warden_auth::permissions;
use warden_core::{CommandContext, Error, Exists, ObjectDetails, Result};
use warden_events::Command;
use warden_org::aggregate;
use warden_policy::{
    IdpProviderAdded, IdpProviderRemoved, InstanceLoginPolicyEvent, InstanceLoginPolicyWriteModel,
    LoginPolicy, LoginPolicyRemoved, OrgLoginPolicyEvent, OrgLoginPolicyWriteModel,
    instance_aggregate,
};

use crate::Commands;
use crate::cascade::IdpLinkRef;
use crate::commands::required;

impl Commands {
    /// Sets the instance-wide default login policy.
    pub async fn add_default_login_policy(&self, ctx: &CommandContext, policy: LoginPolicy) -> Result<ObjectDetails> {
        let mut model = InstanceLoginPolicyWriteModel::new(ctx.instance_id());
        self.filter_to_reducer(ctx, &mut model).await?;
        if model.exists() {
            return Err(Error::already_exists("default login policy already exists"));
        }
        self.authorize(ctx, &permissions::IAM_POLICY_WRITE, ctx.instance_id(), ctx.instance_id())?;

        let command = Command::new(ctx, &instance_aggregate(ctx.instance_id()), &InstanceLoginPolicyEvent::Added(policy))?
            .expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;
        info!(instance_id = ctx.instance_id(), "default login policy added");
        Ok(model.base.object_details())
    }

    pub async fn change_default_login_policy(&self, ctx: &CommandContext, policy: LoginPolicy) -> Result<ObjectDetails> {
        let mut model = InstanceLoginPolicyWriteModel::new(ctx.instance_id());
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("default login policy not found"));
        }
        let Some(changed) = model.policy.change_event(&policy) else {
            return Err(Error::precondition("default login policy is unchanged"));
        };
        self.authorize(ctx, &permissions::IAM_POLICY_WRITE, ctx.instance_id(), ctx.instance_id())?;

        let command = Command::new(
            ctx,
            &instance_aggregate(ctx.instance_id()),
            &InstanceLoginPolicyEvent::Changed(changed),
        )?
        .expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;
        info!(
            instance_id = ctx.instance_id(),
            sequence = model.base.processed_sequence,
            "default login policy changed"
        );
        Ok(model.base.object_details())
    }

    /// Overrides the default login policy for one organization.
    pub async fn add_login_policy(&self, ctx: &CommandContext, org_id: &str, policy: LoginPolicy) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        self.existing_org(ctx, org_id).await?;

        let mut model = OrgLoginPolicyWriteModel::new(org_id);
        self.filter_to_reducer(ctx, &mut model).await?;
        if model.exists() {
            return Err(Error::already_exists("login policy already exists on the organization"));
        }
        self.authorize(ctx, &permissions::POLICY_WRITE, org_id, org_id)?;

        self.push_policy_event(ctx, &mut model, OrgLoginPolicyEvent::Added(policy)).await?;
        info!(org_id, "login policy added");
        Ok(model.base.object_details())
    }

    pub async fn change_login_policy(&self, ctx: &CommandContext, org_id: &str, policy: LoginPolicy) -> Result<ObjectDetails> {
        let mut model = self.existing_login_policy(ctx, org_id).await?;
        let Some(changed) = model.policy.change_event(&policy) else {
            return Err(Error::precondition("login policy is unchanged"));
        };
        self.authorize(ctx, &permissions::POLICY_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        self.push_policy_event(ctx, &mut model, OrgLoginPolicyEvent::Changed(changed))
            .await?;
        info!(org_id = %model.base.aggregate_id, sequence = model.base.processed_sequence, "login policy changed");
        Ok(model.base.object_details())
    }

    /// Drops the override; the organization falls back to the default policy.
    pub async fn remove_login_policy(&self, ctx: &CommandContext, org_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_login_policy(ctx, org_id).await?;
        self.authorize(ctx, &permissions::POLICY_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        self.push_policy_event(ctx, &mut model, OrgLoginPolicyEvent::Removed(LoginPolicyRemoved {}))
            .await?;
        info!(org_id = %model.base.aggregate_id, "login policy removed");
        Ok(model.base.object_details())
    }

    pub async fn add_idp_to_login_policy(
        &self,
        ctx: &CommandContext,
        org_id: &str,
        idp_config_id: &str,
    ) -> Result<ObjectDetails> {
        let idp_config_id = required(idp_config_id, "idp config id")?;
        let mut model = self.existing_login_policy(ctx, org_id).await?;
        let Some(idp_owner) = self.available_idp(ctx, &model.base.aggregate_id, idp_config_id).await? else {
            return Err(Error::precondition("identity provider is not available to the organization"));
        };
        if model.policy.has_idp_provider(idp_config_id) {
            return Err(Error::already_exists("identity provider already linked to the login policy"));
        }
        self.authorize(ctx, &permissions::POLICY_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let event = OrgLoginPolicyEvent::IdpProviderAdded(IdpProviderAdded {
            idp_config_id: idp_config_id.to_string(),
            idp_owner,
        });
        self.push_policy_event(ctx, &mut model, event).await?;
        info!(org_id = %model.base.aggregate_id, idp_config_id, "identity provider linked to login policy");
        Ok(model.base.object_details())
    }

    /// Unlinks the IDP and, best effort, the hinted users' links to it.
    pub async fn remove_idp_from_login_policy(
        &self,
        ctx: &CommandContext,
        org_id: &str,
        idp_config_id: &str,
        cascade_links: &[IdpLinkRef],
    ) -> Result<ObjectDetails> {
        let idp_config_id = required(idp_config_id, "idp config id")?;
        let mut model = self.existing_login_policy(ctx, org_id).await?;
        if !model.policy.has_idp_provider(idp_config_id) {
            return Err(Error::not_found("identity provider is not linked to the login policy"));
        }
        self.authorize(ctx, &permissions::POLICY_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let event = OrgLoginPolicyEvent::IdpProviderRemoved(IdpProviderRemoved {
            idp_config_id: idp_config_id.to_string(),
        });
        let agg = aggregate(&model.base.aggregate_id, ctx.instance_id());
        let mut commands = vec![Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version())];
        let cascades = self.cascade_idp_links(ctx, idp_config_id, cascade_links).await;
        let skipped = cascades.skipped();
        commands.extend(cascades.into_commands());

        self.push_and_reduce(ctx, &mut model, commands).await?;
        info!(
            org_id = %model.base.aggregate_id,
            idp_config_id,
            skipped_cascades = skipped,
            "identity provider unlinked from login policy"
        );
        Ok(model.base.object_details())
    }

    async fn existing_login_policy(&self, ctx: &CommandContext, org_id: &str) -> Result<OrgLoginPolicyWriteModel> {
        let org_id = required(org_id, "organization id")?;
        let mut model = OrgLoginPolicyWriteModel::new(org_id);
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("login policy not found on the organization"));
        }
        Ok(model)
    }

    async fn push_policy_event(
        &self,
        ctx: &CommandContext,
        model: &mut OrgLoginPolicyWriteModel,
        event: OrgLoginPolicyEvent,
    ) -> Result<()> {
        let agg = aggregate(&model.base.aggregate_id, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, model, vec![command]).await?;
        Ok(())
    }
}
