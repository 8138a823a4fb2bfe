use tracing::info;

use warden_auth::permissions;
use warden_core::{CommandContext, Error, Exists, ObjectDetails, Result};
use warden_events::Command;
use warden_user::{UserIdpLinkAdded, UserIdpLinkEvent, UserIdpLinkRemoved, UserIdpLinkWriteModel, aggregate};

use crate::Commands;
use crate::commands::required;

/// Request to link a user with an identity at an external provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddIdpLink {
    pub idp_config_id: String,
    pub external_user_id: String,
    pub display_name: String,
}

impl Commands {
    pub async fn add_user_idp_link(
        &self,
        ctx: &CommandContext,
        user_id: &str,
        org_id: &str,
        link: AddIdpLink,
    ) -> Result<ObjectDetails> {
        let idp_config_id = required(&link.idp_config_id, "idp config id")?;
        let external_user_id = required(&link.external_user_id, "external user id")?;

        let user = self.existing_user(ctx, user_id, org_id).await?;
        if self
            .available_idp(ctx, &user.base.resource_owner, idp_config_id)
            .await?
            .is_none()
        {
            return Err(Error::precondition("identity provider is not available to the user's organization"));
        }
        let mut model = UserIdpLinkWriteModel::new(&user.base.aggregate_id, idp_config_id, external_user_id);
        self.filter_to_reducer(ctx, &mut model).await?;
        if model.exists() {
            return Err(Error::already_exists("external identity already linked to the user"));
        }
        self.authorize(ctx, &permissions::USER_WRITE, &user.base.resource_owner, &user.base.aggregate_id)?;

        let event = UserIdpLinkEvent::Added(UserIdpLinkAdded {
            idp_config_id: idp_config_id.to_string(),
            external_user_id: external_user_id.to_string(),
            display_name: link.display_name.trim().to_string(),
        });
        let agg = aggregate(&user.base.aggregate_id, &user.base.resource_owner, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;

        info!(user_id = %model.base.aggregate_id, idp_config_id, "external identity linked");
        Ok(model.base.object_details())
    }

    pub async fn remove_user_idp_link(
        &self,
        ctx: &CommandContext,
        user_id: &str,
        idp_config_id: &str,
        external_user_id: &str,
    ) -> Result<ObjectDetails> {
        let user_id = required(user_id, "user id")?;
        let idp_config_id = required(idp_config_id, "idp config id")?;
        let external_user_id = required(external_user_id, "external user id")?;

        let mut model = UserIdpLinkWriteModel::new(user_id, idp_config_id, external_user_id);
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("external identity link not found"));
        }
        self.authorize(ctx, &permissions::USER_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let event = UserIdpLinkEvent::Removed(UserIdpLinkRemoved {
            idp_config_id: idp_config_id.to_string(),
            external_user_id: external_user_id.to_string(),
        });
        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;

        info!(user_id, idp_config_id, "external identity unlinked");
        Ok(model.base.object_details())
    }
}
