use tracing::{debug, info};

use warden_auth::permissions;
use warden_core::{CommandContext, Error, Exists, ObjectDetails, Result};
use warden_events::Command;
use warden_user::{
    HumanAdded, HumanPasswordChanged, HumanWriteModel, ProfileChanges, UserDeactivated, UserEvent,
    UserLocked, UserReactivated, UserState, UserUnlocked, UsernameChanged, aggregate,
};

use crate::Commands;
use crate::cascade::{GrantCascade, UserGrantScope};
use crate::commands::required;

/// Request to register a human user in an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddHumanUser {
    pub user_id: Option<String>,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Plaintext; only its hash is stored.
    pub password: Option<String>,
}

impl Commands {
    pub async fn add_human_user(&self, ctx: &CommandContext, org_id: &str, request: AddHumanUser) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let username = required(&request.username, "username")?.to_string();
        let first_name = required(&request.first_name, "first name")?.to_string();
        let last_name = required(&request.last_name, "last name")?.to_string();
        let email = required(&request.email, "email")?.to_lowercase();
        if !email.contains('@') {
            return Err(Error::invalid_argument("email is invalid"));
        }
        let password_hash = match request.password.as_deref() {
            Some(password) => Some(self.hash_password(password)?),
            None => None,
        };

        self.require_active_org(ctx, org_id).await?;

        let user_id = self.id_or_next(request.user_id)?;
        let mut model = HumanWriteModel::new(user_id.clone(), "");
        self.filter_to_reducer(ctx, &mut model).await?;
        if model.state != UserState::Unspecified {
            return Err(Error::already_exists("user already exists"));
        }
        self.authorize(ctx, &permissions::USER_WRITE, org_id, &user_id)?;

        let event = UserEvent::HumanAdded(HumanAdded {
            username,
            first_name,
            last_name,
            email,
            password_hash,
        });
        let agg = aggregate(&user_id, org_id, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;

        info!(user_id = %user_id, org_id, "human user added");
        Ok(model.base.object_details().with_id(user_id))
    }

    pub async fn change_username(
        &self,
        ctx: &CommandContext,
        user_id: &str,
        org_id: &str,
        username: &str,
    ) -> Result<ObjectDetails> {
        let username = required(username, "username")?;
        let mut model = self.existing_user(ctx, user_id, org_id).await?;
        if model.username == username {
            return Err(Error::precondition("username is unchanged"));
        }
        self.authorize(ctx, &permissions::USER_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let event = UserEvent::UsernameChanged(UsernameChanged {
            username: username.to_string(),
            old_username: model.username.clone(),
        });
        self.push_user_event(ctx, &mut model, event).await?;
        info!(user_id = %model.base.aggregate_id, "username changed");
        Ok(model.base.object_details())
    }

    /// Applies the provided profile fields; an identical profile is a no-op.
    pub async fn set_profile(
        &self,
        ctx: &CommandContext,
        user_id: &str,
        org_id: &str,
        changes: ProfileChanges,
    ) -> Result<ObjectDetails> {
        let non_blank = |value: Option<String>, what: &str| {
            value
                .map(|v| required(&v, what).map(str::to_string))
                .transpose()
        };
        let changes = ProfileChanges {
            first_name: non_blank(changes.first_name, "first name")?,
            last_name: non_blank(changes.last_name, "last name")?,
            display_name: changes.display_name.map(|v| v.trim().to_string()),
        };
        let mut model = self.existing_user(ctx, user_id, org_id).await?;
        let Some(event) = model.profile_change_event(changes) else {
            debug!(user_id = %model.base.aggregate_id, "profile unchanged");
            return Ok(model.base.object_details());
        };
        self.authorize(ctx, &permissions::USER_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        self.push_user_event(ctx, &mut model, UserEvent::ProfileChanged(event)).await?;
        info!(user_id = %model.base.aggregate_id, "profile changed");
        Ok(model.base.object_details())
    }

    pub async fn set_password(
        &self,
        ctx: &CommandContext,
        user_id: &str,
        org_id: &str,
        password: &str,
    ) -> Result<ObjectDetails> {
        let password_hash = self.hash_password(password)?;
        let mut model = self.existing_user(ctx, user_id, org_id).await?;
        self.authorize(
            ctx,
            &permissions::USER_CREDENTIAL_WRITE,
            &model.base.resource_owner,
            &model.base.aggregate_id,
        )?;

        let event = UserEvent::PasswordChanged(HumanPasswordChanged { password_hash });
        self.push_user_event(ctx, &mut model, event).await?;
        info!(user_id = %model.base.aggregate_id, "password changed");
        Ok(model.base.object_details())
    }

    pub async fn lock_user(&self, ctx: &CommandContext, user_id: &str, org_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_user(ctx, user_id, org_id).await?;
        if !model.state.can_lock() {
            return Err(Error::precondition("user cannot be locked"));
        }
        self.transition_user(ctx, &mut model, UserEvent::Locked(UserLocked {}), "user locked")
            .await
    }

    pub async fn unlock_user(&self, ctx: &CommandContext, user_id: &str, org_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_user(ctx, user_id, org_id).await?;
        if model.state != UserState::Locked {
            return Err(Error::precondition("user is not locked"));
        }
        self.transition_user(ctx, &mut model, UserEvent::Unlocked(UserUnlocked {}), "user unlocked")
            .await
    }

    pub async fn deactivate_user(&self, ctx: &CommandContext, user_id: &str, org_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_user(ctx, user_id, org_id).await?;
        if model.state == UserState::Inactive {
            return Err(Error::precondition("user is already inactive"));
        }
        self.transition_user(ctx, &mut model, UserEvent::Deactivated(UserDeactivated {}), "user deactivated")
            .await
    }

    pub async fn reactivate_user(&self, ctx: &CommandContext, user_id: &str, org_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_user(ctx, user_id, org_id).await?;
        if model.state != UserState::Inactive {
            return Err(Error::precondition("user is not inactive"));
        }
        self.transition_user(ctx, &mut model, UserEvent::Reactivated(UserReactivated {}), "user reactivated")
            .await
    }

    /// Removes the user, releasing its username and external identities;
    /// hinted user grants of the user are removed best effort.
    pub async fn remove_user(
        &self,
        ctx: &CommandContext,
        user_id: &str,
        org_id: &str,
        cascade_user_grant_ids: &[String],
    ) -> Result<ObjectDetails> {
        let mut model = self.existing_user(ctx, user_id, org_id).await?;
        self.authorize(ctx, &permissions::USER_DELETE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let removed = UserEvent::Removed(model.removed_event());
        let mut commands = vec![Command::new(ctx, &agg, &removed)?.expecting(model.base.expected_version())];
        let cascades = self
            .cascade_user_grants(
                ctx,
                cascade_user_grant_ids,
                UserGrantScope::User(&model.base.aggregate_id),
                GrantCascade::Remove,
            )
            .await;
        let skipped = cascades.skipped();
        commands.extend(cascades.into_commands());

        self.push_and_reduce(ctx, &mut model, commands).await?;
        info!(user_id = %model.base.aggregate_id, skipped_cascades = skipped, "user removed");
        Ok(model.base.object_details())
    }

    /// Loads a user; an empty `org_id` accepts any owner.
    pub(crate) async fn existing_user(&self, ctx: &CommandContext, user_id: &str, org_id: &str) -> Result<HumanWriteModel> {
        let user_id = required(user_id, "user id")?;
        let mut model = HumanWriteModel::new(user_id, org_id.trim());
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("user not found"));
        }
        Ok(model)
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        let min = self.config.password_min_length;
        if password.chars().count() < min {
            return Err(Error::invalid_argument(format!(
                "password must have at least {min} characters"
            )));
        }
        Ok(self.hasher.hash(password)?)
    }

    async fn transition_user(
        &self,
        ctx: &CommandContext,
        model: &mut HumanWriteModel,
        event: UserEvent,
        message: &'static str,
    ) -> Result<ObjectDetails> {
        self.authorize(ctx, &permissions::USER_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;
        self.push_user_event(ctx, model, event).await?;
        info!(user_id = %model.base.aggregate_id, sequence = model.base.processed_sequence, "{message}");
        Ok(model.base.object_details())
    }

    async fn push_user_event(&self, ctx: &CommandContext, model: &mut HumanWriteModel, event: UserEvent) -> Result<()> {
        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, model, vec![command]).await?;
        Ok(())
    }
}
