//! Best-effort side effects on dependents of a mutated entity.
//!
//! A cascade never fails the primary command: each dependent either yields
//! a draft that joins the primary push, or is logged and skipped.

use tracing::{debug, warn};

use warden_core::{CommandContext, Error, Exists, ExpectedVersion, Result};
use warden_events::Command;
use warden_policy::{IdpProviderRemoved, OrgLoginPolicyEvent, OrgLoginPolicyWriteModel};
use warden_user::{
    HumanWriteModel, UserDomainClaimed, UserEvent, UserIdpLinkEvent, UserIdpLinkRemoved,
    UserIdpLinkWriteModel,
};
use warden_usergrant::{
    GroupGrantChanged, GroupGrantEvent, GroupGrantWriteModel, UserGrantCascadeChanged,
    UserGrantEvent, UserGrantWriteModel, aggregate as user_grant_aggregate, group_grant_aggregate,
};

use crate::Commands;

/// Reference to a user's link with an external identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpLinkRef {
    pub user_id: String,
    pub external_user_id: String,
}

impl IdpLinkRef {
    pub fn new(user_id: impl Into<String>, external_user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            external_user_id: external_user_id.into(),
        }
    }
}

/// Collects cascade drafts for one primary command.
#[derive(Debug)]
pub struct CascadeBatch {
    kind: &'static str,
    commands: Vec<Command>,
    skipped: usize,
}

impl CascadeBatch {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            commands: Vec::new(),
            skipped: 0,
        }
    }

    /// Records the outcome for one dependent. `Ok(None)` means the
    /// dependent is not affected.
    pub fn add(&mut self, dependent_id: &str, outcome: Result<Option<Command>>) {
        match outcome {
            Ok(Some(command)) => self.commands.push(command),
            Ok(None) => debug!(cascade = self.kind, dependent_id, "dependent unaffected"),
            Err(error) => {
                self.skipped += 1;
                warn!(cascade = self.kind, dependent_id, %error, "cascade skipped");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// What happens to a dependent user or group grant.
#[derive(Debug, Clone, Copy)]
pub(crate) enum GrantCascade<'a> {
    /// The referenced project, project grant or grantee is gone.
    Remove,
    /// These role keys no longer exist upstream.
    DropRoles(&'a [String]),
}

/// Which upstream a hinted user grant must reference to be touched.
#[derive(Debug, Clone, Copy)]
pub(crate) enum UserGrantScope<'a> {
    Project(&'a str),
    ProjectGrant(&'a str),
    User(&'a str),
}

impl UserGrantScope<'_> {
    fn covers(&self, model: &UserGrantWriteModel) -> bool {
        match self {
            UserGrantScope::Project(id) => model.project_id == *id,
            UserGrantScope::ProjectGrant(id) => model.project_grant_id.as_deref() == Some(*id),
            UserGrantScope::User(id) => model.user_id == *id,
        }
    }
}

/// Which upstream a hinted group grant must reference to be touched.
#[derive(Debug, Clone, Copy)]
pub(crate) enum GroupGrantScope<'a> {
    Project(&'a str),
    Group(&'a str),
}

impl GroupGrantScope<'_> {
    fn covers(&self, model: &GroupGrantWriteModel) -> bool {
        match self {
            GroupGrantScope::Project(id) => model.project_id == *id,
            GroupGrantScope::Group(id) => model.group_id == *id,
        }
    }
}

impl Commands {
    /// Cascade drafts for caller-hinted user grants.
    pub(crate) async fn cascade_user_grants(
        &self,
        ctx: &CommandContext,
        user_grant_ids: &[String],
        scope: UserGrantScope<'_>,
        action: GrantCascade<'_>,
    ) -> CascadeBatch {
        let mut batch = CascadeBatch::new(match action {
            GrantCascade::Remove => "user.grant.cascade.removed",
            GrantCascade::DropRoles(_) => "user.grant.cascade.changed",
        });
        for id in user_grant_ids {
            let outcome = self.user_grant_cascade(ctx, id, scope, action).await;
            batch.add(id, outcome);
        }
        batch
    }

    async fn user_grant_cascade(
        &self,
        ctx: &CommandContext,
        user_grant_id: &str,
        scope: UserGrantScope<'_>,
        action: GrantCascade<'_>,
    ) -> Result<Option<Command>> {
        let mut model = UserGrantWriteModel::new(user_grant_id, "");
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("user grant does not exist"));
        }
        if !scope.covers(&model) {
            return Err(Error::precondition(
                "user grant does not reference the changed entity",
            ));
        }

        let event = match action {
            GrantCascade::Remove => UserGrantEvent::CascadeRemoved(model.removed_payload()),
            GrantCascade::DropRoles(removed) => {
                if !model.role_keys.iter().any(|k| removed.contains(k)) {
                    return Ok(None);
                }
                let role_keys = model
                    .role_keys
                    .iter()
                    .filter(|k| !removed.contains(k))
                    .cloned()
                    .collect();
                UserGrantEvent::CascadeChanged(UserGrantCascadeChanged { role_keys })
            }
        };
        let aggregate =
            user_grant_aggregate(user_grant_id, &model.base.resource_owner, ctx.instance_id());
        Ok(Some(
            Command::new(ctx, &aggregate, &event)?.expecting(ExpectedVersion::Any),
        ))
    }

    /// Cascade drafts for caller-hinted group grants.
    pub(crate) async fn cascade_group_grants(
        &self,
        ctx: &CommandContext,
        group_grant_ids: &[String],
        scope: GroupGrantScope<'_>,
        action: GrantCascade<'_>,
    ) -> CascadeBatch {
        let mut batch = CascadeBatch::new(match action {
            GrantCascade::Remove => "group.grant.cascade.removed",
            GrantCascade::DropRoles(_) => "group.grant.cascade.changed",
        });
        for id in group_grant_ids {
            let outcome = self.group_grant_cascade(ctx, id, scope, action).await;
            batch.add(id, outcome);
        }
        batch
    }

    async fn group_grant_cascade(
        &self,
        ctx: &CommandContext,
        group_grant_id: &str,
        scope: GroupGrantScope<'_>,
        action: GrantCascade<'_>,
    ) -> Result<Option<Command>> {
        let mut model = GroupGrantWriteModel::new(group_grant_id, "");
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("group grant does not exist"));
        }
        if !scope.covers(&model) {
            return Err(Error::precondition(
                "group grant does not reference the changed entity",
            ));
        }

        let event = match action {
            GrantCascade::Remove => GroupGrantEvent::CascadeRemoved(model.removed_payload()),
            GrantCascade::DropRoles(removed) => match model.without_roles(removed) {
                Some(role_keys) => GroupGrantEvent::CascadeChanged(GroupGrantChanged { role_keys }),
                None => return Ok(None),
            },
        };
        let aggregate =
            group_grant_aggregate(group_grant_id, &model.base.resource_owner, ctx.instance_id());
        Ok(Some(
            Command::new(ctx, &aggregate, &event)?.expecting(ExpectedVersion::Any),
        ))
    }

    /// Cascade drafts unlinking a removed instance IDP from the hinted
    /// organizations' login policies.
    pub(crate) async fn cascade_login_policy_idps(
        &self,
        ctx: &CommandContext,
        idp_config_id: &str,
        org_ids: &[String],
    ) -> CascadeBatch {
        let mut batch = CascadeBatch::new("org.policy.login.idpprovider.cascade.removed");
        for org_id in org_ids {
            let outcome = self.login_policy_idp_cascade(ctx, idp_config_id, org_id).await;
            batch.add(org_id, outcome);
        }
        batch
    }

    async fn login_policy_idp_cascade(
        &self,
        ctx: &CommandContext,
        idp_config_id: &str,
        org_id: &str,
    ) -> Result<Option<Command>> {
        let mut policy = OrgLoginPolicyWriteModel::new(org_id);
        self.filter_to_reducer(ctx, &mut policy).await?;
        if !policy.exists() {
            return Err(Error::not_found("login policy does not exist on the organization"));
        }
        if !policy.policy.has_idp_provider(idp_config_id) {
            return Ok(None);
        }
        let event = OrgLoginPolicyEvent::IdpProviderCascadeRemoved(IdpProviderRemoved {
            idp_config_id: idp_config_id.to_string(),
        });
        let aggregate = warden_org::aggregate(org_id, ctx.instance_id());
        Ok(Some(
            Command::new(ctx, &aggregate, &event)?.expecting(ExpectedVersion::Any),
        ))
    }

    /// Cascade drafts moving users of other organizations off a domain that
    /// `org_id` just verified.
    pub(crate) async fn cascade_domain_claims(
        &self,
        ctx: &CommandContext,
        org_id: &str,
        domain: &str,
        user_ids: &[String],
    ) -> CascadeBatch {
        let mut batch = CascadeBatch::new("user.domain.claimed");
        for user_id in user_ids {
            let outcome = self.domain_claim(ctx, org_id, domain, user_id).await;
            batch.add(user_id, outcome);
        }
        batch
    }

    async fn domain_claim(
        &self,
        ctx: &CommandContext,
        org_id: &str,
        domain: &str,
        user_id: &str,
    ) -> Result<Option<Command>> {
        let mut model = HumanWriteModel::new(user_id, "");
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("user does not exist"));
        }
        // members of the verifying organization keep their login names
        if model.base.resource_owner == org_id {
            return Ok(None);
        }
        let suffix = format!("@{domain}");
        if !model.username.to_lowercase().ends_with(&suffix) {
            return Err(Error::precondition("login name is not on the claimed domain"));
        }

        let event = UserEvent::DomainClaimed(UserDomainClaimed {
            username: format!("{}@temporary.{}", self.id_generator.next_id()?, ctx.instance_id()),
            old_username: model.username.clone(),
        });
        let aggregate =
            warden_user::aggregate(user_id, &model.base.resource_owner, ctx.instance_id());
        Ok(Some(
            Command::new(ctx, &aggregate, &event)?.expecting(ExpectedVersion::Any),
        ))
    }

    /// Cascade drafts unlinking hinted users from a removed or unlinked IDP,
    /// whether the IDP belonged to an organization or to the instance.
    pub(crate) async fn cascade_idp_links(
        &self,
        ctx: &CommandContext,
        idp_config_id: &str,
        links: &[IdpLinkRef],
    ) -> CascadeBatch {
        let mut batch = CascadeBatch::new("user.human.externalidp.cascade.removed");
        for link in links {
            let outcome = self.idp_link_cascade(ctx, idp_config_id, link).await;
            batch.add(&link.user_id, outcome);
        }
        batch
    }

    async fn idp_link_cascade(
        &self,
        ctx: &CommandContext,
        idp_config_id: &str,
        link: &IdpLinkRef,
    ) -> Result<Option<Command>> {
        let mut model =
            UserIdpLinkWriteModel::new(&link.user_id, idp_config_id, &link.external_user_id);
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("identity provider link does not exist"));
        }
        let event = UserIdpLinkEvent::CascadeRemoved(UserIdpLinkRemoved {
            idp_config_id: idp_config_id.to_string(),
            external_user_id: link.external_user_id.clone(),
        });
        let aggregate =
            warden_user::aggregate(&link.user_id, &model.base.resource_owner, ctx.instance_id());
        Ok(Some(
            Command::new(ctx, &aggregate, &event)?.expecting(ExpectedVersion::Any),
        ))
    }
}
