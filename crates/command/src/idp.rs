use tracing::{debug, info};

use warden_auth::{Permission, permissions};
use warden_core::{CommandContext, Error, Exists, ObjectDetails, Result};
use warden_events::{Aggregate, Command, SearchCriteria};
use warden_org::{
    IDP_SEARCH_TYPE, IdpChanges, IdpConfigAdded, IdpConfigEvent, IdpConfigRemoved,
    IdpConfigWriteModel, IdpOwnerType, IdpProviderConfig, InstanceIdpConfigEvent, JwtConfig,
    OidcConfig, STATE_SEARCH_FIELD, aggregate, instance_aggregate,
};
use warden_policy::{IdpProviderRemoved, OrgLoginPolicyEvent, OrgLoginPolicyWriteModel};

use crate::Commands;
use crate::cascade::IdpLinkRef;
use crate::commands::required;

/// Request to register an OIDC identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddIdp {
    pub name: String,
    pub client_id: String,
    /// Plaintext; encrypted before it reaches an event.
    pub client_secret: String,
    pub issuer: String,
    pub scopes: Vec<String>,
}

/// Request to register a provider that issues JWTs to an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddJwtIdp {
    pub name: String,
    pub jwt_endpoint: String,
    pub issuer: String,
    pub keys_endpoint: String,
    /// Request header carrying the token.
    pub header_name: String,
}

/// Requested IDP settings; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeIdp {
    pub name: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub issuer: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub jwt_endpoint: Option<String>,
    pub keys_endpoint: Option<String>,
    pub header_name: Option<String>,
}

fn optional_required(value: Option<String>, what: &str) -> Result<Option<String>> {
    value
        .map(|v| required(&v, what).map(str::to_string))
        .transpose()
}

fn idp_aggregate(ctx: &CommandContext, owner: IdpOwnerType, aggregate_id: &str) -> Aggregate {
    match owner {
        IdpOwnerType::Org => aggregate(aggregate_id, ctx.instance_id()),
        IdpOwnerType::System => instance_aggregate(ctx.instance_id()),
    }
}

/// Drafts `event` on the aggregate owning the configuration.
fn idp_command(ctx: &CommandContext, model: &IdpConfigWriteModel, event: IdpConfigEvent) -> Result<Command> {
    let agg = idp_aggregate(ctx, model.owner, &model.base.aggregate_id);
    match model.owner {
        IdpOwnerType::Org => Command::new(ctx, &agg, &event),
        IdpOwnerType::System => Command::new(ctx, &agg, &InstanceIdpConfigEvent::from(event)),
    }
}

fn idp_permission(owner: IdpOwnerType) -> Permission {
    match owner {
        IdpOwnerType::Org => permissions::ORG_IDP_WRITE,
        IdpOwnerType::System => permissions::IAM_IDP_WRITE,
    }
}

impl AddJwtIdp {
    fn config(&self) -> Result<(String, IdpProviderConfig)> {
        let name = required(&self.name, "idp name")?.to_string();
        let config = JwtConfig {
            jwt_endpoint: required(&self.jwt_endpoint, "jwt endpoint")?.to_string(),
            issuer: required(&self.issuer, "issuer")?.to_string(),
            keys_endpoint: required(&self.keys_endpoint, "keys endpoint")?.to_string(),
            header_name: required(&self.header_name, "header name")?.to_string(),
        };
        Ok((name, IdpProviderConfig::Jwt(config)))
    }
}

impl Commands {
    pub async fn add_org_idp(&self, ctx: &CommandContext, org_id: &str, request: AddIdp) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let (name, config) = self.oidc_config(request)?;
        self.existing_org(ctx, org_id).await?;
        self.add_idp(ctx, IdpConfigWriteModel::new_org(org_id, ""), name, config).await
    }

    pub async fn add_org_jwt_idp(&self, ctx: &CommandContext, org_id: &str, request: AddJwtIdp) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let (name, config) = request.config()?;
        self.existing_org(ctx, org_id).await?;
        self.add_idp(ctx, IdpConfigWriteModel::new_org(org_id, ""), name, config).await
    }

    /// Registers an OIDC provider every organization of the instance may use.
    pub async fn add_instance_idp(&self, ctx: &CommandContext, request: AddIdp) -> Result<ObjectDetails> {
        let (name, config) = self.oidc_config(request)?;
        self.add_idp(ctx, IdpConfigWriteModel::new_instance(ctx.instance_id(), ""), name, config)
            .await
    }

    pub async fn add_instance_jwt_idp(&self, ctx: &CommandContext, request: AddJwtIdp) -> Result<ObjectDetails> {
        let (name, config) = request.config()?;
        self.add_idp(ctx, IdpConfigWriteModel::new_instance(ctx.instance_id(), ""), name, config)
            .await
    }

    /// Applies the provided settings; identical settings are a no-op.
    pub async fn change_org_idp(
        &self,
        ctx: &CommandContext,
        org_id: &str,
        idp_config_id: &str,
        request: ChangeIdp,
    ) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let model = self
            .existing_idp(ctx, IdpConfigWriteModel::new_org(org_id, idp_config_id.trim()))
            .await?;
        self.change_idp(ctx, model, request).await
    }

    pub async fn change_instance_idp(
        &self,
        ctx: &CommandContext,
        idp_config_id: &str,
        request: ChangeIdp,
    ) -> Result<ObjectDetails> {
        let model = self
            .existing_idp(ctx, IdpConfigWriteModel::new_instance(ctx.instance_id(), idp_config_id.trim()))
            .await?;
        self.change_idp(ctx, model, request).await
    }

    /// Removes the configuration, unlinks it from the org login policy and,
    /// best effort, from the hinted users.
    pub async fn remove_org_idp(
        &self,
        ctx: &CommandContext,
        org_id: &str,
        idp_config_id: &str,
        cascade_links: &[IdpLinkRef],
    ) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let mut model = self
            .existing_idp(ctx, IdpConfigWriteModel::new_org(org_id, idp_config_id.trim()))
            .await?;
        self.authorize(ctx, &permissions::ORG_IDP_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let mut policy = OrgLoginPolicyWriteModel::new(model.base.aggregate_id.clone());
        self.filter_to_reducer(ctx, &mut policy).await?;

        let idp_config_id = model.idp_config_id.clone();
        let mut commands = vec![
            idp_command(
                ctx,
                &model,
                IdpConfigEvent::Removed(IdpConfigRemoved {
                    idp_config_id: idp_config_id.clone(),
                }),
            )?
            .expecting(model.base.expected_version()),
        ];
        if policy.exists() && policy.policy.has_idp_provider(&idp_config_id) {
            let event = OrgLoginPolicyEvent::IdpProviderCascadeRemoved(IdpProviderRemoved {
                idp_config_id: idp_config_id.clone(),
            });
            let agg = aggregate(&model.base.aggregate_id, ctx.instance_id());
            commands.push(Command::new(ctx, &agg, &event)?);
        }
        let cascades = self.cascade_idp_links(ctx, &idp_config_id, cascade_links).await;
        let skipped = cascades.skipped();
        commands.extend(cascades.into_commands());

        self.push_and_reduce(ctx, &mut model, commands).await?;
        info!(idp_config_id = %idp_config_id, skipped_cascades = skipped, "identity provider removed");
        Ok(model.base.object_details())
    }

    /// Removes an instance IDP. Organizations' login policies and users'
    /// links to it are only known from the caller's hints and are
    /// unlinked best effort.
    pub async fn remove_instance_idp(
        &self,
        ctx: &CommandContext,
        idp_config_id: &str,
        cascade_policy_org_ids: &[String],
        cascade_links: &[IdpLinkRef],
    ) -> Result<ObjectDetails> {
        let mut model = self
            .existing_idp(ctx, IdpConfigWriteModel::new_instance(ctx.instance_id(), idp_config_id.trim()))
            .await?;
        self.authorize(ctx, &permissions::IAM_IDP_WRITE, ctx.instance_id(), ctx.instance_id())?;

        let idp_config_id = model.idp_config_id.clone();
        let mut commands = vec![
            idp_command(
                ctx,
                &model,
                IdpConfigEvent::Removed(IdpConfigRemoved {
                    idp_config_id: idp_config_id.clone(),
                }),
            )?
            .expecting(model.base.expected_version()),
        ];
        let policies = self
            .cascade_login_policy_idps(ctx, &idp_config_id, cascade_policy_org_ids)
            .await;
        let links = self.cascade_idp_links(ctx, &idp_config_id, cascade_links).await;
        let skipped = policies.skipped() + links.skipped();
        commands.extend(policies.into_commands());
        commands.extend(links.into_commands());

        self.push_and_reduce(ctx, &mut model, commands).await?;
        info!(idp_config_id = %idp_config_id, skipped_cascades = skipped, "instance identity provider removed");
        Ok(model.base.object_details())
    }

    fn oidc_config(&self, request: AddIdp) -> Result<(String, IdpProviderConfig)> {
        let name = required(&request.name, "idp name")?.to_string();
        let client_id = required(&request.client_id, "client id")?.to_string();
        let client_secret = required(&request.client_secret, "client secret")?;
        let issuer = required(&request.issuer, "issuer")?.to_string();
        let config = OidcConfig {
            client_id,
            client_secret: self.encryptor.encrypt(client_secret.as_bytes())?,
            issuer,
            scopes: request.scopes,
        };
        Ok((name, IdpProviderConfig::Oidc(config)))
    }

    /// Pushes a new configuration onto the aggregate `model` folds; the
    /// model's IDP id is assigned here.
    async fn add_idp(
        &self,
        ctx: &CommandContext,
        mut model: IdpConfigWriteModel,
        name: String,
        config: IdpProviderConfig,
    ) -> Result<ObjectDetails> {
        let owner = model.owner;
        self.authorize(ctx, &idp_permission(owner), &model.base.resource_owner, &model.base.aggregate_id)?;

        let idp_config_id = self.id_generator.next_id()?;
        model.idp_config_id.clone_from(&idp_config_id);
        self.filter_to_reducer(ctx, &mut model).await?;

        let idp_type = config.idp_type();
        let event = IdpConfigEvent::Added(IdpConfigAdded {
            idp_config_id: idp_config_id.clone(),
            name,
            config,
        });
        let command = idp_command(ctx, &model, event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;

        info!(
            resource_owner = %model.base.resource_owner,
            idp_config_id = %idp_config_id,
            idp_owner = ?owner,
            ?idp_type,
            "identity provider added"
        );
        Ok(model.base.object_details().with_id(idp_config_id))
    }

    async fn change_idp(
        &self,
        ctx: &CommandContext,
        mut model: IdpConfigWriteModel,
        request: ChangeIdp,
    ) -> Result<ObjectDetails> {
        let client_secret = match optional_required(request.client_secret, "client secret")? {
            Some(secret) => Some(self.encryptor.encrypt(secret.as_bytes())?),
            None => None,
        };
        let changes = IdpChanges {
            name: optional_required(request.name, "idp name")?,
            client_id: optional_required(request.client_id, "client id")?,
            client_secret,
            issuer: optional_required(request.issuer, "issuer")?,
            scopes: request.scopes,
            jwt_endpoint: optional_required(request.jwt_endpoint, "jwt endpoint")?,
            keys_endpoint: optional_required(request.keys_endpoint, "keys endpoint")?,
            header_name: optional_required(request.header_name, "header name")?,
        };

        let Some(event) = model.change_event(changes)? else {
            debug!(idp_config_id = %model.idp_config_id, "identity provider unchanged");
            return Ok(model.base.object_details());
        };
        self.authorize(ctx, &idp_permission(model.owner), &model.base.resource_owner, &model.base.aggregate_id)?;

        let command = idp_command(ctx, &model, IdpConfigEvent::Changed(event))?
            .expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;
        info!(
            idp_config_id = %model.idp_config_id,
            sequence = model.base.processed_sequence,
            "identity provider changed"
        );
        Ok(model.base.object_details())
    }

    async fn existing_idp(&self, ctx: &CommandContext, mut model: IdpConfigWriteModel) -> Result<IdpConfigWriteModel> {
        required(&model.idp_config_id, "idp config id")?;
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("identity provider not found"));
        }
        Ok(model)
    }

    /// Where an active IDP usable by `org_id` is configured: on the org
    /// itself or on the instance. Looked up in the field index.
    pub(crate) async fn available_idp(
        &self,
        ctx: &CommandContext,
        org_id: &str,
        idp_config_id: &str,
    ) -> Result<Option<IdpOwnerType>> {
        let criteria = [IdpOwnerType::Org, IdpOwnerType::System].map(|owner| {
            let aggregate_id = match owner {
                IdpOwnerType::Org => org_id,
                IdpOwnerType::System => ctx.instance_id(),
            };
            SearchCriteria::aggregate(owner.aggregate_type(), aggregate_id)
                .object_type(IDP_SEARCH_TYPE)
                .object_id(idp_config_id)
                .field_name(STATE_SEARCH_FIELD)
        });
        let results = self.search(ctx, &criteria).await?;
        let owner_of = |owner: IdpOwnerType| {
            results
                .iter()
                .any(|r| r.aggregate.aggregate_type == owner.aggregate_type())
                .then_some(owner)
        };
        Ok(owner_of(IdpOwnerType::Org).or_else(|| owner_of(IdpOwnerType::System)))
    }
}
