use async_trait::async_trait;
use tracing::{error, info};

use warden_auth::permissions;
use warden_core::{CommandContext, Error, Exists, ObjectDetails, Result};
use warden_events::Command;
use warden_infra::random_token;
use warden_org::{
    DomainValidationType, OrgDomainAdded, OrgDomainEvent, OrgDomainPrimarySet, OrgDomainRemoved,
    OrgDomainVerificationAdded, OrgDomainVerificationFailed, OrgDomainVerified, OrgDomainWriteModel,
    aggregate,
};

use crate::Commands;
use crate::commands::required;

const VALIDATION_TOKEN_BYTES: usize = 24;

/// Checks that a validation token is published on a domain.
#[async_trait]
pub trait DomainVerifier: Send + Sync {
    async fn check(&self, domain: &str, token: &str, validation_type: DomainValidationType) -> Result<()>;
}

/// Token the organization has to publish, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainValidation {
    pub token: String,
    pub url: String,
    pub details: ObjectDetails,
}

impl Commands {
    pub async fn add_org_domain(&self, ctx: &CommandContext, org_id: &str, domain: &str) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let domain = required(domain, "domain")?.to_lowercase();

        self.existing_org(ctx, org_id).await?;
        let mut model = OrgDomainWriteModel::new(org_id, domain.clone());
        self.filter_to_reducer(ctx, &mut model).await?;
        if model.exists() {
            return Err(Error::already_exists("domain already added to the organization"));
        }
        self.authorize(ctx, &permissions::ORG_WRITE, org_id, org_id)?;

        let event = OrgDomainEvent::Added(OrgDomainAdded { domain: domain.clone() });
        self.push_domain_event(ctx, &mut model, event).await?;
        info!(org_id, domain = %domain, "organization domain added");
        Ok(model.base.object_details())
    }

    /// Marks the domain verified and reserves it instance-wide. Users of
    /// other organizations in `claimed_user_ids` whose login name is on the
    /// domain are moved to temporary names in the same push; users that
    /// cannot be claimed are skipped.
    pub async fn verify_org_domain(
        &self,
        ctx: &CommandContext,
        org_id: &str,
        domain: &str,
        claimed_user_ids: &[String],
    ) -> Result<ObjectDetails> {
        let mut model = self.unverified_domain(ctx, org_id, domain).await?;
        self.authorize(ctx, &permissions::ORG_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;
        self.commit_verification(ctx, &mut model, claimed_user_ids).await
    }

    /// Issues a fresh validation token for the domain. The token is stored
    /// encrypted and replaces any earlier one.
    pub async fn generate_org_domain_validation(
        &self,
        ctx: &CommandContext,
        org_id: &str,
        domain: &str,
        validation_type: DomainValidationType,
    ) -> Result<DomainValidation> {
        let mut model = self.unverified_domain(ctx, org_id, domain).await?;
        self.authorize(ctx, &permissions::ORG_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let token = random_token(VALIDATION_TOKEN_BYTES)?;
        let validation_code = self.encryptor.encrypt(token.as_bytes())?;
        let event = OrgDomainEvent::VerificationAdded(OrgDomainVerificationAdded {
            domain: model.domain.clone(),
            validation_type,
            validation_code,
        });
        self.push_domain_event(ctx, &mut model, event).await?;

        info!(org_id = %model.base.aggregate_id, domain = %model.domain, ?validation_type, "domain validation generated");
        Ok(DomainValidation {
            url: validation_type.token_url(&model.domain, &token),
            token,
            details: model.base.object_details(),
        })
    }

    /// Checks the last generated token through the configured verifier.
    /// Success verifies the domain like [`Commands::verify_org_domain`];
    /// a failed check is recorded and its error returned.
    pub async fn validate_org_domain(
        &self,
        ctx: &CommandContext,
        org_id: &str,
        domain: &str,
        claimed_user_ids: &[String],
    ) -> Result<ObjectDetails> {
        let mut model = self.unverified_domain(ctx, org_id, domain).await?;
        let (Some(validation_type), Some(code)) = (model.validation_type, model.validation_code.as_ref()) else {
            return Err(Error::precondition("domain verification is missing"));
        };
        self.authorize(ctx, &permissions::ORG_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;
        let verifier = self
            .domain_verifier
            .as_ref()
            .ok_or_else(|| Error::precondition("no domain verifier is configured"))?;

        let token = String::from_utf8(self.encryptor.decrypt(code)?)
            .map_err(|_| Error::internal("validation token is not utf-8"))?;
        let checked = verifier.check(&model.domain, &token, validation_type).await;
        match checked {
            Ok(()) => self.commit_verification(ctx, &mut model, claimed_user_ids).await,
            Err(check) => {
                let event = OrgDomainEvent::VerificationFailed(OrgDomainVerificationFailed {
                    domain: model.domain.clone(),
                });
                if let Err(push) = self.push_domain_event(ctx, &mut model, event).await {
                    error!(org_id = %model.base.aggregate_id, domain = %model.domain, error = %push, "recording failed verification");
                }
                info!(org_id = %model.base.aggregate_id, domain = %model.domain, error = %check, "domain verification failed");
                Err(check)
            }
        }
    }

    pub async fn set_primary_org_domain(&self, ctx: &CommandContext, org_id: &str, domain: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_domain(ctx, org_id, domain).await?;
        if !model.verified {
            return Err(Error::precondition("only verified domains can be primary"));
        }
        if model.primary {
            return Err(Error::precondition("domain is already primary"));
        }
        self.authorize(ctx, &permissions::ORG_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let event = OrgDomainEvent::PrimarySet(OrgDomainPrimarySet {
            domain: model.domain.clone(),
        });
        self.push_domain_event(ctx, &mut model, event).await?;
        info!(org_id = %model.base.aggregate_id, domain = %model.domain, "primary domain set");
        Ok(model.base.object_details())
    }

    pub async fn remove_org_domain(&self, ctx: &CommandContext, org_id: &str, domain: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_domain(ctx, org_id, domain).await?;
        if model.primary {
            return Err(Error::precondition("primary domain cannot be removed"));
        }
        self.authorize(ctx, &permissions::ORG_WRITE, &model.base.resource_owner, &model.base.aggregate_id)?;

        let event = OrgDomainEvent::Removed(OrgDomainRemoved {
            domain: model.domain.clone(),
            was_verified: model.verified,
        });
        self.push_domain_event(ctx, &mut model, event).await?;
        info!(org_id = %model.base.aggregate_id, domain = %model.domain, "organization domain removed");
        Ok(model.base.object_details())
    }

    async fn commit_verification(
        &self,
        ctx: &CommandContext,
        model: &mut OrgDomainWriteModel,
        claimed_user_ids: &[String],
    ) -> Result<ObjectDetails> {
        let agg = aggregate(&model.base.aggregate_id, ctx.instance_id());
        let verified = OrgDomainEvent::Verified(OrgDomainVerified {
            domain: model.domain.clone(),
        });
        let mut commands = vec![Command::new(ctx, &agg, &verified)?.expecting(model.base.expected_version())];
        let claims = self
            .cascade_domain_claims(ctx, &model.base.aggregate_id, &model.domain, claimed_user_ids)
            .await;
        let (claimed, skipped) = (claims.len(), claims.skipped());
        commands.extend(claims.into_commands());

        self.push_and_reduce(ctx, model, commands).await?;
        info!(
            org_id = %model.base.aggregate_id,
            domain = %model.domain,
            claimed_users = claimed,
            skipped_claims = skipped,
            "organization domain verified"
        );
        Ok(model.base.object_details())
    }

    async fn unverified_domain(&self, ctx: &CommandContext, org_id: &str, domain: &str) -> Result<OrgDomainWriteModel> {
        let model = self.existing_domain(ctx, org_id, domain).await?;
        if model.verified {
            return Err(Error::precondition("domain is already verified"));
        }
        Ok(model)
    }

    async fn existing_domain(&self, ctx: &CommandContext, org_id: &str, domain: &str) -> Result<OrgDomainWriteModel> {
        let org_id = required(org_id, "organization id")?;
        let domain = required(domain, "domain")?.to_lowercase();
        let mut model = OrgDomainWriteModel::new(org_id, domain);
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("domain not found on the organization"));
        }
        Ok(model)
    }

    async fn push_domain_event(
        &self,
        ctx: &CommandContext,
        model: &mut OrgDomainWriteModel,
        event: OrgDomainEvent,
    ) -> Result<()> {
        let agg = aggregate(&model.base.aggregate_id, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, model, vec![command]).await?;
        Ok(())
    }
}
