use tracing::info;

use warden_auth::permissions;
use warden_core::{CommandContext, Error, Exists, LifecycleState, ObjectDetails, Result};
use warden_events::Command;
use warden_org::{
    OrgAdded, OrgChanged, OrgDeactivated, OrgDomainAdded, OrgDomainEvent, OrgEvent, OrgReactivated,
    OrgRemoved, OrgWriteModel, aggregate,
};

use crate::Commands;
use crate::commands::required;

/// Request to create an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOrg {
    /// Generated when absent.
    pub org_id: Option<String>,
    pub name: String,
    /// Added unverified, in this order.
    pub domains: Vec<String>,
}

impl Commands {
    pub async fn add_org(&self, ctx: &CommandContext, request: AddOrg) -> Result<ObjectDetails> {
        let name = required(&request.name, "organization name")?.to_string();
        let mut domains: Vec<String> = Vec::with_capacity(request.domains.len());
        for domain in &request.domains {
            let domain = required(domain, "domain")?.to_lowercase();
            if domains.contains(&domain) {
                return Err(Error::invalid_argument(format!("duplicate domain {domain:?}")));
            }
            domains.push(domain);
        }

        let org_id = self.id_or_next(request.org_id)?;
        let mut model = OrgWriteModel::new(org_id.clone());
        self.filter_to_reducer(ctx, &mut model).await?;
        if model.state != LifecycleState::Unspecified {
            return Err(Error::already_exists("organization already exists"));
        }
        self.authorize(ctx, &permissions::ORG_CREATE, &org_id, &org_id)?;

        let agg = aggregate(&org_id, ctx.instance_id());
        let expected = model.base.expected_version();
        let mut commands = vec![
            Command::new(ctx, &agg, &OrgEvent::Added(OrgAdded { name }))?.expecting(expected),
        ];
        for domain in domains {
            let event = OrgDomainEvent::Added(OrgDomainAdded { domain });
            commands.push(Command::new(ctx, &agg, &event)?.expecting(expected));
        }
        self.push_and_reduce(ctx, &mut model, commands).await?;

        info!(org_id = %org_id, sequence = model.base.processed_sequence, "organization added");
        Ok(model.base.object_details().with_id(org_id))
    }

    pub async fn change_org(&self, ctx: &CommandContext, org_id: &str, name: &str) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let name = required(name, "organization name")?;

        let mut model = self.existing_org(ctx, org_id).await?;
        if model.name == name {
            return Err(Error::precondition("organization name is unchanged"));
        }
        self.authorize(ctx, &permissions::ORG_WRITE, org_id, org_id)?;

        let event = OrgEvent::Changed(OrgChanged {
            name: name.to_string(),
            old_name: model.name.clone(),
        });
        self.push_org_event(ctx, &mut model, event).await?;
        info!(org_id, sequence = model.base.processed_sequence, "organization changed");
        Ok(model.base.object_details())
    }

    pub async fn deactivate_org(&self, ctx: &CommandContext, org_id: &str) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let mut model = self.existing_org(ctx, org_id).await?;
        if model.state != LifecycleState::Active {
            return Err(Error::precondition("organization is not active"));
        }
        self.authorize(ctx, &permissions::ORG_WRITE, org_id, org_id)?;

        self.push_org_event(ctx, &mut model, OrgEvent::Deactivated(OrgDeactivated {}))
            .await?;
        info!(org_id, sequence = model.base.processed_sequence, "organization deactivated");
        Ok(model.base.object_details())
    }

    pub async fn reactivate_org(&self, ctx: &CommandContext, org_id: &str) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let mut model = self.existing_org(ctx, org_id).await?;
        if model.state != LifecycleState::Inactive {
            return Err(Error::precondition("organization is not inactive"));
        }
        self.authorize(ctx, &permissions::ORG_WRITE, org_id, org_id)?;

        self.push_org_event(ctx, &mut model, OrgEvent::Reactivated(OrgReactivated {}))
            .await?;
        info!(org_id, sequence = model.base.processed_sequence, "organization reactivated");
        Ok(model.base.object_details())
    }

    /// Removes the organization and releases its name and verified domains.
    pub async fn remove_org(&self, ctx: &CommandContext, org_id: &str) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let mut model = self.existing_org(ctx, org_id).await?;
        self.authorize(ctx, &permissions::ORG_DELETE, org_id, org_id)?;

        let event = OrgEvent::Removed(OrgRemoved {
            name: model.name.clone(),
            verified_domains: model.verified_domains.clone(),
        });
        self.push_org_event(ctx, &mut model, event).await?;
        info!(org_id, sequence = model.base.processed_sequence, "organization removed");
        Ok(model.base.object_details())
    }

    pub(crate) async fn existing_org(&self, ctx: &CommandContext, org_id: &str) -> Result<OrgWriteModel> {
        let mut model = OrgWriteModel::new(org_id);
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("organization not found"));
        }
        Ok(model)
    }

    async fn push_org_event(
        &self,
        ctx: &CommandContext,
        model: &mut OrgWriteModel,
        event: OrgEvent,
    ) -> Result<()> {
        let agg = aggregate(&model.base.aggregate_id, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, model, vec![command]).await?;
        Ok(())
    }
}
