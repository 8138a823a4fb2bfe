use tracing::info;

use warden_auth::permissions;
use warden_core::{CommandContext, Error, Exists, LifecycleState, ObjectDetails, Result};
use warden_events::{Command, SearchCriteria, SearchResult};
use warden_org::ORG_SEARCH_TYPE;
use warden_project::{
    GRANT_SEARCH_TYPE, GRANTED_ORG_SEARCH_FIELD, PROJECT_SEARCH_TYPE, ROLE_KEY_SEARCH_FIELD,
    STATE_SEARCH_FIELD,
};
use warden_user::{GROUP_AGGREGATE_TYPE, GROUP_SEARCH_TYPE, USER_SEARCH_TYPE, UserState};
use warden_usergrant::{
    GrantFacts, GrantPreConditionReadModel, GrantPreconditions, Grantee, UserGrantAdded,
    UserGrantChanged, UserGrantDeactivated, UserGrantEvent, UserGrantReactivated,
    UserGrantWriteModel, aggregate,
};

use crate::Commands;
use crate::commands::{distinct_keys, indexed_state, last_details, required};
use crate::config::PreconditionStrategy;
use crate::project_grant::{indexed_role_keys, project_roles_criteria, project_state_criteria};

/// Request to grant project roles to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddUserGrant {
    pub user_grant_id: Option<String>,
    pub user_id: String,
    pub project_id: String,
    /// Set when the project belongs to another organization and reaches
    /// `org_id` through a project grant.
    pub project_grant_id: Option<String>,
    pub role_keys: Vec<String>,
}

fn grantee_criteria(grantee: &Grantee) -> SearchCriteria {
    match grantee {
        Grantee::User(user_id) => SearchCriteria::aggregate(warden_user::AGGREGATE_TYPE, user_id)
            .object_type(USER_SEARCH_TYPE)
            .field_name(warden_user::STATE_SEARCH_FIELD),
        Grantee::Group(group_id) => SearchCriteria::aggregate(GROUP_AGGREGATE_TYPE, group_id)
            .object_type(GROUP_SEARCH_TYPE)
            .field_name(warden_user::STATE_SEARCH_FIELD),
    }
}

/// Users may be granted across organizations; groups only inside their own.
fn indexed_grantee_exists(results: &[SearchResult], grantee: &Grantee, org_id: &str) -> Result<bool> {
    match grantee {
        Grantee::User(user_id) => Ok(results
            .iter()
            .find(|r| {
                r.aggregate.aggregate_type == warden_user::AGGREGATE_TYPE
                    && r.aggregate.id == *user_id
                    && r.object_type == USER_SEARCH_TYPE
            })
            .map(|r| r.value_as::<UserState>())
            .transpose()?
            .is_some_and(|state| state.exists())),
        Grantee::Group(group_id) => Ok(indexed_state(results, GROUP_AGGREGATE_TYPE, group_id, GROUP_SEARCH_TYPE)?
            .is_some_and(|(state, owner)| state.exists() && owner == org_id)),
    }
}

/// Folds the index entries of one project grant.
fn indexed_grant(results: &[SearchResult], project_id: &str, grant_id: &str) -> Result<Option<GrantFacts>> {
    let mut facts: Option<GrantFacts> = None;
    for r in results.iter().filter(|r| {
        r.aggregate.aggregate_type == warden_project::AGGREGATE_TYPE
            && r.aggregate.id == project_id
            && r.object_type == GRANT_SEARCH_TYPE
            && r.object_id == grant_id
    }) {
        let grant = facts.get_or_insert_with(GrantFacts::default);
        match r.field_name.as_str() {
            STATE_SEARCH_FIELD => grant.state = r.value_as()?,
            GRANTED_ORG_SEARCH_FIELD => grant.granted_org_id = r.value_as()?,
            ROLE_KEY_SEARCH_FIELD => grant.role_keys.push(r.value_as()?),
            _ => {}
        }
    }
    Ok(facts)
}

impl Commands {
    /// Collects the facts a grant of `org_id` depends on, with the configured
    /// strategy.
    pub(crate) async fn grant_preconditions(
        &self,
        ctx: &CommandContext,
        org_id: &str,
        grantee: &Grantee,
        project_id: &str,
        project_grant_id: Option<&str>,
    ) -> Result<GrantPreconditions> {
        match self.config.precondition_strategy {
            PreconditionStrategy::Replay => {
                let mut model = GrantPreConditionReadModel::new(
                    org_id,
                    grantee.clone(),
                    project_id,
                    project_grant_id.map(str::to_string),
                );
                self.filter_to_reducer(ctx, &mut model).await?;
                Ok(model.facts)
            }
            PreconditionStrategy::Search => {
                let mut criteria = vec![
                    grantee_criteria(grantee),
                    SearchCriteria::aggregate(warden_org::AGGREGATE_TYPE, org_id)
                        .object_type(ORG_SEARCH_TYPE)
                        .field_name(warden_org::STATE_SEARCH_FIELD),
                    project_state_criteria(project_id),
                    project_roles_criteria(project_id),
                ];
                if let Some(grant_id) = project_grant_id {
                    criteria.push(
                        SearchCriteria::aggregate(warden_project::AGGREGATE_TYPE, project_id)
                            .object_type(GRANT_SEARCH_TYPE)
                            .object_id(grant_id),
                    );
                }
                let results = self.search(ctx, &criteria).await?;

                let grantee_exists = indexed_grantee_exists(&results, grantee, org_id)?;
                let org_state = indexed_state(&results, warden_org::AGGREGATE_TYPE, org_id, ORG_SEARCH_TYPE)?
                    .map(|(state, _)| state)
                    .unwrap_or_default();
                let (project_state, project_owner) =
                    indexed_state(&results, warden_project::AGGREGATE_TYPE, project_id, PROJECT_SEARCH_TYPE)?
                        .unwrap_or_default();
                let grant = match project_grant_id {
                    Some(grant_id) => indexed_grant(&results, project_id, grant_id)?,
                    None => None,
                };
                Ok(GrantPreconditions {
                    grantee_exists,
                    org_state,
                    project_state,
                    project_owner,
                    project_roles: indexed_role_keys(&results, project_id)?,
                    grant,
                })
            }
        }
    }

    /// Grants on a project grant may be authorized on the grant itself or,
    /// failing that, on its project.
    pub(crate) fn authorize_grant(
        &self,
        ctx: &CommandContext,
        permission: &warden_auth::Permission,
        model_owner: &str,
        project_id: &str,
        project_grant_id: Option<&str>,
    ) -> Result<()> {
        match project_grant_id {
            Some(grant_id) => self.authorize_with_fallback(ctx, permission, model_owner, grant_id, project_id),
            None => self.authorize(ctx, permission, model_owner, project_id),
        }
    }

    pub async fn add_user_grant(&self, ctx: &CommandContext, org_id: &str, request: AddUserGrant) -> Result<ObjectDetails> {
        let org_id = required(org_id, "organization id")?;
        let user_id = required(&request.user_id, "user id")?;
        let project_id = required(&request.project_id, "project id")?;
        let project_grant_id = request
            .project_grant_id
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty());
        let role_keys = distinct_keys(&request.role_keys, "role key")?;

        let preconditions = self
            .grant_preconditions(ctx, org_id, &Grantee::User(user_id.to_string()), project_id, project_grant_id)
            .await?;
        preconditions.check(org_id, project_grant_id, &role_keys)?;

        let user_grant_id = self.id_or_next(request.user_grant_id.clone())?;
        let mut model = UserGrantWriteModel::new(user_grant_id.clone(), "");
        self.filter_to_reducer(ctx, &mut model).await?;
        if model.state != LifecycleState::Unspecified {
            return Err(Error::already_exists("user grant already exists"));
        }
        self.authorize_grant(ctx, &permissions::USER_GRANT_WRITE, org_id, project_id, project_grant_id)?;

        let event = UserGrantEvent::Added(UserGrantAdded {
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            project_grant_id: project_grant_id.map(str::to_string),
            role_keys,
        });
        let agg = aggregate(&user_grant_id, org_id, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;

        info!(user_grant_id = %user_grant_id, user_id, project_id, "user grant added");
        Ok(model.base.object_details().with_id(user_grant_id))
    }

    /// Replaces the granted roles; identical roles are rejected.
    pub async fn change_user_grant(
        &self,
        ctx: &CommandContext,
        user_grant_id: &str,
        role_keys: &[String],
    ) -> Result<ObjectDetails> {
        let role_keys = distinct_keys(role_keys, "role key")?;
        let mut model = self.existing_user_grant(ctx, user_grant_id).await?;
        let mut current = model.role_keys.clone();
        let mut requested = role_keys.clone();
        current.sort();
        requested.sort();
        if current == requested {
            return Err(Error::precondition("user grant roles are unchanged"));
        }

        let owner = model.base.resource_owner.clone();
        let project_grant_id = model.project_grant_id.clone();
        let preconditions = self
            .grant_preconditions(
                ctx,
                &owner,
                &Grantee::User(model.user_id.clone()),
                &model.project_id,
                project_grant_id.as_deref(),
            )
            .await?;
        preconditions.check(&owner, project_grant_id.as_deref(), &role_keys)?;
        self.authorize_grant(
            ctx,
            &permissions::USER_GRANT_WRITE,
            &owner,
            &model.project_id,
            project_grant_id.as_deref(),
        )?;

        self.push_user_grant_event(ctx, &mut model, UserGrantEvent::Changed(UserGrantChanged { role_keys }))
            .await?;
        info!(user_grant_id = %model.base.aggregate_id, "user grant changed");
        Ok(model.base.object_details())
    }

    pub async fn deactivate_user_grant(&self, ctx: &CommandContext, user_grant_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_user_grant(ctx, user_grant_id).await?;
        if model.state != LifecycleState::Active {
            return Err(Error::precondition("user grant is not active"));
        }
        self.authorize_grant(
            ctx,
            &permissions::USER_GRANT_WRITE,
            &model.base.resource_owner,
            &model.project_id,
            model.project_grant_id.as_deref(),
        )?;

        self.push_user_grant_event(ctx, &mut model, UserGrantEvent::Deactivated(UserGrantDeactivated {}))
            .await?;
        info!(user_grant_id = %model.base.aggregate_id, "user grant deactivated");
        Ok(model.base.object_details())
    }

    pub async fn reactivate_user_grant(&self, ctx: &CommandContext, user_grant_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_user_grant(ctx, user_grant_id).await?;
        if model.state != LifecycleState::Inactive {
            return Err(Error::precondition("user grant is not inactive"));
        }
        self.authorize_grant(
            ctx,
            &permissions::USER_GRANT_WRITE,
            &model.base.resource_owner,
            &model.project_id,
            model.project_grant_id.as_deref(),
        )?;

        self.push_user_grant_event(ctx, &mut model, UserGrantEvent::Reactivated(UserGrantReactivated {}))
            .await?;
        info!(user_grant_id = %model.base.aggregate_id, "user grant reactivated");
        Ok(model.base.object_details())
    }

    pub async fn remove_user_grant(&self, ctx: &CommandContext, user_grant_id: &str) -> Result<ObjectDetails> {
        let mut model = self.existing_user_grant(ctx, user_grant_id).await?;
        let command = self.user_grant_removal(ctx, &model)?;
        self.push_and_reduce(ctx, &mut model, vec![command]).await?;
        info!(user_grant_id = %model.base.aggregate_id, "user grant removed");
        Ok(model.base.object_details())
    }

    /// Removes every listed grant in one push. Any missing or forbidden
    /// grant rejects the whole batch before anything is written. The details
    /// are those of the last removal.
    pub async fn bulk_remove_user_grants(
        &self,
        ctx: &CommandContext,
        user_grant_ids: &[String],
    ) -> Result<ObjectDetails> {
        let ids = distinct_keys(user_grant_ids, "user grant id")?;
        if ids.is_empty() {
            return Err(Error::invalid_argument("at least one user grant id is required"));
        }
        let mut commands = Vec::with_capacity(ids.len());
        for id in &ids {
            let model = self.existing_user_grant(ctx, id).await?;
            commands.push(self.user_grant_removal(ctx, &model)?);
        }
        let pushed = self.push(ctx, commands).await?;
        info!(count = ids.len(), "user grants removed");
        last_details(&pushed)
    }

    fn user_grant_removal(&self, ctx: &CommandContext, model: &UserGrantWriteModel) -> Result<Command> {
        self.authorize_grant(
            ctx,
            &permissions::USER_GRANT_DELETE,
            &model.base.resource_owner,
            &model.project_id,
            model.project_grant_id.as_deref(),
        )?;
        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let event = UserGrantEvent::Removed(model.removed_payload());
        Ok(Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version()))
    }

    async fn existing_user_grant(&self, ctx: &CommandContext, user_grant_id: &str) -> Result<UserGrantWriteModel> {
        let user_grant_id = required(user_grant_id, "user grant id")?;
        let owner = self
            .resolve_resource_owner(ctx, warden_usergrant::AGGREGATE_TYPE, user_grant_id)
            .await?;
        let mut model = UserGrantWriteModel::new(user_grant_id, owner);
        self.filter_to_reducer(ctx, &mut model).await?;
        if !model.exists() {
            return Err(Error::not_found("user grant not found"));
        }
        Ok(model)
    }

    async fn push_user_grant_event(
        &self,
        ctx: &CommandContext,
        model: &mut UserGrantWriteModel,
        event: UserGrantEvent,
    ) -> Result<()> {
        let agg = aggregate(&model.base.aggregate_id, &model.base.resource_owner, ctx.instance_id());
        let command = Command::new(ctx, &agg, &event)?.expecting(model.base.expected_version());
        self.push_and_reduce(ctx, model, vec![command]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use warden_events::Aggregate;

    use super::*;

    fn entry(field_name: &str, value: serde_json::Value) -> SearchResult {
        SearchResult {
            aggregate: Aggregate::new("project", "p1", "o1", "inst"),
            object_type: GRANT_SEARCH_TYPE.to_string(),
            object_id: "g1".to_string(),
            field_name: field_name.to_string(),
            value,
        }
    }

    #[test]
    fn grant_facts_are_folded_from_index_entries() {
        let results = vec![
            entry(STATE_SEARCH_FIELD, json!("inactive")),
            entry(GRANTED_ORG_SEARCH_FIELD, json!("o2")),
            entry(ROLE_KEY_SEARCH_FIELD, json!("A")),
            entry(ROLE_KEY_SEARCH_FIELD, json!("B")),
        ];
        let facts = indexed_grant(&results, "p1", "g1").unwrap().unwrap();
        assert_eq!(facts.state, LifecycleState::Inactive);
        assert_eq!(facts.granted_org_id, "o2");
        assert_eq!(facts.role_keys, vec!["A".to_string(), "B".to_string()]);

        assert_eq!(indexed_grant(&results, "p1", "other").unwrap(), None);
    }
}
