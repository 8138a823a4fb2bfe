use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use warden_core::{CommandContext, Error};

use crate::{Membership, Permission, RolePermissions};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("actor '{0}' has no membership in this instance")]
    NoMembership(String),

    #[error("forbidden: missing permission '{permission}' on '{aggregate_id}'")]
    Forbidden {
        permission: String,
        aggregate_id: String,
    },
}

impl From<AuthzError> for Error {
    fn from(value: AuthzError) -> Self {
        Error::permission_denied(value.to_string())
    }
}

/// Authorization port, checked at the command boundary.
///
/// `resource_owner` is the organization owning the target, `aggregate_id` the
/// most specific object the permission is requested on. Implementations must
/// not perform IO; the command layer resolves unknown owners beforehand.
pub trait PermissionGate: Send + Sync {
    fn check(
        &self,
        ctx: &CommandContext,
        permission: &Permission,
        resource_owner: &str,
        aggregate_id: &str,
    ) -> Result<(), AuthzError>;
}

impl<G> PermissionGate for std::sync::Arc<G>
where
    G: PermissionGate + ?Sized,
{
    fn check(
        &self,
        ctx: &CommandContext,
        permission: &Permission,
        resource_owner: &str,
        aggregate_id: &str,
    ) -> Result<(), AuthzError> {
        (**self).check(ctx, permission, resource_owner, aggregate_id)
    }
}

/// Checks `specific_id` first, then `parent_id`. If both are refused the
/// parent's error is returned.
pub fn check_with_fallback<G>(
    gate: &G,
    ctx: &CommandContext,
    permission: &Permission,
    resource_owner: &str,
    specific_id: &str,
    parent_id: &str,
) -> Result<(), AuthzError>
where
    G: PermissionGate + ?Sized,
{
    if gate.check(ctx, permission, resource_owner, specific_id).is_ok() {
        return Ok(());
    }
    gate.check(ctx, permission, resource_owner, parent_id)
}

/// Reference gate: scoped memberships evaluated against a role table.
///
/// - No IO
/// - No panics
#[derive(Debug, Default)]
pub struct MembershipGate {
    roles: RolePermissions,
    memberships: RwLock<HashMap<(String, String), Vec<Membership>>>,
}

impl MembershipGate {
    pub fn new(roles: RolePermissions) -> Self {
        Self {
            roles,
            memberships: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_membership(self, membership: Membership) -> Self {
        self.add_membership(membership);
        self
    }

    pub fn add_membership(&self, membership: Membership) {
        let key = (membership.instance_id.clone(), membership.actor_id.clone());
        let mut guard = self.memberships.write().unwrap_or_else(|e| e.into_inner());
        guard.entry(key).or_default().push(membership);
    }
}

impl PermissionGate for MembershipGate {
    fn check(
        &self,
        ctx: &CommandContext,
        permission: &Permission,
        resource_owner: &str,
        aggregate_id: &str,
    ) -> Result<(), AuthzError> {
        let guard = self.memberships.read().unwrap_or_else(|e| e.into_inner());
        let key = (ctx.instance_id().to_string(), ctx.actor_id().to_string());
        let memberships = guard
            .get(&key)
            .ok_or_else(|| AuthzError::NoMembership(ctx.actor_id().to_string()))?;

        let allowed = memberships
            .iter()
            .filter(|m| m.scope.covers(resource_owner, aggregate_id))
            .flat_map(|m| m.roles.iter())
            .any(|role| self.roles.allows(role, permission));

        if allowed {
            Ok(())
        } else {
            tracing::debug!(
                actor_id = ctx.actor_id(),
                permission = permission.as_str(),
                resource_owner,
                aggregate_id,
                "permission refused"
            );
            Err(AuthzError::Forbidden {
                permission: permission.as_str().to_string(),
                aggregate_id: aggregate_id.to_string(),
            })
        }
    }
}
