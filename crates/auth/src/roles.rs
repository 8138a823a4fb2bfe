use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::permissions::{self, Permission};

/// Role identifier used for RBAC.
///
/// Roles are opaque strings at this layer; [`RolePermissions`] maps them to
/// the capabilities they grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role → permission table.
#[derive(Debug, Clone, Default)]
pub struct RolePermissions {
    table: HashMap<Role, HashSet<Permission>>,
}

impl RolePermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant<I>(mut self, role: impl Into<Cow<'static, str>>, permissions: I) -> Self
    where
        I: IntoIterator<Item = Permission>,
    {
        self.table
            .entry(Role::new(role))
            .or_default()
            .extend(permissions);
        self
    }

    /// Whether `role` grants `required`, directly or through `"*"`.
    pub fn allows(&self, role: &Role, required: &Permission) -> bool {
        self.table
            .get(role)
            .is_some_and(|perms| perms.contains(&permissions::WILDCARD) || perms.contains(required))
    }

    /// Built-in roles of an identity platform instance.
    pub fn iam_defaults() -> Self {
        use permissions::*;

        Self::new()
            .grant("IAM_OWNER", [WILDCARD])
            .grant(
                "ORG_OWNER",
                [
                    ORG_WRITE,
                    ORG_DELETE,
                    ORG_IDP_WRITE,
                    POLICY_WRITE,
                    PROJECT_CREATE,
                    PROJECT_WRITE,
                    PROJECT_DELETE,
                    PROJECT_ROLE_WRITE,
                    PROJECT_GRANT_WRITE,
                    PROJECT_GRANT_DELETE,
                    USER_WRITE,
                    USER_DELETE,
                    USER_CREDENTIAL_WRITE,
                    USER_GRANT_WRITE,
                    USER_GRANT_DELETE,
                    GROUP_WRITE,
                    GROUP_DELETE,
                    GROUP_GRANT_WRITE,
                    GROUP_GRANT_DELETE,
                ],
            )
            .grant(
                "ORG_USER_MANAGER",
                [USER_WRITE, USER_DELETE, USER_CREDENTIAL_WRITE, GROUP_WRITE, GROUP_DELETE],
            )
            .grant(
                "PROJECT_OWNER",
                [
                    PROJECT_WRITE,
                    PROJECT_DELETE,
                    PROJECT_ROLE_WRITE,
                    PROJECT_GRANT_WRITE,
                    PROJECT_GRANT_DELETE,
                    USER_GRANT_WRITE,
                    USER_GRANT_DELETE,
                    GROUP_GRANT_WRITE,
                    GROUP_GRANT_DELETE,
                ],
            )
            .grant(
                "PROJECT_GRANT_OWNER",
                [USER_GRANT_WRITE, USER_GRANT_DELETE, GROUP_GRANT_WRITE, GROUP_GRANT_DELETE],
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_role_allows_everything() {
        let table = RolePermissions::iam_defaults();
        assert!(table.allows(&Role::new("IAM_OWNER"), &permissions::ORG_CREATE));
        assert!(table.allows(&Role::new("IAM_OWNER"), &Permission::new("anything.at.all")));
    }

    #[test]
    fn scoped_roles_only_allow_listed_permissions() {
        let table = RolePermissions::iam_defaults();
        let grant_owner = Role::new("PROJECT_GRANT_OWNER");
        assert!(table.allows(&grant_owner, &permissions::USER_GRANT_WRITE));
        assert!(!table.allows(&grant_owner, &permissions::PROJECT_WRITE));
        assert!(!table.allows(&Role::new("UNKNOWN"), &permissions::USER_WRITE));
        assert!(table.allows(&grant_owner, &permissions::GROUP_GRANT_WRITE));
        assert!(!table.allows(&Role::new("ORG_OWNER"), &permissions::IAM_IDP_WRITE));
    }
}
