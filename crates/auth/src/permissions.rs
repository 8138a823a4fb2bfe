use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "project.grant.write").
/// A special wildcard permission `"*"` can be used by role tables to indicate
/// "allow all" without listing every capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const WILDCARD: Permission = Permission::from_static("*");

pub const ORG_CREATE: Permission = Permission::from_static("org.create");
pub const ORG_WRITE: Permission = Permission::from_static("org.write");
pub const ORG_DELETE: Permission = Permission::from_static("org.delete");
pub const ORG_IDP_WRITE: Permission = Permission::from_static("org.idp.write");
pub const IAM_IDP_WRITE: Permission = Permission::from_static("iam.idp.write");

pub const POLICY_WRITE: Permission = Permission::from_static("policy.write");
pub const IAM_POLICY_WRITE: Permission = Permission::from_static("iam.policy.write");

pub const PROJECT_CREATE: Permission = Permission::from_static("project.create");
pub const PROJECT_WRITE: Permission = Permission::from_static("project.write");
pub const PROJECT_DELETE: Permission = Permission::from_static("project.delete");
pub const PROJECT_ROLE_WRITE: Permission = Permission::from_static("project.role.write");
pub const PROJECT_GRANT_WRITE: Permission = Permission::from_static("project.grant.write");
pub const PROJECT_GRANT_DELETE: Permission = Permission::from_static("project.grant.delete");

pub const USER_WRITE: Permission = Permission::from_static("user.write");
pub const USER_DELETE: Permission = Permission::from_static("user.delete");
pub const USER_CREDENTIAL_WRITE: Permission = Permission::from_static("user.credential.write");

pub const USER_GRANT_WRITE: Permission = Permission::from_static("user.grant.write");
pub const USER_GRANT_DELETE: Permission = Permission::from_static("user.grant.delete");

pub const GROUP_WRITE: Permission = Permission::from_static("group.write");
pub const GROUP_DELETE: Permission = Permission::from_static("group.delete");
pub const GROUP_GRANT_WRITE: Permission = Permission::from_static("group.grant.write");
pub const GROUP_GRANT_DELETE: Permission = Permission::from_static("group.grant.delete");
