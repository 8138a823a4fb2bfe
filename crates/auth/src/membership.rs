use serde::{Deserialize, Serialize};

use crate::Role;

/// Where a membership applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum MembershipScope {
    /// The whole instance.
    Instance,
    Org(String),
    Project(String),
    ProjectGrant(String),
}

impl MembershipScope {
    /// Whether the scope covers a resource owned by `resource_owner` and
    /// identified by `aggregate_id`.
    pub fn covers(&self, resource_owner: &str, aggregate_id: &str) -> bool {
        match self {
            Self::Instance => true,
            Self::Org(org_id) => org_id == resource_owner,
            Self::Project(id) | Self::ProjectGrant(id) => id == aggregate_id,
        }
    }
}

/// An actor's roles within one scope of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub instance_id: String,
    pub actor_id: String,
    pub scope: MembershipScope,
    pub roles: Vec<Role>,
}

impl Membership {
    pub fn new(
        instance_id: impl Into<String>,
        actor_id: impl Into<String>,
        scope: MembershipScope,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            actor_id: actor_id.into(),
            scope,
            roles: roles.into_iter().collect(),
        }
    }
}
