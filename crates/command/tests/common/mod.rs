//! Shared fixtures for command scenario tests.

#![allow(dead_code)]

use std::sync::Arc;

use warden_auth::{Membership, MembershipGate, MembershipScope, Role, RolePermissions};
use warden_command::{
    AddGroup, AddHumanUser, AddOrg, AddProject, AddProjectGrant, AddProjectRole, AddUserGrant,
    CommandConfig, Commands,
};
use warden_core::CommandContext;
use warden_events::StoredEvent;
use warden_infra::{AesGcmEncryptor, Eventstore, InMemoryEventstore};

pub const INSTANCE: &str = "inst-1";
pub const ADMIN: &str = "admin";

pub struct Harness {
    pub store: Arc<InMemoryEventstore>,
    pub commands: Commands,
    pub ctx: CommandContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CommandConfig::default())
    }

    pub fn with_config(config: CommandConfig) -> Self {
        let store = Arc::new(InMemoryEventstore::new());
        let commands = commands_over(store.clone(), config);
        Self {
            store,
            commands,
            ctx: CommandContext::new(INSTANCE, ADMIN),
        }
    }

    /// Events appended so far.
    pub fn event_count(&self) -> usize {
        self.store.events().len()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.store.events().into_iter().map(|e| e.event_type).collect()
    }

    pub fn events_since(&self, count: usize) -> Vec<StoredEvent> {
        self.store.events().into_iter().skip(count).collect()
    }

    pub async fn org(&self, id: &str, name: &str) {
        let request = AddOrg {
            org_id: Some(id.to_string()),
            name: name.to_string(),
            domains: vec![],
        };
        self.commands.add_org(&self.ctx, request).await.expect("org added");
    }

    pub async fn project(&self, org_id: &str, id: &str, name: &str, roles: &[&str]) {
        let request = AddProject {
            project_id: Some(id.to_string()),
            name: name.to_string(),
            project_role_assertion: false,
            project_role_check: false,
            roles: roles.iter().map(|k| AddProjectRole::new(*k, *k)).collect(),
        };
        self.commands
            .add_project(&self.ctx, org_id, request)
            .await
            .expect("project added");
    }

    pub async fn project_grant(&self, project_id: &str, grant_id: &str, granted_org_id: &str, roles: &[&str]) {
        let request = AddProjectGrant {
            grant_id: Some(grant_id.to_string()),
            granted_org_id: granted_org_id.to_string(),
            role_keys: keys(roles),
        };
        self.commands
            .add_project_grant(&self.ctx, project_id, "", request)
            .await
            .expect("project grant added");
    }

    pub async fn user(&self, org_id: &str, id: &str, username: &str) {
        self.commands
            .add_human_user(&self.ctx, org_id, human(id, username))
            .await
            .expect("user added");
    }

    pub async fn user_grant(
        &self,
        org_id: &str,
        id: &str,
        user_id: &str,
        project_id: &str,
        project_grant_id: Option<&str>,
        roles: &[&str],
    ) {
        let request = AddUserGrant {
            user_grant_id: Some(id.to_string()),
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            project_grant_id: project_grant_id.map(str::to_string),
            role_keys: keys(roles),
        };
        self.commands
            .add_user_grant(&self.ctx, org_id, request)
            .await
            .expect("user grant added");
    }

    pub async fn group(&self, org_id: &str, id: &str, name: &str) {
        let request = AddGroup {
            group_id: Some(id.to_string()),
            name: name.to_string(),
            description: String::new(),
        };
        self.commands
            .add_group(&self.ctx, org_id, request)
            .await
            .expect("group added");
    }

    /// Owner org `o1` with project `p1` (roles A, B, C) granted to org `o2`
    /// as `g1` with roles A, B.
    pub async fn granted_project(&self) {
        self.org("o1", "Owner Org").await;
        self.org("o2", "Partner Org").await;
        self.project("o1", "p1", "Portal", &["A", "B", "C"]).await;
        self.project_grant("p1", "g1", "o2", &["A", "B"]).await;
    }
}

pub fn commands_over(store: Arc<dyn Eventstore>, config: CommandConfig) -> Commands {
    let gate = MembershipGate::new(RolePermissions::iam_defaults()).with_membership(Membership::new(
        INSTANCE,
        ADMIN,
        MembershipScope::Instance,
        [Role::new("IAM_OWNER")],
    ));
    let encryptor = AesGcmEncryptor::generate("test-key").expect("key generated");
    Commands::new(store, Arc::new(gate), Arc::new(encryptor)).with_config(config)
}

pub fn keys(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn human(id: &str, username: &str) -> AddHumanUser {
    AddHumanUser {
        user_id: Some(id.to_string()),
        username: username.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: format!("{username}@example.com"),
        password: Some("correct horse".to_string()),
    }
}
