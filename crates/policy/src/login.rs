use serde::{Deserialize, Serialize};

use warden_core::{Exists, ObjectState};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordlessType {
    #[default]
    NotAllowed,
    Allowed,
}

/// Settings governing how users of an instance or organization log in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPolicy {
    pub allow_register: bool,
    pub allow_username_password: bool,
    pub allow_external_idp: bool,
    pub force_mfa: bool,
    #[serde(default)]
    pub passwordless_type: PasswordlessType,
}

/// Only the settings that changed are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPolicyChanged {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_register: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_username_password: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_external_idp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_mfa: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passwordless_type: Option<PasswordlessType>,
}

impl LoginPolicyChanged {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Transitions shared by every login policy variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPolicyTransition {
    Added(LoginPolicy),
    Changed(LoginPolicyChanged),
    Removed,
    IdpProviderAdded(String),
    IdpProviderRemoved(String),
}

/// Shared login policy state; outer models delegate their policy events here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginPolicyWriteModel {
    pub policy: LoginPolicy,
    pub idp_providers: Vec<String>,
    pub state: ObjectState,
}

impl LoginPolicyWriteModel {
    pub fn apply(&mut self, transition: LoginPolicyTransition) {
        match transition {
            LoginPolicyTransition::Added(policy) => {
                self.policy = policy;
                self.idp_providers.clear();
                self.state = ObjectState::Active;
            }
            LoginPolicyTransition::Changed(c) => {
                let p = &mut self.policy;
                if let Some(v) = c.allow_register {
                    p.allow_register = v;
                }
                if let Some(v) = c.allow_username_password {
                    p.allow_username_password = v;
                }
                if let Some(v) = c.allow_external_idp {
                    p.allow_external_idp = v;
                }
                if let Some(v) = c.force_mfa {
                    p.force_mfa = v;
                }
                if let Some(v) = c.passwordless_type {
                    p.passwordless_type = v;
                }
            }
            LoginPolicyTransition::Removed => {
                self.policy = LoginPolicy::default();
                self.idp_providers.clear();
                self.state = ObjectState::Removed;
            }
            LoginPolicyTransition::IdpProviderAdded(idp) => {
                if !self.idp_providers.contains(&idp) {
                    self.idp_providers.push(idp);
                }
            }
            LoginPolicyTransition::IdpProviderRemoved(idp) => {
                self.idp_providers.retain(|p| *p != idp);
            }
        }
    }

    /// The change event turning the current policy into `requested`, or
    /// `None` if they are equal.
    pub fn change_event(&self, requested: &LoginPolicy) -> Option<LoginPolicyChanged> {
        fn diff<T: PartialEq + Copy>(requested: T, current: T) -> Option<T> {
            (requested != current).then_some(requested)
        }

        let current = &self.policy;
        let changed = LoginPolicyChanged {
            allow_register: diff(requested.allow_register, current.allow_register),
            allow_username_password: diff(
                requested.allow_username_password,
                current.allow_username_password,
            ),
            allow_external_idp: diff(requested.allow_external_idp, current.allow_external_idp),
            force_mfa: diff(requested.force_mfa, current.force_mfa),
            passwordless_type: diff(requested.passwordless_type, current.passwordless_type),
        };
        (!changed.is_empty()).then_some(changed)
    }

    pub fn has_idp_provider(&self, idp_config_id: &str) -> bool {
        self.idp_providers.iter().any(|p| p == idp_config_id)
    }
}

impl Exists for LoginPolicyWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}
