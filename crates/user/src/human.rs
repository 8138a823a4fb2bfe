use serde::{Deserialize, Serialize};

use warden_core::{Exists, Result};
use warden_events::{
    Aggregate, AggregateFilter, Event, FieldOperation, SearchQuery, StoredEvent,
    UniqueConstraint, WriteModel, WriteModelBase, impl_event_codec,
};

use crate::idp_link::{EXTERNAL_IDP_UNIQUE_TYPE, UserIdpLinkEvent, link_unique_key};
use crate::state::UserState;

pub const AGGREGATE_TYPE: &str = "user";
pub const USER_SEARCH_TYPE: &str = "user";
pub const STATE_SEARCH_FIELD: &str = "state";
/// Usernames are unique across the whole instance.
pub const USERNAME_UNIQUE_TYPE: &str = "username";

const USERNAME_TAKEN: &str = "username is already taken";

pub fn aggregate(user_id: &str, org_id: &str, instance_id: &str) -> Aggregate {
    Aggregate::new(AGGREGATE_TYPE, user_id, org_id, instance_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanAdded {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Encoded hash, never the plain password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameChanged {
    pub username: String,
    #[serde(skip)]
    pub old_username: String,
}

/// Another organization verified the domain of the user's login name; the
/// user is moved to a temporary one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDomainClaimed {
    pub username: String,
    #[serde(skip)]
    pub old_username: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanProfileChanged {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanPasswordChanged {
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLocked {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUnlocked {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeactivated {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReactivated {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRemoved {
    pub username: String,
    /// `(idp_config_id, external_user_id)` links released with the user.
    #[serde(skip)]
    pub idp_links: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    HumanAdded(HumanAdded),
    UsernameChanged(UsernameChanged),
    DomainClaimed(UserDomainClaimed),
    ProfileChanged(HumanProfileChanged),
    PasswordChanged(HumanPasswordChanged),
    Locked(UserLocked),
    Unlocked(UserUnlocked),
    Deactivated(UserDeactivated),
    Reactivated(UserReactivated),
    Removed(UserRemoved),
}

impl_event_codec!(UserEvent {
    HumanAdded => "user.human.added",
    UsernameChanged => "user.username.changed",
    DomainClaimed => "user.domain.claimed",
    ProfileChanged => "user.human.profile.changed",
    PasswordChanged => "user.human.password.changed",
    Locked => "user.locked",
    Unlocked => "user.unlocked",
    Deactivated => "user.deactivated",
    Reactivated => "user.reactivated",
    Removed => "user.removed",
});

impl Event for UserEvent {
    fn fields(&self, aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        let state = |state: UserState| {
            FieldOperation::set(USER_SEARCH_TYPE, &aggregate.id, STATE_SEARCH_FIELD, state)
                .map(|op| vec![op])
        };
        match self {
            UserEvent::HumanAdded(_) | UserEvent::Unlocked(_) | UserEvent::Reactivated(_) => {
                state(UserState::Active)
            }
            UserEvent::Locked(_) => state(UserState::Locked),
            UserEvent::Deactivated(_) => state(UserState::Inactive),
            UserEvent::Removed(_) => Ok(vec![FieldOperation::RemoveAggregate]),
            _ => Ok(Vec::new()),
        }
    }

    fn unique_constraints(&self, _aggregate: &Aggregate) -> Vec<UniqueConstraint> {
        match self {
            UserEvent::HumanAdded(e) => {
                vec![UniqueConstraint::add(USERNAME_UNIQUE_TYPE, &e.username, USERNAME_TAKEN)]
            }
            UserEvent::UsernameChanged(e) => vec![
                UniqueConstraint::remove(USERNAME_UNIQUE_TYPE, &e.old_username),
                UniqueConstraint::add(USERNAME_UNIQUE_TYPE, &e.username, USERNAME_TAKEN),
            ],
            UserEvent::DomainClaimed(e) => vec![
                UniqueConstraint::remove(USERNAME_UNIQUE_TYPE, &e.old_username),
                UniqueConstraint::add(USERNAME_UNIQUE_TYPE, &e.username, USERNAME_TAKEN),
            ],
            UserEvent::Removed(e) => std::iter::once(UniqueConstraint::remove(
                USERNAME_UNIQUE_TYPE,
                &e.username,
            ))
            .chain(e.idp_links.iter().map(|(idp, external)| {
                UniqueConstraint::remove(EXTERNAL_IDP_UNIQUE_TYPE, link_unique_key(idp, external))
            }))
            .collect(),
            _ => Vec::new(),
        }
    }
}

/// Requested profile; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
}

/// State of one human user.
#[derive(Debug, Clone, Default)]
pub struct HumanWriteModel {
    pub base: WriteModelBase,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub state: UserState,
    pub idp_links: Vec<(String, String)>,
}

impl HumanWriteModel {
    /// `org_id` may be empty when the owner is not known yet; it is filled
    /// from the first folded event.
    pub fn new(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            base: WriteModelBase::new(AGGREGATE_TYPE, user_id, org_id),
            ..Self::default()
        }
    }

    pub fn profile_change_event(&self, changes: ProfileChanges) -> Option<HumanProfileChanged> {
        let event = HumanProfileChanged {
            first_name: changes.first_name.filter(|v| *v != self.first_name),
            last_name: changes.last_name.filter(|v| *v != self.last_name),
            display_name: changes.display_name.filter(|v| *v != self.display_name),
        };
        let changed =
            event.first_name.is_some() || event.last_name.is_some() || event.display_name.is_some();
        changed.then_some(event)
    }

    pub fn removed_event(&self) -> UserRemoved {
        UserRemoved {
            username: self.username.clone(),
            idp_links: self.idp_links.clone(),
        }
    }
}

impl Exists for HumanWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}

impl WriteModel for HumanWriteModel {
    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    fn query(&self) -> SearchQuery {
        SearchQuery::new().filter(
            AggregateFilter::new(AGGREGATE_TYPE)
                .aggregate_id(self.base.aggregate_id.clone()),
        )
    }

    fn reduce(&mut self, event: &StoredEvent) -> Result<()> {
        if let Some(e) = event.decode::<UserEvent>()? {
            match e {
                UserEvent::HumanAdded(e) => {
                    self.display_name = format!("{} {}", e.first_name, e.last_name);
                    self.username = e.username;
                    self.first_name = e.first_name;
                    self.last_name = e.last_name;
                    self.email = e.email;
                    self.password_hash = e.password_hash;
                    self.state = UserState::Active;
                }
                UserEvent::UsernameChanged(e) => self.username = e.username,
                UserEvent::DomainClaimed(e) => self.username = e.username,
                UserEvent::ProfileChanged(e) => {
                    if let Some(v) = e.first_name {
                        self.first_name = v;
                    }
                    if let Some(v) = e.last_name {
                        self.last_name = v;
                    }
                    if let Some(v) = e.display_name {
                        self.display_name = v;
                    }
                }
                UserEvent::PasswordChanged(e) => self.password_hash = Some(e.password_hash),
                UserEvent::Locked(_) => self.state = UserState::Locked,
                // unlocking always lands on active, as in the login flow
                UserEvent::Unlocked(_) | UserEvent::Reactivated(_) => {
                    self.state = UserState::Active
                }
                UserEvent::Deactivated(_) => self.state = UserState::Inactive,
                UserEvent::Removed(_) => {
                    self.state = UserState::Removed;
                    self.idp_links.clear();
                }
            }
        } else if let Some(e) = event.decode::<UserIdpLinkEvent>()? {
            match e {
                UserIdpLinkEvent::Added(e) => {
                    self.idp_links.push((e.idp_config_id, e.external_user_id));
                }
                UserIdpLinkEvent::Removed(e) | UserIdpLinkEvent::CascadeRemoved(e) => {
                    self.idp_links
                        .retain(|(idp, ext)| !(*idp == e.idp_config_id && *ext == e.external_user_id));
                }
            }
        }
        Ok(())
    }
}
