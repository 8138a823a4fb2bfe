//! Users domain module (event-sourced).
//!
//! Human users of an organization, their links to external identity
//! providers, and the groups users are organized in.

pub mod group;
pub mod human;
pub mod idp_link;
pub mod state;

pub use group::{
    GROUP_AGGREGATE_TYPE, GROUP_NAME_UNIQUE_TYPE, GROUP_SEARCH_TYPE, GroupAdded, GroupEvent,
    GroupRemoved, GroupWriteModel, group_aggregate,
};
pub use human::{
    AGGREGATE_TYPE, HumanAdded, HumanPasswordChanged, HumanProfileChanged, HumanWriteModel,
    ProfileChanges, STATE_SEARCH_FIELD, USER_SEARCH_TYPE, USERNAME_UNIQUE_TYPE, UserDeactivated,
    UserDomainClaimed, UserEvent, UserLocked, UserReactivated, UserRemoved, UserUnlocked,
    UsernameChanged, aggregate,
};
pub use idp_link::{
    EXTERNAL_IDP_UNIQUE_TYPE, UserIdpLinkAdded, UserIdpLinkEvent, UserIdpLinkRemoved,
    UserIdpLinkWriteModel,
};
pub use state::UserState;
