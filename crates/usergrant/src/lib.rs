//! User and group grants: the roles a user or group holds on a project (or
//! on a project grant).

pub mod grant;
pub mod group_grant;
pub mod precondition;

pub use grant::{
    AGGREGATE_TYPE, STATE_SEARCH_FIELD, USER_GRANT_SEARCH_TYPE, USER_GRANT_UNIQUE_TYPE,
    UserGrantAdded, UserGrantCascadeChanged, UserGrantChanged, UserGrantDeactivated,
    UserGrantEvent, UserGrantReactivated, UserGrantRemoved, UserGrantWriteModel, aggregate,
};
pub use group_grant::{
    GROUP_GRANT_AGGREGATE_TYPE, GROUP_GRANT_SEARCH_TYPE, GROUP_GRANT_UNIQUE_TYPE, GroupGrantAdded,
    GroupGrantChanged, GroupGrantDeactivated, GroupGrantEvent, GroupGrantReactivated,
    GroupGrantRemoved, GroupGrantWriteModel, group_grant_aggregate,
};
pub use precondition::{GrantFacts, GrantPreConditionReadModel, GrantPreconditions, Grantee};
