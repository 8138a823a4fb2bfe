//! Projects domain module (event-sourced).
//!
//! The `project` aggregate carries the project itself, its roles and the
//! grants that share it with other organizations.

pub mod grant;
pub mod project;
pub mod role;

pub use grant::{
    GRANT_SEARCH_TYPE, GRANT_UNIQUE_TYPE, GRANTED_ORG_SEARCH_FIELD, ProjectGrantAdded,
    ProjectGrantCascadeChanged, ProjectGrantChanged, ProjectGrantDeactivated, ProjectGrantEvent,
    ProjectGrantReactivated, ProjectGrantRemoved, ProjectGrantWriteModel, ROLE_KEY_SEARCH_FIELD,
    RoleKeyDiff,
};
pub use project::{
    AGGREGATE_TYPE, NAME_UNIQUE_TYPE, PROJECT_SEARCH_TYPE, ProjectAdded, ProjectChanged,
    ProjectChanges, ProjectDeactivated, ProjectEvent, ProjectReactivated, ProjectRemoved,
    ProjectWriteModel, STATE_SEARCH_FIELD, aggregate,
};
pub use role::{
    KEY_SEARCH_FIELD, ProjectRoleAdded, ProjectRoleChanged, ProjectRoleEvent, ProjectRoleRemoved,
    ProjectRoleWriteModel, ROLE_SEARCH_TYPE, ROLE_UNIQUE_TYPE,
};
