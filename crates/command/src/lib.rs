//! `warden-command` — the write side of the identity domain.
//!
//! Every mutation is a method on [`Commands`]: it validates the intent,
//! folds the relevant write models from the event store, checks state and
//! cross-aggregate preconditions, asks the permission gate, and appends the
//! resulting events (plus best-effort cascades) in one optimistic push.

pub mod cascade;
mod commands;
pub mod config;
pub mod group;
pub mod group_grant;
pub mod idp;
pub mod org;
pub mod org_domain;
pub mod policy;
pub mod project;
pub mod project_grant;
pub mod project_role;
pub mod user;
pub mod user_grant;
pub mod user_idp_link;

pub use cascade::{CascadeBatch, IdpLinkRef};
pub use commands::Commands;
pub use config::{CommandConfig, PreconditionStrategy};
pub use group::AddGroup;
pub use group_grant::AddGroupGrant;
pub use org::AddOrg;
pub use org_domain::{DomainValidation, DomainVerifier};
pub use idp::{AddIdp, AddJwtIdp, ChangeIdp};
pub use project::AddProject;
pub use project_grant::AddProjectGrant;
pub use project_role::AddProjectRole;
pub use user::AddHumanUser;
pub use user_grant::AddUserGrant;
pub use user_idp_link::AddIdpLink;

pub use warden_org::DomainValidationType;
pub use warden_policy::LoginPolicy;
pub use warden_project::ProjectChanges;
pub use warden_user::ProfileChanges;
