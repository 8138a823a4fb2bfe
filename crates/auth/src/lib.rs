//! `warden-auth` — permission gate for the command side.
//!
//! This crate is decoupled from transport and storage: it only answers
//! "may this actor do X on that resource".

pub mod authorize;
pub mod membership;
pub mod permissions;
pub mod roles;

pub use authorize::{AuthzError, MembershipGate, PermissionGate, check_with_fallback};
pub use membership::{Membership, MembershipScope};
pub use permissions::Permission;
pub use roles::{Role, RolePermissions};
