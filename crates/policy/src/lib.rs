//! Login policy domain module (event-sourced).
//!
//! The instance carries the default login policy; an organization may
//! override it. Both variants share one policy shape and one reducer
//! ([`LoginPolicyWriteModel`]), embedded by the instance and org models.

pub mod instance;
pub mod login;
pub mod org;

pub use instance::{
    INSTANCE_AGGREGATE_TYPE, InstanceLoginPolicyEvent, InstanceLoginPolicyWriteModel,
    instance_aggregate,
};
pub use login::{
    LoginPolicy, LoginPolicyChanged, LoginPolicyTransition, LoginPolicyWriteModel,
    PasswordlessType,
};
pub use org::{
    IdpProviderAdded, IdpProviderRemoved, LoginPolicyRemoved, OrgLoginPolicyEvent,
    OrgLoginPolicyWriteModel,
};
