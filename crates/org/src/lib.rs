//! Organizations domain module (event-sourced).
//!
//! Event vocabulary and write models of the `org` aggregate: the
//! organization itself, its domains and its identity-provider configurations.
//! Instance-wide identity providers share the IDP vocabulary.
//! Pure domain logic: no IO, no storage.

pub mod domain;
pub mod idp;
pub mod org;

pub use domain::{
    DOMAIN_SEARCH_TYPE, DOMAIN_UNIQUE_TYPE, DomainValidationType, OrgDomainAdded, OrgDomainEvent,
    OrgDomainPrimarySet, OrgDomainRemoved, OrgDomainVerificationAdded, OrgDomainVerificationFailed,
    OrgDomainVerified, OrgDomainWriteModel, VERIFIED_SEARCH_FIELD,
};
pub use idp::{
    IDP_SEARCH_TYPE, INSTANCE_AGGREGATE_TYPE, IdpChanges, IdpConfigAdded, IdpConfigChanged,
    IdpConfigEvent, IdpConfigRemoved, IdpConfigWriteModel, IdpOwnerType, IdpProviderConfig,
    IdpType, InstanceIdpConfigEvent, JwtConfig, NAME_SEARCH_FIELD, OidcConfig, TYPE_SEARCH_FIELD,
    instance_aggregate,
};
pub use org::{
    AGGREGATE_TYPE, NAME_UNIQUE_TYPE, ORG_SEARCH_TYPE, OrgAdded, OrgChanged, OrgDeactivated,
    OrgEvent, OrgReactivated, OrgRemoved, OrgWriteModel, STATE_SEARCH_FIELD, aggregate,
};
