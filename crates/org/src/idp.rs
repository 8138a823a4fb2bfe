//! Identity-provider configurations.
//!
//! An IDP is configured either on an organization (`org.idp.config.*`, on the
//! org aggregate) or on the instance itself (`instance.idp.config.*`), where
//! every organization may use it. Both scopes share one payload vocabulary
//! and one write model.

use serde::{Deserialize, Serialize};

use warden_core::{CryptoValue, Error, Exists, LifecycleState, ObjectState, Result};
use warden_events::{
    Aggregate, AggregateFilter, Event, FieldOperation, SearchQuery, StoredEvent,
    WriteModel, WriteModelBase, impl_event_codec,
};

use crate::org::{AGGREGATE_TYPE, OrgEvent, STATE_SEARCH_FIELD};

pub const IDP_SEARCH_TYPE: &str = "idp";
pub const NAME_SEARCH_FIELD: &str = "name";
pub const TYPE_SEARCH_FIELD: &str = "type";

pub const INSTANCE_AGGREGATE_TYPE: &str = "instance";

/// The instance aggregate is identified and owned by the instance id.
pub fn instance_aggregate(instance_id: &str) -> Aggregate {
    Aggregate::new(INSTANCE_AGGREGATE_TYPE, instance_id, instance_id, instance_id)
}

/// Where an IDP configuration lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdpOwnerType {
    #[default]
    Org,
    /// Configured on the instance and available to every organization.
    System,
}

impl IdpOwnerType {
    pub fn aggregate_type(self) -> &'static str {
        match self {
            IdpOwnerType::Org => AGGREGATE_TYPE,
            IdpOwnerType::System => INSTANCE_AGGREGATE_TYPE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdpType {
    Oidc,
    Jwt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcConfig {
    pub client_id: String,
    pub client_secret: CryptoValue,
    pub issuer: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// A provider that hands out signed JWTs instead of running an OIDC flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtConfig {
    pub jwt_endpoint: String,
    pub issuer: String,
    pub keys_endpoint: String,
    pub header_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdpProviderConfig {
    Oidc(OidcConfig),
    Jwt(JwtConfig),
}

impl IdpProviderConfig {
    pub fn idp_type(&self) -> IdpType {
        match self {
            IdpProviderConfig::Oidc(_) => IdpType::Oidc,
            IdpProviderConfig::Jwt(_) => IdpType::Jwt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpConfigAdded {
    pub idp_config_id: String,
    pub name: String,
    pub config: IdpProviderConfig,
}

/// Only the members that changed are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpConfigChanged {
    pub idp_config_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<CryptoValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,
}

impl IdpConfigChanged {
    fn is_change(&self) -> bool {
        self.name.is_some()
            || self.client_id.is_some()
            || self.client_secret.is_some()
            || self.issuer.is_some()
            || self.scopes.is_some()
            || self.jwt_endpoint.is_some()
            || self.keys_endpoint.is_some()
            || self.header_name.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpConfigRemoved {
    pub idp_config_id: String,
}

/// IDP events on an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdpConfigEvent {
    Added(IdpConfigAdded),
    Changed(IdpConfigChanged),
    Removed(IdpConfigRemoved),
}

impl_event_codec!(IdpConfigEvent {
    Added => "org.idp.config.added",
    Changed => "org.idp.config.changed",
    Removed => "org.idp.config.removed",
});

/// IDP events on the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceIdpConfigEvent {
    Added(IdpConfigAdded),
    Changed(IdpConfigChanged),
    Removed(IdpConfigRemoved),
}

impl_event_codec!(InstanceIdpConfigEvent {
    Added => "instance.idp.config.added",
    Changed => "instance.idp.config.changed",
    Removed => "instance.idp.config.removed",
});

impl From<InstanceIdpConfigEvent> for IdpConfigEvent {
    fn from(event: InstanceIdpConfigEvent) -> Self {
        match event {
            InstanceIdpConfigEvent::Added(e) => IdpConfigEvent::Added(e),
            InstanceIdpConfigEvent::Changed(e) => IdpConfigEvent::Changed(e),
            InstanceIdpConfigEvent::Removed(e) => IdpConfigEvent::Removed(e),
        }
    }
}

impl From<IdpConfigEvent> for InstanceIdpConfigEvent {
    fn from(event: IdpConfigEvent) -> Self {
        match event {
            IdpConfigEvent::Added(e) => InstanceIdpConfigEvent::Added(e),
            IdpConfigEvent::Changed(e) => InstanceIdpConfigEvent::Changed(e),
            IdpConfigEvent::Removed(e) => InstanceIdpConfigEvent::Removed(e),
        }
    }
}

impl Event for IdpConfigEvent {
    fn fields(&self, _aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        match self {
            IdpConfigEvent::Added(e) => Ok(vec![
                FieldOperation::set(
                    IDP_SEARCH_TYPE,
                    &e.idp_config_id,
                    STATE_SEARCH_FIELD,
                    LifecycleState::Active,
                )?,
                FieldOperation::set(IDP_SEARCH_TYPE, &e.idp_config_id, NAME_SEARCH_FIELD, &e.name)?,
                FieldOperation::set(IDP_SEARCH_TYPE, &e.idp_config_id, TYPE_SEARCH_FIELD, e.config.idp_type())?,
            ]),
            IdpConfigEvent::Changed(e) => e
                .name
                .iter()
                .map(|name| {
                    FieldOperation::set(IDP_SEARCH_TYPE, &e.idp_config_id, NAME_SEARCH_FIELD, name)
                })
                .collect(),
            IdpConfigEvent::Removed(e) => {
                Ok(vec![FieldOperation::remove_object(IDP_SEARCH_TYPE, &e.idp_config_id)])
            }
        }
    }
}

impl Event for InstanceIdpConfigEvent {
    fn fields(&self, aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        IdpConfigEvent::from(self.clone()).fields(aggregate)
    }
}

/// Requested IDP configuration. `None` keeps the current value; the
/// secret is already encrypted. OIDC members only apply to OIDC providers
/// and JWT members only to JWT providers; `issuer` applies to both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdpChanges {
    pub name: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<CryptoValue>,
    pub issuer: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub jwt_endpoint: Option<String>,
    pub keys_endpoint: Option<String>,
    pub header_name: Option<String>,
}

impl IdpChanges {
    fn touches_oidc(&self) -> bool {
        self.client_id.is_some() || self.client_secret.is_some() || self.scopes.is_some()
    }

    fn touches_jwt(&self) -> bool {
        self.jwt_endpoint.is_some() || self.keys_endpoint.is_some() || self.header_name.is_some()
    }
}

/// One identity-provider configuration of an organization or the instance.
#[derive(Debug, Clone, Default)]
pub struct IdpConfigWriteModel {
    pub base: WriteModelBase,
    pub owner: IdpOwnerType,
    pub idp_config_id: String,
    pub name: String,
    pub config: Option<IdpProviderConfig>,
    pub state: ObjectState,
}

impl IdpConfigWriteModel {
    pub fn new_org(org_id: impl Into<String>, idp_config_id: impl Into<String>) -> Self {
        Self::new(IdpOwnerType::Org, org_id.into(), idp_config_id.into())
    }

    pub fn new_instance(instance_id: impl Into<String>, idp_config_id: impl Into<String>) -> Self {
        Self::new(IdpOwnerType::System, instance_id.into(), idp_config_id.into())
    }

    fn new(owner: IdpOwnerType, aggregate_id: String, idp_config_id: String) -> Self {
        Self {
            base: WriteModelBase::new(owner.aggregate_type(), aggregate_id.clone(), aggregate_id),
            owner,
            idp_config_id,
            ..Self::default()
        }
    }

    pub fn idp_type(&self) -> Option<IdpType> {
        self.config.as_ref().map(IdpProviderConfig::idp_type)
    }

    /// The change event for `changes`, or `None` if nothing differs.
    /// A provided secret always counts as a change: ciphertexts are not
    /// comparable. Members of the other provider type are rejected.
    pub fn change_event(&self, changes: IdpChanges) -> Result<Option<IdpConfigChanged>> {
        fn diff<T: PartialEq>(requested: Option<T>, current: &T) -> Option<T> {
            requested.filter(|v| v != current)
        }

        let mut event = IdpConfigChanged {
            idp_config_id: self.idp_config_id.clone(),
            name: diff(changes.name.clone(), &self.name),
            ..IdpConfigChanged::default()
        };
        match &self.config {
            Some(IdpProviderConfig::Oidc(current)) => {
                if changes.touches_jwt() {
                    return Err(Error::invalid_argument("JWT settings do not apply to an OIDC provider"));
                }
                event.client_id = diff(changes.client_id, &current.client_id);
                event.client_secret = changes.client_secret;
                event.issuer = diff(changes.issuer, &current.issuer);
                event.scopes = diff(changes.scopes, &current.scopes);
            }
            Some(IdpProviderConfig::Jwt(current)) => {
                if changes.touches_oidc() {
                    return Err(Error::invalid_argument("OIDC settings do not apply to a JWT provider"));
                }
                event.issuer = diff(changes.issuer, &current.issuer);
                event.jwt_endpoint = diff(changes.jwt_endpoint, &current.jwt_endpoint);
                event.keys_endpoint = diff(changes.keys_endpoint, &current.keys_endpoint);
                event.header_name = diff(changes.header_name, &current.header_name);
            }
            None => {}
        }
        Ok(event.is_change().then_some(event))
    }

    fn apply(&mut self, event: IdpConfigEvent) {
        match event {
            IdpConfigEvent::Added(e) if e.idp_config_id == self.idp_config_id => {
                self.name = e.name;
                self.config = Some(e.config);
                self.state = ObjectState::Active;
            }
            IdpConfigEvent::Changed(e) if e.idp_config_id == self.idp_config_id => {
                if let Some(name) = e.name {
                    self.name = name;
                }
                match &mut self.config {
                    Some(IdpProviderConfig::Oidc(c)) => {
                        if let Some(client_id) = e.client_id {
                            c.client_id = client_id;
                        }
                        if let Some(secret) = e.client_secret {
                            c.client_secret = secret;
                        }
                        if let Some(issuer) = e.issuer {
                            c.issuer = issuer;
                        }
                        if let Some(scopes) = e.scopes {
                            c.scopes = scopes;
                        }
                    }
                    Some(IdpProviderConfig::Jwt(c)) => {
                        if let Some(issuer) = e.issuer {
                            c.issuer = issuer;
                        }
                        if let Some(endpoint) = e.jwt_endpoint {
                            c.jwt_endpoint = endpoint;
                        }
                        if let Some(endpoint) = e.keys_endpoint {
                            c.keys_endpoint = endpoint;
                        }
                        if let Some(header) = e.header_name {
                            c.header_name = header;
                        }
                    }
                    None => {}
                }
            }
            IdpConfigEvent::Removed(e) if e.idp_config_id == self.idp_config_id => {
                self.state = ObjectState::Removed;
            }
            _ => {}
        }
    }
}

impl Exists for IdpConfigWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}

impl WriteModel for IdpConfigWriteModel {
    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    fn query(&self) -> SearchQuery {
        SearchQuery::new().filter(
            AggregateFilter::new(self.owner.aggregate_type())
                .aggregate_id(self.base.aggregate_id.clone()),
        )
    }

    fn reduce(&mut self, event: &StoredEvent) -> Result<()> {
        match self.owner {
            IdpOwnerType::Org => {
                if let Some(e) = event.decode::<IdpConfigEvent>()? {
                    self.apply(e);
                } else if let Some(OrgEvent::Removed(_)) = event.decode::<OrgEvent>()? {
                    self.state = ObjectState::Removed;
                }
            }
            IdpOwnerType::System => {
                if let Some(e) = event.decode::<InstanceIdpConfigEvent>()? {
                    self.apply(e.into());
                }
            }
        }
        Ok(())
    }
}
