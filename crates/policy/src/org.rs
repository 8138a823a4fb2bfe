use serde::{Deserialize, Serialize};

use warden_core::{Exists, Result};
use warden_events::{
    AggregateFilter, Event, SearchQuery, StoredEvent, WriteModel, WriteModelBase,
    impl_event_codec,
};
use warden_org::{AGGREGATE_TYPE, IdpOwnerType, OrgEvent};

use crate::login::{LoginPolicy, LoginPolicyChanged, LoginPolicyTransition, LoginPolicyWriteModel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPolicyRemoved {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpProviderAdded {
    pub idp_config_id: String,
    /// Whether the linked IDP is the organization's own or the instance's.
    #[serde(default)]
    pub idp_owner: IdpOwnerType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpProviderRemoved {
    pub idp_config_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgLoginPolicyEvent {
    Added(LoginPolicy),
    Changed(LoginPolicyChanged),
    Removed(LoginPolicyRemoved),
    IdpProviderAdded(IdpProviderAdded),
    IdpProviderRemoved(IdpProviderRemoved),
    /// Emitted when the referenced IDP configuration itself is removed.
    IdpProviderCascadeRemoved(IdpProviderRemoved),
}

impl_event_codec!(OrgLoginPolicyEvent {
    Added => "org.policy.login.added",
    Changed => "org.policy.login.changed",
    Removed => "org.policy.login.removed",
    IdpProviderAdded => "org.policy.login.idpprovider.added",
    IdpProviderRemoved => "org.policy.login.idpprovider.removed",
    IdpProviderCascadeRemoved => "org.policy.login.idpprovider.cascade.removed",
});

impl Event for OrgLoginPolicyEvent {}

/// Login policy override of one organization.
#[derive(Debug, Clone, Default)]
pub struct OrgLoginPolicyWriteModel {
    pub base: WriteModelBase,
    pub policy: LoginPolicyWriteModel,
}

impl OrgLoginPolicyWriteModel {
    pub fn new(org_id: impl Into<String>) -> Self {
        let org_id = org_id.into();
        Self {
            base: WriteModelBase::new(AGGREGATE_TYPE, org_id.clone(), org_id),
            ..Self::default()
        }
    }
}

impl Exists for OrgLoginPolicyWriteModel {
    fn exists(&self) -> bool {
        self.policy.exists()
    }
}

impl WriteModel for OrgLoginPolicyWriteModel {
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
        if let Some(e) = event.decode::<OrgLoginPolicyEvent>()? {
            self.policy.apply(match e {
                OrgLoginPolicyEvent::Added(p) => LoginPolicyTransition::Added(p),
                OrgLoginPolicyEvent::Changed(c) => LoginPolicyTransition::Changed(c),
                OrgLoginPolicyEvent::Removed(_) => LoginPolicyTransition::Removed,
                OrgLoginPolicyEvent::IdpProviderAdded(e) => {
                    LoginPolicyTransition::IdpProviderAdded(e.idp_config_id)
                }
                OrgLoginPolicyEvent::IdpProviderRemoved(e)
                | OrgLoginPolicyEvent::IdpProviderCascadeRemoved(e) => {
                    LoginPolicyTransition::IdpProviderRemoved(e.idp_config_id)
                }
            });
        } else if let Some(OrgEvent::Removed(_)) = event.decode::<OrgEvent>()? {
            self.policy.apply(LoginPolicyTransition::Removed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use warden_events::append_and_reduce;
    use warden_events::testing::Stream;
    use warden_org::{OrgAdded, OrgRemoved, aggregate};

    use super::*;

    fn provider(id: &str) -> IdpProviderAdded {
        IdpProviderAdded {
            idp_config_id: id.into(),
            idp_owner: IdpOwnerType::Org,
        }
    }

    #[test]
    fn cascade_removal_unlinks_provider() {
        let mut stream = Stream::new(aggregate("o1", "inst"));
        let events = vec![
            stream.next(OrgEvent::Added(OrgAdded { name: "Acme".into() })),
            stream.next(OrgLoginPolicyEvent::Added(LoginPolicy::default())),
            stream.next(OrgLoginPolicyEvent::IdpProviderAdded(provider("idp1"))),
            stream.next(OrgLoginPolicyEvent::IdpProviderAdded(provider("idp2"))),
            stream.next(OrgLoginPolicyEvent::IdpProviderCascadeRemoved(IdpProviderRemoved {
                idp_config_id: "idp1".into(),
            })),
        ];

        let mut model = OrgLoginPolicyWriteModel::new("o1");
        append_and_reduce(&mut model, &events).unwrap();

        assert!(model.exists());
        assert_eq!(model.policy.idp_providers, vec!["idp2".to_string()]);
        assert_eq!(model.base.processed_sequence, 5);
    }

    #[test]
    fn org_removal_removes_policy() {
        let mut stream = Stream::new(aggregate("o1", "inst"));
        let events = vec![
            stream.next(OrgLoginPolicyEvent::Added(LoginPolicy::default())),
            stream.next(OrgEvent::Removed(OrgRemoved {
                name: "Acme".into(),
                verified_domains: vec![],
            })),
        ];
        let mut model = OrgLoginPolicyWriteModel::new("o1");
        append_and_reduce(&mut model, &events).unwrap();
        assert!(!model.exists());
    }
}
