use serde::{Deserialize, Serialize};

use warden_core::{Exists, ObjectState, Result};
use warden_events::{
    Aggregate, AggregateFilter, Event, SearchQuery, StoredEvent, UniqueConstraint,
    WriteModel, WriteModelBase, impl_event_codec,
};

use crate::human::{AGGREGATE_TYPE, UserEvent};

/// An external identity maps to at most one user per instance.
pub const EXTERNAL_IDP_UNIQUE_TYPE: &str = "external_idp";

pub(crate) fn link_unique_key(idp_config_id: &str, external_user_id: &str) -> String {
    format!("{idp_config_id}:{external_user_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdpLinkAdded {
    pub idp_config_id: String,
    pub external_user_id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdpLinkRemoved {
    pub idp_config_id: String,
    pub external_user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdpLinkEvent {
    Added(UserIdpLinkAdded),
    Removed(UserIdpLinkRemoved),
    CascadeRemoved(UserIdpLinkRemoved),
}

impl_event_codec!(UserIdpLinkEvent {
    Added => "user.human.externalidp.added",
    Removed => "user.human.externalidp.removed",
    CascadeRemoved => "user.human.externalidp.cascade.removed",
});

impl Event for UserIdpLinkEvent {
    fn unique_constraints(&self, _aggregate: &Aggregate) -> Vec<UniqueConstraint> {
        match self {
            UserIdpLinkEvent::Added(e) => vec![UniqueConstraint::add(
                EXTERNAL_IDP_UNIQUE_TYPE,
                link_unique_key(&e.idp_config_id, &e.external_user_id),
                "external identity is already linked to a user",
            )],
            UserIdpLinkEvent::Removed(e) | UserIdpLinkEvent::CascadeRemoved(e) => {
                vec![UniqueConstraint::remove(
                    EXTERNAL_IDP_UNIQUE_TYPE,
                    link_unique_key(&e.idp_config_id, &e.external_user_id),
                )]
            }
        }
    }
}

/// One link between a user and an external identity.
#[derive(Debug, Clone, Default)]
pub struct UserIdpLinkWriteModel {
    pub base: WriteModelBase,
    pub idp_config_id: String,
    pub external_user_id: String,
    pub display_name: String,
    pub state: ObjectState,
}

impl UserIdpLinkWriteModel {
    pub fn new(
        user_id: impl Into<String>,
        idp_config_id: impl Into<String>,
        external_user_id: impl Into<String>,
    ) -> Self {
        Self {
            base: WriteModelBase::new(AGGREGATE_TYPE, user_id, String::new()),
            idp_config_id: idp_config_id.into(),
            external_user_id: external_user_id.into(),
            ..Self::default()
        }
    }

    fn is_mine(&self, idp_config_id: &str, external_user_id: &str) -> bool {
        self.idp_config_id == idp_config_id && self.external_user_id == external_user_id
    }
}

impl Exists for UserIdpLinkWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}

impl WriteModel for UserIdpLinkWriteModel {
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
        if let Some(e) = event.decode::<UserIdpLinkEvent>()? {
            match e {
                UserIdpLinkEvent::Added(e) if self.is_mine(&e.idp_config_id, &e.external_user_id) => {
                    self.display_name = e.display_name;
                    self.state = ObjectState::Active;
                }
                UserIdpLinkEvent::Removed(e) | UserIdpLinkEvent::CascadeRemoved(e)
                    if self.is_mine(&e.idp_config_id, &e.external_user_id) =>
                {
                    self.state = ObjectState::Removed;
                }
                _ => {}
            }
        } else if let Some(UserEvent::Removed(_)) = event.decode::<UserEvent>()? {
            self.state = ObjectState::Removed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use warden_events::append_and_reduce;
    use warden_events::testing::Stream;

    use super::*;
    use crate::human::aggregate;

    fn link(idp: &str, ext: &str) -> UserIdpLinkEvent {
        UserIdpLinkEvent::Added(UserIdpLinkAdded {
            idp_config_id: idp.into(),
            external_user_id: ext.into(),
            display_name: String::new(),
        })
    }

    #[test]
    fn folds_only_the_addressed_link() {
        let mut stream = Stream::new(aggregate("u1", "o1", "inst"));
        let events = vec![
            stream.next(link("idp1", "a")),
            stream.next(link("idp1", "b")),
            stream.next(UserIdpLinkEvent::CascadeRemoved(UserIdpLinkRemoved {
                idp_config_id: "idp1".into(),
                external_user_id: "b".into(),
            })),
        ];

        let mut a = UserIdpLinkWriteModel::new("u1", "idp1", "a");
        append_and_reduce(&mut a, &events).unwrap();
        let mut b = UserIdpLinkWriteModel::new("u1", "idp1", "b");
        append_and_reduce(&mut b, &events).unwrap();

        assert!(a.exists());
        assert!(!b.exists());
        assert_eq!(a.base.resource_owner, "o1");
    }

    #[test]
    fn cascade_removal_releases_the_identity() {
        let removed = UserIdpLinkEvent::CascadeRemoved(UserIdpLinkRemoved {
            idp_config_id: "idp1".into(),
            external_user_id: "A".into(),
        });
        let constraints = removed.unique_constraints(&aggregate("u1", "o1", "inst"));
        assert_eq!(constraints, vec![UniqueConstraint::remove(EXTERNAL_IDP_UNIQUE_TYPE, "idp1:a")]);
    }
}
