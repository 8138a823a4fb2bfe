use serde::{Deserialize, Serialize};

use warden_core::{Exists, LifecycleState, Result};
use warden_events::{
    Aggregate, AggregateFilter, Event, FieldOperation, SearchQuery, StoredEvent,
    UniqueConstraint, WriteModel, WriteModelBase, impl_event_codec,
};

use crate::domain::{DOMAIN_UNIQUE_TYPE, OrgDomainEvent};

pub const AGGREGATE_TYPE: &str = "org";
pub const ORG_SEARCH_TYPE: &str = "org";
pub const STATE_SEARCH_FIELD: &str = "state";
pub const NAME_UNIQUE_TYPE: &str = "org_name";

/// An organization owns itself: its resource owner is its own id.
pub fn aggregate(org_id: &str, instance_id: &str) -> Aggregate {
    Aggregate::new(AGGREGATE_TYPE, org_id, org_id, instance_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgAdded {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgChanged {
    pub name: String,
    #[serde(skip)]
    pub old_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDeactivated {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgReactivated {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgRemoved {
    pub name: String,
    /// Verified domains whose reservation is released with the org.
    #[serde(skip)]
    pub verified_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgEvent {
    Added(OrgAdded),
    Changed(OrgChanged),
    Deactivated(OrgDeactivated),
    Reactivated(OrgReactivated),
    Removed(OrgRemoved),
}

impl_event_codec!(OrgEvent {
    Added => "org.added",
    Changed => "org.changed",
    Deactivated => "org.deactivated",
    Reactivated => "org.reactivated",
    Removed => "org.removed",
});

impl Event for OrgEvent {
    fn fields(&self, aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        let state = |state: LifecycleState| {
            FieldOperation::set(ORG_SEARCH_TYPE, &aggregate.id, STATE_SEARCH_FIELD, state)
                .map(|op| vec![op])
        };
        match self {
            OrgEvent::Added(_) | OrgEvent::Reactivated(_) => state(LifecycleState::Active),
            OrgEvent::Deactivated(_) => state(LifecycleState::Inactive),
            OrgEvent::Changed(_) => Ok(Vec::new()),
            OrgEvent::Removed(_) => Ok(vec![FieldOperation::RemoveAggregate]),
        }
    }

    fn unique_constraints(&self, _aggregate: &Aggregate) -> Vec<UniqueConstraint> {
        match self {
            OrgEvent::Added(e) => vec![UniqueConstraint::add(
                NAME_UNIQUE_TYPE,
                &e.name,
                "organization name is already taken",
            )],
            OrgEvent::Changed(e) => vec![
                UniqueConstraint::remove(NAME_UNIQUE_TYPE, &e.old_name),
                UniqueConstraint::add(NAME_UNIQUE_TYPE, &e.name, "organization name is already taken"),
            ],
            OrgEvent::Removed(e) => std::iter::once(UniqueConstraint::remove(NAME_UNIQUE_TYPE, &e.name))
                .chain(
                    e.verified_domains
                        .iter()
                        .map(|d| UniqueConstraint::remove(DOMAIN_UNIQUE_TYPE, d)),
                )
                .collect(),
            OrgEvent::Deactivated(_) | OrgEvent::Reactivated(_) => Vec::new(),
        }
    }
}

/// State of one organization.
#[derive(Debug, Clone, Default)]
pub struct OrgWriteModel {
    pub base: WriteModelBase,
    pub name: String,
    pub state: LifecycleState,
    pub primary_domain: String,
    pub verified_domains: Vec<String>,
}

impl OrgWriteModel {
    pub fn new(org_id: impl Into<String>) -> Self {
        let org_id = org_id.into();
        Self {
            base: WriteModelBase::new(AGGREGATE_TYPE, org_id.clone(), org_id),
            ..Self::default()
        }
    }
}

impl Exists for OrgWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}

impl WriteModel for OrgWriteModel {
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
        if let Some(e) = event.decode::<OrgEvent>()? {
            match e {
                OrgEvent::Added(e) => {
                    self.name = e.name;
                    self.state = LifecycleState::Active;
                }
                OrgEvent::Changed(e) => self.name = e.name,
                OrgEvent::Deactivated(_) => self.state = LifecycleState::Inactive,
                OrgEvent::Reactivated(_) => self.state = LifecycleState::Active,
                OrgEvent::Removed(_) => {
                    self.state = LifecycleState::Removed;
                    self.verified_domains.clear();
                }
            }
        } else if let Some(e) = event.decode::<OrgDomainEvent>()? {
            match e {
                OrgDomainEvent::Verified(e) => {
                    if !self.verified_domains.contains(&e.domain) {
                        self.verified_domains.push(e.domain);
                    }
                }
                OrgDomainEvent::PrimarySet(e) => self.primary_domain = e.domain,
                OrgDomainEvent::Removed(e) => {
                    self.verified_domains.retain(|d| *d != e.domain);
                    if self.primary_domain == e.domain {
                        self.primary_domain.clear();
                    }
                }
                OrgDomainEvent::Added(_)
                | OrgDomainEvent::VerificationAdded(_)
                | OrgDomainEvent::VerificationFailed(_) => {}
            }
        }
        Ok(())
    }
}
