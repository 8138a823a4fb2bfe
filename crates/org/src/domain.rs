use serde::{Deserialize, Serialize};

use warden_core::{CryptoValue, Exists, ObjectState, Result};
use warden_events::{
    Aggregate, AggregateFilter, Event, FieldOperation, SearchQuery, StoredEvent,
    UniqueConstraint, WriteModel, WriteModelBase, impl_event_codec,
};

use crate::org::{AGGREGATE_TYPE, OrgEvent};

pub const DOMAIN_SEARCH_TYPE: &str = "org_domain";
pub const VERIFIED_SEARCH_FIELD: &str = "verified";
/// A verified domain belongs to exactly one organization per instance.
pub const DOMAIN_UNIQUE_TYPE: &str = "org_domain";

/// Where the owner publishes the validation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainValidationType {
    /// A file served at a well-known path of the domain.
    Http,
    /// A TXT record on a challenge subdomain.
    Dns,
}

impl DomainValidationType {
    /// Location the verifier reads the token from.
    pub fn token_url(self, domain: &str, token: &str) -> String {
        match self {
            DomainValidationType::Http => {
                format!("https://{domain}/.well-known/warden-challenge/{token}.txt")
            }
            DomainValidationType::Dns => format!("_warden-challenge.{domain}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDomainAdded {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDomainVerificationAdded {
    pub domain: String,
    pub validation_type: DomainValidationType,
    /// Encrypted token; only the latest one counts.
    pub validation_code: CryptoValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDomainVerificationFailed {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDomainVerified {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDomainPrimarySet {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDomainRemoved {
    pub domain: String,
    #[serde(default)]
    pub was_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgDomainEvent {
    Added(OrgDomainAdded),
    VerificationAdded(OrgDomainVerificationAdded),
    VerificationFailed(OrgDomainVerificationFailed),
    Verified(OrgDomainVerified),
    PrimarySet(OrgDomainPrimarySet),
    Removed(OrgDomainRemoved),
}

impl_event_codec!(OrgDomainEvent {
    Added => "org.domain.added",
    VerificationAdded => "org.domain.verification.added",
    VerificationFailed => "org.domain.verification.failed",
    Verified => "org.domain.verified",
    PrimarySet => "org.domain.primary.set",
    Removed => "org.domain.removed",
});

impl Event for OrgDomainEvent {
    fn fields(&self, _aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        Ok(match self {
            OrgDomainEvent::Verified(e) => vec![FieldOperation::set(
                DOMAIN_SEARCH_TYPE,
                &e.domain,
                VERIFIED_SEARCH_FIELD,
                true,
            )?],
            OrgDomainEvent::Removed(e) => {
                vec![FieldOperation::remove_object(DOMAIN_SEARCH_TYPE, &e.domain)]
            }
            OrgDomainEvent::Added(_)
            | OrgDomainEvent::VerificationAdded(_)
            | OrgDomainEvent::VerificationFailed(_)
            | OrgDomainEvent::PrimarySet(_) => Vec::new(),
        })
    }

    fn unique_constraints(&self, _aggregate: &Aggregate) -> Vec<UniqueConstraint> {
        match self {
            OrgDomainEvent::Verified(e) => vec![UniqueConstraint::add(
                DOMAIN_UNIQUE_TYPE,
                &e.domain,
                "domain is already verified by another organization",
            )],
            OrgDomainEvent::Removed(e) if e.was_verified => {
                vec![UniqueConstraint::remove(DOMAIN_UNIQUE_TYPE, &e.domain)]
            }
            _ => Vec::new(),
        }
    }
}

/// One domain of an organization.
#[derive(Debug, Clone, Default)]
pub struct OrgDomainWriteModel {
    pub base: WriteModelBase,
    pub domain: String,
    pub verified: bool,
    pub primary: bool,
    pub validation_type: Option<DomainValidationType>,
    pub validation_code: Option<CryptoValue>,
    pub state: ObjectState,
}

impl OrgDomainWriteModel {
    pub fn new(org_id: impl Into<String>, domain: impl Into<String>) -> Self {
        let org_id = org_id.into();
        Self {
            base: WriteModelBase::new(AGGREGATE_TYPE, org_id.clone(), org_id),
            domain: domain.into(),
            ..Self::default()
        }
    }
}

impl Exists for OrgDomainWriteModel {
    fn exists(&self) -> bool {
        self.state.exists()
    }
}

impl WriteModel for OrgDomainWriteModel {
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
        if let Some(e) = event.decode::<OrgDomainEvent>()? {
            match e {
                OrgDomainEvent::Added(e) if e.domain == self.domain => {
                    self.state = ObjectState::Active;
                    self.verified = false;
                    self.primary = false;
                    self.validation_type = None;
                    self.validation_code = None;
                }
                OrgDomainEvent::VerificationAdded(e) if e.domain == self.domain => {
                    self.validation_type = Some(e.validation_type);
                    self.validation_code = Some(e.validation_code);
                }
                OrgDomainEvent::Verified(e) if e.domain == self.domain => self.verified = true,
                OrgDomainEvent::PrimarySet(e) => self.primary = e.domain == self.domain,
                OrgDomainEvent::Removed(e) if e.domain == self.domain => {
                    self.state = ObjectState::Removed;
                    self.verified = false;
                    self.primary = false;
                }
                _ => {}
            }
        } else if let Some(OrgEvent::Removed(_)) = event.decode::<OrgEvent>()? {
            self.state = ObjectState::Removed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use warden_events::append_and_reduce;

    use super::*;
    use crate::org::{OrgAdded, OrgRemoved, aggregate};
    use warden_events::testing::Stream;

    fn domain_added(domain: &str) -> OrgDomainEvent {
        OrgDomainEvent::Added(OrgDomainAdded { domain: domain.into() })
    }

    #[test]
    fn tracks_only_its_domain_but_any_primary_switch() {
        let mut stream = Stream::new(aggregate("o1", "inst"));
        let events = vec![
            stream.next(OrgEvent::Added(OrgAdded { name: "Acme".into() })),
            stream.next(domain_added("a.io")),
            stream.next(domain_added("b.io")),
            stream.next(OrgDomainEvent::Verified(OrgDomainVerified { domain: "a.io".into() })),
            stream.next(OrgDomainEvent::PrimarySet(OrgDomainPrimarySet { domain: "a.io".into() })),
            stream.next(OrgDomainEvent::Verified(OrgDomainVerified { domain: "b.io".into() })),
            stream.next(OrgDomainEvent::PrimarySet(OrgDomainPrimarySet { domain: "b.io".into() })),
        ];

        let mut model = OrgDomainWriteModel::new("o1", "a.io");
        append_and_reduce(&mut model, &events).unwrap();

        assert!(model.exists());
        assert!(model.verified);
        assert!(!model.primary);
        assert_eq!(model.base.processed_sequence, 7);
    }

    #[test]
    fn org_removal_removes_domain() {
        let mut stream = Stream::new(aggregate("o1", "inst"));
        let events = vec![
            stream.next(domain_added("a.io")),
            stream.next(OrgEvent::Removed(OrgRemoved {
                name: "Acme".into(),
                verified_domains: vec![],
            })),
        ];
        let mut model = OrgDomainWriteModel::new("o1", "a.io");
        append_and_reduce(&mut model, &events).unwrap();
        assert!(!model.exists());
    }

    #[test]
    fn latest_validation_replaces_earlier_ones() {
        let code = |crypted: &str| CryptoValue {
            algorithm: "aes-256-gcm".into(),
            key_id: "k".into(),
            crypted: crypted.into(),
        };
        let verification = |domain: &str, kind, crypted| {
            OrgDomainEvent::VerificationAdded(OrgDomainVerificationAdded {
                domain: domain.into(),
                validation_type: kind,
                validation_code: code(crypted),
            })
        };
        let mut stream = Stream::new(aggregate("o1", "inst"));
        let events = vec![
            stream.next(domain_added("a.io")),
            stream.next(verification("a.io", DomainValidationType::Http, "first")),
            stream.next(OrgDomainEvent::VerificationFailed(OrgDomainVerificationFailed {
                domain: "a.io".into(),
            })),
            stream.next(verification("a.io", DomainValidationType::Dns, "second")),
            stream.next(verification("b.io", DomainValidationType::Http, "other")),
        ];
        let mut model = OrgDomainWriteModel::new("o1", "a.io");
        append_and_reduce(&mut model, &events).unwrap();

        assert!(!model.verified);
        assert_eq!(model.validation_type, Some(DomainValidationType::Dns));
        assert_eq!(model.validation_code, Some(code("second")));
    }

    #[test]
    fn token_locations() {
        assert_eq!(
            DomainValidationType::Http.token_url("a.io", "t0k"),
            "https://a.io/.well-known/warden-challenge/t0k.txt"
        );
        assert_eq!(DomainValidationType::Dns.token_url("a.io", "t0k"), "_warden-challenge.a.io");
    }

    #[test]
    fn only_verified_removal_releases_reservation() {
        let agg = aggregate("o1", "inst");
        let unverified = OrgDomainEvent::Removed(OrgDomainRemoved {
            domain: "a.io".into(),
            was_verified: false,
        });
        let verified = OrgDomainEvent::Removed(OrgDomainRemoved {
            domain: "a.io".into(),
            was_verified: true,
        });
        assert!(unverified.unique_constraints(&agg).is_empty());
        assert_eq!(verified.unique_constraints(&agg).len(), 1);
    }
}
