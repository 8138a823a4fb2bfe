use warden_core::{Exists, Result};
use warden_events::{
    AggregateFilter, Event, SearchQuery, StoredEvent, WriteModel, WriteModelBase,
    impl_event_codec,
};
pub use warden_org::{INSTANCE_AGGREGATE_TYPE, instance_aggregate};

use crate::login::{LoginPolicy, LoginPolicyChanged, LoginPolicyTransition, LoginPolicyWriteModel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceLoginPolicyEvent {
    Added(LoginPolicy),
    Changed(LoginPolicyChanged),
}

impl_event_codec!(InstanceLoginPolicyEvent {
    Added => "instance.policy.login.added",
    Changed => "instance.policy.login.changed",
});

impl Event for InstanceLoginPolicyEvent {}

/// Default login policy of an instance.
#[derive(Debug, Clone, Default)]
pub struct InstanceLoginPolicyWriteModel {
    pub base: WriteModelBase,
    pub policy: LoginPolicyWriteModel,
}

impl InstanceLoginPolicyWriteModel {
    pub fn new(instance_id: impl Into<String>) -> Self {
        let instance_id = instance_id.into();
        Self {
            base: WriteModelBase::new(INSTANCE_AGGREGATE_TYPE, instance_id.clone(), instance_id),
            ..Self::default()
        }
    }
}

impl Exists for InstanceLoginPolicyWriteModel {
    fn exists(&self) -> bool {
        self.policy.exists()
    }
}

impl WriteModel for InstanceLoginPolicyWriteModel {
    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    fn query(&self) -> SearchQuery {
        SearchQuery::new().filter(
            AggregateFilter::new(INSTANCE_AGGREGATE_TYPE)
                .aggregate_id(self.base.aggregate_id.clone()),
        )
    }

    fn reduce(&mut self, event: &StoredEvent) -> Result<()> {
        let Some(e) = event.decode::<InstanceLoginPolicyEvent>()? else {
            return Ok(());
        };
        self.policy.apply(match e {
            InstanceLoginPolicyEvent::Added(p) => LoginPolicyTransition::Added(p),
            InstanceLoginPolicyEvent::Changed(c) => LoginPolicyTransition::Changed(c),
        });
        Ok(())
    }
}
