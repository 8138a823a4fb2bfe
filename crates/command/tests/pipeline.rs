//! Cross-cutting behavior of the command pipeline: authorization,
//! instance isolation, deadlines and optimistic concurrency.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Barrier;

use common::{ADMIN, Harness, INSTANCE, commands_over};
use warden_auth::{Membership, MembershipGate, MembershipScope, Role, RolePermissions};
use warden_command::{AddOrg, CommandConfig, Commands};
use warden_core::{CommandContext, Error};
use warden_events::{Command, SearchCriteria, SearchQuery, SearchResult, StoredEvent};
use warden_infra::{AesGcmEncryptor, EventStoreError, Eventstore, InMemoryEventstore};

/// Delays every read.
struct SlowStore {
    inner: Arc<InMemoryEventstore>,
    delay: Duration,
}

#[async_trait]
impl Eventstore for SlowStore {
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>, EventStoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.filter(query).await
    }

    async fn push(&self, commands: Vec<Command>) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.push(commands).await
    }

    async fn search(
        &self,
        instance_id: &str,
        criteria: &[SearchCriteria],
    ) -> Result<Vec<SearchResult>, EventStoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.search(instance_id, criteria).await
    }
}

/// Holds every reader until a second one arrives, so two commands load the
/// same version before either pushes.
struct BarrierStore {
    inner: Arc<InMemoryEventstore>,
    barrier: Barrier,
}

#[async_trait]
impl Eventstore for BarrierStore {
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>, EventStoreError> {
        let events = self.inner.filter(query).await?;
        self.barrier.wait().await;
        Ok(events)
    }

    async fn push(&self, commands: Vec<Command>) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.push(commands).await
    }

    async fn search(
        &self,
        instance_id: &str,
        criteria: &[SearchCriteria],
    ) -> Result<Vec<SearchResult>, EventStoreError> {
        self.inner.search(instance_id, criteria).await
    }
}

fn commands_with_gate(store: Arc<InMemoryEventstore>, gate: MembershipGate) -> Commands {
    let encryptor = AesGcmEncryptor::generate("test-key").unwrap();
    Commands::new(store, Arc::new(gate), Arc::new(encryptor))
}

#[tokio::test]
async fn concurrent_changes_yield_one_success_and_one_conflict() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    let racing = commands_over(
        Arc::new(BarrierStore {
            inner: h.store.clone(),
            barrier: Barrier::new(2),
        }),
        CommandConfig::default(),
    );

    let (first, second) = tokio::join!(
        racing.change_org(&h.ctx, "o1", "Acme One"),
        racing.change_org(&h.ctx, "o1", "Acme Two"),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let conflict = outcomes.into_iter().find_map(Result::err).unwrap();
    assert!(conflict.is_conflict(), "{conflict:?}");
    assert_eq!(h.event_count(), 2);
}

#[tokio::test]
async fn caller_deadline_bounds_store_calls() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    let slow = commands_over(
        Arc::new(SlowStore {
            inner: h.store.clone(),
            delay: Duration::from_millis(200),
        }),
        CommandConfig::default(),
    );
    let ctx = h.ctx.clone().with_timeout(Duration::from_millis(10));

    let err = slow.change_org(&ctx, "o1", "Renamed").await.unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded(_)), "{err:?}");
    assert_eq!(h.event_count(), 1);
}

#[tokio::test]
async fn configured_timeout_applies_without_a_deadline() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    let slow = commands_over(
        Arc::new(SlowStore {
            inner: h.store.clone(),
            delay: Duration::from_millis(200),
        }),
        CommandConfig {
            command_timeout_ms: Some(10),
            ..CommandConfig::default()
        },
    );

    let err = slow.deactivate_org(&h.ctx, "o1").await.unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded(_)), "{err:?}");
}

#[tokio::test]
async fn refused_commands_write_nothing() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    let before = h.event_count();

    let stranger = commands_with_gate(h.store.clone(), MembershipGate::new(RolePermissions::iam_defaults()));
    let err = stranger.change_org(&h.ctx, "o1", "Hijacked").await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)), "{err:?}");
    assert_eq!(h.event_count(), before);
}

#[tokio::test]
async fn org_scoped_roles_stop_at_the_org_boundary() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.org("o2", "Globex").await;

    let gate = MembershipGate::new(RolePermissions::iam_defaults()).with_membership(Membership::new(
        INSTANCE,
        "owner-of-o1",
        MembershipScope::Org("o1".into()),
        [Role::new("ORG_OWNER")],
    ));
    let scoped = commands_with_gate(h.store.clone(), gate);
    let ctx = CommandContext::new(INSTANCE, "owner-of-o1");

    scoped.change_org(&ctx, "o1", "Acme Corp").await.unwrap();
    let err = scoped.change_org(&ctx, "o2", "Globex Corp").await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)), "{err:?}");

    // Creating organizations is reserved for instance administrators.
    let err = scoped
        .add_org(
            &ctx,
            AddOrg {
                org_id: None,
                name: "Initech".into(),
                domains: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)), "{err:?}");
}

#[tokio::test]
async fn instances_do_not_see_each_other() {
    let h = Harness::new();
    h.org("o1", "Acme").await;

    let other = CommandContext::new("inst-2", ADMIN);
    let err = h.commands.change_org(&other, "o1", "Renamed").await.unwrap_err();
    assert!(err.is_not_found(), "{err:?}");

    let err = h.commands.add_human_user(&other, "o1", common::human("u1", "ada")).await.unwrap_err();
    assert!(err.is_precondition_failed(), "{err:?}");
}

#[tokio::test]
async fn details_track_the_aggregate_sequence() {
    let h = Harness::new();
    h.org("o1", "Acme").await;

    let changed = h.commands.change_org(&h.ctx, "o1", "Acme Corp").await.unwrap();
    let deactivated = h.commands.deactivate_org(&h.ctx, "o1").await.unwrap();

    assert_eq!(changed.sequence, 2);
    assert_eq!(deactivated.sequence, 3);
    assert_eq!(deactivated.resource_owner, "o1");
    assert!(deactivated.change_date >= changed.change_date);
}
