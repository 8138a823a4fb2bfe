//! The command pipeline shared by every entity module.
//!
//! ```text
//! intent
//!   ↓ validate shape
//!   ↓ load write model(s)            (filter)
//!   ↓ existence / state
//!   ↓ cross-aggregate preconditions  (one batched search)
//!   ↓ idempotence / diff
//!   ↓ authorize                      (permission gate)
//!   ↓ build drafts (+ cascades)
//!   ↓ push                           (optimistic concurrency)
//!   ↓ fold pushed events back
//! ObjectDetails
//! ```
//!
//! Filter, push and search are the only suspension points. Each one is bound
//! by the context deadline (or the configured per-call timeout).

use std::future::Future;
use std::sync::Arc;

use tokio::time::{Instant, timeout_at};

use warden_auth::{Permission, PermissionGate, check_with_fallback};
use warden_core::{
    CommandContext, Error, IdGenerator, LifecycleState, ObjectDetails, Result, SecretEncryptor,
    SecretHasher, UuidV7Generator,
};
use warden_events::{
    AggregateFilter, Command, SearchCriteria, SearchQuery, SearchResult, StoredEvent, WriteModel,
    append_and_reduce,
};
use warden_infra::{EventStoreError, Eventstore, Sha256SecretHasher};

use crate::config::CommandConfig;
use crate::org_domain::DomainVerifier;

/// Entry point for every mutation of the identity domain.
///
/// Holds the injected ports; write models are created per call and never
/// shared, so one `Commands` serves concurrent requests of any instance.
#[derive(Clone)]
pub struct Commands {
    pub(crate) store: Arc<dyn Eventstore>,
    pub(crate) gate: Arc<dyn PermissionGate>,
    pub(crate) id_generator: Arc<dyn IdGenerator>,
    pub(crate) hasher: Arc<dyn SecretHasher>,
    pub(crate) encryptor: Arc<dyn SecretEncryptor>,
    pub(crate) domain_verifier: Option<Arc<dyn DomainVerifier>>,
    pub(crate) config: CommandConfig,
}

impl std::fmt::Debug for Commands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commands")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Commands {
    /// Uses UUIDv7 ids and salted SHA-256 password hashing unless replaced.
    pub fn new(
        store: Arc<dyn Eventstore>,
        gate: Arc<dyn PermissionGate>,
        encryptor: Arc<dyn SecretEncryptor>,
    ) -> Self {
        Self {
            store,
            gate,
            id_generator: Arc::new(UuidV7Generator),
            hasher: Arc::new(Sha256SecretHasher),
            encryptor,
            domain_verifier: None,
            config: CommandConfig::default(),
        }
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn SecretHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Enables token-based domain validation.
    pub fn with_domain_verifier(mut self, verifier: Arc<dyn DomainVerifier>) -> Self {
        self.domain_verifier = Some(verifier);
        self
    }

    pub fn with_config(mut self, config: CommandConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    /// Runs one port call under the context deadline, or the configured
    /// timeout when the caller set none.
    async fn bounded<T, F>(&self, ctx: &CommandContext, call: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = core::result::Result<T, EventStoreError>>,
    {
        let deadline = ctx
            .deadline()
            .or_else(|| self.config.command_timeout().map(|t| Instant::now() + t));
        let outcome = match deadline {
            Some(deadline) => timeout_at(deadline, fut)
                .await
                .map_err(|_| Error::DeadlineExceeded(format!("{call} did not finish in time")))?,
            None => fut.await,
        };
        outcome.map_err(Error::from)
    }

    /// Loads the model's events of the context instance and folds them.
    pub(crate) async fn filter_to_reducer<M>(&self, ctx: &CommandContext, model: &mut M) -> Result<()>
    where
        M: WriteModel + Send + ?Sized,
    {
        let query = model.query().instance(ctx.instance_id());
        let events = self.bounded(ctx, "filter", self.store.filter(&query)).await?;
        append_and_reduce(model, &events)
    }

    pub(crate) async fn push(&self, ctx: &CommandContext, commands: Vec<Command>) -> Result<Vec<StoredEvent>> {
        if let Some(foreign) = commands
            .iter()
            .find(|c| c.aggregate.instance_id != ctx.instance_id())
        {
            return Err(Error::internal(format!(
                "draft for {} {} targets another instance",
                foreign.aggregate.aggregate_type, foreign.aggregate.id
            )));
        }
        self.bounded(ctx, "push", self.store.push(commands)).await
    }

    /// Pushes `commands` and folds the returned events into `model`.
    pub(crate) async fn push_and_reduce<M>(
        &self,
        ctx: &CommandContext,
        model: &mut M,
        commands: Vec<Command>,
    ) -> Result<Vec<StoredEvent>>
    where
        M: WriteModel + Send + ?Sized,
    {
        let events = self.push(ctx, commands).await?;
        append_and_reduce(model, &events)?;
        Ok(events)
    }

    pub(crate) async fn search(
        &self,
        ctx: &CommandContext,
        criteria: &[SearchCriteria],
    ) -> Result<Vec<SearchResult>> {
        self.bounded(ctx, "search", self.store.search(ctx.instance_id(), criteria))
            .await
    }

    /// Owner of an aggregate the caller did not qualify, from its first event.
    pub(crate) async fn resolve_resource_owner(
        &self,
        ctx: &CommandContext,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<String> {
        let query = SearchQuery::new()
            .instance(ctx.instance_id())
            .filter(AggregateFilter::new(aggregate_type).aggregate_id(aggregate_id));
        let events = self.bounded(ctx, "filter", self.store.filter(&query)).await?;
        events
            .into_iter()
            .next()
            .map(|e| e.resource_owner)
            .ok_or_else(|| Error::not_found(format!("{aggregate_type} {aggregate_id} not found")))
    }

    pub(crate) fn authorize(
        &self,
        ctx: &CommandContext,
        permission: &Permission,
        resource_owner: &str,
        aggregate_id: &str,
    ) -> Result<()> {
        self.gate
            .check(ctx, permission, resource_owner, aggregate_id)
            .map_err(Error::from)
    }

    pub(crate) fn authorize_with_fallback(
        &self,
        ctx: &CommandContext,
        permission: &Permission,
        resource_owner: &str,
        specific_id: &str,
        parent_id: &str,
    ) -> Result<()> {
        check_with_fallback(
            self.gate.as_ref(),
            ctx,
            permission,
            resource_owner,
            specific_id,
            parent_id,
        )
        .map_err(Error::from)
    }

    /// Caller-supplied id, or a fresh one.
    pub(crate) fn id_or_next(&self, id: Option<String>) -> Result<String> {
        match id.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => self.id_generator.next_id(),
        }
    }
}

/// Lifecycle state stored in the field index for `(aggregate, object)`,
/// if any entry matched.
pub(crate) fn indexed_state(
    results: &[SearchResult],
    aggregate_type: &str,
    aggregate_id: &str,
    object_type: &str,
) -> Result<Option<(LifecycleState, String)>> {
    results
        .iter()
        .find(|r| {
            r.aggregate.aggregate_type == aggregate_type
                && r.aggregate.id == aggregate_id
                && r.object_type == object_type
                && r.field_name == "state"
        })
        .map(|r| Ok((r.value_as::<LifecycleState>()?, r.aggregate.resource_owner.clone())))
        .transpose()
}

/// Trims and rejects blank required input.
pub(crate) fn required<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::invalid_argument(format!("{what} is required")));
    }
    Ok(value)
}

/// Trims keys and rejects blanks and duplicates.
pub(crate) fn distinct_keys(keys: &[String], what: &str) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        let key = required(key, what)?;
        if out.iter().any(|k| k == key) {
            return Err(Error::invalid_argument(format!("duplicate {what} {key:?}")));
        }
        out.push(key.to_string());
    }
    Ok(out)
}

/// Details of the last event of a multi-aggregate push.
pub(crate) fn last_details(pushed: &[StoredEvent]) -> Result<ObjectDetails> {
    pushed
        .last()
        .map(|e| ObjectDetails::new(e.resource_owner.clone(), e.sequence, Some(e.created_at)))
        .ok_or_else(|| Error::internal("push returned no events"))
}
