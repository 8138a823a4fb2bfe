use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use warden_events::{
    Aggregate, Command, FieldOperation, SearchCriteria, SearchField, SearchQuery, SearchResult,
    StoredEvent, StreamKey, UniqueAction,
};

use super::r#trait::{EventStoreError, Eventstore};

#[derive(Debug, Clone)]
struct FieldEntry {
    aggregate: Aggregate,
    field: SearchField,
}

impl FieldEntry {
    fn belongs_to(&self, aggregate: &Aggregate) -> bool {
        self.aggregate.instance_id == aggregate.instance_id
            && self.aggregate.aggregate_type == aggregate.aggregate_type
            && self.aggregate.id == aggregate.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct UniqueKey {
    instance_id: String,
    kind: String,
    key: String,
}

#[derive(Debug, Default)]
struct State {
    log: Vec<StoredEvent>,
    sequences: HashMap<StreamKey, u64>,
    unique: HashSet<UniqueKey>,
    fields: Vec<FieldEntry>,
}

/// In-memory append-only event store with field index and unique constraints.
///
/// Intended for tests/dev. Not optimized for performance: filters scan the
/// whole log and the field index is a flat list.
#[derive(Debug, Default)]
pub struct InMemoryEventstore {
    state: RwLock<State>,
}

impl InMemoryEventstore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the full log in position order.
    pub fn events(&self) -> Vec<StoredEvent> {
        self.state
            .read()
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }
}

fn apply_field_operation(fields: &mut Vec<FieldEntry>, aggregate: &Aggregate, op: FieldOperation) {
    match op {
        FieldOperation::Set(field) => {
            fields.retain(|e| {
                !(e.belongs_to(aggregate)
                    && e.field.object_type == field.object_type
                    && e.field.object_id == field.object_id
                    && e.field.field_name == field.field_name)
            });
            fields.push(FieldEntry {
                aggregate: aggregate.clone(),
                field,
            });
        }
        FieldOperation::Add(field) => {
            let duplicate = fields
                .iter()
                .any(|e| e.belongs_to(aggregate) && e.field == field);
            if !duplicate {
                fields.push(FieldEntry {
                    aggregate: aggregate.clone(),
                    field,
                });
            }
        }
        FieldOperation::RemoveField {
            object_type,
            object_id,
            field_name,
        } => fields.retain(|e| {
            !(e.belongs_to(aggregate)
                && e.field.object_type == object_type
                && e.field.object_id == object_id
                && e.field.field_name == field_name)
        }),
        FieldOperation::RemoveObject {
            object_type,
            object_id,
        } => fields.retain(|e| {
            !(e.belongs_to(aggregate)
                && e.field.object_type == object_type
                && e.field.object_id == object_id)
        }),
        FieldOperation::RemoveAggregate => fields.retain(|e| !e.belongs_to(aggregate)),
    }
}

#[async_trait]
impl Eventstore for InMemoryEventstore {
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>, EventStoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;

        Ok(state
            .log
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect())
    }

    async fn push(&self, commands: Vec<Command>) -> Result<Vec<StoredEvent>, EventStoreError> {
        if commands.is_empty() {
            return Ok(vec![]);
        }

        let mut guard = self
            .state
            .write()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;
        let state = &mut *guard;

        // Expectations are checked against the pre-batch sequences.
        for (idx, command) in commands.iter().enumerate() {
            let aggregate = &command.aggregate;
            if aggregate.id.is_empty() || aggregate.instance_id.is_empty() {
                return Err(EventStoreError::InvalidAppend(format!(
                    "command {idx} has no aggregate id or instance"
                )));
            }
            let current = state
                .sequences
                .get(&aggregate.stream_key())
                .copied()
                .unwrap_or(0);
            if !command.expected.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "{} {}: expected {:?}, found {current}",
                    aggregate.aggregate_type, aggregate.id, command.expected
                )));
            }
        }

        let mut unique = state.unique.clone();
        for command in &commands {
            for constraint in &command.unique_constraints {
                let key = UniqueKey {
                    instance_id: command.aggregate.instance_id.clone(),
                    kind: constraint.kind.clone(),
                    key: constraint.key.clone(),
                };
                match constraint.action {
                    UniqueAction::Add => {
                        if !unique.insert(key) {
                            let msg = if constraint.error_message.is_empty() {
                                format!("{} '{}' is taken", constraint.kind, constraint.key)
                            } else {
                                constraint.error_message.clone()
                            };
                            return Err(EventStoreError::UniqueViolation(msg));
                        }
                    }
                    UniqueAction::Remove => {
                        unique.remove(&key);
                    }
                }
            }
        }
        state.unique = unique;

        let created_at = Utc::now();
        let mut pushed = Vec::with_capacity(commands.len());
        for mut command in commands {
            let sequence = {
                let seq = state
                    .sequences
                    .entry(command.aggregate.stream_key())
                    .or_insert(0);
                *seq += 1;
                *seq
            };
            let position = state.log.len() as u64 + 1;
            for op in std::mem::take(&mut command.fields) {
                apply_field_operation(&mut state.fields, &command.aggregate, op);
            }
            let event = StoredEvent::from_command(command, sequence, position, created_at);
            state.log.push(event.clone());
            pushed.push(event);
        }

        tracing::debug!(count = pushed.len(), "events pushed");
        Ok(pushed)
    }

    async fn search(
        &self,
        instance_id: &str,
        criteria: &[SearchCriteria],
    ) -> Result<Vec<SearchResult>, EventStoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;

        Ok(state
            .fields
            .iter()
            .filter(|e| e.aggregate.instance_id == instance_id)
            .filter(|e| criteria.iter().any(|c| c.matches(&e.aggregate, &e.field)))
            .map(|e| SearchResult {
                aggregate: e.aggregate.clone(),
                object_type: e.field.object_type.clone(),
                object_id: e.field.object_id.clone(),
                field_name: e.field.field_name.clone(),
                value: e.field.value.clone(),
            })
            .collect())
    }
}
