//! Secondary field index vocabulary.
//!
//! Events declare which of their fields should be queryable across
//! aggregates (e.g. "project P has role key R", "org O is active"). The
//! store maintains the index as a side effect of push; the command layer
//! only reads it through `search` to answer precondition questions.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use warden_core::{Error, Result};

use crate::aggregate::Aggregate;

/// One indexed value of an object living inside an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchField {
    pub object_type: String,
    pub object_id: String,
    pub field_name: String,
    pub value: JsonValue,
}

impl SearchField {
    pub fn new(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        field_name: impl Into<String>,
        value: impl Serialize,
    ) -> Result<Self> {
        Ok(Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
            field_name: field_name.into(),
            value: serde_json::to_value(value)?,
        })
    }
}

/// Mutation of the field index, scoped to the pushed command's aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldOperation {
    /// Replace every value of `(object_type, object_id, field_name)`.
    Set(SearchField),
    /// Add one more value (multi-valued fields such as role keys).
    Add(SearchField),
    RemoveField {
        object_type: String,
        object_id: String,
        field_name: String,
    },
    RemoveObject {
        object_type: String,
        object_id: String,
    },
    /// Drop every entry of the aggregate.
    RemoveAggregate,
}

impl FieldOperation {
    pub fn set(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        field_name: impl Into<String>,
        value: impl Serialize,
    ) -> Result<Self> {
        Ok(Self::Set(SearchField::new(object_type, object_id, field_name, value)?))
    }

    pub fn add(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        field_name: impl Into<String>,
        value: impl Serialize,
    ) -> Result<Self> {
        Ok(Self::Add(SearchField::new(object_type, object_id, field_name, value)?))
    }

    pub fn remove_field(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self::RemoveField {
            object_type: object_type.into(),
            object_id: object_id.into(),
            field_name: field_name.into(),
        }
    }

    pub fn remove_object(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self::RemoveObject {
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }
}

/// One search criterion; unset members match anything. Criteria passed to a
/// single search call are OR-ed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub aggregate_type: Option<String>,
    pub aggregate_id: Option<String>,
    pub resource_owner: Option<String>,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub field_name: Option<String>,
}

impl SearchCriteria {
    pub fn aggregate(aggregate_type: impl Into<String>, aggregate_id: impl Into<String>) -> Self {
        Self {
            aggregate_type: Some(aggregate_type.into()),
            aggregate_id: Some(aggregate_id.into()),
            ..Self::default()
        }
    }

    pub fn resource_owner(mut self, resource_owner: impl Into<String>) -> Self {
        self.resource_owner = Some(resource_owner.into());
        self
    }

    pub fn object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    pub fn object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    pub fn matches(&self, aggregate: &Aggregate, field: &SearchField) -> bool {
        fn eq(expected: &Option<String>, actual: &str) -> bool {
            expected.as_deref().is_none_or(|e| e == actual)
        }
        eq(&self.aggregate_type, &aggregate.aggregate_type)
            && eq(&self.aggregate_id, &aggregate.id)
            && eq(&self.resource_owner, &aggregate.resource_owner)
            && eq(&self.object_type, &field.object_type)
            && eq(&self.object_id, &field.object_id)
            && eq(&self.field_name, &field.field_name)
    }
}

/// A matching index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub aggregate: Aggregate,
    pub object_type: String,
    pub object_id: String,
    pub field_name: String,
    pub value: JsonValue,
}

impl SearchResult {
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            Error::internal(format!(
                "unexpected value for {}.{}: {e}",
                self.object_type, self.field_name
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Aggregate {
        Aggregate::new("project", "p1", "org1", "inst1")
    }

    #[test]
    fn unset_criteria_match_everything() {
        let field = SearchField::new("project_role", "admin", "key", "admin").unwrap();
        assert!(SearchCriteria::default().matches(&project(), &field));
    }

    #[test]
    fn criteria_compare_every_set_member() {
        let field = SearchField::new("project_role", "admin", "key", "admin").unwrap();
        let hit = SearchCriteria::aggregate("project", "p1")
            .object_type("project_role")
            .field_name("key");
        let miss = SearchCriteria::aggregate("project", "p2").object_type("project_role");
        assert!(hit.matches(&project(), &field));
        assert!(!miss.matches(&project(), &field));
        assert!(!hit.clone().resource_owner("org2").matches(&project(), &field));
    }

    #[test]
    fn unserializable_values_are_rejected() {
        let mut map = std::collections::HashMap::new();
        map.insert((1, 2), "composite keys are not valid json");
        let err = SearchField::new("project", "p1", "odd", map).unwrap_err();
        assert_eq!(err.kind(), "internal");
    }

    #[test]
    fn value_as_decodes_json() {
        let result = SearchResult {
            aggregate: project(),
            object_type: "project".into(),
            object_id: "p1".into(),
            field_name: "state".into(),
            value: serde_json::json!("active"),
        };
        let state: warden_core::LifecycleState = result.value_as().unwrap();
        assert_eq!(state, warden_core::LifecycleState::Active);
        assert!(result.value_as::<u32>().is_err());
    }
}
