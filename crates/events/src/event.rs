use serde_json::Value as JsonValue;

use warden_core::Result;

use crate::aggregate::Aggregate;
use crate::field::FieldOperation;
use crate::unique::UniqueConstraint;

/// Wire mapping between a typed event enum and `(event_type, payload)`.
///
/// Usually generated with [`impl_event_codec!`](crate::impl_event_codec).
/// `decode` returns `Ok(None)` for event types the enum does not declare, so
/// reducers silently skip events added by newer schema versions.
pub trait EventCodec: Sized {
    /// Every event type this enum understands.
    const EVENT_TYPES: &'static [&'static str];

    /// Stable event name (e.g. "project.grant.added").
    fn event_type(&self) -> &'static str;

    fn to_payload(&self) -> Result<JsonValue>;

    fn decode(event_type: &str, payload: &JsonValue) -> Result<Option<Self>>;
}

/// A domain event: immutable fact about one aggregate.
///
/// Besides the payload, an event declares the secondary-index fields and the
/// unique constraints the store must maintain when it is appended to
/// `aggregate`.
pub trait Event: EventCodec + Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Schema version for this event type.
    fn version(&self) -> u32 {
        1
    }

    fn fields(&self, _aggregate: &Aggregate) -> Result<Vec<FieldOperation>> {
        Ok(Vec::new())
    }

    fn unique_constraints(&self, _aggregate: &Aggregate) -> Vec<UniqueConstraint> {
        Vec::new()
    }
}

/// Implements [`EventCodec`] for an enum whose variants each wrap one
/// serde payload struct.
///
/// ```ignore
/// impl_event_codec!(OrgEvent {
///     Added => "org.added",
///     Removed => "org.removed",
/// });
/// ```
#[macro_export]
macro_rules! impl_event_codec {
    ($enum:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $crate::EventCodec for $enum {
            const EVENT_TYPES: &'static [&'static str] = &[$($name),+];

            fn event_type(&self) -> &'static str {
                match self {
                    $($enum::$variant(_) => $name,)+
                }
            }

            fn to_payload(&self) -> $crate::__private::Result<$crate::__private::serde_json::Value> {
                let value = match self {
                    $($enum::$variant(e) => $crate::__private::serde_json::to_value(e)?,)+
                };
                Ok(value)
            }

            fn decode(
                event_type: &str,
                payload: &$crate::__private::serde_json::Value,
            ) -> $crate::__private::Result<Option<Self>> {
                let event = match event_type {
                    $($name => $enum::$variant($crate::__private::serde::Deserialize::deserialize(payload)?),)+
                    _ => return Ok(None),
                };
                Ok(Some(event))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Renamed {
        name: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Closed {}

    #[derive(Debug, Clone, PartialEq)]
    enum SampleEvent {
        Renamed(Renamed),
        Closed(Closed),
    }

    crate::impl_event_codec!(SampleEvent {
        Renamed => "sample.renamed",
        Closed => "sample.closed",
    });

    #[test]
    fn decodes_declared_types() {
        let decoded = SampleEvent::decode("sample.renamed", &json!({"name": "n"})).unwrap();
        assert_eq!(decoded, Some(SampleEvent::Renamed(Renamed { name: "n".into() })));

        let closed = SampleEvent::decode("sample.closed", &json!({})).unwrap();
        assert_eq!(closed, Some(SampleEvent::Closed(Closed {})));
    }

    #[test]
    fn unknown_types_are_ignored() {
        let decoded = SampleEvent::decode("sample.archived", &json!({"anything": 1})).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn malformed_payload_of_known_type_is_an_error() {
        let err = SampleEvent::decode("sample.renamed", &json!({"name": 7})).unwrap_err();
        assert_eq!(err.kind(), "internal");
    }

    #[test]
    fn payload_round_trips_through_type_name() {
        let ev = SampleEvent::Renamed(Renamed { name: "x".into() });
        assert_eq!(ev.event_type(), "sample.renamed");
        let payload = ev.to_payload().unwrap();
        assert_eq!(SampleEvent::decode(ev.event_type(), &payload).unwrap(), Some(ev));
        assert_eq!(SampleEvent::EVENT_TYPES, &["sample.renamed", "sample.closed"]);
    }
}
