use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Typed value of a single event trait.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "dtype", content = "value", rename_all = "lowercase")]
pub enum TraitValue {
    Text(String),
    Int(i64),
    Float(f64),
    Datetime(DateTime<Utc>),
}

/// One named, typed attribute extracted from an event payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Trait {
    pub name: String,
    #[serde(flatten)]
    pub value: TraitValue,
}

impl Trait {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Trait {
        Trait {
            name: name.into(),
            value: TraitValue::Text(value.into()),
        }
    }

    pub fn int(name: impl Into<String>, value: i64) -> Trait {
        Trait {
            name: name.into(),
            value: TraitValue::Int(value),
        }
    }
}

/// A discrete occurrence decoded from the notification bus.
///
/// Same immutability discipline as [`crate::Sample`]: built once at the
/// collaborator boundary, read-only downstream. Trait order is preserved
/// from decoding.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub message_id: Uuid,
    pub event_type: String,
    pub generated: DateTime<Utc>,
    pub traits: Vec<Trait>,
    pub raw: Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, traits: Vec<Trait>, raw: Value) -> Event {
        Event {
            message_id: Uuid::new_v4(),
            event_type: event_type.into(),
            generated: Utc::now(),
            traits,
            raw,
        }
    }

    /// Wire-ready record for publisher backends.
    pub fn as_record(&self) -> Value {
        serde_json::to_value(self).expect("event serialization is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traits_keep_declaration_order() {
        let event = Event::new(
            "compute.instance.create.end",
            vec![
                Trait::text("instance_id", "i-123"),
                Trait::int("vcpus", 4),
                Trait::text("state", "active"),
            ],
            Value::Null,
        );

        let names: Vec<&str> = event.traits.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["instance_id", "vcpus", "state"]);
    }

    #[test]
    fn record_carries_typed_traits() {
        let event = Event::new("volume.delete", vec![Trait::int("size_gb", 100)], Value::Null);
        let record = event.as_record();
        assert_eq!(record["event_type"], "volume.delete");
        assert_eq!(record["traits"][0]["dtype"], "int");
        assert_eq!(record["traits"][0]["value"], 100);
    }
}
