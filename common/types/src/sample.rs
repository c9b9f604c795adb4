use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a measured volume relates to previous observations of the same meter.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// Point-in-time reading, no relation to prior values.
    Gauge,
    /// Change since the previous reading.
    Delta,
    /// Monotonically increasing total since some epoch.
    Cumulative,
}

/// A single measurement emitted by a pollster or decoded from a notification.
///
/// Samples are immutable once built: the pipeline and its transformers only
/// ever produce new `Sample` values, never mutate one in flight. `volume` is
/// kept as raw JSON because notification-path samples can carry null or
/// garbage volumes; the pipeline validates and drops those before publishing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SampleKind,
    pub unit: String,
    pub volume: Value,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub resource_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub resource_metadata: Map<String, Value>,
    pub source: String,
}

impl Sample {
    /// Build a sample with a numeric volume, stamped now. The usual pollster
    /// entry point; notification decoding fills the struct directly.
    pub fn new(
        name: impl Into<String>,
        kind: SampleKind,
        unit: impl Into<String>,
        volume: f64,
        resource_id: impl Into<String>,
    ) -> Sample {
        Sample {
            name: name.into(),
            kind,
            unit: unit.into(),
            volume: Value::from(volume),
            user_id: None,
            project_id: None,
            resource_id: resource_id.into(),
            timestamp: Utc::now(),
            resource_metadata: Map::new(),
            source: "polling".to_string(),
        }
    }

    /// The volume as a float, if it is numeric at all.
    pub fn volume_as_f64(&self) -> Option<f64> {
        self.volume.as_f64()
    }

    /// Wire-ready record for publisher backends.
    pub fn as_record(&self) -> Value {
        serde_json::to_value(self).expect("sample serialization is infallible")
    }
}
